use std::env;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Environment variable naming the repository when `--repo` is absent.
pub const REPO_ENV: &str = "PINSCAN_PATH";

#[derive(Parser, Debug)]
#[command(
    name = "pinscan",
    about = "Read-only audit of a pinned block store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Repository to audit [default: $PINSCAN_PATH, then ~/.pinscan]
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Threads for the link scan (overrides pinscan.toml)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Stop after this many block fetches
    #[arg(long, global = true)]
    pub max_visits: Option<usize>,

    /// Stop after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List top-level objects with type, size and pin status
    Roots,
    /// List pinned hashes found in stale pinset shards but not in the live pins
    LostPins,
}

impl Cli {
    /// The repository path: `--repo`, then `$PINSCAN_PATH`, then `~/.pinscan`.
    pub fn repo_path(&self) -> Option<PathBuf> {
        resolve_repo(
            self.repo.clone(),
            env::var_os(REPO_ENV).map(PathBuf::from),
            env::var_os("HOME").map(PathBuf::from),
        )
    }
}

fn resolve_repo(
    flag: Option<PathBuf>,
    from_env: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    flag.or(from_env)
        .or_else(|| home.map(|h| h.join(".pinscan")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parse_roots() {
        let cli = Cli::try_parse_from(["pinscan", "roots"]).unwrap();
        assert_eq!(cli.command, Some(Command::Roots));
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_lost_pins_with_options() {
        let cli = Cli::try_parse_from([
            "pinscan",
            "lost-pins",
            "--repo",
            "/tmp/r",
            "--format",
            "json",
            "--max-visits",
            "100",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Command::LostPins));
        assert_eq!(cli.repo, Some(PathBuf::from("/tmp/r")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.max_visits, Some(100));
        assert!(cli.verbose);
    }

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::try_parse_from(["pinscan"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn unknown_subcommand_is_invalid_subcommand() {
        let err = Cli::try_parse_from(["pinscan", "bogus"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn repo_resolution_order() {
        let flag = Some(PathBuf::from("/flag"));
        let env = Some(PathBuf::from("/env"));
        let home = Some(PathBuf::from("/home/u"));
        assert_eq!(
            resolve_repo(flag.clone(), env.clone(), home.clone()),
            Some(PathBuf::from("/flag"))
        );
        assert_eq!(
            resolve_repo(None, env, home.clone()),
            Some(PathBuf::from("/env"))
        );
        assert_eq!(
            resolve_repo(None, None, home),
            Some(PathBuf::from("/home/u/.pinscan"))
        );
        assert_eq!(resolve_repo(None, None, None), None);
    }
}
