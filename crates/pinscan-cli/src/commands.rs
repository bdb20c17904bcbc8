use std::future::Future;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use tokio::signal;
use tokio::task::{self, JoinError, JoinHandle};
use tracing::debug;

use pinscan_audit::report;
use pinscan_audit::{Auditor, CancelToken};

use crate::cli::{Cli, Command, OutputFormat};

/// Outcome of a run that got past setup.
pub struct Summary {
    pub found: usize,
    pub partial: Option<String>,
}

/// How a supervised scan ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Finished(T),
    /// A second interrupt arrived before the cancelled scan wound down.
    ForceQuit,
}

/// Wait for `scan`, cancelling it on the first interrupt and giving up on
/// the second.
///
/// An `interrupt` future that resolves to an error never counts as an
/// interrupt.
pub async fn supervise<T, F, Fut>(
    mut scan: JoinHandle<T>,
    cancel: &CancelToken,
    mut interrupt: F,
) -> Result<Outcome<T>, JoinError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    tokio::select! {
        joined = &mut scan => return joined.map(Outcome::Finished),
        Ok(()) = interrupt() => {
            eprintln!(
                "{} interrupted, finishing partial report (interrupt again to quit)",
                "!".yellow().bold()
            );
            cancel.cancel();
        }
    }
    tokio::select! {
        joined = &mut scan => joined.map(Outcome::Finished),
        Ok(()) = interrupt() => Ok(Outcome::ForceQuit),
    }
}

/// Open the repository, run `command` on a blocking task and print its
/// report to stdout.
///
/// Ctrl-C cancels the scan; whatever it found so far is still printed and
/// labelled partial. A second Ctrl-C abandons the scan.
pub async fn run_command(
    cli: &Cli,
    command: Command,
    repo: &Path,
) -> anyhow::Result<Outcome<Summary>> {
    let mut auditor = Auditor::open(repo)?;

    let config = auditor.config_mut();
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if cli.max_visits.is_some() {
        config.max_visits = cli.max_visits;
    }
    if cli.timeout_secs.is_some() {
        config.deadline_secs = cli.timeout_secs;
    }
    debug!(repo = %repo.display(), config = ?auditor.config(), "repository opened");

    let cancel = CancelToken::new();
    let ctl = auditor.control(cancel.clone());
    let format = cli.format;

    let scan = task::spawn_blocking(move || -> anyhow::Result<Summary> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let summary = match command {
            Command::Roots => {
                let found = auditor.roots_report(&ctl)?;
                let preview = auditor.config().directory_preview;
                match format {
                    OutputFormat::Text => {
                        report::write_roots_text(&mut out, auditor.store(), &found, preview)?
                    }
                    OutputFormat::Json => {
                        report::write_roots_json(&mut out, auditor.store(), &found, preview)?
                    }
                }
                Summary {
                    found: found.value.len(),
                    partial: found.stopped.map(|r| r.to_string()),
                }
            }
            Command::LostPins => {
                let found = auditor.lost_pins(&ctl)?;
                match format {
                    OutputFormat::Text => report::write_lost_pins_text(&mut out, &found)?,
                    OutputFormat::Json => report::write_lost_pins_json(&mut out, &found)?,
                }
                Summary {
                    found: found.value.missing.len(),
                    partial: found.stopped.map(|r| r.to_string()),
                }
            }
        };
        out.flush()?;
        Ok(summary)
    });

    match supervise(scan, &cancel, signal::ctrl_c)
        .await
        .context("audit task failed")?
    {
        Outcome::Finished(summary) => Ok(Outcome::Finished(summary?)),
        Outcome::ForceQuit => Ok(Outcome::ForceQuit),
    }
}

/// Print a one-line status for a finished run on stderr.
pub fn print_summary(command: Command, summary: &Summary) {
    let what = match command {
        Command::Roots => "top-level objects",
        Command::LostPins => "lost pins",
    };
    match &summary.partial {
        None => eprintln!("{} {} {}", "✓".green().bold(), summary.found, what),
        Some(reason) => eprintln!(
            "{} {} {} ({})",
            "~".yellow().bold(),
            summary.found,
            what,
            format!("partial: {reason}").yellow()
        ),
    }
}
