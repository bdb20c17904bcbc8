//! Text and JSON rendering of audit results.
//!
//! Reports go to any `io::Write`. A partial scan always ends with a
//! `(partial: <reason>)` line in text form and `"complete": false` in JSON.

use std::io::Write;

use serde::Serialize;

use pinscan_store::{BlockStore, Node};

use crate::classify::ObjectInfo;
use crate::control::{Scan, StopReason};
use crate::error::{AuditError, AuditResult};
use crate::lost_pins::{LostPins, WalkStats};

/// Render the directory-entry preview line for a directory node.
///
/// The first `preview` names are quoted; ` ...` follows when more exist.
pub fn format_dirents(node: &Node, preview: usize) -> String {
    let mut line = String::from("\tDirents: [ ");
    for link in node.links.iter().take(preview) {
        line.push_str(&format!("{:?} ", link.name));
    }
    line.push(']');
    if node.links.len() > preview {
        line.push_str(" ...");
    }
    line
}

fn write_partial_marker<W: Write>(out: &mut W, stopped: Option<StopReason>) -> AuditResult<()> {
    if let Some(reason) = stopped {
        writeln!(out, "(partial: {reason})")?;
    }
    Ok(())
}

/// Write the roots report as text.
///
/// Directory rows are followed by a preview of their entry names; if the
/// directory cannot be re-fetched, an error line is written for that row
/// only.
pub fn write_roots_text<W, S>(
    out: &mut W,
    store: &S,
    scan: &Scan<Vec<ObjectInfo>>,
    preview: usize,
) -> AuditResult<()>
where
    W: Write,
    S: BlockStore + ?Sized,
{
    writeln!(out, "{:<64} Type\tSize\tPinned(recursively)", "Hash")?;
    for info in &scan.value {
        writeln!(
            out,
            "{} {}\t{}\t{}",
            info.hash, info.declared_type, info.total_size, info.pinned
        )?;
        if info.declared_type.is_directory() {
            match store.fetch_node(&info.hash) {
                Ok(node) => writeln!(out, "{}", format_dirents(&node, preview))?,
                Err(e) => writeln!(out, "\tError fetching node: {e}")?,
            }
        }
    }
    write_partial_marker(out, scan.stopped)
}

/// Write the lost-pins report as text: one hash per line.
pub fn write_lost_pins_text<W: Write>(out: &mut W, scan: &Scan<LostPins>) -> AuditResult<()> {
    for hash in &scan.value.missing {
        writeln!(out, "{hash}")?;
    }
    write_partial_marker(out, scan.stopped)
}

#[derive(Serialize)]
struct ObjectRow<'a> {
    #[serde(flatten)]
    info: &'a ObjectInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    dirents: Option<Vec<&'a str>>,
    /// Set when the directory has more entries than `dirents` lists.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dirents_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct RootsDocument<'a> {
    complete: bool,
    stopped: Option<StopReason>,
    objects: Vec<ObjectRow<'a>>,
}

#[derive(Serialize)]
struct LostPinsDocument<'a> {
    complete: bool,
    stopped: Option<StopReason>,
    missing: Vec<String>,
    stats: &'a WalkStats,
}

fn to_json<W: Write, T: Serialize>(out: &mut W, doc: &T) -> AuditResult<()> {
    serde_json::to_writer_pretty(&mut *out, doc)
        .map_err(|e| AuditError::Serialization(e.to_string()))?;
    writeln!(out)?;
    Ok(())
}

/// Write the roots report as a JSON document.
pub fn write_roots_json<W, S>(
    out: &mut W,
    store: &S,
    scan: &Scan<Vec<ObjectInfo>>,
    preview: usize,
) -> AuditResult<()>
where
    W: Write,
    S: BlockStore + ?Sized,
{
    // Directory nodes are fetched up front so the rows can borrow names.
    let dir_nodes: Vec<Option<Result<Node, String>>> = scan
        .value
        .iter()
        .map(|info| {
            info.declared_type
                .is_directory()
                .then(|| store.fetch_node(&info.hash).map_err(|e| e.to_string()))
        })
        .collect();

    let objects = scan
        .value
        .iter()
        .zip(&dir_nodes)
        .map(|(info, dir)| {
            let (dirents, dirents_truncated, error) = match dir {
                Some(Ok(node)) => (
                    Some(node.links.iter().take(preview).map(|l| l.name.as_str()).collect()),
                    node.links.len() > preview,
                    None,
                ),
                Some(Err(e)) => (None, false, Some(e.clone())),
                None => (None, false, None),
            };
            ObjectRow {
                info,
                dirents,
                dirents_truncated,
                error,
            }
        })
        .collect();

    to_json(
        out,
        &RootsDocument {
            complete: scan.is_complete(),
            stopped: scan.stopped,
            objects,
        },
    )
}

/// Write the lost-pins report as a JSON document.
pub fn write_lost_pins_json<W: Write>(out: &mut W, scan: &Scan<LostPins>) -> AuditResult<()> {
    to_json(
        out,
        &LostPinsDocument {
            complete: scan.is_complete(),
            stopped: scan.stopped,
            missing: scan.value.missing.iter().map(|h| h.to_hex()).collect(),
            stats: &scan.value.stats,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DeclaredType;
    use pinscan_store::{FsKind, FsNode, InMemoryBlockStore, Link};
    use pinscan_types::ContentHash;

    fn dir_with(n: usize) -> Node {
        let links = (0..n)
            .map(|i| Link::new(format!("entry{i}"), ContentHash::from_hash([i as u8; 32]), 1))
            .collect();
        Node::new(FsNode::directory().encode().unwrap(), links)
    }

    fn render_roots(store: &InMemoryBlockStore, scan: &Scan<Vec<ObjectInfo>>) -> String {
        let mut out = Vec::new();
        write_roots_text(&mut out, store, scan, 5).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn dir_row(hash: ContentHash) -> ObjectInfo {
        ObjectInfo {
            hash,
            declared_type: DeclaredType::UnixFs(FsKind::Directory),
            total_size: 10,
            pinned: true,
        }
    }

    #[test]
    fn seven_entries_show_five_and_an_ellipsis() {
        let line = format_dirents(&dir_with(7), 5);
        assert_eq!(
            line,
            "\tDirents: [ \"entry0\" \"entry1\" \"entry2\" \"entry3\" \"entry4\" ] ..."
        );
    }

    #[test]
    fn three_entries_show_all_without_ellipsis() {
        let line = format_dirents(&dir_with(3), 5);
        assert_eq!(line, "\tDirents: [ \"entry0\" \"entry1\" \"entry2\" ]");
    }

    #[test]
    fn names_are_quoted_verbatim() {
        let node = Node::new(vec![], vec![Link::new("a \"b\"", ContentHash::digest(b"x"), 0)]);
        assert_eq!(format_dirents(&node, 5), "\tDirents: [ \"a \\\"b\\\"\" ]");
    }

    #[test]
    fn roots_text_lists_rows_and_dirents() {
        let store = InMemoryBlockStore::new();
        let dir = store.put_node(&dir_with(2)).unwrap();
        let scan = Scan::complete(vec![dir_row(dir)]);
        let text = render_roots(&store, &scan);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("Hash"));
        assert_eq!(lines[1], format!("{dir} unixfs-Directory\t10\ttrue"));
        assert_eq!(lines[2], "\tDirents: [ \"entry0\" \"entry1\" ]");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn refetch_failure_is_reported_for_that_row_only() {
        let store = InMemoryBlockStore::new();
        let present = store.put_node(&dir_with(1)).unwrap();
        let gone = ContentHash::digest(b"gone");
        let scan = Scan::complete(vec![dir_row(gone), dir_row(present)]);
        let text = render_roots(&store, &scan);
        assert!(text.contains("\tError fetching node: block not found"));
        assert!(text.contains("\tDirents: [ \"entry0\" ]"));
    }

    #[test]
    fn partial_scans_are_marked() {
        let store = InMemoryBlockStore::new();
        let scan = Scan::partial(Vec::new(), StopReason::Cancelled);
        assert!(render_roots(&store, &scan).ends_with("(partial: cancelled)\n"));

        let mut out = Vec::new();
        let lost = Scan::partial(LostPins::default(), StopReason::DeadlineExceeded);
        write_lost_pins_text(&mut out, &lost).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "(partial: deadline exceeded)\n");
    }

    #[test]
    fn lost_pins_text_is_one_hash_per_line() {
        let mut found = LostPins::default();
        let (a, b) = (ContentHash::digest(b"a"), ContentHash::digest(b"b"));
        found.missing.extend([a, b]);
        let mut out = Vec::new();
        write_lost_pins_text(&mut out, &Scan::complete(found)).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut expected = vec![a.to_hex(), b.to_hex()];
        expected.sort();
        assert_eq!(text.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn roots_json_carries_completeness_and_dirents() {
        let store = InMemoryBlockStore::new();
        let dir = store.put_node(&dir_with(7)).unwrap();
        let scan = Scan::partial(vec![dir_row(dir)], StopReason::VisitLimit);
        let mut out = Vec::new();
        write_roots_json(&mut out, &store, &scan, 5).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["complete"], false);
        assert_eq!(doc["stopped"], "visit_limit");
        assert_eq!(doc["objects"][0]["type"], "unixfs-Directory");
        assert_eq!(doc["objects"][0]["dirents"].as_array().unwrap().len(), 5);
        assert_eq!(doc["objects"][0]["dirents_truncated"], true);
    }

    #[test]
    fn roots_json_omits_truncation_flag_for_short_directories() {
        let store = InMemoryBlockStore::new();
        let dir = store.put_node(&dir_with(3)).unwrap();
        let scan = Scan::complete(vec![dir_row(dir)]);
        let mut out = Vec::new();
        write_roots_json(&mut out, &store, &scan, 5).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let row = &doc["objects"][0];
        assert_eq!(row["dirents"].as_array().unwrap().len(), 3);
        assert!(row.get("dirents_truncated").is_none());
    }

    #[test]
    fn lost_pins_json_lists_hex_hashes() {
        let mut found = LostPins::default();
        let a = ContentHash::digest(b"a");
        found.missing.insert(a);
        let mut out = Vec::new();
        write_lost_pins_json(&mut out, &Scan::complete(found)).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["complete"], true);
        assert_eq!(doc["missing"][0], a.to_hex());
    }
}
