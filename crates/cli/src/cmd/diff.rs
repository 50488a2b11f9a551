//! Diff command implementation
//!
//! Show what `apply` would change, as a unified diff from the destination
//! to the target state.

use clap::Args;
use hearth_core::path::RelPath;
use hearth_engine::materialize::Action;
use hearth_engine::secrets::is_binary;
use hearth_engine::system::{RealSystem, mode_of};
use hearth_engine::{MaterializeOptions, Materializer, PlannedChange, TargetEntry};
use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cmd::FilterArgs;
use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Show differences between the destination and the source state
#[derive(Debug, Clone, Args)]
pub struct DiffCommand {
    /// Specific files to diff (all if not specified)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Entry type filter
    #[command(flatten)]
    pub filter: FilterArgs,
}

impl Command for DiffCommand {
    type Output = String;

    fn execute(&self, context: &RuntimeContext) -> Result<String> {
        let state = context.read_source_state()?;
        let options = MaterializeOptions {
            filter: self.filter.filter(),
            targets: crate::build_filter_paths(&self.files, context.dest_dir())?,
            ..MaterializeOptions::default()
        };
        let processor = context.processor()?;
        let store = context.open_store()?;

        let changes = Materializer::new(context.dest_dir().clone(), &processor, &RealSystem, &store)
            .plan(&state, &options)?;

        let dest_dir = context.dest_dir().as_path();
        let mut output = String::new();
        for change in changes.iter().filter(|c| c.is_mutating()) {
            output.push_str(&diff_change(change, dest_dir)?);
        }

        print_colored_diff(&output);
        Ok(output)
    }
}

/// Diff one planned change against the destination
fn diff_change(change: &PlannedChange, dest_dir: &Path) -> Result<String> {
    let path = change.path();
    let dest_path = dest_dir.join(path.as_path());
    let meta = fs::symlink_metadata(&dest_path).ok();

    if change.action == Action::Remove {
        let old = meta
            .as_ref()
            .filter(|m| m.is_file())
            .map(|_| fs::read(&dest_path))
            .transpose()?;
        return Ok(format_removed(path, old.as_deref()));
    }

    Ok(match &change.target {
        TargetEntry::File { content, mode, .. } => {
            let old = match &meta {
                Some(m) if m.is_file() => Some((fs::read(&dest_path)?, mode_of(m))),
                _ => None,
            };
            match old {
                Some((old_content, old_mode)) => {
                    format_modified(path, &old_content, content, old_mode, Some(*mode))
                }
                None => format_new(path, content, Some(*mode), None),
            }
        }
        TargetEntry::Directory { mode, .. } => format!("new directory mode {mode:06o} {path}\n"),
        TargetEntry::Symlink { target, .. } => {
            let old = fs::read_link(&dest_path)
                .map(|t| format!("{}\n", t.display()))
                .unwrap_or_default();
            unified_diff(&old, &format!("{target}\n"), path)
        }
        TargetEntry::Script { content, .. } => format_new(path, content, None, Some("script")),
        TargetEntry::Remove { .. } => format_removed(path, None),
    })
}

/// Format mode diff header
fn format_mode_diff(old_mode: Option<u32>, new_mode: Option<u32>) -> String {
    const PERM_MASK: u32 = 0o7777;
    match (old_mode, new_mode) {
        (Some(old), Some(new)) if old & PERM_MASK != new & PERM_MASK => format!(
            "old mode {:06o}\nnew mode {:06o}\n",
            old & PERM_MASK,
            new & PERM_MASK
        ),
        _ => String::new(),
    }
}

fn format_modified(
    path: &RelPath,
    old: &[u8],
    new: &[u8],
    old_mode: Option<u32>,
    new_mode: Option<u32>,
) -> String {
    let mut output = format!("diff a/{path} b/{path}\n");
    output.push_str(&format_mode_diff(old_mode, new_mode));

    if old == new {
        return output;
    }
    if is_binary(old) || is_binary(new) {
        output.push_str(&format!("Binary files a/{path} and b/{path} differ\n"));
        return output;
    }

    output.push_str(&unified_diff(
        &String::from_utf8_lossy(old),
        &String::from_utf8_lossy(new),
        path,
    ));
    output
}

/// Unified diff using the similar crate
fn unified_diff(old: &str, new: &str, path: &RelPath) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();
    output.push_str(&format!("--- a/{path}\n"));
    output.push_str(&format!("+++ b/{path}\n"));

    for group in diff.grouped_ops(3) {
        if let (Some(first), Some(last)) = (group.first(), group.last()) {
            let old_start = first.old_range().start + 1;
            let old_len = last.old_range().end - first.old_range().start;
            let new_start = first.new_range().start + 1;
            let new_len = last.new_range().end - first.new_range().start;
            output.push_str(&format!(
                "@@ -{old_start},{old_len} +{new_start},{new_len} @@\n"
            ));
        }

        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                output.push_str(sign);
                output.push_str(change.value());
                if !change.value().ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }
    output
}

/// Format a file that does not exist yet
fn format_new(path: &RelPath, content: &[u8], mode: Option<u32>, kind: Option<&str>) -> String {
    let mut output = String::new();
    match (kind, mode) {
        (Some(kind), _) => output.push_str(&format!("new {kind} {path}\n")),
        (None, Some(mode)) => output.push_str(&format!("new file mode {mode:06o}\n")),
        (None, None) => {}
    }

    if is_binary(content) {
        output.push_str(&format!("Binary file b/{path} added\n"));
        return output;
    }

    let text = String::from_utf8_lossy(content);
    output.push_str("--- /dev/null\n");
    output.push_str(&format!("+++ b/{path}\n"));
    output.push_str(&format!("@@ -0,0 +1,{} @@\n", text.lines().count()));
    for line in text.lines() {
        output.push_str(&format!("+{line}\n"));
    }
    output
}

/// Format an entry apply would delete
fn format_removed(path: &RelPath, content: Option<&[u8]>) -> String {
    let mut output = format!("deleted {path}\n");
    if let Some(content) = content.filter(|c| !is_binary(c)) {
        let text = String::from_utf8_lossy(content);
        output.push_str(&format!("--- a/{path}\n"));
        output.push_str("+++ /dev/null\n");
        output.push_str(&format!("@@ -1,{} +0,0 @@\n", text.lines().count()));
        for line in text.lines() {
            output.push_str(&format!("-{line}\n"));
        }
    }
    output
}

/// Print colored diff output
fn print_colored_diff(diff: &str) {
    for line in diff.lines() {
        if line.starts_with("---") || line.starts_with("+++") || line.starts_with("diff ") {
            println!("{}", line.bold());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}
