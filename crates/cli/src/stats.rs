//! Run summaries for add and apply

use hearth_engine::materialize::{Action, ApplyReport};
use hearth_engine::{CaptureReport, TargetEntry};
use owo_colors::OwoColorize;

/// Counts of what an apply run did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyStats {
    /// Files written
    pub files: usize,
    /// Directories created
    pub directories: usize,
    /// Symlinks written
    pub symlinks: usize,
    /// Scripts run
    pub scripts: usize,
    /// Entries removed
    pub removed: usize,
    /// Entries declined at a prompt
    pub skipped: usize,
    /// Scripts that failed
    pub failed: usize,
}

impl ApplyStats {
    /// Tally an apply report
    pub fn from_report(report: &ApplyReport) -> Self {
        let mut stats = Self {
            skipped: report.skipped.len(),
            failed: report.failures.len(),
            ..Self::default()
        };
        for change in &report.applied {
            match (&change.action, &change.target) {
                (Action::Remove, _) => stats.removed += 1,
                (_, TargetEntry::File { .. }) => stats.files += 1,
                (_, TargetEntry::Directory { .. }) => stats.directories += 1,
                (_, TargetEntry::Symlink { .. }) => stats.symlinks += 1,
                (_, TargetEntry::Script { .. }) => stats.scripts += 1,
                (_, TargetEntry::Remove { .. }) => stats.removed += 1,
            }
        }
        stats
    }

    /// Number of changes carried out
    pub fn total(&self) -> usize {
        self.files + self.directories + self.symlinks + self.scripts + self.removed
    }

    fn breakdown(&self) -> Vec<String> {
        [
            (self.files, "files"),
            (self.directories, "directories"),
            (self.symlinks, "symlinks"),
            (self.scripts, "scripts"),
            (self.removed, "removed"),
            (self.skipped, "skipped"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, what)| format!("{count} {what}"))
        .collect()
    }

    /// Print a one-line summary with a breakdown underneath
    pub fn print_summary(&self, dry_run: bool) {
        let total = self.total();
        if dry_run {
            println!(
                "{} {} would be applied",
                "●".bright_green(),
                total.to_string().bright_white().bold()
            );
        } else if self.failed > 0 {
            println!(
                "{} {} applied | {} {} failed",
                "●".bright_green(),
                total.to_string().bright_green().bold(),
                "●".bright_red(),
                self.failed.to_string().bright_red().bold(),
            );
        } else {
            println!(
                "{} {} applied",
                "●".bright_green(),
                total.to_string().bright_green().bold()
            );
        }

        let parts = self.breakdown();
        if parts.len() > 1 || self.skipped > 0 {
            println!("  {}", parts.join(", ").dimmed());
        }
    }
}

/// Print what an add run did
pub fn print_capture_summary(report: &CaptureReport) {
    for path in &report.captured {
        println!("  {} {}", "+".bright_green(), path);
    }
    for (path, reason) in &report.ignored {
        println!("  {} {} ({})", "-".yellow(), path, reason.dimmed());
    }

    println!(
        "{} {} added, {} unchanged",
        "●".bright_green(),
        report.captured.len().to_string().bright_green().bold(),
        report.unchanged.len()
    );
    if !report.skipped.is_empty() {
        println!("  {}", format!("{} skipped", report.skipped.len()).dimmed());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use hearth_engine::PlannedChange;
    use hearth_engine::attr::ScriptAttr;

    fn change(action: Action, target: TargetEntry) -> PlannedChange {
        PlannedChange {
            action,
            target,
            dest_modified: false,
        }
    }

    #[test]
    fn test_from_report_counts_by_kind() {
        let report = ApplyReport {
            applied: vec![
                change(
                    Action::Create,
                    TargetEntry::File {
                        path: ".bashrc".parse().unwrap(),
                        content: Vec::new(),
                        mode: 0o644,
                        create: false,
                    },
                ),
                change(
                    Action::Create,
                    TargetEntry::Directory {
                        path: ".config".parse().unwrap(),
                        mode: 0o755,
                        exact: false,
                    },
                ),
                change(
                    Action::Remove,
                    TargetEntry::File {
                        path: ".config/stale".parse().unwrap(),
                        content: Vec::new(),
                        mode: 0o644,
                        create: false,
                    },
                ),
                change(
                    Action::RunScript,
                    TargetEntry::Script {
                        path: "setup.sh".parse().unwrap(),
                        content: Vec::new(),
                        script: ScriptAttr::default(),
                    },
                ),
            ],
            skipped: vec!["a".parse().unwrap()],
            ..ApplyReport::default()
        };

        let stats = ApplyStats::from_report(&report);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.scripts, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.total(), 4);
        assert_eq!(
            stats.breakdown(),
            vec!["1 files", "1 directories", "1 scripts", "1 removed", "1 skipped"]
        );
    }
}
