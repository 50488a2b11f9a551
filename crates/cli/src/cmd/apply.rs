//! Apply command implementation
//!
//! Apply the source state to the destination directory.

use clap::Args;
use hearth_config::SecretsMode;
use hearth_engine::gate::{PolicyGate, RunContext, RunStatus};
use hearth_engine::materialize::ApplyReport;
use hearth_engine::secrets::PatternScanner;
use hearth_engine::system::{DryRunSystem, RealSystem, System};
use hearth_engine::{MaterializeOptions, Materializer};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::debug;

use crate::cmd::FilterArgs;
use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};
use crate::stats::ApplyStats;
use crate::ui::TerminalPrompter;

/// Apply the source state to the destination
#[derive(Debug, Clone, Args)]
pub struct ApplyCommand {
    /// Specific files to apply (all if not specified)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Interactive mode - confirm each change
    #[arg(short, long)]
    pub interactive: bool,

    /// Keep going when a script fails (default from config)
    #[arg(short = 'k', long)]
    pub keep_going: bool,

    /// Entry type filter
    #[command(flatten)]
    pub filter: FilterArgs,
}

impl ApplyCommand {
    fn options(&self, context: &RuntimeContext) -> Result<MaterializeOptions> {
        Ok(MaterializeOptions {
            filter: self.filter.filter(),
            targets: crate::build_filter_paths(&self.files, context.dest_dir())?,
            continue_on_script_error: self.keep_going
                || context.config.apply.continue_on_script_error,
            dry_run: self.dry_run,
        })
    }

    fn gate(&self) -> PolicyGate {
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Ignore);
        if self.interactive {
            gate.with_prompter(Box::new(TerminalPrompter::new()))
        } else {
            gate
        }
    }
}

impl Command for ApplyCommand {
    type Output = ApplyReport;

    fn execute(&self, context: &RuntimeContext) -> Result<ApplyReport> {
        let state = context.read_source_state()?;
        let options = self.options(context)?;
        let processor = context.processor()?;
        let store = context.open_store()?;

        let dry_run_system = DryRunSystem::new();
        let system: &dyn System = if self.dry_run {
            &dry_run_system
        } else {
            &RealSystem
        };

        let report = Materializer::new(context.dest_dir().clone(), &processor, system, &store)
            .apply(&state, &options, &self.gate(), &mut RunContext::new())?;

        for change in &report.applied {
            println!("  {} {}", "●".bright_green(), change);
        }
        if self.dry_run {
            for operation in dry_run_system.operations() {
                debug!(?operation, "Would perform");
            }
        }
        for failure in &report.failures {
            println!("  {} {}", "●".bright_red(), failure);
        }
        if report.status == RunStatus::Quit {
            println!("{}", "Stopped at user request".yellow());
        }

        let stats = ApplyStats::from_report(&report);
        if self.files.len() != 1 {
            println!();
            stats.print_summary(self.dry_run);
        }

        if stats.failed > 0 {
            return Err(CommandError::ApplyFailed {
                failed: stats.failed,
                total: stats.total() + stats.failed,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::common::ResolvedPaths;
    use hearth_config::Config;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        context: RuntimeContext,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("home")).unwrap();
            fs::create_dir_all(temp.path().join("source")).unwrap();
            let config =
                Config::from_toml_str("[variables]\nemail = \"me@example.com\"\n", temp.path())
                    .unwrap();
            let paths = ResolvedPaths::resolve(
                &temp.path().join("source"),
                &temp.path().join("home"),
                None,
                temp.path().join("state/state.db"),
            )
            .unwrap();
            Self {
                context: RuntimeContext::new(config, paths),
                _temp: temp,
            }
        }

        fn source_file(&self, rel: &str, content: &str) {
            let path = self.context.source_dir().as_path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn home(&self, rel: &str) -> PathBuf {
            self.context.dest_dir().as_path().join(rel)
        }
    }

    fn apply(extra: &[&str]) -> ApplyCommand {
        #[derive(clap::Parser)]
        struct Harness {
            #[command(flatten)]
            apply: ApplyCommand,
        }
        let args = std::iter::once("apply").chain(extra.iter().copied());
        <Harness as clap::Parser>::try_parse_from(args).unwrap().apply
    }

    #[test]
    fn test_apply_writes_rendered_files() {
        let fixture = Fixture::new();
        fixture.source_file("dot_gitconfig.tmpl", "email = {{ email }}\n");
        fixture.source_file("dot_config/app/settings", "x\n");

        let report = apply(&[]).execute(&fixture.context).unwrap();

        assert_eq!(report.applied.len(), 4);
        assert_eq!(
            fs::read_to_string(fixture.home(".gitconfig")).unwrap(),
            "email = me@example.com\n"
        );
        assert!(fixture.home(".config/app/settings").is_file());
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let fixture = Fixture::new();
        fixture.source_file("dot_bashrc", "alias ll='ls -l'\n");

        let report = apply(&["--dry-run"]).execute(&fixture.context).unwrap();

        assert_eq!(report.applied.len(), 1);
        assert!(!fixture.home(".bashrc").exists());
    }

    #[test]
    fn test_files_and_filters_limit_the_run() {
        let fixture = Fixture::new();
        fixture.source_file("dot_a", "a");
        fixture.source_file("dot_b", "b");
        fixture.source_file("symlink_dot_link", "dot_a");

        let only_a = fixture.home(".a").display().to_string();
        apply(&[&only_a]).execute(&fixture.context).unwrap();
        assert!(fixture.home(".a").exists());
        assert!(!fixture.home(".b").exists());

        apply(&["--exclude", "symlinks"])
            .execute(&fixture.context)
            .unwrap();
        assert!(fixture.home(".b").exists());
        assert!(fs::symlink_metadata(fixture.home(".link")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_script_reports_failure_with_keep_going() {
        let fixture = Fixture::new();
        fixture.source_file("run_fail.sh", "#!/bin/sh\nexit 2\n");
        fixture.source_file("dot_profile", "x");

        let result = apply(&["--keep-going"]).execute(&fixture.context);

        assert!(matches!(
            result,
            Err(CommandError::ApplyFailed { failed: 1, .. })
        ));
        assert!(fixture.home(".profile").is_file());
    }
}
