//! Add command implementation
//!
//! Capture destination files into the hearth source directory.

use anyhow::Context;
use clap::Args;
use hearth_config::SecretsMode;
use hearth_core::path::AbsPath;
use hearth_engine::gate::{PolicyGate, RunContext, RunStatus};
use hearth_engine::scanner::{DestinationScanner, ScanOptions, partition_supported};
use hearth_engine::secrets::PatternScanner;
use hearth_engine::system::RealSystem;
use hearth_engine::{Capture, CaptureOptions, CaptureReport};
use owo_colors::OwoColorize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::cmd::FilterArgs;
use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::{CommandError, Result};
use crate::stats::print_capture_summary;
use crate::ui::TerminalPrompter;

/// How to handle files containing secrets
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SecretsArg {
    /// Ignore secrets and add files anyway
    Ignore,
    /// Show warnings about secrets but proceed
    Warning,
    /// Fail if secrets are detected
    Error,
}

impl From<SecretsArg> for SecretsMode {
    fn from(arg: SecretsArg) -> Self {
        match arg {
            SecretsArg::Ignore => Self::Ignore,
            SecretsArg::Warning => Self::Warning,
            SecretsArg::Error => Self::Error,
        }
    }
}

/// Add files to the source directory
#[derive(Debug, Clone, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct AddCommand {
    /// Files to add to the source directory
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Mark files as templates
    #[arg(short, long)]
    pub template: bool,

    /// Replace variable values found in files with template expressions
    #[arg(short, long)]
    pub autotemplate: bool,

    /// Encrypt files with age
    #[arg(short = 'E', long)]
    pub encrypt: bool,

    /// Only create the file when it is missing or empty on apply
    #[arg(short, long)]
    pub create: bool,

    /// Mark directories as exact: apply removes anything unmanaged inside
    #[arg(long)]
    pub exact: bool,

    /// Replace existing entries without asking, even if attributes are dropped
    #[arg(short, long)]
    pub force: bool,

    /// Ask before adding each entry
    #[arg(short, long)]
    pub interactive: bool,

    /// Do not warn about entries that are not added
    #[arg(short, long)]
    pub quiet: bool,

    /// Add the targets of symlinks instead of the symlinks
    #[arg(short = 'L', long)]
    pub follow: bool,

    /// Do not descend into directories
    #[arg(long)]
    pub no_recursive: bool,

    /// Do not keep encryption, templating, create and exact from existing entries
    #[arg(long)]
    pub no_inherit: bool,

    /// Template symlink targets that point inside the source or destination
    #[arg(long)]
    pub template_symlinks: bool,

    /// How to handle files containing secrets (default from config)
    #[arg(long, value_enum)]
    pub secrets: Option<SecretsArg>,

    /// Entry type filter
    #[command(flatten)]
    pub filter: FilterArgs,
}

impl AddCommand {
    fn capture_options(&self, context: &RuntimeContext) -> CaptureOptions {
        let config = &context.config.add;
        CaptureOptions {
            auto_template: self.autotemplate,
            create: self.create,
            encrypt: self.encrypt || config.encrypt,
            exact: self.exact,
            filter: self.filter.filter(),
            protected_paths: context.protected_paths(),
            protected_fatal: false,
            template: self.template,
            template_symlinks: self.template_symlinks || config.template_symlinks,
            inherit: config.inherit && !self.no_inherit,
        }
    }

    fn gate(&self, context: &RuntimeContext) -> PolicyGate {
        let severity = self
            .secrets
            .map_or(context.config.add.secrets, SecretsMode::from);
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), severity)
            .with_force(self.force)
            .with_quiet(self.quiet);
        if self.interactive {
            gate.with_prompter(Box::new(TerminalPrompter::new()))
        } else {
            gate
        }
    }
}

impl Command for AddCommand {
    type Output = CaptureReport;

    fn execute(&self, context: &RuntimeContext) -> Result<CaptureReport> {
        let source_dir = context.source_dir();
        let dest_dir = context.dest_dir();

        if !source_dir.as_path().exists() {
            fs::create_dir_all(source_dir.as_path()).with_context(|| {
                format!("Failed to create source directory: {source_dir}")
            })?;
        }

        let roots: Vec<AbsPath> = crate::build_filter_paths(&self.files, dest_dir)?
            .iter()
            .map(|rel| dest_dir.join(rel))
            .collect();

        let scanner = DestinationScanner::new(
            dest_dir.clone(),
            ScanOptions {
                follow: self.follow,
                recursive: !self.no_recursive,
            },
        );
        let (observations, unsupported) = partition_supported(scanner.scan(&roots)?);
        for error in &unsupported {
            warn!("{error}");
        }
        debug!(count = observations.len(), "Scanned destination");

        let codec = context.codec();
        let processor = context.processor()?;
        let store = context.open_store()?;
        let mut state = context.read_source_state()?;

        let report = Capture::new(dest_dir.clone(), &codec, &processor, &RealSystem, &store).run(
            &mut state,
            &observations,
            &self.capture_options(context),
            &self.gate(context),
            &mut RunContext::new(),
        )?;

        print_capture_summary(&report);
        if report.status == RunStatus::Quit {
            println!("{}", "Stopped at user request".yellow());
        }

        if !unsupported.is_empty() {
            return Err(CommandError::AddFailed {
                failed: unsupported.len(),
                total: observations.len() + unsupported.len(),
            });
        }
        Ok(report)
    }
}
