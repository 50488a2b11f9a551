//! hearth CLI library
//!
//! Argument parsing, configuration loading and the `add`, `apply` and
//! `diff` commands. Kept as a library so the commands can be tested.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;
pub mod stats;
pub mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_core::path::{AbsPath, RelPath};
use std::path::{Path, PathBuf};

use command::Command;
use common::{ResolvedPaths, RuntimeContext};

/// hearth - keep a dotfile source tree and your home directory in step
#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Manage your dotfiles with hearth")]
#[command(version)]
#[command(long_about = "Manage your dotfiles with hearth

Files in your home directory are captured into a source tree whose file
names carry their attributes (dot_, private_, executable_, encrypted_ ...),
and the source tree is applied back to your home directory.

Features:
  • Template support with Jinja2-like syntax
  • Age encryption for sensitive files
  • Exact directories, create-once files, symlinks and scripts")]
pub struct Cli {
    /// Path to the source directory
    #[arg(long, env = "HEARTH_SOURCE_DIR", value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Path to the destination directory (usually $HOME)
    #[arg(long, env = "HEARTH_DEST_DIR", value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, env = "HEARTH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, env = "HEARTH_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for hearth CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Add files from the destination to the source directory
    Add(cmd::add::AddCommand),

    /// Apply the source state to the destination
    Apply(cmd::apply::ApplyCommand),

    /// Show differences between the destination and the source state
    Diff(cmd::diff::DiffCommand),
}

/// Load the config file named on the command line, or the default one
///
/// An explicit `--config` must exist; the default location is optional.
fn load_config(cli: &Cli) -> Result<(hearth_config::Config, Option<PathBuf>)> {
    if let Some(path) = &cli.config {
        let config = hearth_config::Config::load(path)
            .map_err(error::CommandError::config)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        return Ok((config, Some(path.clone())));
    }

    match hearth_config::default_config_file() {
        Some(path) => {
            let config = hearth_config::Config::load_or_default(&path)
                .map_err(error::CommandError::config)?;
            let loaded = path.exists().then_some(path);
            Ok((config, loaded))
        }
        None => Ok((hearth_config::Config::default(), None)),
    }
}

/// Determine source and destination directories from CLI and config
fn determine_directories(
    cli: &Cli,
    config: &hearth_config::Config,
) -> Result<(PathBuf, PathBuf)> {
    let source_dir = cli
        .source
        .clone()
        .or_else(|| config.general.src_dir.clone())
        .or_else(hearth_config::default_source_dir)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Could not determine source directory. Please specify with --source or set general.srcDir in the config file."
            )
        })?;

    let dest_dir = cli
        .dest
        .clone()
        .or_else(|| config.general.dst_dir.clone())
        .or_else(::dirs::home_dir)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Could not determine destination directory (home directory not found). \
                 Please specify with --dest or set general.dstDir in the config file."
            )
        })?;

    Ok((expand_tilde(&source_dir), expand_tilde(&dest_dir)))
}

/// Main entry point for the CLI logic
///
/// # Errors
///
/// Returns an error if:
/// - Logging initialization fails
/// - Configuration loading fails
/// - Source or destination directories cannot be determined
/// - Command execution fails
pub fn run(cli: Cli) -> Result<()> {
    hearth_config::logging::init(cli.verbose, cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    let (config, config_file) = load_config(&cli)?;
    let (source_dir, dest_dir) = determine_directories(&cli, &config)?;
    let state_file = hearth_config::state_file()
        .ok_or_else(|| anyhow::anyhow!("Could not determine the state directory"))?;

    let working_tree = config.general.working_tree.as_deref().map(expand_tilde);
    let paths = ResolvedPaths::resolve(&source_dir, &dest_dir, config_file, state_file)?
        .with_working_tree(working_tree.as_deref())?;
    tracing::debug!(
        source = %paths.source_dir,
        dest = %paths.dest_dir,
        state = %paths.state_file.display(),
        "Resolved paths"
    );
    let context = RuntimeContext::new(config, paths);

    execute_command(cli.command, &context)
}

/// Execute the command based on the command type
fn execute_command(command: Commands, context: &RuntimeContext) -> Result<()> {
    match command {
        Commands::Add(add_cmd) => {
            add_cmd.execute(context)?;
        }
        Commands::Apply(apply_cmd) => {
            apply_cmd.execute(context)?;
        }
        Commands::Diff(diff_cmd) => {
            diff_cmd.execute(context)?;
        }
    }
    Ok(())
}

// ============================================================================
// Common utility functions
// ============================================================================

/// Turn user-provided file arguments into destination-relative targets
///
/// The last component is not resolved, so naming a symlink selects the
/// symlink rather than what it points to.
pub(crate) fn build_filter_paths(
    files: &[PathBuf],
    dest_abs: &AbsPath,
) -> error::Result<Vec<RelPath>> {
    files
        .iter()
        .map(|file_path| {
            let file_abs = resolve_absolute_path(&expand_tilde(file_path))?;
            file_abs.strip_prefix(dest_abs).map_err(|_| {
                error::CommandError::path_not_under_dest(
                    file_abs.into_path_buf(),
                    dest_abs.as_path().to_path_buf(),
                )
            })
        })
        .collect()
}

/// Expand tilde (~) in a path to the home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if !path.as_os_str().as_encoded_bytes().starts_with(b"~") {
        return path.to_path_buf();
    }

    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };

    match path.to_str() {
        Some("~") => home,
        Some(s) if s.starts_with("~/") => home.join(&s[2..]),
        _ => path.to_path_buf(),
    }
}

/// Resolve a path to an absolute path
///
/// The parent directory is canonicalized when it exists; the file name is
/// kept as given.
pub(crate) fn resolve_absolute_path(path: &Path) -> error::Result<AbsPath> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let resolved = match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match std::fs::canonicalize(parent) {
            Ok(parent) => parent.join(name),
            Err(_) => absolute.clone(),
        },
        _ => std::fs::canonicalize(&absolute).unwrap_or(absolute),
    };

    Ok(AbsPath::new(resolved)?)
}
