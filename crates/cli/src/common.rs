//! Common utilities and types shared across CLI commands

use hearth_config::Config;
use hearth_core::path::AbsPath;
use hearth_core::EncryptionProvider;
use hearth_crypto::AgeEncryption;
use hearth_engine::codec::AttrCodec;
use hearth_engine::persist::RedbPersistentState;
use hearth_engine::processor::{ContentProcessor, NoEncryption};
use hearth_engine::SourceState;
use hearth_template::{TemplateContext, TemplateEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CommandError, Result};

/// Resolved paths for dotfile operations
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    /// Absolute source directory; may not exist yet
    pub source_dir: AbsPath,
    /// Working tree containing the source directory; the source directory
    /// unless configured otherwise
    pub working_tree: AbsPath,
    /// Absolute destination directory (canonicalized)
    pub dest_dir: AbsPath,
    /// Config file that was loaded, if any
    pub config_file: Option<PathBuf>,
    /// Persistent state database
    pub state_file: PathBuf,
}

impl ResolvedPaths {
    /// Resolve the source and destination directories
    ///
    /// The destination must exist and is canonicalized. The source directory
    /// is made absolute, and canonicalized when it exists, so `add` can
    /// create it on first use.
    pub fn resolve(
        source_dir: &Path,
        dest_dir: &Path,
        config_file: Option<PathBuf>,
        state_file: PathBuf,
    ) -> Result<Self> {
        let dest_dir = std::fs::canonicalize(dest_dir).map_err(|source| {
            CommandError::InvalidPath {
                path: dest_dir.display().to_string(),
                source,
            }
        })?;

        let source_dir = crate::resolve_absolute_path(source_dir)?;
        Ok(Self {
            working_tree: source_dir.clone(),
            source_dir,
            dest_dir: AbsPath::new(dest_dir)?,
            config_file,
            state_file,
        })
    }
}

impl ResolvedPaths {
    /// Use `working_tree` instead of the source directory, when given
    pub fn with_working_tree(mut self, working_tree: Option<&Path>) -> Result<Self> {
        if let Some(path) = working_tree {
            self.working_tree = crate::resolve_absolute_path(path)?;
        }
        Ok(self)
    }
}

/// Runtime context for CLI commands
///
/// Holds the loaded configuration and resolved paths, and builds the
/// engine collaborators commands share.
#[derive(Clone)]
pub struct RuntimeContext {
    /// Shared configuration
    pub config: Arc<Config>,
    /// Resolved paths
    pub paths: ResolvedPaths,
}

impl RuntimeContext {
    /// Create a context from loaded configuration and resolved paths
    pub fn new(config: Config, paths: ResolvedPaths) -> Self {
        Self {
            config: Arc::new(config),
            paths,
        }
    }

    /// Source directory
    #[inline]
    pub fn source_dir(&self) -> &AbsPath {
        &self.paths.source_dir
    }

    /// Destination directory
    #[inline]
    pub fn dest_dir(&self) -> &AbsPath {
        &self.paths.dest_dir
    }

    /// Name codec using the configured encrypted suffix
    pub fn codec(&self) -> AttrCodec {
        AttrCodec::new(self.config.general.encrypted_suffix.clone())
    }

    /// Read the source tree
    pub fn read_source_state(&self) -> Result<SourceState> {
        Ok(SourceState::read(self.source_dir().clone(), &self.codec())?)
    }

    /// Open the persistent state database
    pub fn open_store(&self) -> Result<RedbPersistentState> {
        Ok(RedbPersistentState::new(&self.paths.state_file)?)
    }

    /// Build the content processor: age when keys are configured, and
    /// templates rendered against the configured variables
    pub fn processor(&self) -> Result<ContentProcessor> {
        let encryption: Box<dyn EncryptionProvider> = if self.config.has_age() {
            let identities = self
                .config
                .age_identities()
                .map_err(CommandError::age_keys)?;
            let recipients = self
                .config
                .age_recipients()
                .map_err(CommandError::age_keys)?;
            Box::new(
                AgeEncryption::new(recipients, identities)
                    .with_suffix(self.config.general.encrypted_suffix.clone()),
            )
        } else {
            Box::new(NoEncryption)
        };

        let context = TemplateContext::new(self.source_dir().as_path(), self.dest_dir().as_path())
            .with_variables(&self.config.variables)
            .to_value()
            .map_err(CommandError::template)?;

        Ok(ContentProcessor::new(
            encryption,
            Box::new(TemplateEngine::new()),
            context,
        ))
    }

    /// Paths `add` must never capture: hearth's own files and directories
    pub fn protected_paths(&self) -> Vec<AbsPath> {
        let mut paths = vec![self.source_dir().clone()];
        if self.paths.working_tree != self.paths.source_dir {
            paths.push(self.paths.working_tree.clone());
        }
        let candidates = [
            self.paths.config_file.clone(),
            Some(self.paths.state_file.clone()),
            hearth_config::cache_dir(),
        ];
        for path in candidates.into_iter().flatten() {
            let path = std::fs::canonicalize(&path).unwrap_or(path);
            if let Ok(path) = AbsPath::new(path) {
                paths.push(path);
            }
        }
        paths
    }
}
