//! Entry types for the source and target states
//!
//! - [`SourceStateEntry`]: an entry of the source tree, keyed by its target path
//! - [`TargetEntry`]: the desired destination state after decryption and rendering
//!
//! Source content is read lazily: a [`LazyContent`] does not touch the
//! filesystem until asked and caches what it read, so scanning a large
//! source tree only reads the entries that are actually compared.

use crate::attr::{Attr, ScriptAttr};
use crate::error::{Error, Result};
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use once_cell::sync::OnceCell;
use std::fmt;

/// Kind of a source entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryType {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symbolic link
    Symlink,
    /// Script run during apply
    Script,
    /// Destination path to remove
    Remove,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::Symlink => "symlink",
            Self::Script => "script",
            Self::Remove => "remove",
        })
    }
}

/// Content that is loaded on first access and cached
#[derive(Debug, Clone)]
pub struct LazyContent {
    origin: Option<AbsPath>,
    cell: OnceCell<Vec<u8>>,
}

impl LazyContent {
    /// Content backed by a file, read on first access
    pub fn from_file(path: AbsPath) -> Self {
        Self {
            origin: Some(path),
            cell: OnceCell::new(),
        }
    }

    /// Content already in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            origin: None,
            cell: OnceCell::with_value(bytes),
        }
    }

    /// Get the content, reading the backing file if needed
    pub fn get(&self) -> Result<&[u8]> {
        self.cell
            .get_or_try_init(|| match &self.origin {
                Some(path) => std::fs::read(path.as_path()).map_err(|source| Error::FileRead {
                    path: path.clone(),
                    source,
                }),
                None => Ok(Vec::new()),
            })
            .map(Vec::as_slice)
    }

    /// Whether the content has been read
    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Point file-backed content at the file's new location
    pub fn relocate(&mut self, path: AbsPath) {
        if self.origin.is_some() {
            self.origin = Some(path);
        }
    }
}

/// An entry of the source state
///
/// Every variant carries its target path, its attributes and the source
/// path it was read from (or will be written to).
#[derive(Debug, Clone)]
pub enum SourceStateEntry {
    /// A regular file
    File {
        /// Path relative to the destination root
        target_path: RelPath,
        /// Encoded path relative to the source root
        source_path: SourceRelPath,
        /// Attributes decoded from the name
        attr: Attr,
        /// Source bytes (encrypted when `attr` says so)
        content: LazyContent,
    },

    /// A directory
    Dir {
        /// Path relative to the destination root
        target_path: RelPath,
        /// Encoded path relative to the source root
        source_path: SourceRelPath,
        /// Attributes decoded from the name
        attr: Attr,
    },

    /// A symbolic link; content is the link target
    Symlink {
        /// Path relative to the destination root
        target_path: RelPath,
        /// Encoded path relative to the source root
        source_path: SourceRelPath,
        /// Attributes decoded from the name
        attr: Attr,
        /// Link target bytes
        content: LazyContent,
    },

    /// A script
    Script {
        /// Path relative to the destination root, used as the script's identity
        target_path: RelPath,
        /// Encoded path relative to the source root
        source_path: SourceRelPath,
        /// Attributes decoded from the name
        attr: Attr,
        /// Run condition and phase
        script: ScriptAttr,
        /// Script body
        content: LazyContent,
    },

    /// A destination path that must not exist
    Remove {
        /// Path relative to the destination root
        target_path: RelPath,
        /// Encoded path relative to the source root
        source_path: SourceRelPath,
        /// Always empty
        attr: Attr,
    },
}

impl SourceStateEntry {
    /// Get the target path for this entry
    pub fn target_path(&self) -> &RelPath {
        match self {
            Self::File { target_path, .. }
            | Self::Dir { target_path, .. }
            | Self::Symlink { target_path, .. }
            | Self::Script { target_path, .. }
            | Self::Remove { target_path, .. } => target_path,
        }
    }

    /// Get the source path for this entry
    pub fn source_path(&self) -> &SourceRelPath {
        match self {
            Self::File { source_path, .. }
            | Self::Dir { source_path, .. }
            | Self::Symlink { source_path, .. }
            | Self::Script { source_path, .. }
            | Self::Remove { source_path, .. } => source_path,
        }
    }

    /// Get the attributes for this entry
    pub fn attr(&self) -> Attr {
        match self {
            Self::File { attr, .. }
            | Self::Dir { attr, .. }
            | Self::Symlink { attr, .. }
            | Self::Script { attr, .. }
            | Self::Remove { attr, .. } => *attr,
        }
    }

    /// Get the entry type
    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::File { .. } => EntryType::File,
            Self::Dir { .. } => EntryType::Dir,
            Self::Symlink { .. } => EntryType::Symlink,
            Self::Script { .. } => EntryType::Script,
            Self::Remove { .. } => EntryType::Remove,
        }
    }

    /// Script attributes, default for non-scripts
    pub fn script_attr(&self) -> ScriptAttr {
        match self {
            Self::Script { script, .. } => *script,
            _ => ScriptAttr::default(),
        }
    }

    /// Lazy content, for entries that have any
    pub fn content(&self) -> Option<&LazyContent> {
        match self {
            Self::File { content, .. }
            | Self::Symlink { content, .. }
            | Self::Script { content, .. } => Some(content),
            Self::Dir { .. } | Self::Remove { .. } => None,
        }
    }

    /// Record that the entry's source now lives at `source_path`, i.e. `abs`
    pub fn relocate(&mut self, new_source_path: SourceRelPath, abs: AbsPath) {
        match self {
            Self::File {
                source_path,
                content,
                ..
            }
            | Self::Symlink {
                source_path,
                content,
                ..
            }
            | Self::Script {
                source_path,
                content,
                ..
            } => {
                *source_path = new_source_path;
                content.relocate(abs);
            }
            Self::Dir { source_path, .. } | Self::Remove { source_path, .. } => {
                *source_path = new_source_path;
            }
        }
    }
}

/// A target entry representing the desired destination state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEntry {
    /// A regular file with its content and permissions
    File {
        /// Path in the destination
        path: RelPath,
        /// Content after decryption and rendering
        content: Vec<u8>,
        /// Unix permissions
        mode: u32,
        /// Only written when absent or empty
        create: bool,
    },

    /// A directory
    Directory {
        /// Path in the destination
        path: RelPath,
        /// Unix permissions
        mode: u32,
        /// Remove unmanaged children
        exact: bool,
    },

    /// A symbolic link
    Symlink {
        /// Path in the destination
        path: RelPath,
        /// Where the symlink points to
        target: String,
    },

    /// A script to run
    Script {
        /// Script identity
        path: RelPath,
        /// Rendered body
        content: Vec<u8>,
        /// Run condition and phase
        script: ScriptAttr,
    },

    /// A file or directory that should be removed
    Remove {
        /// Path to remove from the destination
        path: RelPath,
    },
}

impl TargetEntry {
    /// Get the destination path for this entry
    #[inline]
    pub fn path(&self) -> &RelPath {
        match self {
            TargetEntry::File { path, .. }
            | TargetEntry::Directory { path, .. }
            | TargetEntry::Symlink { path, .. }
            | TargetEntry::Script { path, .. }
            | TargetEntry::Remove { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lazy_content_reads_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        std::fs::write(&path, b"first").unwrap();

        let content = LazyContent::from_file(AbsPath::new(path.clone()).unwrap());
        assert!(!content.is_loaded());
        assert_eq!(content.get().unwrap(), b"first");
        assert!(content.is_loaded());

        // Cached: later changes on disk are not observed
        std::fs::write(&path, b"second").unwrap();
        assert_eq!(content.get().unwrap(), b"first");
    }

    #[test]
    fn test_lazy_content_missing_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = AbsPath::new(temp.path().join("missing")).unwrap();
        let content = LazyContent::from_file(path.clone());

        match content.get() {
            Err(Error::FileRead { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected FileRead, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_accessors() {
        let entry = SourceStateEntry::File {
            target_path: ".bashrc".parse().unwrap(),
            source_path: SourceRelPath::new("dot_bashrc".into()).unwrap(),
            attr: Attr::TEMPLATE,
            content: LazyContent::from_bytes(b"x".to_vec()),
        };
        assert_eq!(entry.target_path().as_str(), ".bashrc");
        assert_eq!(entry.source_path().file_name(), "dot_bashrc");
        assert_eq!(entry.entry_type(), EntryType::File);
        assert!(entry.attr().is_template());
        assert_eq!(entry.content().unwrap().get().unwrap(), b"x");
        assert_eq!(entry.script_attr(), ScriptAttr::default());
    }

    #[test]
    fn test_relocate_repoints_unread_content() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("new"), b"moved").unwrap();

        let mut entry = SourceStateEntry::File {
            target_path: "x".parse().unwrap(),
            source_path: SourceRelPath::new("old".into()).unwrap(),
            attr: Attr::empty(),
            content: LazyContent::from_file(AbsPath::new(temp.path().join("old")).unwrap()),
        };
        entry.relocate(
            SourceRelPath::new("new".into()).unwrap(),
            AbsPath::new(temp.path().join("new")).unwrap(),
        );
        assert_eq!(entry.source_path().file_name(), "new");
        assert_eq!(entry.content().unwrap().get().unwrap(), b"moved");
    }
}
