//! Destination scanner
//!
//! Turns user-supplied destination paths into [`DestObservation`]s. Device
//! files, sockets and FIFOs are reported as [`DestKind::Other`] rather than
//! failing the whole scan; the caller decides whether to skip or abort.

use crate::entry::EntryType;
use crate::error::{Error, Result};
use crate::system::mode_of;
use hearth_core::path::{AbsPath, RelPath};
use std::fs::{FileType, Metadata};
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

/// Kind of a destination entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestKind {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symbolic link
    Symlink,
    /// Anything else, named
    Other(&'static str),
}

impl DestKind {
    fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_symlink() {
            return Self::Symlink;
        }
        if file_type.is_dir() {
            return Self::Dir;
        }
        if file_type.is_file() {
            return Self::File;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if file_type.is_block_device() {
                return Self::Other("block device");
            }
            if file_type.is_char_device() {
                return Self::Other("character device");
            }
            if file_type.is_fifo() {
                return Self::Other("fifo");
            }
            if file_type.is_socket() {
                return Self::Other("socket");
            }
        }
        Self::Other("unknown")
    }
}

/// One observed destination entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestObservation {
    /// Absolute path
    pub abs_path: AbsPath,
    /// Path relative to the destination root
    pub rel_path: RelPath,
    /// What was found
    pub kind: DestKind,
    /// Unix permission bits
    pub mode: u32,
}

impl DestObservation {
    /// Observe a single path, following a final symlink only with `follow`
    pub fn observe(dest_root: &AbsPath, abs_path: AbsPath, follow: bool) -> Result<Self> {
        let metadata = stat(&abs_path, follow)?;
        Self::from_metadata(dest_root, abs_path, &metadata)
    }

    fn from_metadata(dest_root: &AbsPath, abs_path: AbsPath, metadata: &Metadata) -> Result<Self> {
        let rel_path = abs_path.strip_prefix(dest_root)?;
        Ok(Self {
            rel_path,
            kind: DestKind::from_file_type(metadata.file_type()),
            mode: mode_of(metadata).unwrap_or(0o644),
            abs_path,
        })
    }

    /// Entry type this observation would be captured as
    pub fn entry_type(&self) -> Result<EntryType> {
        match self.kind {
            DestKind::File => Ok(EntryType::File),
            DestKind::Dir => Ok(EntryType::Dir),
            DestKind::Symlink => Ok(EntryType::Symlink),
            DestKind::Other(kind) => Err(Error::UnsupportedEntryType {
                path: self.abs_path.clone(),
                kind: kind.to_string(),
            }),
        }
    }
}

fn stat(path: &AbsPath, follow: bool) -> Result<Metadata> {
    let result = if follow {
        std::fs::metadata(path.as_path())
    } else {
        std::fs::symlink_metadata(path.as_path())
    };
    result.map_err(|e| Error::Metadata {
        path: path.clone(),
        source: e,
    })
}

/// Scan options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Follow symlinks, capturing what they point to
    pub follow: bool,
    /// Descend into directories
    pub recursive: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow: false,
            recursive: true,
        }
    }
}

/// Scanner over a destination root
#[derive(Debug, Clone)]
pub struct DestinationScanner {
    dest_root: AbsPath,
    options: ScanOptions,
}

impl DestinationScanner {
    /// Create a scanner for `dest_root`
    pub fn new(dest_root: AbsPath, options: ScanOptions) -> Self {
        Self { dest_root, options }
    }

    /// Destination root
    pub fn dest_root(&self) -> &AbsPath {
        &self.dest_root
    }

    /// Observe `roots` and, with `recursive`, everything under directory roots
    ///
    /// The result is sorted by relative path with duplicates removed.
    pub fn scan(&self, roots: &[AbsPath]) -> Result<Vec<DestObservation>> {
        let mut observations = Vec::new();

        for root in roots {
            if !root.starts_with(&self.dest_root) || root == &self.dest_root {
                return Err(Error::InvalidPathPrefix {
                    path: Arc::new(root.as_path().to_path_buf()),
                    base: Arc::new(self.dest_root.as_path().to_path_buf()),
                });
            }

            let observation =
                DestObservation::observe(&self.dest_root, root.clone(), self.options.follow)?;
            let descend = self.options.recursive && observation.kind == DestKind::Dir;
            observations.push(observation);
            if descend {
                self.walk(root, &mut observations)?;
            }
        }

        observations.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        observations.dedup_by(|a, b| a.rel_path == b.rel_path);
        Ok(observations)
    }

    fn walk(&self, dir: &AbsPath, observations: &mut Vec<DestObservation>) -> Result<()> {
        let walker = WalkDir::new(dir.as_path())
            .min_depth(1)
            .follow_links(self.options.follow)
            .sort_by_file_name();

        for item in walker {
            let item = item.map_err(|e| {
                let path = e
                    .path()
                    .and_then(|p| AbsPath::from_path(p).ok())
                    .unwrap_or_else(|| dir.clone());
                Error::DirectoryRead {
                    path,
                    source: e.into(),
                }
            })?;
            let abs_path = AbsPath::new(PathBuf::from(item.path()))?;
            let metadata = item.metadata().map_err(|e| Error::Metadata {
                path: abs_path.clone(),
                source: e.into(),
            })?;
            observations.push(DestObservation::from_metadata(
                &self.dest_root,
                abs_path,
                &metadata,
            )?);
        }
        Ok(())
    }
}

/// Split observations into supported ones and unsupported-type errors
pub fn partition_supported(
    observations: Vec<DestObservation>,
) -> (Vec<DestObservation>, Vec<Error>) {
    let mut supported = Vec::with_capacity(observations.len());
    let mut unsupported = Vec::new();
    for observation in observations {
        match observation.entry_type() {
            Ok(_) => supported.push(observation),
            Err(e) => unsupported.push(e),
        }
    }
    (supported, unsupported)
}
