//! System abstraction for filesystem operations
//!
//! Capture writes into the source tree and materialize writes into the
//! destination through the same [`System`] trait, which is what makes dry
//! runs possible:
//! - [`RealSystem`]: actual filesystem operations
//! - [`DryRunSystem`]: reads the real filesystem, records writes without executing them

use crate::error::{Error, Result};
use hearth_core::path::AbsPath;
use std::cell::RefCell;
use std::fs::{self, Metadata};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Abstraction over filesystem operations
pub trait System {
    /// Read a file's contents
    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>>;

    /// Replace a file's contents, creating parent directories as needed
    ///
    /// An existing entry at `path`, including a symlink, is replaced rather
    /// than written through.
    fn write_file(&self, path: &AbsPath, content: &[u8], mode: Option<u32>) -> Result<()>;

    /// Create a directory and its parents
    fn create_dir_all(&self, path: &AbsPath, mode: Option<u32>) -> Result<()>;

    /// Remove a file, a symlink or an empty directory
    fn remove(&self, path: &AbsPath) -> Result<()>;

    /// Remove an entry, recursing into directories
    fn remove_all(&self, path: &AbsPath) -> Result<()>;

    /// Metadata without following symlinks, `None` if nothing exists at `path`
    fn symlink_metadata(&self, path: &AbsPath) -> Result<Option<Metadata>>;

    /// Create a symbolic link at `link` pointing to `target`
    fn symlink(&self, target: &Path, link: &AbsPath) -> Result<()>;

    /// Read a symbolic link
    fn read_link(&self, path: &AbsPath) -> Result<PathBuf>;

    /// Names of a directory's children, sorted
    fn read_dir(&self, path: &AbsPath) -> Result<Vec<String>>;

    /// Rename `from` to `to`
    fn rename(&self, from: &AbsPath, to: &AbsPath) -> Result<()>;

    /// Set Unix permission bits
    fn set_permissions(&self, path: &AbsPath, mode: u32) -> Result<()>;
}

/// Unix permission bits of `metadata`, `None` on other platforms
#[cfg(unix)]
pub fn mode_of(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

/// Unix permission bits of `metadata`, `None` on other platforms
#[cfg(not(unix))]
pub fn mode_of(_metadata: &Metadata) -> Option<u32> {
    None
}

/// Real filesystem implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSystem;

impl System for RealSystem {
    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        fs::read(path.as_path()).map_err(|e| Error::FileRead {
            path: path.clone(),
            source: e,
        })
    }

    fn write_file(&self, path: &AbsPath, content: &[u8], mode: Option<u32>) -> Result<()> {
        let parent = path.parent().ok_or_else(|| Error::FileWrite {
            path: path.clone(),
            source: std::io::Error::new(ErrorKind::InvalidInput, "path has no parent"),
        })?;
        self.create_dir_all(&parent, None)?;

        let write_err = |e: std::io::Error| Error::FileWrite {
            path: path.clone(),
            source: e,
        };

        let mut temp = tempfile::NamedTempFile::new_in(parent.as_path()).map_err(write_err)?;
        temp.write_all(content).map_err(write_err)?;

        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode))
                .map_err(write_err)?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        temp.persist(path.as_path())
            .map_err(|e| write_err(e.error))?;
        Ok(())
    }

    fn create_dir_all(&self, path: &AbsPath, mode: Option<u32>) -> Result<()> {
        fs::create_dir_all(path.as_path()).map_err(|e| Error::DirectoryCreate {
            path: path.clone(),
            source: e,
        })?;

        if let Some(mode) = mode {
            self.set_permissions(path, mode)?;
        }
        Ok(())
    }

    fn remove(&self, path: &AbsPath) -> Result<()> {
        let remove_err = |e| Error::Remove {
            path: path.clone(),
            source: e,
        };
        let metadata = fs::symlink_metadata(path.as_path()).map_err(remove_err)?;
        if metadata.is_dir() {
            fs::remove_dir(path.as_path()).map_err(remove_err)
        } else {
            fs::remove_file(path.as_path()).map_err(remove_err)
        }
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        let remove_err = |e| Error::Remove {
            path: path.clone(),
            source: e,
        };
        let metadata = fs::symlink_metadata(path.as_path()).map_err(remove_err)?;
        if metadata.is_dir() {
            fs::remove_dir_all(path.as_path()).map_err(remove_err)
        } else {
            fs::remove_file(path.as_path()).map_err(remove_err)
        }
    }

    fn symlink_metadata(&self, path: &AbsPath) -> Result<Option<Metadata>> {
        match fs::symlink_metadata(path.as_path()) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Metadata {
                path: path.clone(),
                source: e,
            }),
        }
    }

    fn symlink(&self, target: &Path, link: &AbsPath) -> Result<()> {
        if let Some(parent) = link.parent() {
            self.create_dir_all(&parent, None)?;
        }
        let link_err = |e| Error::FileWrite {
            path: link.clone(),
            source: e,
        };

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link.as_path()).map_err(link_err)
        }

        #[cfg(windows)]
        {
            if target.is_dir() {
                std::os::windows::fs::symlink_dir(target, link.as_path()).map_err(link_err)
            } else {
                std::os::windows::fs::symlink_file(target, link.as_path()).map_err(link_err)
            }
        }
    }

    fn read_link(&self, path: &AbsPath) -> Result<PathBuf> {
        fs::read_link(path.as_path()).map_err(|e| Error::FileRead {
            path: path.clone(),
            source: e,
        })
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<String>> {
        let read_err = |e| Error::DirectoryRead {
            path: path.clone(),
            source: e,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(path.as_path()).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn rename(&self, from: &AbsPath, to: &AbsPath) -> Result<()> {
        fs::rename(from.as_path(), to.as_path()).map_err(|e| Error::FileWrite {
            path: to.clone(),
            source: e,
        })
    }

    fn set_permissions(&self, path: &AbsPath, mode: u32) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path.as_path(), fs::Permissions::from_mode(mode)).map_err(|e| {
                Error::FileWrite {
                    path: path.clone(),
                    source: e,
                }
            })
        }

        #[cfg(not(unix))]
        {
            let _ = (path, mode);
            Ok(())
        }
    }
}

/// An operation that would be performed on the filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Write a file
    WriteFile {
        /// File written
        path: AbsPath,
        /// Bytes written
        size: usize,
        /// Permissions applied
        mode: Option<u32>,
    },
    /// Create a directory
    CreateDir {
        /// Directory created
        path: AbsPath,
        /// Permissions applied
        mode: Option<u32>,
    },
    /// Remove a path
    Remove {
        /// Path removed
        path: AbsPath,
    },
    /// Create a symlink
    Symlink {
        /// Link created
        link: AbsPath,
        /// Where it points
        target: PathBuf,
    },
    /// Rename a path
    Rename {
        /// Old path
        from: AbsPath,
        /// New path
        to: AbsPath,
    },
    /// Change permissions
    SetPermissions {
        /// Path changed
        path: AbsPath,
        /// New mode
        mode: u32,
    },
}

/// Dry-run system that records operations without executing them
///
/// Reads go to the real filesystem so plans are computed against the actual
/// destination.
#[derive(Debug, Default)]
pub struct DryRunSystem {
    operations: RefCell<Vec<Operation>>,
}

impl DryRunSystem {
    /// Create a new dry-run system
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations that would have been performed, in order
    pub fn operations(&self) -> Vec<Operation> {
        self.operations.borrow().clone()
    }

    fn record(&self, op: Operation) {
        self.operations.borrow_mut().push(op);
    }
}

impl System for DryRunSystem {
    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        RealSystem.read_file(path)
    }

    fn write_file(&self, path: &AbsPath, content: &[u8], mode: Option<u32>) -> Result<()> {
        self.record(Operation::WriteFile {
            path: path.clone(),
            size: content.len(),
            mode,
        });
        Ok(())
    }

    fn create_dir_all(&self, path: &AbsPath, mode: Option<u32>) -> Result<()> {
        self.record(Operation::CreateDir {
            path: path.clone(),
            mode,
        });
        Ok(())
    }

    fn remove(&self, path: &AbsPath) -> Result<()> {
        self.record(Operation::Remove { path: path.clone() });
        Ok(())
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        self.record(Operation::Remove { path: path.clone() });
        Ok(())
    }

    fn symlink_metadata(&self, path: &AbsPath) -> Result<Option<Metadata>> {
        RealSystem.symlink_metadata(path)
    }

    fn symlink(&self, target: &Path, link: &AbsPath) -> Result<()> {
        self.record(Operation::Symlink {
            link: link.clone(),
            target: target.to_path_buf(),
        });
        Ok(())
    }

    fn read_link(&self, path: &AbsPath) -> Result<PathBuf> {
        RealSystem.read_link(path)
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<String>> {
        RealSystem.read_dir(path)
    }

    fn rename(&self, from: &AbsPath, to: &AbsPath) -> Result<()> {
        self.record(Operation::Rename {
            from: from.clone(),
            to: to.clone(),
        });
        Ok(())
    }

    fn set_permissions(&self, path: &AbsPath, mode: u32) -> Result<()> {
        self.record(Operation::SetPermissions {
            path: path.clone(),
            mode,
        });
        Ok(())
    }
}
