//! Type-safe path types
//!
//! This module provides three distinct path types using the newtype pattern:
//!
//! - [`AbsPath`]: Absolute filesystem paths
//! - [`RelPath`]: Normalized target paths relative to a root
//! - [`SourceRelPath`]: Relative paths in the source directory whose segments are encoded names
//!
//! Relative paths are normalized on construction: `.` segments and trailing
//! slashes are dropped, `..` is rejected and the result is never empty. Two
//! relative paths are therefore equal exactly when they name the same entry,
//! which makes them safe to use as map keys.
//!
//! # Examples
//!
//! ```
//! use hearth_core::path::{AbsPath, RelPath};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let home = AbsPath::new("/home/user".into())?;
//! let config = RelPath::new("./.config/nvim/init.lua".into())?;
//! assert_eq!(config.as_str(), ".config/nvim/init.lua");
//!
//! let nvim_config = home.join(&config);
//! assert_eq!(nvim_config.to_string(), "/home/user/.config/nvim/init.lua");
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Normalize a relative path into its components.
fn normalize_relative(path: &Path) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => {
                if segment.to_str().is_none() {
                    return Err(Error::Path(format!(
                        "path is not valid UTF-8: {}",
                        path.display()
                    )));
                }
                normalized.push(segment);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::Path(format!(
                    "parent directory references are not allowed: {}",
                    path.display()
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathNotRelative {
                    path: path.to_path_buf(),
                });
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::Path(format!(
            "relative path is empty: '{}'",
            path.display()
        )));
    }

    Ok(normalized)
}

/// An absolute path on the filesystem
///
/// This type guarantees that the path is absolute.
/// Use this for file operations and as base directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct AbsPath(PathBuf);

impl AbsPath {
    /// Create a new `AbsPath` from a `PathBuf`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    ///
    /// # Examples
    ///
    /// ```
    /// use hearth_core::path::AbsPath;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let abs = AbsPath::new("/home/user".into())?;
    /// assert!(abs.as_path().is_absolute());
    ///
    /// let err = AbsPath::new("relative/path".into());
    /// assert!(err.is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(path: PathBuf) -> Result<Self> {
        if path.is_absolute() {
            Ok(AbsPath(path))
        } else {
            Err(Error::PathNotAbsolute { path })
        }
    }

    /// Create a new `AbsPath` from a reference to a `Path`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(path.to_path_buf())
    }

    /// Get the underlying `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Join with a relative path to create a new absolute path
    pub fn join(&self, rel: &RelPath) -> Self {
        AbsPath(self.0.join(rel.as_path()))
    }

    /// Join with a source-relative path
    pub fn join_source(&self, rel: &SourceRelPath) -> Self {
        AbsPath(self.0.join(rel.as_path()))
    }

    /// Get the parent directory
    ///
    /// Returns `None` if this is the root directory.
    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| AbsPath(p.to_path_buf()))
    }

    /// Whether `self` is `base` or lies underneath it
    pub fn starts_with(&self, base: &AbsPath) -> bool {
        self.0.starts_with(&base.0)
    }

    /// Strip a base directory prefix to get a relative path
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is not strictly under `base`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hearth_core::path::AbsPath;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let home = AbsPath::new("/home/user".into())?;
    /// let file = AbsPath::new("/home/user/.bashrc".into())?;
    /// assert_eq!(file.strip_prefix(&home)?.as_str(), ".bashrc");
    /// assert!(home.strip_prefix(&home).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn strip_prefix(&self, base: &AbsPath) -> Result<RelPath> {
        let invalid = || Error::InvalidPathPrefix {
            path: Arc::new(self.0.clone()),
            base: Arc::new(base.0.clone()),
        };
        let rel = self.0.strip_prefix(&base.0).map_err(|_| invalid())?;
        RelPath::new(rel.to_path_buf()).map_err(|_| invalid())
    }

    /// Get the file name
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }
}

impl TryFrom<PathBuf> for AbsPath {
    type Error = Error;

    fn try_from(path: PathBuf) -> Result<Self> {
        Self::new(path)
    }
}

impl From<AbsPath> for PathBuf {
    fn from(path: AbsPath) -> Self {
        path.0
    }
}

/// A normalized relative path, used as the key for target entries
///
/// Ordering is component-wise, so a directory always sorts before its
/// descendants and siblings sort lexically.
///
/// # Examples
///
/// ```
/// use hearth_core::path::RelPath;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir: RelPath = ".config".parse()?;
/// let file: RelPath = ".config/nvim/".parse()?;
/// assert!(dir < file);
/// assert_eq!(file.parent(), Some(dir));
/// assert!(".config/../etc".parse::<RelPath>().is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct RelPath(PathBuf);

impl RelPath {
    /// Create a new `RelPath` from a `PathBuf`, normalizing it
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absolute, contains `..`, is not
    /// valid UTF-8, or normalizes to nothing.
    pub fn new(path: PathBuf) -> Result<Self> {
        normalize_relative(&path).map(RelPath)
    }

    /// Get the underlying `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// The path as a slash-separated string
    pub fn as_str(&self) -> &str {
        // Construction guarantees UTF-8
        self.0.to_str().unwrap_or_default()
    }

    /// Convert to a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Join with another relative path
    pub fn join(&self, other: &RelPath) -> Self {
        RelPath(self.0.join(&other.0))
    }

    /// Append a single name
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a single normal path segment.
    pub fn join_name(&self, name: &str) -> Result<Self> {
        let segment = RelPath::from_str(name)?;
        if segment.depth() != 1 {
            return Err(Error::Path(format!("not a single path segment: {name}")));
        }
        Ok(self.join(&segment))
    }

    /// Get the parent directory
    ///
    /// Returns `None` if this is a single component path.
    pub fn parent(&self) -> Option<Self> {
        self.0
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| RelPath(p.to_path_buf()))
    }

    /// Get the last component
    pub fn file_name(&self) -> &str {
        self.0
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Iterate over the path segments
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|s| s.to_str())
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.0.iter().count()
    }

    /// All proper ancestors, outermost first
    pub fn ancestors(&self) -> Vec<RelPath> {
        let mut ancestors: Vec<RelPath> = self
            .0
            .ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| RelPath(p.to_path_buf()))
            .collect();
        ancestors.reverse();
        ancestors
    }

    /// Whether `self` equals `base` or lies underneath it
    pub fn starts_with(&self, base: &RelPath) -> bool {
        self.0.starts_with(&base.0)
    }
}

impl FromStr for RelPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(PathBuf::from(s))
    }
}

impl TryFrom<PathBuf> for RelPath {
    type Error = Error;

    fn try_from(path: PathBuf) -> Result<Self> {
        Self::new(path)
    }
}

impl From<RelPath> for PathBuf {
    fn from(path: RelPath) -> Self {
        path.0
    }
}

/// A relative path in the source directory with encoded attributes
///
/// Segments are encoded names such as `dot_bashrc` or `private_dot_ssh`.
///
/// ```
/// use hearth_core::path::SourceRelPath;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = SourceRelPath::new("dot_config".into())?.join_name("nvim")?;
/// assert_eq!(source.to_string(), "dot_config/nvim");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SourceRelPath(PathBuf);

impl SourceRelPath {
    /// Create a new `SourceRelPath` from a `PathBuf`, normalizing it
    ///
    /// # Errors
    ///
    /// Same conditions as [`RelPath::new`].
    pub fn new(path: PathBuf) -> Result<Self> {
        normalize_relative(&path).map(SourceRelPath)
    }

    /// Get the underlying `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Append a single encoded name
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a single normal path segment.
    pub fn join_name(&self, name: &str) -> Result<Self> {
        let segment = Self::new(PathBuf::from(name))?;
        if segment.0.iter().count() != 1 {
            return Err(Error::Path(format!("not a single path segment: {name}")));
        }
        Ok(SourceRelPath(self.0.join(segment.0)))
    }

    /// Get the parent directory
    pub fn parent(&self) -> Option<Self> {
        self.0
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| SourceRelPath(p.to_path_buf()))
    }

    /// Get the last component (the encoded name)
    pub fn file_name(&self) -> &str {
        self.0
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

impl TryFrom<PathBuf> for SourceRelPath {
    type Error = Error;

    fn try_from(path: PathBuf) -> Result<Self> {
        Self::new(path)
    }
}

impl From<SourceRelPath> for PathBuf {
    fn from(path: SourceRelPath) -> Self {
        path.0
    }
}

impl fmt::Display for AbsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl fmt::Display for SourceRelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
