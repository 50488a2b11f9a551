//! Entry attributes
//!
//! [`Attr`] is the set of boolean attributes a source entry carries. The
//! source-tree name encoding lives in [`crate::codec`]; this module only
//! knows what the attributes mean, including how the permission attributes
//! map onto Unix mode bits:
//!
//! | attribute    | derived from mode              | applied as                 |
//! |--------------|--------------------------------|----------------------------|
//! | `EXECUTABLE` | owner execute bit (`0o100`) set | `0o111` added              |
//! | `PRIVATE`    | group/other read (`0o044`) clear | group/other bits removed  |
//! | `READONLY`   | owner write bit (`0o200`) clear  | all write bits removed    |
//!
//! # Examples
//!
//! ```
//! use hearth_engine::attr::Attr;
//!
//! let attr = Attr::from_mode(0o700);
//! assert!(attr.is_private() && attr.is_executable());
//! assert_eq!(attr.file_mode(), 0o700);
//! ```

use std::fmt;

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;
const OWNER_EXECUTE: u32 = 0o100;
const OWNER_WRITE: u32 = 0o200;
const GROUP_OTHER_READ: u32 = 0o044;
const GROUP_OTHER_ALL: u32 = 0o077;
const ALL_EXECUTE: u32 = 0o111;
const ALL_WRITE: u32 = 0o222;

bitflags::bitflags! {
    /// Attributes carried by a source entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attr: u8 {
        /// Source content is encrypted
        const ENCRYPTED = 1 << 0;
        /// Group and other have no access
        const PRIVATE = 1 << 1;
        /// Nobody may write
        const READONLY = 1 << 2;
        /// Executable
        const EXECUTABLE = 1 << 3;
        /// Content (or link target) is a template
        const TEMPLATE = 1 << 4;
        /// Directory only: destination children absent from the source are removed
        const EXACT = 1 << 5;
        /// File only: written when absent, never overwritten
        const CREATE = 1 << 6;
    }
}

impl Attr {
    /// Attributes derived from, and applied as, permission bits
    pub const PERMISSIONS: Attr = Attr::PRIVATE
        .union(Attr::READONLY)
        .union(Attr::EXECUTABLE);

    /// Attributes whose silent loss on re-capture warrants confirmation
    pub const GUARDED: Attr = Attr::ENCRYPTED.union(Attr::PRIVATE).union(Attr::TEMPLATE);

    /// Check if content is encrypted
    #[inline]
    pub fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    /// Check if permissions are private
    #[inline]
    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// Check if read-only
    #[inline]
    pub fn is_readonly(self) -> bool {
        self.contains(Self::READONLY)
    }

    /// Check if executable
    #[inline]
    pub fn is_executable(self) -> bool {
        self.contains(Self::EXECUTABLE)
    }

    /// Check if a template
    #[inline]
    pub fn is_template(self) -> bool {
        self.contains(Self::TEMPLATE)
    }

    /// Check if an exact directory
    #[inline]
    pub fn is_exact(self) -> bool {
        self.contains(Self::EXACT)
    }

    /// Check if create-only
    #[inline]
    pub fn is_create(self) -> bool {
        self.contains(Self::CREATE)
    }

    /// Permission attributes of a file with the given mode
    pub fn from_mode(mode: u32) -> Self {
        let mut attr = Self::empty();
        attr.set(Self::EXECUTABLE, mode & OWNER_EXECUTE != 0);
        attr.set(Self::PRIVATE, mode & GROUP_OTHER_READ == 0);
        attr.set(Self::READONLY, mode & OWNER_WRITE == 0);
        attr
    }

    /// Mode a file with these attributes is written with
    pub fn file_mode(self) -> u32 {
        let mut mode = DEFAULT_FILE_MODE;
        if self.is_executable() {
            mode |= ALL_EXECUTE;
        }
        if self.is_private() {
            mode &= !GROUP_OTHER_ALL;
        }
        if self.is_readonly() {
            mode &= !ALL_WRITE;
        }
        mode
    }

    /// Mode a directory is created with
    pub fn dir_mode(self) -> u32 {
        DEFAULT_DIR_MODE
    }

    /// Guarded attributes present in `self` but missing from `replacement`
    pub fn dropped_by(self, replacement: Attr) -> Attr {
        self.difference(replacement).intersection(Self::GUARDED)
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<String> = self
            .iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect();
        f.write_str(&names.join(","))
    }
}

/// When a script runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScriptCondition {
    /// Every apply
    #[default]
    Always,
    /// Only when its rendered content changed since the last successful run
    OnChange,
}

/// Phase in which a script runs
///
/// Ordering is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RunOrder {
    /// Before any other entry
    Before,
    /// In lexical position among the other entries
    #[default]
    During,
    /// After every other entry
    After,
}

/// Script-only attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScriptAttr {
    /// Run condition
    pub condition: ScriptCondition,
    /// Run phase
    pub order: RunOrder,
}
