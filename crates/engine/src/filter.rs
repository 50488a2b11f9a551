//! Entry type include/exclude filter
//!
//! An entry type is included iff `(include is empty OR t ∈ include) AND
//! t ∉ exclude`. Sets parse from comma-separated names such as
//! `files,symlinks`; `all` and `none` are accepted too.

use crate::entry::EntryType;
use crate::error::{Error, Result};
use std::str::FromStr;

bitflags::bitflags! {
    /// A set of entry types
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntryTypeSet: u8 {
        /// Directories
        const DIRS = 1 << 0;
        /// Regular files
        const FILES = 1 << 1;
        /// Remove entries
        const REMOVE = 1 << 2;
        /// Scripts
        const SCRIPTS = 1 << 3;
        /// Symbolic links
        const SYMLINKS = 1 << 4;
        /// Externally sourced entries
        const EXTERNALS = 1 << 5;
    }
}

impl EntryTypeSet {
    /// Whether the set contains `entry_type`
    pub fn contains_type(self, entry_type: EntryType) -> bool {
        self.contains(Self::from(entry_type))
    }
}

impl From<EntryType> for EntryTypeSet {
    fn from(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::File => Self::FILES,
            EntryType::Dir => Self::DIRS,
            EntryType::Symlink => Self::SYMLINKS,
            EntryType::Script => Self::SCRIPTS,
            EntryType::Remove => Self::REMOVE,
        }
    }
}

impl FromStr for EntryTypeSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = Self::empty();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            set |= match name.to_ascii_lowercase().as_str() {
                "all" => Self::all(),
                "none" => Self::empty(),
                "dirs" | "dir" => Self::DIRS,
                "files" | "file" => Self::FILES,
                "remove" => Self::REMOVE,
                "scripts" | "script" => Self::SCRIPTS,
                "symlinks" | "symlink" => Self::SYMLINKS,
                "externals" | "external" => Self::EXTERNALS,
                _ => return Err(Error::InvalidFilter(name.to_string())),
            };
        }
        Ok(set)
    }
}

/// Include/exclude filter over entry types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryTypeFilter {
    /// Types to include; empty means everything
    pub include: EntryTypeSet,
    /// Types to exclude; wins over `include`
    pub exclude: EntryTypeSet,
}

impl EntryTypeFilter {
    /// Create a filter
    pub fn new(include: EntryTypeSet, exclude: EntryTypeSet) -> Self {
        Self { include, exclude }
    }

    /// Whether entries of `entry_type` pass the filter
    pub fn includes(&self, entry_type: EntryType) -> bool {
        (self.include.is_empty() || self.include.contains_type(entry_type))
            && !self.exclude.contains_type(entry_type)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    const ALL_TYPES: [EntryType; 5] = [
        EntryType::File,
        EntryType::Dir,
        EntryType::Symlink,
        EntryType::Script,
        EntryType::Remove,
    ];

    #[test]
    fn test_empty_filter_includes_everything() {
        let filter = EntryTypeFilter::default();
        assert!(ALL_TYPES.iter().all(|t| filter.includes(*t)));
    }

    #[test]
    fn test_include_files_only() {
        for exclude in [EntryTypeSet::empty(), EntryTypeSet::SYMLINKS, EntryTypeSet::DIRS] {
            let filter = EntryTypeFilter::new(EntryTypeSet::FILES, exclude);
            for t in ALL_TYPES {
                assert_eq!(filter.includes(t), t == EntryType::File, "{t}");
            }
        }
    }

    #[test]
    fn test_exclude_wins() {
        for include in [EntryTypeSet::empty(), EntryTypeSet::all(), EntryTypeSet::SYMLINKS] {
            let filter = EntryTypeFilter::new(include, EntryTypeSet::SYMLINKS);
            assert!(!filter.includes(EntryType::Symlink));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "files, symlinks".parse::<EntryTypeSet>().unwrap(),
            EntryTypeSet::FILES | EntryTypeSet::SYMLINKS
        );
        assert_eq!("all".parse::<EntryTypeSet>().unwrap(), EntryTypeSet::all());
        assert_eq!("none".parse::<EntryTypeSet>().unwrap(), EntryTypeSet::empty());
        assert_eq!("".parse::<EntryTypeSet>().unwrap(), EntryTypeSet::empty());
        assert!(matches!(
            "files,bogus".parse::<EntryTypeSet>(),
            Err(Error::InvalidFilter(name)) if name == "bogus"
        ));
    }
}
