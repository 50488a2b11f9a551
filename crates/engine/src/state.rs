//! Source state
//!
//! [`SourceState`] is the decoded source tree: one [`SourceStateEntry`] per
//! target path. Reading is strict; a name that does not decode or two
//! source names mapping to the same target abort the read with the path
//! involved.
//!
//! Names starting with `.` (`.git`, editor droppings, hearth's own
//! metadata) are not part of the source state.

use crate::codec::AttrCodec;
use crate::entry::{EntryType, LazyContent, SourceStateEntry};
use crate::error::{Error, Result};
use crate::maps::sorted_keys;
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// The decoded source tree, keyed by target path
#[derive(Debug)]
pub struct SourceState {
    root: AbsPath,
    entries: HashMap<RelPath, SourceStateEntry>,
}

impl SourceState {
    /// An empty source state rooted at `root`
    pub fn new(root: AbsPath) -> Self {
        Self {
            root,
            entries: HashMap::new(),
        }
    }

    /// Read and decode the source tree under `root`
    ///
    /// A missing root reads as an empty state.
    pub fn read(root: AbsPath, codec: &AttrCodec) -> Result<Self> {
        let mut state = Self::new(root);
        if !state.root.as_path().is_dir() {
            return Ok(state);
        }

        // Source directory (relative) -> target directory, filled parents first
        let mut dir_targets: HashMap<PathBuf, RelPath> = HashMap::new();

        let mut walker = WalkDir::new(state.root.as_path())
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(item) = walker.next() {
            let item = item.map_err(|e| Error::DirectoryRead {
                path: state.root.clone(),
                source: e.into(),
            })?;

            let name = item.file_name().to_str().ok_or_else(|| {
                Error::Path(format!("non UTF-8 name in source tree: {}", item.path().display()))
            })?;
            let is_dir = item.file_type().is_dir();
            if name.starts_with('.') {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            let rel = item
                .path()
                .strip_prefix(state.root.as_path())
                .map_err(|_| Error::InvalidPathPrefix {
                    path: Arc::new(item.path().to_path_buf()),
                    base: Arc::new(state.root.as_path().to_path_buf()),
                })?;
            let source_path = SourceRelPath::new(rel.to_path_buf())?;

            let decoded = codec.decode(name, is_dir)?;
            let target_path = match rel.parent().filter(|p| !p.as_os_str().is_empty()) {
                Some(parent) => match dir_targets.get(parent) {
                    Some(parent_target) => parent_target.join_name(&decoded.base_name)?,
                    None => {
                        return Err(Error::ParentNotDirectory {
                            path: RelPath::new(rel.to_path_buf())?,
                        });
                    }
                },
                None => RelPath::new(PathBuf::from(&decoded.base_name))?,
            };

            let abs = state.root.join_source(&source_path);
            let entry = match decoded.entry_type {
                EntryType::Dir => {
                    dir_targets.insert(rel.to_path_buf(), target_path.clone());
                    SourceStateEntry::Dir {
                        target_path,
                        source_path,
                        attr: decoded.attr,
                    }
                }
                EntryType::Remove => {
                    if is_dir {
                        walker.skip_current_dir();
                    }
                    SourceStateEntry::Remove {
                        target_path,
                        source_path,
                        attr: decoded.attr,
                    }
                }
                EntryType::File => SourceStateEntry::File {
                    target_path,
                    source_path,
                    attr: decoded.attr,
                    content: LazyContent::from_file(abs),
                },
                EntryType::Symlink => SourceStateEntry::Symlink {
                    target_path,
                    source_path,
                    attr: decoded.attr,
                    content: LazyContent::from_file(abs),
                },
                EntryType::Script => SourceStateEntry::Script {
                    target_path,
                    source_path,
                    attr: decoded.attr,
                    script: decoded.script,
                    content: LazyContent::from_file(abs),
                },
            };

            if let Some(existing) = state.entries.get(entry.target_path()) {
                return Err(Error::DuplicateTarget {
                    target: entry.target_path().clone(),
                    first: existing.source_path().clone(),
                    second: entry.source_path().clone(),
                });
            }
            debug!(
                target = %entry.target_path(),
                source = %entry.source_path(),
                kind = %entry.entry_type(),
                "Read source entry"
            );
            state.entries.insert(entry.target_path().clone(), entry);
        }

        Ok(state)
    }

    /// Root of the source tree
    pub fn root(&self) -> &AbsPath {
        &self.root
    }

    /// Entry for `target`
    pub fn get(&self, target: &RelPath) -> Option<&SourceStateEntry> {
        self.entries.get(target)
    }

    /// Whether `target` is managed
    pub fn contains(&self, target: &RelPath) -> bool {
        self.entries.contains_key(target)
    }

    /// Insert an entry, replacing any entry for the same target
    ///
    /// The parent target, if any, must be a managed directory.
    pub fn insert(&mut self, entry: SourceStateEntry) -> Result<Option<SourceStateEntry>> {
        if let Some(parent) = entry.target_path().parent()
            && !matches!(self.entries.get(&parent), Some(SourceStateEntry::Dir { .. }))
        {
            return Err(Error::ParentNotDirectory {
                path: entry.target_path().clone(),
            });
        }
        Ok(self.entries.insert(entry.target_path().clone(), entry))
    }

    /// Remove `target` and every entry underneath it
    pub fn remove_subtree(&mut self, target: &RelPath) -> Vec<SourceStateEntry> {
        let keys: Vec<RelPath> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(target))
            .cloned()
            .collect();
        keys.iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }

    /// Rewrite the source paths of everything under `dir` after its source
    /// directory moved from `from` to `to`
    pub fn relocate_subtree(
        &mut self,
        dir: &RelPath,
        from: &SourceRelPath,
        to: &SourceRelPath,
    ) -> Result<()> {
        for (target, entry) in &mut self.entries {
            if !target.starts_with(dir) {
                continue;
            }
            let rest = entry
                .source_path()
                .as_path()
                .strip_prefix(from.as_path())
                .map_err(|_| Error::Path(format!("{} is not under {from}", entry.source_path())))?;
            let moved = if rest.as_os_str().is_empty() {
                to.clone()
            } else {
                SourceRelPath::new(to.as_path().join(rest))?
            };
            let abs = self.root.join_source(&moved);
            entry.relocate(moved, abs);
        }
        Ok(())
    }

    /// Entries in ascending target order; parents precede children
    pub fn iter_sorted(&self) -> impl Iterator<Item = &SourceStateEntry> {
        sorted_keys(&self.entries)
            .into_iter()
            .filter_map(|key| self.entries.get(key))
    }

    /// Names of the direct children of `dir`, sorted
    pub fn child_names(&self, dir: &RelPath) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .keys()
            .filter(|key| key.parent().as_ref() == Some(dir))
            .map(RelPath::file_name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Absolute path of a source entry
    pub fn source_abs_path(&self, source_path: &SourceRelPath) -> AbsPath {
        self.root.join_source(source_path)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::attr::{Attr, RunOrder};
    use std::fs;
    use tempfile::TempDir;

    fn write(temp: &TempDir, rel: &str, content: &str) {
        let path = temp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(temp: &TempDir) -> Result<SourceState> {
        SourceState::read(
            AbsPath::new(temp.path().to_path_buf()).unwrap(),
            &AttrCodec::default(),
        )
    }

    fn rel(s: &str) -> RelPath {
        s.parse().unwrap()
    }

    #[test]
    fn test_read_decodes_tree() {
        let temp = TempDir::new().unwrap();
        write(&temp, "dot_bashrc", "bash");
        write(&temp, "private_dot_ssh/private_config.tmpl", "Host *");
        write(&temp, "exact_dot_config/nvim/init.lua", "lua");
        write(&temp, "symlink_dot_vimrc", ".config/nvim/init.lua");
        write(&temp, "run_before_setup.sh", "#!/bin/sh\n");
        fs::create_dir_all(temp.path().join("remove_dot_cache/ignored")).unwrap();

        let err = read(&temp).unwrap_err();
        // private_ is not valid on a directory
        assert!(err.to_string().contains("private_dot_ssh"), "{err}");

        fs::rename(temp.path().join("private_dot_ssh"), temp.path().join("dot_ssh")).unwrap();
        let state = read(&temp).unwrap();

        assert_eq!(state.len(), 9);
        let config = state.get(&rel(".ssh/config")).unwrap();
        assert_eq!(config.attr(), Attr::PRIVATE | Attr::TEMPLATE);
        assert_eq!(config.content().unwrap().get().unwrap(), b"Host *");

        assert!(state.get(&rel(".config")).unwrap().attr().is_exact());
        assert_eq!(
            state.get(&rel(".vimrc")).unwrap().entry_type(),
            EntryType::Symlink
        );
        assert_eq!(
            state.get(&rel("setup.sh")).unwrap().script_attr().order,
            RunOrder::Before
        );
        assert_eq!(
            state.get(&rel(".cache")).unwrap().entry_type(),
            EntryType::Remove
        );
        assert!(state.get(&rel(".cache/ignored")).is_none());
    }

    #[test]
    fn test_read_skips_dot_names() {
        let temp = TempDir::new().unwrap();
        write(&temp, ".git/config", "x");
        write(&temp, ".hearthignore", "x");
        write(&temp, "dot_profile", "x");

        let state = read(&temp).unwrap();
        assert_eq!(state.len(), 1);
        assert!(state.contains(&rel(".profile")));
    }

    #[test]
    fn test_read_rejects_duplicate_targets() {
        let temp = TempDir::new().unwrap();
        write(&temp, "dot_zshrc", "a");
        write(&temp, "dot_zshrc.tmpl", "b");

        match read(&temp) {
            Err(Error::DuplicateTarget { target, .. }) => assert_eq!(target.as_str(), ".zshrc"),
            other => panic!("expected DuplicateTarget, got {other:?}"),
        }
    }

    #[test]
    fn test_read_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let state = SourceState::read(
            AbsPath::new(temp.path().join("nope")).unwrap(),
            &AttrCodec::default(),
        )
        .unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_iteration_is_sorted_parents_first() {
        let temp = TempDir::new().unwrap();
        write(&temp, "b", "");
        write(&temp, "a/z", "");
        write(&temp, "a/b/c", "");
        write(&temp, "a-b", "");

        let state = read(&temp).unwrap();
        let order: Vec<&str> = state.iter_sorted().map(|e| e.target_path().as_str()).collect();
        assert_eq!(order, vec!["a", "a/b", "a/b/c", "a/z", "a-b", "b"]);
        assert_eq!(state.child_names(&rel("a")), vec!["b", "z"]);
    }

    #[test]
    fn test_insert_requires_directory_parent() {
        let temp = TempDir::new().unwrap();
        let mut state = SourceState::new(AbsPath::new(temp.path().to_path_buf()).unwrap());

        let file = SourceStateEntry::File {
            target_path: rel("dir/file"),
            source_path: SourceRelPath::new("dir/file".into()).unwrap(),
            attr: Attr::empty(),
            content: LazyContent::from_bytes(Vec::new()),
        };
        assert!(matches!(
            state.insert(file.clone()),
            Err(Error::ParentNotDirectory { .. })
        ));

        state
            .insert(SourceStateEntry::Dir {
                target_path: rel("dir"),
                source_path: SourceRelPath::new("dir".into()).unwrap(),
                attr: Attr::empty(),
            })
            .unwrap();
        assert!(state.insert(file.clone()).unwrap().is_none());
        assert!(state.insert(file).unwrap().is_some());
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_relocate_and_remove_subtree() {
        let temp = TempDir::new().unwrap();
        write(&temp, "dot_config/app/config.toml", "x");
        write(&temp, "dot_profile", "p");
        let mut state = read(&temp).unwrap();

        fs::rename(
            temp.path().join("dot_config"),
            temp.path().join("exact_dot_config"),
        )
        .unwrap();
        state
            .relocate_subtree(
                &rel(".config"),
                &SourceRelPath::new("dot_config".into()).unwrap(),
                &SourceRelPath::new("exact_dot_config".into()).unwrap(),
            )
            .unwrap();
        let file = state.get(&rel(".config/app/config.toml")).unwrap();
        assert_eq!(
            file.source_path().to_string(),
            "exact_dot_config/app/config.toml"
        );
        assert_eq!(file.content().unwrap().get().unwrap(), b"x");

        let removed = state.remove_subtree(&rel(".config"));
        assert_eq!(removed.len(), 3);
        assert_eq!(state.len(), 1);
    }
}
