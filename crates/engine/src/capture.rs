//! Capture: bring destination entries into the source state
//!
//! Observations are handled one at a time in target order, so a directory's
//! source entry always exists before anything underneath it. Per
//! observation the order is fixed:
//!
//! 1. protected path check, then the entry type filter
//! 2. build the new entry (the pre-capture hook runs for regular files)
//! 3. the replace hook, when guarded attributes would be dropped
//! 4. remove a stale source entry with a different name
//! 5. create missing parent directories, write, record entry state
//!
//! A hook error aborts the batch and [`Decision::Quit`] stops it; whatever
//! was written before stays written.

use crate::attr::Attr;
use crate::autotemplate::auto_template;
use crate::codec::{AttrCodec, SourceName};
use crate::entry::{EntryType, LazyContent, SourceStateEntry};
use crate::error::{Error, Result};
use crate::filter::EntryTypeFilter;
use crate::gate::{Candidate, CaptureHooks, Decision, IgnoreReason, RunContext, RunStatus};
use crate::persist::{EntryState, PersistentState};
use crate::processor::ContentProcessor;
use crate::scanner::{DestKind, DestObservation};
use crate::state::SourceState;
use crate::system::System;
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use hearth_core::traits::{DEST_DIR_EXPR, SOURCE_DIR_EXPR};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Attributes carried over from an existing entry with `inherit`
const INHERITED: Attr = Attr::ENCRYPTED.union(Attr::TEMPLATE).union(Attr::CREATE);

/// Options for a capture run
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Replace template data values in file content with expressions
    pub auto_template: bool,
    /// Mark captured files create-only
    pub create: bool,
    /// Encrypt captured files
    pub encrypt: bool,
    /// Mark captured directories exact
    pub exact: bool,
    /// Entry types to capture
    pub filter: EntryTypeFilter,
    /// Paths that are never captured, along with everything beneath them
    pub protected_paths: Vec<AbsPath>,
    /// Fail the run on a protected path instead of skipping it
    pub protected_fatal: bool,
    /// Mark captured files as templates
    pub template: bool,
    /// Template symlink targets inside the source or destination root
    pub template_symlinks: bool,
    /// Keep encryption, templating, create and exact from existing entries
    pub inherit: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            auto_template: false,
            create: false,
            encrypt: false,
            exact: false,
            filter: EntryTypeFilter::default(),
            protected_paths: Vec::new(),
            protected_fatal: false,
            template: false,
            template_symlinks: false,
            inherit: true,
        }
    }
}

/// Outcome of [`Capture::run`]
#[derive(Debug, Default)]
pub struct CaptureReport {
    /// How the run ended
    pub status: RunStatus,
    /// Targets written to the source tree, implicit parents included
    pub captured: Vec<RelPath>,
    /// Targets whose source was already identical
    pub unchanged: Vec<RelPath>,
    /// Targets a hook declined
    pub skipped: Vec<RelPath>,
    /// Targets left out by policy or protection
    pub ignored: Vec<(RelPath, IgnoreReason)>,
}

/// A new entry before it has a source path
struct Captured {
    entry_type: EntryType,
    attr: Attr,
    /// Bytes for the source tree, `None` for directories
    source_bytes: Option<Vec<u8>>,
    /// Destination content, for the entry state record
    plain: Vec<u8>,
    mode: Option<u32>,
}

enum Flow<T> {
    Go(T),
    Skip,
    Quit,
}

/// Apply a hook decision, recording prompt suppression in `suppress`
fn follow(decision: Decision, suppress: &mut bool) -> Flow<()> {
    match decision {
        Decision::Proceed => Flow::Go(()),
        Decision::ProceedAndSuppressPrompts => {
            *suppress = true;
            Flow::Go(())
        }
        Decision::Skip => Flow::Skip,
        Decision::Quit => Flow::Quit,
    }
}

/// Captures destination entries into a source tree
pub struct Capture<'a> {
    dest_root: AbsPath,
    codec: &'a AttrCodec,
    processor: &'a ContentProcessor,
    system: &'a dyn System,
    store: &'a dyn PersistentState,
}

impl<'a> Capture<'a> {
    /// Capture from `dest_root`, writing through `system`
    pub fn new(
        dest_root: AbsPath,
        codec: &'a AttrCodec,
        processor: &'a ContentProcessor,
        system: &'a dyn System,
        store: &'a dyn PersistentState,
    ) -> Self {
        Self {
            dest_root,
            codec,
            processor,
            system,
            store,
        }
    }

    /// Capture `observations` into `state`
    pub fn run(
        &self,
        state: &mut SourceState,
        observations: &[DestObservation],
        options: &CaptureOptions,
        hooks: &dyn CaptureHooks,
        ctx: &mut RunContext,
    ) -> Result<CaptureReport> {
        let mut ordered: Vec<&DestObservation> = observations.iter().collect();
        ordered.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        ordered.dedup_by(|a, b| a.rel_path == b.rel_path);

        let mut report = CaptureReport::default();
        for observation in ordered {
            let target = &observation.rel_path;

            if options
                .protected_paths
                .iter()
                .any(|p| observation.abs_path.starts_with(p))
            {
                if options.protected_fatal {
                    return Err(Error::ProtectedPath {
                        path: observation.abs_path.clone(),
                    });
                }
                hooks.on_ignore(target, &IgnoreReason::Protected);
                report.ignored.push((target.clone(), IgnoreReason::Protected));
                continue;
            }

            let entry_type = observation.entry_type()?;
            if !options.filter.includes(entry_type) {
                let reason = IgnoreReason::Filtered(entry_type);
                hooks.on_ignore(target, &reason);
                report.ignored.push((target.clone(), reason));
                continue;
            }

            let existing = state.get(target).cloned();
            let built = match observation.kind {
                DestKind::Dir => Flow::Go(Self::build_dir(existing.as_ref(), options)),
                DestKind::File => {
                    self.build_file(observation, existing.as_ref(), options, hooks, ctx)?
                }
                DestKind::Symlink => Flow::Go(self.build_symlink(state, observation, options)?),
                DestKind::Other(kind) => {
                    return Err(Error::UnsupportedEntryType {
                        path: observation.abs_path.clone(),
                        kind: kind.to_string(),
                    });
                }
            };
            let captured = match built {
                Flow::Go(captured) => captured,
                Flow::Skip => {
                    hooks.on_ignore(target, &IgnoreReason::Declined);
                    report.skipped.push(target.clone());
                    continue;
                }
                Flow::Quit => {
                    info!("Capture stopped");
                    report.status = RunStatus::Quit;
                    return Ok(report);
                }
            };

            let (parent_source, missing_parents) = self.parent_source_path(state, target)?;
            let encoded = self.codec.encode(
                &SourceName::new(target.file_name(), captured.entry_type).with_attr(captured.attr),
            )?;
            let source_path = match &parent_source {
                Some(parent) => parent.join_name(&encoded)?,
                None => SourceRelPath::new(PathBuf::from(&encoded))?,
            };
            let entry = new_entry(target, &source_path, &captured);

            if let Some(old) = &existing
                && old.entry_type() == EntryType::File
                && captured.entry_type == EntryType::File
                && !old.attr().dropped_by(captured.attr).is_empty()
            {
                let decision = hooks.replace(ctx, target, &entry, old)?;
                match follow(decision, &mut ctx.suppress_replace_prompts) {
                    Flow::Go(()) => {}
                    Flow::Skip => {
                        hooks.on_ignore(target, &IgnoreReason::Declined);
                        report.skipped.push(target.clone());
                        continue;
                    }
                    Flow::Quit => {
                        info!("Capture stopped");
                        report.status = RunStatus::Quit;
                        return Ok(report);
                    }
                }
            }

            let unchanged = match &existing {
                Some(old) => is_unchanged(old, &source_path, &captured)?,
                None => false,
            };
            if let Some(old) = &existing
                && !unchanged
            {
                self.remove_stale(state, old, &source_path, captured.entry_type)?;
            }

            for (parent_target, parent_source) in missing_parents {
                self.system
                    .create_dir_all(&state.source_abs_path(&parent_source), None)?;
                debug!(target = %parent_target, source = %parent_source, "Created parent");
                state.insert(SourceStateEntry::Dir {
                    target_path: parent_target.clone(),
                    source_path: parent_source,
                    attr: Attr::empty(),
                })?;
                report.captured.push(parent_target);
            }

            if !unchanged {
                let abs = state.source_abs_path(&source_path);
                match &captured.source_bytes {
                    Some(bytes) => self.system.write_file(&abs, bytes, None)?,
                    None => self.system.create_dir_all(&abs, None)?,
                }
            }
            state.insert(entry)?;
            EntryState::new(&captured.plain, captured.mode).save(self.store, target)?;

            if unchanged {
                debug!(target = %target, source = %source_path, "Unchanged");
                report.unchanged.push(target.clone());
            } else {
                info!(target = %target, source = %source_path, "Captured");
                report.captured.push(target.clone());
            }
        }

        Ok(report)
    }

    fn build_dir(existing: Option<&SourceStateEntry>, options: &CaptureOptions) -> Captured {
        let inherited_exact = options.inherit
            && matches!(existing, Some(SourceStateEntry::Dir { attr, .. }) if attr.is_exact());
        let attr = if options.exact || inherited_exact {
            Attr::EXACT
        } else {
            Attr::empty()
        };
        Captured {
            entry_type: EntryType::Dir,
            attr,
            source_bytes: None,
            plain: Vec::new(),
            mode: None,
        }
    }

    fn build_file(
        &self,
        observation: &DestObservation,
        existing: Option<&SourceStateEntry>,
        options: &CaptureOptions,
        hooks: &dyn CaptureHooks,
        ctx: &mut RunContext,
    ) -> Result<Flow<Captured>> {
        let target = &observation.rel_path;
        let inherited = match existing {
            Some(SourceStateEntry::File { attr, .. }) if options.inherit => *attr & INHERITED,
            _ => Attr::empty(),
        };
        let encrypt = options.encrypt || inherited.is_encrypted();

        let content = LazyContent::from_file(observation.abs_path.clone());
        let candidate = Candidate {
            target_path: target,
            observation,
            content: Some(&content),
            encrypt,
        };
        match follow(
            hooks.pre_capture(ctx, &candidate)?,
            &mut ctx.suppress_capture_prompts,
        ) {
            Flow::Go(()) => {}
            Flow::Skip => return Ok(Flow::Skip),
            Flow::Quit => return Ok(Flow::Quit),
        }

        let plain = content.get()?.to_vec();
        let mut attr = (Attr::from_mode(observation.mode) & Attr::PERMISSIONS) | inherited;
        attr.set(Attr::ENCRYPTED, encrypt);
        if options.create {
            attr |= Attr::CREATE;
        }
        if options.template {
            attr |= Attr::TEMPLATE;
        }

        let mut text = plain.clone();
        if options.auto_template || inherited.is_template() {
            let (templated, substituted) = auto_template(&plain, self.processor.context());
            if substituted {
                text = templated;
                attr |= Attr::TEMPLATE;
            }
        }

        let source_bytes = if encrypt {
            match self.reusable_ciphertext(existing, &text) {
                Some(ciphertext) => ciphertext,
                None => self.processor.encrypt(target.as_str(), &text)?,
            }
        } else {
            text
        };

        Ok(Flow::Go(Captured {
            entry_type: EntryType::File,
            attr,
            source_bytes: Some(source_bytes),
            plain,
            mode: Some(observation.mode),
        }))
    }

    /// Existing ciphertext, when it decrypts to `plaintext`
    fn reusable_ciphertext(
        &self,
        existing: Option<&SourceStateEntry>,
        plaintext: &[u8],
    ) -> Option<Vec<u8>> {
        let old = existing.filter(|e| e.attr().is_encrypted())?;
        let ciphertext = old.content()?.get().ok()?;
        let decrypted = self
            .processor
            .decrypt(&old.source_path().to_string(), ciphertext)
            .ok()?;
        (decrypted == plaintext).then(|| ciphertext.to_vec())
    }

    fn build_symlink(
        &self,
        state: &SourceState,
        observation: &DestObservation,
        options: &CaptureOptions,
    ) -> Result<Captured> {
        let link = self.system.read_link(&observation.abs_path)?;
        let raw = link
            .to_str()
            .ok_or_else(|| Error::InvalidEncoding {
                name: observation.abs_path.to_string(),
                reason: "symlink target is not valid UTF-8".to_string(),
            })?
            .to_owned();

        let mut attr = Attr::empty();
        let mut stored = raw.clone();
        if options.template_symlinks {
            let roots = [
                (state.root(), SOURCE_DIR_EXPR),
                (&self.dest_root, DEST_DIR_EXPR),
            ];
            if let Some(templated) = roots
                .iter()
                .find_map(|(root, expr)| templated_link(&link, root, expr))
            {
                stored = templated;
                attr |= Attr::TEMPLATE;
            }
        }

        Ok(Captured {
            entry_type: EntryType::Symlink,
            attr,
            source_bytes: Some(stored.into_bytes()),
            plain: raw.into_bytes(),
            mode: None,
        })
    }

    /// Source path of `target`'s parent, and the ancestors that have no
    /// entry yet paired with the source paths they will get
    fn parent_source_path(
        &self,
        state: &SourceState,
        target: &RelPath,
    ) -> Result<(Option<SourceRelPath>, Vec<(RelPath, SourceRelPath)>)> {
        let mut current: Option<SourceRelPath> = None;
        let mut missing = Vec::new();

        for ancestor in target.ancestors() {
            let source_path = match state.get(&ancestor) {
                Some(SourceStateEntry::Dir { source_path, .. }) => source_path.clone(),
                Some(_) => return Err(Error::ParentNotDirectory { path: target.clone() }),
                None => {
                    let encoded = self
                        .codec
                        .encode(&SourceName::new(ancestor.file_name(), EntryType::Dir))?;
                    let source_path = match &current {
                        Some(parent) => parent.join_name(&encoded)?,
                        None => SourceRelPath::new(PathBuf::from(encoded))?,
                    };
                    missing.push((ancestor, source_path.clone()));
                    source_path
                }
            };
            current = Some(source_path);
        }

        Ok((current, missing))
    }

    /// Make room for a new entry at `source_path` replacing `old`
    fn remove_stale(
        &self,
        state: &mut SourceState,
        old: &SourceStateEntry,
        source_path: &SourceRelPath,
        entry_type: EntryType,
    ) -> Result<()> {
        let target = old.target_path();
        let old_abs = state.source_abs_path(old.source_path());

        if old.entry_type() == EntryType::Dir && entry_type == EntryType::Dir {
            if old.source_path() != source_path {
                let new_abs = state.source_abs_path(source_path);
                debug!(from = %old.source_path(), to = %source_path, "Renaming source directory");
                self.system.rename(&old_abs, &new_abs)?;
                state.relocate_subtree(target, old.source_path(), source_path)?;
            }
        } else if old.entry_type() != entry_type || old.source_path() != source_path {
            debug!(source = %old.source_path(), "Removing stale source entry");
            self.system.remove_all(&old_abs)?;
            state.remove_subtree(target);
        }
        Ok(())
    }
}

fn new_entry(target: &RelPath, source_path: &SourceRelPath, captured: &Captured) -> SourceStateEntry {
    let target_path = target.clone();
    let source_path = source_path.clone();
    let attr = captured.attr;
    let content = || LazyContent::from_bytes(captured.source_bytes.clone().unwrap_or_default());
    match captured.entry_type {
        EntryType::Symlink => SourceStateEntry::Symlink {
            target_path,
            source_path,
            attr,
            content: content(),
        },
        EntryType::Dir => SourceStateEntry::Dir {
            target_path,
            source_path,
            attr,
        },
        _ => SourceStateEntry::File {
            target_path,
            source_path,
            attr,
            content: content(),
        },
    }
}

/// Whether `old` already holds exactly what would be written
fn is_unchanged(
    old: &SourceStateEntry,
    source_path: &SourceRelPath,
    captured: &Captured,
) -> Result<bool> {
    if old.source_path() != source_path || old.entry_type() != captured.entry_type {
        return Ok(false);
    }
    match (&captured.source_bytes, old.content()) {
        (None, _) => Ok(true),
        (Some(bytes), Some(content)) => Ok(content.get()? == bytes.as_slice()),
        (Some(_), None) => Ok(false),
    }
}

/// `link` with `root` replaced by `expr`, when `link` lies inside `root`
fn templated_link(link: &Path, root: &AbsPath, expr: &str) -> Option<String> {
    let rest = link.strip_prefix(root.as_path()).ok()?;
    if rest.as_os_str().is_empty() {
        Some(expr.to_string())
    } else {
        Some(format!("{expr}/{}", rest.to_string_lossy()))
    }
}
