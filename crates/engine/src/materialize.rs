//! Materialize: make the destination match the source state
//!
//! Every entry is rendered into a [`TargetEntry`] (decrypt, then template)
//! and compared with what is on disk. The result is an ordered list of
//! [`PlannedChange`]s: `before_` scripts first, then everything else in
//! target order with exact-directory removals right after their directory,
//! then `after_` scripts.
//!
//! [`Materializer::apply`] executes the plan through a [`System`], asking
//! [`ApplyHooks::confirm`] before each mutating change.

use crate::attr::{Attr, RunOrder, ScriptAttr, ScriptCondition};
use crate::entry::{LazyContent, SourceStateEntry, TargetEntry};
use crate::error::{Error, Result};
use crate::filter::EntryTypeFilter;
use crate::gate::{ApplyHooks, Decision, RunContext, RunStatus};
use crate::persist::{EntryState, PersistentState, ScriptState};
use crate::processor::ContentProcessor;
use crate::script::ScriptRunner;
use crate::state::SourceState;
use crate::system::{System, mode_of};
use hearth_core::path::{AbsPath, RelPath};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Why an existing destination entry needs updating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReason {
    /// Content or link target differs
    Content,
    /// Governed permission bits differ
    Mode,
    /// A different kind of entry is in the way
    Type,
}

impl fmt::Display for UpdateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Content => "content",
            Self::Mode => "mode",
            Self::Type => "type",
        })
    }
}

/// What materialize will do with one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing there yet
    Create,
    /// Something there that differs
    Update(UpdateReason),
    /// Already up to date
    NoOp,
    /// Delete from the destination
    Remove,
    /// Run the script
    RunScript,
    /// Script does not need to run
    SkipScript,
}

/// A planned change to one destination path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    /// What to do
    pub action: Action,
    /// Desired state of the path
    pub target: TargetEntry,
    /// The destination file was edited since hearth last wrote it, and the
    /// source changed as well
    pub dest_modified: bool,
}

impl PlannedChange {
    /// Destination path the change applies to
    pub fn path(&self) -> &RelPath {
        self.target.path()
    }

    /// Whether executing the change touches the destination
    pub fn is_mutating(&self) -> bool {
        matches!(
            self.action,
            Action::Create | Action::Update(_) | Action::Remove | Action::RunScript
        )
    }
}

impl fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path();
        match self.action {
            Action::Create => write!(f, "Create {path}"),
            Action::Update(reason) if self.dest_modified => {
                write!(f, "Update {path} ({reason}, modified since last apply)")
            }
            Action::Update(reason) => write!(f, "Update {path} ({reason})"),
            Action::NoOp => write!(f, "Keep {path}"),
            Action::Remove => write!(f, "Remove {path}"),
            Action::RunScript => write!(f, "Run {path}"),
            Action::SkipScript => write!(f, "Skip {path}"),
        }
    }
}

/// Options for a materialize run
#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    /// Entry types to consider
    pub filter: EntryTypeFilter,
    /// Only these targets and their descendants; empty means all
    pub targets: Vec<RelPath>,
    /// Report failing scripts instead of stopping
    pub continue_on_script_error: bool,
    /// Do not run scripts or record state
    pub dry_run: bool,
}

impl MaterializeOptions {
    fn selects(&self, path: &RelPath) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| path.starts_with(t))
    }
}

/// Outcome of [`Materializer::apply`]
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// How the run ended
    pub status: RunStatus,
    /// Changes that were carried out
    pub applied: Vec<PlannedChange>,
    /// Targets already up to date
    pub unchanged: Vec<RelPath>,
    /// Targets a hook declined
    pub skipped: Vec<RelPath>,
    /// Failed scripts, with `continue_on_script_error`
    pub failures: Vec<Error>,
}

/// Plans and applies source state to a destination
pub struct Materializer<'a> {
    dest_root: AbsPath,
    processor: &'a ContentProcessor,
    system: &'a dyn System,
    store: &'a dyn PersistentState,
    runner: ScriptRunner,
}

impl<'a> Materializer<'a> {
    /// Materialize into `dest_root`; scripts run there too
    pub fn new(
        dest_root: AbsPath,
        processor: &'a ContentProcessor,
        system: &'a dyn System,
        store: &'a dyn PersistentState,
    ) -> Self {
        let runner = ScriptRunner::new(dest_root.clone());
        Self {
            dest_root,
            processor,
            system,
            store,
            runner,
        }
    }

    /// Render `entry` into its desired destination state
    pub fn target_entry(&self, entry: &SourceStateEntry) -> Result<TargetEntry> {
        let path = entry.target_path().clone();
        let source = entry.source_path().to_string();
        let attr = entry.attr();
        let processed = |content: &LazyContent| {
            self.processor.process(&source, attr, content.get()?)
        };

        Ok(match entry {
            SourceStateEntry::File { content, .. } => TargetEntry::File {
                path,
                content: processed(content)?,
                mode: attr.file_mode(),
                create: attr.is_create(),
            },
            SourceStateEntry::Dir { .. } => TargetEntry::Directory {
                path,
                mode: attr.dir_mode(),
                exact: attr.is_exact(),
            },
            SourceStateEntry::Symlink { content, .. } => {
                let bytes = processed(content)?;
                let target = String::from_utf8(bytes).map_err(|e| Error::InvalidUtf8 {
                    path: source.clone(),
                    source: e.utf8_error(),
                })?;
                TargetEntry::Symlink {
                    path,
                    target: target.trim_end().to_string(),
                }
            }
            SourceStateEntry::Script { content, script, .. } => TargetEntry::Script {
                path,
                content: processed(content)?,
                script: *script,
            },
            SourceStateEntry::Remove { .. } => TargetEntry::Remove { path },
        })
    }

    /// Compute the changes needed to bring the destination in line
    pub fn plan(
        &self,
        state: &SourceState,
        options: &MaterializeOptions,
    ) -> Result<Vec<PlannedChange>> {
        let mut before = Vec::new();
        let mut during = Vec::new();
        let mut after = Vec::new();

        for entry in state.iter_sorted() {
            let path = entry.target_path();
            if !options.filter.includes(entry.entry_type()) || !options.selects(path) {
                debug!(path = %path, "Filtered out");
                continue;
            }

            let change = self.compare(self.target_entry(entry)?)?;
            debug!(change = %change, "Planned");
            let phase = match &change.target {
                TargetEntry::Script { script, .. } => script.order,
                _ => RunOrder::During,
            };
            match phase {
                RunOrder::Before => before.push(change),
                RunOrder::After => after.push(change),
                RunOrder::During => {
                    let removals = match change.target {
                        TargetEntry::Directory { exact: true, .. } => {
                            self.exact_removals(state, path)?
                        }
                        _ => Vec::new(),
                    };
                    during.push(change);
                    during.extend(removals);
                }
            }
        }

        before.append(&mut during);
        before.append(&mut after);
        Ok(before)
    }

    /// Plan, then carry out every mutating change the hooks accept
    pub fn apply(
        &self,
        state: &SourceState,
        options: &MaterializeOptions,
        hooks: &dyn ApplyHooks,
        ctx: &mut RunContext,
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for change in self.plan(state, options)? {
            if !change.is_mutating() {
                report.unchanged.push(change.path().clone());
                continue;
            }

            match hooks.confirm(ctx, &change)? {
                Decision::Proceed => {}
                Decision::ProceedAndSuppressPrompts => ctx.suppress_apply_prompts = true,
                Decision::Skip => {
                    debug!(path = %change.path(), "Skipped");
                    report.skipped.push(change.path().clone());
                    continue;
                }
                Decision::Quit => {
                    info!("Apply stopped");
                    report.status = RunStatus::Quit;
                    return Ok(report);
                }
            }

            match self.execute(&change, options) {
                Ok(()) => report.applied.push(change),
                Err(e @ Error::ScriptExecution { .. }) if options.continue_on_script_error => {
                    warn!(error = %e, "Continuing after script failure");
                    report.failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    fn compare(&self, target: TargetEntry) -> Result<PlannedChange> {
        let abs = self.dest_root.join(target.path());
        let mut dest_modified = false;
        let action = match &target {
            TargetEntry::Script {
                path,
                content,
                script,
            } => self.script_action(path, content, *script)?,
            TargetEntry::Remove { .. } => match self.system.symlink_metadata(&abs)? {
                Some(_) => Action::Remove,
                None => Action::NoOp,
            },
            TargetEntry::File {
                content,
                mode,
                create,
                ..
            } => match self.system.symlink_metadata(&abs)? {
                None => Action::Create,
                Some(meta) if !meta.is_file() => Action::Update(UpdateReason::Type),
                Some(meta) if *create && meta.len() > 0 => Action::NoOp,
                Some(meta) => {
                    let actual = self.system.read_file(&abs)?;
                    if actual != *content {
                        dest_modified =
                            self.modified_since_written(target.path(), &actual, content)?;
                        Action::Update(UpdateReason::Content)
                    } else if mode_of(&meta)
                        .is_some_and(|actual| Attr::from_mode(actual) != Attr::from_mode(*mode))
                    {
                        Action::Update(UpdateReason::Mode)
                    } else {
                        Action::NoOp
                    }
                }
            },
            TargetEntry::Directory { .. } => match self.system.symlink_metadata(&abs)? {
                None => Action::Create,
                Some(meta) if meta.is_dir() => Action::NoOp,
                Some(_) => Action::Update(UpdateReason::Type),
            },
            TargetEntry::Symlink { target: link, .. } => {
                match self.system.symlink_metadata(&abs)? {
                    None => Action::Create,
                    Some(meta) if !meta.file_type().is_symlink() => {
                        Action::Update(UpdateReason::Type)
                    }
                    Some(_) if self.system.read_link(&abs)? != Path::new(link) => {
                        Action::Update(UpdateReason::Content)
                    }
                    Some(_) => Action::NoOp,
                }
            }
        };
        Ok(PlannedChange {
            action,
            target,
            dest_modified,
        })
    }

    /// Whether both `actual` and `desired` moved away from the content
    /// recorded when `path` was last written
    fn modified_since_written(
        &self,
        path: &RelPath,
        actual: &[u8],
        desired: &[u8],
    ) -> Result<bool> {
        Ok(EntryState::load(self.store, path)?
            .is_some_and(|last| !last.matches(actual) && !last.matches(desired)))
    }

    fn script_action(&self, path: &RelPath, content: &[u8], script: ScriptAttr) -> Result<Action> {
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(Action::SkipScript);
        }
        match script.condition {
            ScriptCondition::Always => Ok(Action::RunScript),
            ScriptCondition::OnChange => match ScriptState::load(self.store, path)? {
                Some(last) if !last.changed(content) => Ok(Action::SkipScript),
                _ => Ok(Action::RunScript),
            },
        }
    }

    /// Removals for destination children of an exact directory that the
    /// source does not manage
    fn exact_removals(&self, state: &SourceState, dir: &RelPath) -> Result<Vec<PlannedChange>> {
        let abs = self.dest_root.join(dir);
        match self.system.symlink_metadata(&abs)? {
            Some(meta) if meta.is_dir() => {}
            _ => return Ok(Vec::new()),
        }

        let managed = state.child_names(dir);
        let mut removals = Vec::new();
        for name in self.system.read_dir(&abs)? {
            if managed.contains(&name.as_str()) {
                continue;
            }
            removals.push(PlannedChange {
                action: Action::Remove,
                target: TargetEntry::Remove {
                    path: dir.join_name(&name)?,
                },
                dest_modified: false,
            });
        }
        Ok(removals)
    }

    fn execute(&self, change: &PlannedChange, options: &MaterializeOptions) -> Result<()> {
        let path = change.path();
        let abs = self.dest_root.join(path);
        let replacing = matches!(change.action, Action::Update(UpdateReason::Type));

        match (&change.action, &change.target) {
            (Action::NoOp | Action::SkipScript, _) => return Ok(()),
            (Action::Remove, _) => {
                self.system.remove_all(&abs)?;
                if !options.dry_run {
                    EntryState::remove(self.store, path)?;
                }
                info!(path = %path, "Removed");
            }
            (Action::RunScript, TargetEntry::Script { content, .. }) => {
                if options.dry_run {
                    info!(script = %path, "Would run script");
                    return Ok(());
                }
                self.runner.run(path, content)?;
                ScriptState::new(content).save(self.store, path)?;
                info!(script = %path, "Ran script");
            }
            (Action::Update(UpdateReason::Mode), TargetEntry::File { content, mode, .. }) => {
                self.system.set_permissions(&abs, *mode)?;
                self.record(options, path, EntryState::new(content, Some(*mode)))?;
                info!(path = %path, mode = format_args!("{mode:o}"), "Updated mode");
            }
            (_, TargetEntry::File { content, mode, .. }) => {
                if replacing {
                    self.system.remove_all(&abs)?;
                }
                self.system.write_file(&abs, content, Some(*mode))?;
                self.record(options, path, EntryState::new(content, Some(*mode)))?;
                info!(path = %path, "Wrote file");
            }
            (_, TargetEntry::Directory { mode, .. }) => {
                if replacing {
                    self.system.remove_all(&abs)?;
                }
                self.system.create_dir_all(&abs, Some(*mode))?;
                self.record(options, path, EntryState::new(&[], Some(*mode)))?;
                info!(path = %path, "Created directory");
            }
            (_, TargetEntry::Symlink { target, .. }) => {
                if matches!(change.action, Action::Update(_)) {
                    self.system.remove_all(&abs)?;
                }
                self.system.symlink(Path::new(target), &abs)?;
                self.record(options, path, EntryState::new(target.as_bytes(), None))?;
                info!(path = %path, target = %target, "Linked");
            }
            (_, TargetEntry::Script { .. } | TargetEntry::Remove { .. }) => {}
        }
        Ok(())
    }

    fn record(&self, options: &MaterializeOptions, path: &RelPath, state: EntryState) -> Result<()> {
        if options.dry_run {
            return Ok(());
        }
        state.save(self.store, path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::codec::AttrCodec;
    use crate::persist::MockPersistentState;
    use crate::processor::NoEncryption;
    use crate::system::RealSystem;
    use hearth_template::TemplateEngine;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        source: TempDir,
        dest: TempDir,
        processor: ContentProcessor,
        store: MockPersistentState,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                source: TempDir::new().unwrap(),
                dest: TempDir::new().unwrap(),
                processor: ContentProcessor::new(
                    Box::new(NoEncryption),
                    Box::new(TemplateEngine::new()),
                    json!({"name": "hearth"}),
                ),
                store: MockPersistentState::new(),
            }
        }

        fn source_file(&self, rel: &str, content: &str) {
            let path = self.source.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn state(&self) -> SourceState {
            SourceState::read(
                AbsPath::new(self.source.path().to_path_buf()).unwrap(),
                &AttrCodec::default(),
            )
            .unwrap()
        }

        fn materializer(&self) -> Materializer<'_> {
            Materializer::new(
                AbsPath::new(self.dest.path().to_path_buf()).unwrap(),
                &self.processor,
                &RealSystem,
                &self.store,
            )
        }
    }

    fn actions(changes: &[PlannedChange]) -> Vec<String> {
        changes.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_plan_create_update_noop() {
        let fx = Fixture::new();
        fx.source_file("dot_new", "new");
        fx.source_file("dot_same", "same");
        fx.source_file("dot_changed.tmpl", "hello {{ name }}");
        fs::write(fx.dest.path().join(".same"), "same").unwrap();
        fs::write(fx.dest.path().join(".changed"), "hello world").unwrap();

        let changes = fx
            .materializer()
            .plan(&fx.state(), &MaterializeOptions::default())
            .unwrap();
        assert_eq!(
            actions(&changes),
            vec!["Update .changed (content)", "Create .new", "Keep .same"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_plan_detects_mode_drift() {
        use std::os::unix::fs::PermissionsExt;
        let fx = Fixture::new();
        fx.source_file("executable_run", "x");
        let dest = fx.dest.path().join("run");
        fs::write(&dest, "x").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o644)).unwrap();

        let changes = fx
            .materializer()
            .plan(&fx.state(), &MaterializeOptions::default())
            .unwrap();
        assert_eq!(changes[0].action, Action::Update(UpdateReason::Mode));
    }

    #[test]
    fn test_create_attr_keeps_non_empty_file() {
        let fx = Fixture::new();
        fx.source_file("create_dot_local", "default");
        fs::write(fx.dest.path().join(".local"), "edited").unwrap();

        let changes = fx
            .materializer()
            .plan(&fx.state(), &MaterializeOptions::default())
            .unwrap();
        assert_eq!(changes[0].action, Action::NoOp);

        fs::write(fx.dest.path().join(".local"), "").unwrap();
        let changes = fx
            .materializer()
            .plan(&fx.state(), &MaterializeOptions::default())
            .unwrap();
        assert_eq!(changes[0].action, Action::Update(UpdateReason::Content));
    }

    #[test]
    fn test_scripts_are_ordered_by_phase() {
        let fx = Fixture::new();
        fx.source_file("run_after_z.sh", "echo after");
        fx.source_file("run_before_b.sh", "echo before");
        fx.source_file("run_a.sh", "echo during");
        fx.source_file("dot_file", "x");
        fx.source_file("run_before_empty.sh", "  \n");

        let changes = fx
            .materializer()
            .plan(&fx.state(), &MaterializeOptions::default())
            .unwrap();
        assert_eq!(
            actions(&changes),
            vec![
                "Run b.sh",
                "Skip empty.sh",
                "Create .file",
                "Run a.sh",
                "Run z.sh"
            ]
        );
    }

    #[test]
    fn test_filter_and_targets_limit_plan() {
        let fx = Fixture::new();
        fx.source_file("dot_a", "a");
        fx.source_file("dot_config/app", "b");
        fx.source_file("run_x.sh", "echo");

        let options = MaterializeOptions {
            filter: EntryTypeFilter::new(
                crate::filter::EntryTypeSet::empty(),
                crate::filter::EntryTypeSet::SCRIPTS,
            ),
            targets: vec![".config".parse().unwrap()],
            ..MaterializeOptions::default()
        };
        let changes = fx.materializer().plan(&fx.state(), &options).unwrap();
        assert_eq!(actions(&changes), vec!["Create .config", "Create .config/app"]);
    }

    #[test]
    fn test_plan_flags_destination_edited_since_last_apply() {
        let fx = Fixture::new();
        fx.source_file("dot_bashrc", "v1\n");
        fx.source_file("dot_profile", "p1\n");
        fx.materializer()
            .apply(
                &fx.state(),
                &MaterializeOptions::default(),
                &crate::gate::PolicyGate::new(
                    Box::new(crate::secrets::PatternScanner::new()),
                    hearth_config::SecretsMode::Ignore,
                ),
                &mut RunContext::new(),
            )
            .unwrap();

        // Both sides of .bashrc change; only the source of .profile does.
        fs::write(fx.dest.path().join(".bashrc"), "local edit\n").unwrap();
        fx.source_file("dot_bashrc", "v2\n");
        fx.source_file("dot_profile", "p2\n");

        let changes = fx
            .materializer()
            .plan(&fx.state(), &MaterializeOptions::default())
            .unwrap();
        assert_eq!(
            actions(&changes),
            vec![
                "Update .bashrc (content, modified since last apply)",
                "Update .profile (content)"
            ]
        );
        assert!(changes[0].dest_modified);
        assert!(!changes[1].dest_modified);
    }

    #[test]
    fn test_symlink_target_is_trimmed() {
        let fx = Fixture::new();
        fx.source_file("symlink_dot_vimrc", ".config/nvim/init.vim\n");
        let state = fx.state();
        let entry = state.get(&".vimrc".parse().unwrap()).unwrap();

        match fx.materializer().target_entry(entry).unwrap() {
            TargetEntry::Symlink { target, .. } => assert_eq!(target, ".config/nvim/init.vim"),
            other => panic!("expected symlink, got {other:?}"),
        }
    }
}
