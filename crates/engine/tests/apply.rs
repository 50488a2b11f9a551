//! Materialize scenarios against real temporary source and destination trees

#![allow(clippy::unwrap_used, clippy::panic)]

use hearth_config::SecretsMode;
use hearth_engine::codec::AttrCodec;
use hearth_engine::gate::{Choice, PolicyGate, Prompter, RunContext, RunStatus};
use hearth_engine::materialize::{Action, ApplyReport};
use hearth_engine::persist::{EntryState, MockPersistentState};
use hearth_engine::processor::{ContentProcessor, NoEncryption};
use hearth_engine::secrets::PatternScanner;
use hearth_engine::system::{DryRunSystem, Operation, RealSystem, System};
use hearth_engine::{
    AbsPath, Error, MaterializeOptions, Materializer, PlannedChange, RelPath, Result, SourceState,
};
use hearth_template::TemplateEngine;
use serde_json::json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use tempfile::TempDir;

struct Workspace {
    source: TempDir,
    dest: TempDir,
    processor: ContentProcessor,
    store: MockPersistentState,
}

impl Workspace {
    fn new() -> Self {
        Self {
            source: TempDir::new().unwrap(),
            dest: TempDir::new().unwrap(),
            processor: ContentProcessor::new(
                Box::new(NoEncryption),
                Box::new(TemplateEngine::new()),
                json!({"user": "alice"}),
            ),
            store: MockPersistentState::new(),
        }
    }

    fn source_file(&self, rel: &str, content: &str) {
        let path = self.source.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn dest_file(&self, rel: &str, content: &str) {
        let path = self.dest.path().join(rel);
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

    fn materializer<'a>(&'a self, system: &'a dyn System) -> Materializer<'a> {
        Materializer::new(
            AbsPath::new(self.dest.path().to_path_buf()).unwrap(),
            &self.processor,
            system,
            &self.store,
        )
    }

    fn apply(&self, options: &MaterializeOptions) -> Result<ApplyReport> {
        self.materializer(&RealSystem).apply(
            &self.state(),
            options,
            &PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning),
            &mut RunContext::new(),
        )
    }
}

fn removals(changes: &[PlannedChange]) -> Vec<&str> {
    changes
        .iter()
        .filter(|c| c.action == Action::Remove)
        .map(|c| c.path().as_str())
        .collect()
}

struct Scripted(RefCell<VecDeque<Choice>>);

impl Prompter for Scripted {
    fn choose(&self, _question: &str) -> Result<Choice> {
        Ok(self.0.borrow_mut().pop_front().unwrap_or(Choice::Yes))
    }
}

#[test]
fn test_exact_directory_removes_unmanaged_children() {
    let ws = Workspace::new();
    ws.source_file("exact_dir/a", "a");
    ws.source_file("exact_dir/b", "b");
    ws.dest_file("dir/a", "a");
    ws.dest_file("dir/b", "b");
    ws.dest_file("dir/c", "c");
    ws.dest_file("dir/sub/d", "d");

    let changes = ws
        .materializer(&RealSystem)
        .plan(&ws.state(), &MaterializeOptions::default())
        .unwrap();
    assert_eq!(removals(&changes), vec!["dir/c", "dir/sub"]);

    ws.apply(&MaterializeOptions::default()).unwrap();
    assert!(ws.dest.path().join("dir/a").is_file());
    assert!(ws.dest.path().join("dir/b").is_file());
    assert!(!ws.dest.path().join("dir/c").exists());
    assert!(!ws.dest.path().join("dir/sub").exists());
}

#[test]
fn test_non_exact_directory_keeps_children() {
    let ws = Workspace::new();
    ws.source_file("dir/a", "a");
    ws.dest_file("dir/c", "c");

    let changes = ws
        .materializer(&RealSystem)
        .plan(&ws.state(), &MaterializeOptions::default())
        .unwrap();
    assert!(removals(&changes).is_empty());
}

#[test]
fn test_remove_entries() {
    let ws = Workspace::new();
    ws.source_file("remove_dot_old", "");
    fs::create_dir_all(ws.source.path().join("remove_dot_cache")).unwrap();
    ws.dest_file(".old", "stale");

    let changes = ws
        .materializer(&RealSystem)
        .plan(&ws.state(), &MaterializeOptions::default())
        .unwrap();
    let actions: Vec<String> = changes.iter().map(ToString::to_string).collect();
    assert_eq!(actions, vec!["Keep .cache", "Remove .old"]);

    ws.apply(&MaterializeOptions::default()).unwrap();
    assert!(!ws.dest.path().join(".old").exists());
}

#[test]
fn test_apply_renders_and_records_state() {
    let ws = Workspace::new();
    ws.source_file("dot_gitconfig.tmpl", "name = {{ user }}\n");
    ws.source_file("private_dot_netrc", "machine x\n");

    let report = ws.apply(&MaterializeOptions::default()).unwrap();
    assert_eq!(report.applied.len(), 2);
    assert_eq!(
        fs::read_to_string(ws.dest.path().join(".gitconfig")).unwrap(),
        "name = alice\n"
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(ws.dest.path().join(".netrc"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let recorded = EntryState::load(&ws.store, &".gitconfig".parse().unwrap())
        .unwrap()
        .unwrap();
    assert!(recorded.matches(b"name = alice\n"));

    // A second apply finds nothing to do
    let report = ws.apply(&MaterializeOptions::default()).unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.unchanged.len(), 2);
}

#[test]
fn test_type_change_replaces_entry() {
    let ws = Workspace::new();
    ws.source_file("dot_vim", "file now");
    ws.dest_file(".vim/old", "x");

    ws.apply(&MaterializeOptions::default()).unwrap();
    assert_eq!(
        fs::read_to_string(ws.dest.path().join(".vim")).unwrap(),
        "file now"
    );
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_created_and_updated() {
    let ws = Workspace::new();
    ws.source_file("symlink_dot_link", "target-a\n");

    ws.apply(&MaterializeOptions::default()).unwrap();
    assert_eq!(
        fs::read_link(ws.dest.path().join(".link")).unwrap(),
        std::path::Path::new("target-a")
    );

    ws.source_file("symlink_dot_link", "target-b");
    ws.apply(&MaterializeOptions::default()).unwrap();
    assert_eq!(
        fs::read_link(ws.dest.path().join(".link")).unwrap(),
        std::path::Path::new("target-b")
    );
}

#[cfg(unix)]
#[test]
fn test_onchange_script_runs_once_per_content() {
    let ws = Workspace::new();
    ws.source_file(
        "run_onchange_install.sh",
        "#!/bin/sh\necho run >> log\n",
    );
    let runs = || {
        fs::read_to_string(ws.dest.path().join("log"))
            .unwrap_or_default()
            .lines()
            .count()
    };

    ws.apply(&MaterializeOptions::default()).unwrap();
    ws.apply(&MaterializeOptions::default()).unwrap();
    assert_eq!(runs(), 1);

    ws.source_file(
        "run_onchange_install.sh",
        "#!/bin/sh\necho run again >> log\n",
    );
    ws.apply(&MaterializeOptions::default()).unwrap();
    assert_eq!(runs(), 2);
}

#[cfg(unix)]
#[test]
fn test_scripts_run_in_phase_order() {
    let ws = Workspace::new();
    ws.source_file("run_after_a.sh", "#!/bin/sh\necho after >> log\n");
    ws.source_file("run_before_z.sh", "#!/bin/sh\necho before >> log\n");
    ws.source_file("run_m.sh", "#!/bin/sh\ntest -f file && echo during >> log\n");
    ws.source_file("file", "x");

    ws.apply(&MaterializeOptions::default()).unwrap();
    assert_eq!(
        fs::read_to_string(ws.dest.path().join("log")).unwrap(),
        "before\nduring\nafter\n"
    );
}

#[cfg(unix)]
#[test]
fn test_script_failure() {
    let ws = Workspace::new();
    ws.source_file("run_before_fail.sh", "#!/bin/sh\nexit 1\n");
    ws.source_file("dot_after", "x");

    assert!(matches!(
        ws.apply(&MaterializeOptions::default()),
        Err(Error::ScriptExecution { .. })
    ));
    assert!(!ws.dest.path().join(".after").exists());

    let options = MaterializeOptions {
        continue_on_script_error: true,
        ..MaterializeOptions::default()
    };
    let report = ws.apply(&options).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(ws.dest.path().join(".after").is_file());
}

#[test]
fn test_dry_run_leaves_destination_alone() {
    let ws = Workspace::new();
    ws.source_file("dot_new", "new");
    ws.source_file("run_x.sh", "#!/bin/sh\ntouch ran\n");
    ws.dest_file(".keep", "x");

    let system = DryRunSystem::new();
    let options = MaterializeOptions {
        dry_run: true,
        ..MaterializeOptions::default()
    };
    let report = ws
        .materializer(&system)
        .apply(
            &ws.state(),
            &options,
            &PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning),
            &mut RunContext::new(),
        )
        .unwrap();

    assert_eq!(report.applied.len(), 2);
    assert!(matches!(
        system.operations().as_slice(),
        [Operation::WriteFile { size: 3, .. }]
    ));
    assert!(!ws.dest.path().join(".new").exists());
    assert!(!ws.dest.path().join("ran").exists());
    assert!(
        EntryState::load(&ws.store, &".new".parse().unwrap())
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_hooks_can_skip_and_quit() {
    let ws = Workspace::new();
    ws.source_file("a", "a");
    ws.source_file("b", "b");
    ws.source_file("c", "c");
    let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning)
        .with_prompter(Box::new(Scripted(RefCell::new(
            [Choice::No, Choice::Yes, Choice::Quit].into(),
        ))));

    let report = ws
        .materializer(&RealSystem)
        .apply(
            &ws.state(),
            &MaterializeOptions::default(),
            &gate,
            &mut RunContext::new(),
        )
        .unwrap();

    assert_eq!(report.status, RunStatus::Quit);
    let a: RelPath = "a".parse().unwrap();
    assert_eq!(report.skipped, vec![a]);
    assert!(!ws.dest.path().join("a").exists());
    assert!(ws.dest.path().join("b").is_file());
    assert!(!ws.dest.path().join("c").exists());
}
