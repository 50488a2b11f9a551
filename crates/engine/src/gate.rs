//! Secret and policy gate
//!
//! Capture and materialize consult hooks before acting on an entry. A hook
//! answers with a [`Decision`]; returning `Err` aborts the whole run, while
//! [`Decision::Quit`] stops it cleanly. Prompt suppression chosen through
//! "all" lives in the per-run [`RunContext`], never in global state.
//!
//! [`PolicyGate`] is the default implementation: secret scanning with a
//! configurable severity, an optional interactive [`Prompter`], and a
//! `force` switch that bypasses both prompts and fatal findings.

use crate::attr::Attr;
use crate::entry::{EntryType, LazyContent, SourceStateEntry};
use crate::error::{Error, Result};
use crate::materialize::PlannedChange;
use crate::scanner::{DestKind, DestObservation};
use crate::secrets::SecretScanner;
use hearth_config::SecretsMode;
use hearth_core::path::RelPath;
use std::fmt;
use tracing::warn;

/// Answer to an interactive question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Do it
    Yes,
    /// Skip this one
    No,
    /// Do it, and stop asking for the rest of the run
    All,
    /// Stop the run
    Quit,
}

/// Asks the user a question
pub trait Prompter {
    /// Ask `question` and wait for a [`Choice`]
    fn choose(&self, question: &str) -> Result<Choice>;
}

/// What a hook wants done with an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead
    Proceed,
    /// Leave this entry alone and continue
    Skip,
    /// Go ahead and stop prompting for the rest of the run
    ProceedAndSuppressPrompts,
    /// Stop the run, keeping what was already done
    Quit,
}

impl From<Choice> for Decision {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Yes => Self::Proceed,
            Choice::No => Self::Skip,
            Choice::All => Self::ProceedAndSuppressPrompts,
            Choice::Quit => Self::Quit,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunStatus {
    /// Every entry was considered
    #[default]
    Completed,
    /// A hook answered quit; earlier work is kept
    Quit,
}

/// State scoped to one capture or apply run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// "all" was answered to a capture prompt
    pub suppress_capture_prompts: bool,
    /// "all" was answered to a replace prompt
    pub suppress_replace_prompts: bool,
    /// "all" was answered to an apply prompt
    pub suppress_apply_prompts: bool,
}

impl RunContext {
    /// A fresh context
    pub fn new() -> Self {
        Self::default()
    }
}

/// Why an observation was not captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Entry type excluded by the filter
    Filtered(EntryType),
    /// Protected path
    Protected,
    /// A hook answered skip
    Declined,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filtered(entry_type) => write!(f, "{entry_type} entries are filtered out"),
            Self::Protected => f.write_str("protected path"),
            Self::Declined => f.write_str("declined"),
        }
    }
}

/// An observation about to be captured
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Target path
    pub target_path: &'a RelPath,
    /// What the scanner saw
    pub observation: &'a DestObservation,
    /// File content, for regular files
    pub content: Option<&'a LazyContent>,
    /// The content will be encrypted in the source tree
    pub encrypt: bool,
}

/// Hooks consulted during capture
pub trait CaptureHooks {
    /// Called once per candidate before anything is written
    fn pre_capture(&self, ctx: &RunContext, candidate: &Candidate<'_>) -> Result<Decision>;

    /// Called when `new` would drop guarded attributes from `old`
    fn replace(
        &self,
        ctx: &RunContext,
        target: &RelPath,
        new: &SourceStateEntry,
        old: &SourceStateEntry,
    ) -> Result<Decision>;

    /// Report an observation that was not captured
    fn on_ignore(&self, target: &RelPath, reason: &IgnoreReason) {
        warn!(path = %target, %reason, "Ignoring");
    }
}

/// Hooks consulted during apply
pub trait ApplyHooks {
    /// Called before each change that modifies the destination
    fn confirm(&self, ctx: &RunContext, change: &PlannedChange) -> Result<Decision>;
}

/// Default hooks: secret scanning plus optional prompting
pub struct PolicyGate {
    scanner: Box<dyn SecretScanner>,
    severity: SecretsMode,
    force: bool,
    quiet: bool,
    prompter: Option<Box<dyn Prompter>>,
}

impl PolicyGate {
    /// Gate scanning with `scanner` at `severity`, not prompting
    pub fn new(scanner: Box<dyn SecretScanner>, severity: SecretsMode) -> Self {
        Self {
            scanner,
            severity,
            force: false,
            quiet: false,
            prompter: None,
        }
    }

    /// Bypass prompts and fatal findings
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Do not warn about ignored observations
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Warning logged for an ignored observation, unless quiet
    fn ignore_warning(&self, target: &RelPath, reason: &IgnoreReason) -> Option<String> {
        (!self.quiet).then(|| format!("Ignoring {target}: {reason}"))
    }

    /// Ask through `prompter`
    #[must_use]
    pub fn with_prompter(mut self, prompter: Box<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    fn ask(&self, suppressed: bool, question: &str) -> Result<Option<Decision>> {
        if self.force || suppressed {
            return Ok(Some(Decision::Proceed));
        }
        match &self.prompter {
            Some(prompter) => Ok(Some(prompter.choose(question)?.into())),
            None => Ok(None),
        }
    }
}

impl CaptureHooks for PolicyGate {
    fn pre_capture(&self, ctx: &RunContext, candidate: &Candidate<'_>) -> Result<Decision> {
        let observation = candidate.observation;
        if self.severity != SecretsMode::Ignore
            && observation.kind == DestKind::File
            && !candidate.encrypt
            && let Some(content) = candidate.content
        {
            let findings = self
                .scanner
                .scan(candidate.target_path.file_name(), content.get()?);
            for finding in &findings {
                warn!(path = %observation.abs_path, %finding, "Possible secret");
            }
            if !findings.is_empty() && self.severity == SecretsMode::Error && !self.force {
                return Err(Error::PolicyViolation {
                    path: observation.abs_path.clone(),
                    findings: findings.iter().map(ToString::to_string).collect(),
                });
            }
        }

        let question = format!("Add {}?", candidate.target_path);
        Ok(self
            .ask(ctx.suppress_capture_prompts, &question)?
            .unwrap_or(Decision::Proceed))
    }

    fn replace(
        &self,
        ctx: &RunContext,
        target: &RelPath,
        new: &SourceStateEntry,
        old: &SourceStateEntry,
    ) -> Result<Decision> {
        let dropped: Attr = old.attr().dropped_by(new.attr());
        let question = format!(
            "Replace {} ({}) with {} ({}), dropping {dropped}?",
            old.source_path(),
            old.attr(),
            new.source_path(),
            new.attr()
        );
        self.ask(ctx.suppress_replace_prompts, &question)?
            .ok_or_else(|| Error::ConflictAborted {
                path: target.clone(),
                reason: format!("the new entry would drop {dropped}; use --force to replace"),
            })
    }

    fn on_ignore(&self, target: &RelPath, reason: &IgnoreReason) {
        if let Some(message) = self.ignore_warning(target, reason) {
            warn!("{message}");
        }
    }
}

impl ApplyHooks for PolicyGate {
    fn confirm(&self, ctx: &RunContext, change: &PlannedChange) -> Result<Decision> {
        let question = if change.dest_modified {
            warn!(path = %change.path(), "Destination changed since it was last written");
            format!("{} has changed since hearth last wrote it. Overwrite?", change.path())
        } else {
            format!("{change}?")
        };
        Ok(self
            .ask(ctx.suppress_apply_prompts, &question)?
            .unwrap_or(Decision::Proceed))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::secrets::PatternScanner;
    use hearth_core::path::{AbsPath, SourceRelPath};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct Scripted(RefCell<VecDeque<Choice>>);

    impl Prompter for Scripted {
        fn choose(&self, _question: &str) -> Result<Choice> {
            Ok(self.0.borrow_mut().pop_front().unwrap())
        }
    }

    fn scripted(choices: &[Choice]) -> Box<dyn Prompter> {
        Box::new(Scripted(RefCell::new(choices.iter().copied().collect())))
    }

    fn observation() -> DestObservation {
        DestObservation {
            abs_path: AbsPath::new("/home/u/.netrc".into()).unwrap(),
            rel_path: ".netrc".parse().unwrap(),
            kind: DestKind::File,
            mode: 0o600,
        }
    }

    fn check(gate: &PolicyGate, content: &[u8], encrypt: bool) -> Result<Decision> {
        let observation = observation();
        let content = LazyContent::from_bytes(content.to_vec());
        gate.pre_capture(
            &RunContext::new(),
            &Candidate {
                target_path: &observation.rel_path,
                observation: &observation,
                content: Some(&content),
                encrypt,
            },
        )
    }

    fn file_entry(name: &str, attr: Attr) -> SourceStateEntry {
        SourceStateEntry::File {
            target_path: ".netrc".parse().unwrap(),
            source_path: SourceRelPath::new(name.into()).unwrap(),
            attr,
            content: LazyContent::from_bytes(Vec::new()),
        }
    }

    const SECRET: &[u8] = b"password = hunter22\n";

    #[test]
    fn test_error_severity_blocks_secrets() {
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Error);
        match check(&gate, SECRET, false) {
            Err(Error::PolicyViolation { findings, .. }) => assert_eq!(findings.len(), 1),
            other => panic!("expected PolicyViolation, got {other:?}"),
        }
        assert_eq!(check(&gate, b"harmless", false).unwrap(), Decision::Proceed);
    }

    #[test]
    fn test_force_and_encrypt_bypass_findings() {
        let gate =
            PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Error).with_force(true);
        assert_eq!(check(&gate, SECRET, false).unwrap(), Decision::Proceed);

        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Error);
        assert_eq!(check(&gate, SECRET, true).unwrap(), Decision::Proceed);
    }

    #[test]
    fn test_warning_and_ignore_proceed() {
        for mode in [SecretsMode::Warning, SecretsMode::Ignore] {
            let gate = PolicyGate::new(Box::new(PatternScanner::new()), mode);
            assert_eq!(check(&gate, SECRET, false).unwrap(), Decision::Proceed);
        }
    }

    #[test]
    fn test_prompt_choices_map_to_decisions() {
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning)
            .with_prompter(scripted(&[Choice::No, Choice::All, Choice::Quit]));
        assert_eq!(check(&gate, b"x", false).unwrap(), Decision::Skip);
        assert_eq!(
            check(&gate, b"x", false).unwrap(),
            Decision::ProceedAndSuppressPrompts
        );
        assert_eq!(check(&gate, b"x", false).unwrap(), Decision::Quit);
    }

    #[test]
    fn test_suppressed_prompts_are_not_asked() {
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning)
            .with_prompter(scripted(&[]));
        let observation = observation();
        let ctx = RunContext {
            suppress_capture_prompts: true,
            ..RunContext::default()
        };
        let decision = gate
            .pre_capture(
                &ctx,
                &Candidate {
                    target_path: &observation.rel_path,
                    observation: &observation,
                    content: None,
                    encrypt: false,
                },
            )
            .unwrap();
        assert_eq!(decision, Decision::Proceed);
    }

    #[test]
    fn test_quiet_silences_ignore_warnings() {
        let target: RelPath = ".cache".parse().unwrap();
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning);
        assert_eq!(
            gate.ignore_warning(&target, &IgnoreReason::Protected).as_deref(),
            Some("Ignoring .cache: protected path")
        );

        let quiet = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning)
            .with_quiet(true);
        assert_eq!(quiet.ignore_warning(&target, &IgnoreReason::Protected), None);
        quiet.on_ignore(&target, &IgnoreReason::Declined);
    }

    struct Recorded(RefCell<Vec<String>>);

    impl Prompter for std::rc::Rc<Recorded> {
        fn choose(&self, question: &str) -> Result<Choice> {
            self.0.borrow_mut().push(question.to_string());
            Ok(Choice::No)
        }
    }

    #[test]
    fn test_confirm_asks_before_overwriting_edited_destination() {
        use crate::entry::TargetEntry;
        use crate::materialize::{Action, UpdateReason};

        let recorded = std::rc::Rc::new(Recorded(RefCell::new(Vec::new())));
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Ignore)
            .with_prompter(Box::new(recorded.clone()));
        let mut change = PlannedChange {
            action: Action::Update(UpdateReason::Content),
            target: TargetEntry::File {
                path: ".bashrc".parse().unwrap(),
                content: b"v2".to_vec(),
                mode: 0o644,
                create: false,
            },
            dest_modified: true,
        };

        assert_eq!(gate.confirm(&RunContext::new(), &change).unwrap(), Decision::Skip);
        change.dest_modified = false;
        gate.confirm(&RunContext::new(), &change).unwrap();
        assert_eq!(
            *recorded.0.borrow(),
            vec![
                ".bashrc has changed since hearth last wrote it. Overwrite?".to_string(),
                "Update .bashrc (content)?".to_string(),
            ]
        );

        let unattended = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Ignore);
        change.dest_modified = true;
        assert_eq!(
            unattended.confirm(&RunContext::new(), &change).unwrap(),
            Decision::Proceed
        );
    }

    #[test]
    fn test_replace_without_force_or_prompt_aborts() {
        let gate = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning);
        let old = file_entry("encrypted_dot_netrc.age", Attr::ENCRYPTED);
        let new = file_entry("dot_netrc", Attr::empty());
        let target: RelPath = ".netrc".parse().unwrap();

        let err = gate
            .replace(&RunContext::new(), &target, &new, &old)
            .unwrap_err();
        assert!(matches!(err, Error::ConflictAborted { .. }));
        assert!(err.to_string().contains("encrypted"), "{err}");

        let forced = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning)
            .with_force(true);
        assert_eq!(
            forced
                .replace(&RunContext::new(), &target, &new, &old)
                .unwrap(),
            Decision::Proceed
        );

        let prompted = PolicyGate::new(Box::new(PatternScanner::new()), SecretsMode::Warning)
            .with_prompter(scripted(&[Choice::No]));
        assert_eq!(
            prompted
                .replace(&RunContext::new(), &target, &new, &old)
                .unwrap(),
            Decision::Skip
        );
    }
}
