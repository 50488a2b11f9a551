//! # Hearth Engine
//!
//! Reconciliation core of the hearth dotfile manager.
//!
//! - **Attributes and names**: [`attr`] and [`codec`] map between source
//!   file names and `(name, type, attributes)`
//! - **Source state**: [`entry`] and [`state`] model the source tree
//! - **Destination**: [`scanner`] observes the destination, [`system`]
//!   abstracts filesystem writes
//! - **Policy**: [`gate`] and [`secrets`] decide what may be captured
//! - **Reconciliation**: [`capture`] (destination to source) and
//!   [`materialize`] (source to destination)
//! - **Persistent state**: [`persist`] remembers what was last written

pub mod attr;
pub mod autotemplate;
pub mod capture;
pub mod codec;
pub mod entry;
pub mod error;
pub mod filter;
pub mod gate;
pub mod hash;
pub mod maps;
pub mod materialize;
pub mod persist;
pub mod processor;
pub mod scanner;
pub mod script;
pub mod secrets;
pub mod state;
pub mod system;

// Re-export path types from core
pub use hearth_core::path::{AbsPath, RelPath, SourceRelPath};

pub use error::{Error, Result};

// Re-export commonly used types
pub use attr::Attr;
pub use capture::{Capture, CaptureOptions, CaptureReport};
pub use entry::{EntryType, SourceStateEntry, TargetEntry};
pub use materialize::{MaterializeOptions, Materializer, PlannedChange};
pub use state::SourceState;
