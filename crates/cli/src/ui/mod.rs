//! Terminal UI components for hearth
//!
//! - Interactive yes/no/all/quit prompts for `add` and `apply`

pub mod prompt;

pub use prompt::TerminalPrompter;
