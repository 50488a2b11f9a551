//! Command trait for the hearth CLI

use crate::common::RuntimeContext;
use crate::error::Result;

/// A subcommand that runs against a loaded [`RuntimeContext`]
///
/// ```rust,ignore
/// #[derive(Debug, Args)]
/// pub struct MyCommand {
///     #[arg(short, long)]
///     pub some_flag: bool,
/// }
///
/// impl Command for MyCommand {
///     type Output = ();
///
///     fn execute(&self, context: &RuntimeContext) -> Result<()> {
///         let state = context.read_source_state()?;
///         Ok(())
///     }
/// }
/// ```
pub trait Command {
    /// The type returned by this command
    type Output;

    /// Execute the command with the given runtime context
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` describing what went wrong.
    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output>;
}
