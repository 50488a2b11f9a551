//! CLI command implementations

pub mod add;
pub mod apply;
pub mod diff;

use clap::Args;
use hearth_engine::filter::{EntryTypeFilter, EntryTypeSet};

/// Entry type include/exclude options shared by commands
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Include only these entry types (comma-separated: files,dirs,symlinks,scripts,remove,all)
    #[arg(long, value_name = "TYPES")]
    pub include: Option<EntryTypeSet>,

    /// Exclude these entry types (comma-separated)
    #[arg(long, value_name = "TYPES")]
    pub exclude: Option<EntryTypeSet>,
}

impl FilterArgs {
    /// Build the engine filter
    pub fn filter(&self) -> EntryTypeFilter {
        EntryTypeFilter::new(
            self.include.unwrap_or_default(),
            self.exclude.unwrap_or_default(),
        )
    }
}
