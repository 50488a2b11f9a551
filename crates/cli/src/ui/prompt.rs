//! Yes/no/all/quit prompt backed by dialoguer

use dialoguer::{Select, theme::ColorfulTheme};
use hearth_engine::gate::{Choice, Prompter};

const CHOICES: [Choice; 4] = [Choice::Yes, Choice::No, Choice::All, Choice::Quit];

/// Short menu label for a choice
fn label(choice: Choice) -> &'static str {
    match choice {
        Choice::Yes => "Yes",
        Choice::No => "No - skip this one",
        Choice::All => "All - yes to everything remaining",
        Choice::Quit => "Quit - stop here, keep what is done",
    }
}

/// Asks questions on the terminal with a dialoguer menu
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    /// Create a prompter with the colorful theme
    #[must_use]
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn choose(&self, question: &str) -> hearth_engine::Result<Choice> {
        let labels: Vec<&str> = CHOICES.iter().copied().map(label).collect();
        let selection = Select::with_theme(&self.theme)
            .with_prompt(question)
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| hearth_engine::Error::Other {
                context: "Failed to read user input".to_string(),
                source: Box::new(e),
            })?;

        Ok(CHOICES.get(selection).copied().unwrap_or(Choice::Quit))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_labels_lead_with_choice_name() {
        for choice in CHOICES {
            let name = format!("{choice:?}");
            assert!(label(choice).starts_with(&name), "{name}");
        }
    }
}
