use crate::error::ExportError;
use dialoguer::{theme::ColorfulTheme, Confirm};

/// Asks the operator whether an interrupted session should be resumed.
pub trait ResumePrompt {
    fn confirm_resume(&self, session_id: &str, committed: usize) -> Result<bool, ExportError>;
}

/// Interactive yes/no prompt on the terminal.
pub struct TerminalPrompt;

impl ResumePrompt for TerminalPrompt {
    fn confirm_resume(&self, session_id: &str, committed: usize) -> Result<bool, ExportError> {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Resume existing session {} ({} messages already saved)?",
                session_id, committed
            ))
            .default(true)
            .interact()?;
        Ok(proceed)
    }
}

// Closures make handy prompts in tests and non-interactive runs
impl<F> ResumePrompt for F
where
    F: Fn(&str, usize) -> bool,
{
    fn confirm_resume(&self, session_id: &str, committed: usize) -> Result<bool, ExportError> {
        Ok(self(session_id, committed))
    }
}
