//! Physical input through an external automation command.
//!
//! Click actions target whatever reference image the resolver last placed
//! at the fixed target path; the external tool locates that image on the
//! live screen and drives the pointer. Success is its exit status.

use crate::action::Action;
use crate::providers::{ActionExecutor, ProviderError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Shells out to an automation tool, one invocation per action.
pub struct CommandExecutor {
    program: String,
    reference_image: PathBuf,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>, reference_image: PathBuf) -> Self {
        Self {
            program: program.into(),
            reference_image,
        }
    }

    fn args_for(&self, action: &Action) -> Result<Vec<String>, ProviderError> {
        let image = self.reference_image.display().to_string();
        match action {
            Action::Click => Ok(vec!["click".into(), image]),
            Action::DoubleClick => Ok(vec!["doubleClick".into(), image]),
            Action::TypeText(text) => Ok(vec![format!("write:{text}")]),
            Action::PressKey(key) => Ok(vec![format!("press:{key}")]),
            Action::Locate { .. } | Action::Wait(_) | Action::Unrecognized(_) => Err(
                ProviderError::Request(format!("not an executor action: {action:?}")),
            ),
        }
    }
}

#[async_trait]
impl ActionExecutor for CommandExecutor {
    #[instrument(skip(self))]
    async fn execute(&self, action: &Action) -> Result<(), ProviderError> {
        let args = self.args_for(action)?;
        debug!(program = %self.program, ?args, "running action");

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("cannot run {}: {e}", self.program)))?;

        if !status.success() {
            return Err(ProviderError::Request(format!(
                "{} exited with {status} for {action:?}",
                self.program
            )));
        }
        Ok(())
    }
}
