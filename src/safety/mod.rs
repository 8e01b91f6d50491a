//! Confirmation before a destructive run.
//!
//! Emptying a bucket cannot be undone, so the CLI asks for an exact "yes"
//! unless:
//! - the run is a dry run (nothing is deleted),
//! - `--force` was given,
//! - the environment is non-interactive (no TTY) or JSON logging is on.

use std::io::{BufRead, IsTerminal, Write};

use anyhow::{Result, anyhow};

use crate::config::Config;
use crate::types::StoragePath;
use crate::types::error::S3purgeError;

/// Trait for handling user prompts, enabling testability.
pub trait PromptHandler: Send + Sync {
    /// Show `summary`, ask for confirmation and return the trimmed answer.
    fn read_confirmation(&self, summary: &str) -> Result<String>;

    /// Returns `true` if both stdin and stdout are connected to a TTY.
    fn is_interactive(&self) -> bool;
}

/// Default prompt handler using stdin/stdout.
pub struct StdioPromptHandler;

impl PromptHandler for StdioPromptHandler {
    fn read_confirmation(&self, summary: &str) -> Result<String> {
        println!("{summary}");
        print!("Type 'yes' to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
    }
}

pub struct SafetyChecker {
    target: StoragePath,
    dry_run: bool,
    force: bool,
    force_destroy: bool,
    delete_bucket: bool,
    json_logging: bool,
    prompt_handler: Box<dyn PromptHandler>,
}

impl SafetyChecker {
    pub fn new(config: &Config) -> Self {
        Self::with_prompt_handler(config, Box::new(StdioPromptHandler))
    }

    pub fn with_prompt_handler(config: &Config, prompt_handler: Box<dyn PromptHandler>) -> Self {
        let json_logging = config
            .tracing_config
            .map(|tc| tc.json_tracing)
            .unwrap_or(false);

        Self {
            target: config.target.clone(),
            dry_run: config.dry_run,
            force: config.force,
            force_destroy: config.force_destroy,
            delete_bucket: config.delete_bucket,
            json_logging,
            prompt_handler,
        }
    }

    /// Returns `Err(S3purgeError::Cancelled)` if the user declines.
    pub fn check_before_deletion(&self) -> Result<()> {
        if self.dry_run || self.force || self.should_skip_prompt() {
            return Ok(());
        }

        let input = self.prompt_handler.read_confirmation(&self.summary())?;
        if input != "yes" {
            return Err(anyhow!(S3purgeError::Cancelled));
        }

        Ok(())
    }

    fn should_skip_prompt(&self) -> bool {
        // Prompt text would corrupt structured output.
        self.json_logging || !self.prompt_handler.is_interactive()
    }

    /// What the run is about to do, in the words shown to the user.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "All object versions and delete markers under {} will be permanently deleted.",
            self.target
        );
        if self.force_destroy {
            summary.push_str(
                "\nLegal holds will be cleared and governance retention bypassed where needed.",
            );
        }
        if self.delete_bucket {
            summary.push_str(&format!(
                "\nThe bucket {} will be deleted afterwards.",
                self.target.bucket()
            ));
        }
        summary
    }
}
