use thiserror::Error;

#[derive(Debug, Error)]
#[error("token prompt failed: {0}")]
pub struct PromptError(pub String);

/// Interactive source of replacement tokens.
///
/// Called synchronously and expected to block on user input, so callers in
/// async code run it on a blocking thread.
pub trait Prompter: Send + Sync {
    fn prompt(&self) -> Result<String, PromptError>;
}

impl<F> Prompter for F
where
    F: Fn() -> Result<String, PromptError> + Send + Sync,
{
    fn prompt(&self) -> Result<String, PromptError> {
        self()
    }
}

/// Re-asks the wrapped prompter until it yields a non-blank answer.
pub struct NonEmpty<P>(pub P);

impl<P: Prompter> Prompter for NonEmpty<P> {
    fn prompt(&self) -> Result<String, PromptError> {
        loop {
            let answer = self.0.prompt()?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
            tracing::debug!("Empty token entered, prompting again");
        }
    }
}
