use thiserror::Error;

/// Maximum number of prompt characters carried in error context.
const PROMPT_CONTEXT_CHARS: usize = 50;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The target application could not be found or launched.
    #[error("Cannot access {0}")]
    Access(String),

    /// Clipboard or keystroke simulation failed while submitting a prompt.
    #[error("Prompt injection failed: {0}")]
    Injection(String),

    /// The accessibility tree could not be read at all.
    #[error("UI scrape failed: {0}")]
    Scrape(String),

    /// A helper process (osascript) could not be spawned or exited badly.
    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{}", describe_operation(.operation, .prompt, .source))]
    Operation {
        operation: String,
        prompt: String,
        #[source]
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Wraps a failure with the operation name and a truncated copy of the prompt.
    pub fn in_operation(self, operation: &str, prompt: &str) -> Self {
        BridgeError::Operation {
            operation: operation.to_string(),
            prompt: truncate_prompt(prompt),
            source: Box::new(self),
        }
    }

    /// True for failures that should never be retried by the engine itself.
    pub fn is_fatal(&self) -> bool {
        match self {
            BridgeError::Access(_) | BridgeError::Injection(_) => true,
            BridgeError::Operation { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

fn describe_operation(operation: &str, prompt: &str, source: &BridgeError) -> String {
    if prompt.is_empty() {
        format!("{operation} failed: {source}")
    } else {
        format!("{operation} failed (prompt: \"{prompt}\"): {source}")
    }
}

/// Shortens a prompt for logs and error messages, appending `...` when cut.
pub fn truncate_prompt(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(PROMPT_CONTEXT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
