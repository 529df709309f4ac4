use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Returns a themed, actionable suggestion for the error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            CliError::Config(_) => Some(
                "Check stratus.toml for syntax errors, unknown fields or a missing [app] table."
                    .to_string(),
            ),
            CliError::Synthesis(_) => {
                Some("Run `stratus diff` to see the graph before deploying.".to_string())
            }
            _ => None,
        }
    }

    pub fn render(&self) {
        eprintln!("\n{} {}", console::style("Error:").red().bold(), self);
        if let Some(s) = self.suggestion() {
            eprintln!("{} {}", console::style("  help:").dim(), s);
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<std::io::Error>() {
            Ok(io) => return CliError::Io(io),
            Err(err) => err,
        };
        // `{:#}` keeps the whole context chain on one line.
        let message = format!("{:#}", err);
        if message.starts_with("Invalid config") {
            CliError::Config(message)
        } else if message.starts_with("Synthesis failed") || message.starts_with("Failed to declare") {
            CliError::Synthesis(message)
        } else {
            CliError::Runtime(message)
        }
    }
}
