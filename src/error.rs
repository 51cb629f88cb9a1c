// Custom Error types live here

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad user input, caught before any remote call.
    #[error("{0}")]
    Validation(String),

    #[error("Store error {status}: {message}")]
    Store { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Text for the blocking notice shown after `action` failed.
    /// Validation messages are shown as-is, everything else gets one wording per action.
    pub fn notice(&self, action: &str) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            _ => format!("Failed to {action}. Please try again."),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
