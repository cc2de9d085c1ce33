use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short code used in the turn log
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Translation(_) => "TRANSLATION_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::NotImplemented(_) => "NOT_IMPLEMENTED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Actionable suggestion shown to the user under the error message
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::Database(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("no such table") || lower.contains("does not exist") {
                    Some("Check that the table name is correct, or rephrase the question.")
                } else if lower.contains("syntax") {
                    Some("The model produced invalid SQL. Try rephrasing the question.")
                } else if lower.contains("timeout") {
                    Some("Consider simplifying your query or checking database performance.")
                } else {
                    None
                }
            }
            AppError::Translation(msg) => {
                if msg.contains("Failed to call") {
                    Some("Make sure the model server is running (e.g. `ollama serve`).")
                } else {
                    None
                }
            }
            AppError::Connection(_) => Some("Check the connection parameters in the config file."),
            _ => None,
        }
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert rusqlite::Error to AppError
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}
