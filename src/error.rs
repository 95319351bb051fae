use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecallError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    /// The backing store cannot be reached at all. Fatal for any operation that needs it.
    #[error("Recall store unavailable: {0}")]
    StoreUnavailable(String),

    /// A single store operation failed while the store itself is reachable.
    #[error("Recall store error: {0}")]
    Store(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RecallError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        RecallError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, RecallError::StoreUnavailable(_))
    }
}

impl From<rusqlite::Error> for RecallError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref code, _)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::NotADatabase
                ) =>
            {
                RecallError::StoreUnavailable(e.to_string())
            }
            other => RecallError::Store(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecallError>;
