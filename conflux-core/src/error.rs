use conflux_model::TitleKey;
use thiserror::Error;

/// Engine-wide error taxonomy.
///
/// Failures are contained at the smallest unit that can make progress
/// (one field group of one title); only a missing or empty snapshot
/// aborts a whole run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transport error fetching {url}: {message}")]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed payload from {url}: {message}")]
    Payload { url: String, message: String },

    #[error("Cannot resolve title {key}: {message}")]
    Resolution { key: TitleKey, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(#[from] conflux_config::ConfigError),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn transport(
        url: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        SyncError::Transport {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    pub fn payload(url: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Payload {
            url: url.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
