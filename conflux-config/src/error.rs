use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Servers {a} and {b} declare the same priority {priority}")]
    DuplicatePriority { a: String, b: String, priority: u32 },

    #[error("Server id declared more than once: {0}")]
    DuplicateServerId(String),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
