use thiserror::Error;

/// Errors raised while constructing or normalizing model values.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid title key: {0}")]
    InvalidKey(String),

    #[error("Invalid snapshot shape: {0}")]
    InvalidSnapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
