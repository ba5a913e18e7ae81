use thiserror::Error;

/// Common error type for NetSight components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

/// Result type alias using NetSight's Error.
pub type Result<T> = std::result::Result<T, Error>;
