//! Error types for the NetSight application.

use thiserror::Error;

use netsight_common::Category;
use netsight_sequencer::SequencerError;

/// Result type alias using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors that can occur while loading or playing a scenario.
#[derive(Error, Debug)]
pub enum AppError {
    /// Shared configuration/loading error.
    #[error(transparent)]
    Common(#[from] netsight_common::Error),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    Validation(String),

    /// A scenario could not be started.
    #[error("Cannot play {category} scenario: {source}")]
    Sequencer {
        category: Category,
        #[source]
        source: SequencerError,
    },

    /// Output error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Attach the scenario category to a sequencer error.
    pub fn sequencer(category: Category, source: SequencerError) -> Self {
        Self::Sequencer { category, source }
    }
}
