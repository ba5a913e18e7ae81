//! Error types for the step sequencer.

use thiserror::Error;

/// Result type alias using [`SequencerError`].
pub type Result<T> = std::result::Result<T, SequencerError>;

/// Reasons a run cannot be started.
///
/// Every variant is a caller mistake detected at `start()`; a run that has
/// started never fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// The step list has no steps.
    #[error("Step sequence is empty")]
    EmptySequence,

    /// A step would advance instantly.
    #[error("Step {index} ('{id}') has a zero duration")]
    ZeroDuration { index: usize, id: String },

    /// `start()` was called outside a Tokio runtime.
    #[error("No Tokio runtime available to schedule ticks")]
    NoRuntime,
}
