//! Step descriptors and their per-run status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};

/// One discrete stage of a simulated process.
///
/// The payload is opaque to the sequencer; hosts use it to render the step
/// (a DNS hop, a TCP segment, an HTTP phase...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step<P> {
    /// Stable identifier, unique within a sequence.
    pub id: String,
    /// Short label for display.
    pub label: String,
    /// Time it takes to reach this step from the previous one.
    pub duration: Duration,
    /// View-specific data.
    pub payload: P,
}

impl<P> Step<P> {
    /// Create a new step.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        duration: Duration,
        payload: P,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            duration,
            payload,
        }
    }

    /// Replace the payload, keeping id, label and duration.
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> Step<Q> {
        Step {
            id: self.id,
            label: self.label,
            duration: self.duration,
            payload: f(self.payload),
        }
    }
}

impl Step<()> {
    /// Create a step without payload.
    pub fn bare(id: impl Into<String>, label: impl Into<String>, duration: Duration) -> Self {
        Self::new(id, label, duration, ())
    }
}

/// Status of a step within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Not reached yet.
    #[default]
    Pending,
    /// The step currently being shown.
    Active,
    /// Already passed.
    Completed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Active => write!(f, "active"),
            StepStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Check that a step list can be played.
///
/// The list must be non-empty and every step must take a positive amount of time.
pub fn validate_steps<P>(steps: &[Step<P>]) -> Result<()> {
    if steps.is_empty() {
        return Err(SequencerError::EmptySequence);
    }

    if let Some((index, step)) = steps
        .iter()
        .enumerate()
        .find(|(_, step)| step.duration.is_zero())
    {
        return Err(SequencerError::ZeroDuration {
            index,
            id: step.id.clone(),
        });
    }

    Ok(())
}
