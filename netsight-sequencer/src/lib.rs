//! NetSight Step Sequencer
//!
//! A small runtime that walks an ordered list of steps on a timer:
//!
//! - [`Step`] - immutable step descriptor with an opaque payload
//! - [`SequenceRun`] - per-run position and [`StepStatus`] of every step
//! - [`Sequencer`] - owns at most one active run; starting again cancels the previous one
//! - [`RunHandle`] - `stop()`, snapshots and completion for a run
//! - [`SequenceObserver`] - callback contract (closures work too)
//!
//! Ticks are scheduled on the ambient Tokio runtime. A run advances once per
//! step duration, invokes `on_step` for every step and `on_complete` once after
//! the last one. `stop()` cancels the pending tick synchronously.

mod error;
mod run;
mod sequencer;
mod step;

pub use error::{Result, SequencerError};
pub use run::{RunState, SequenceRun};
pub use sequencer::{RunHandle, SequenceObserver, Sequencer};
pub use step::{Step, StepStatus, validate_steps};
