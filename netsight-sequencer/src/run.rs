//! Transient state of a single run.

use serde::{Deserialize, Serialize};

use crate::step::StepStatus;

/// Lifecycle of a run as seen from its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Ticks are still scheduled.
    Running,
    /// Every step was reached and `on_complete` was invoked.
    Completed,
    /// The run was cancelled before completing.
    Stopped,
}

impl RunState {
    /// Whether the run will not invoke any more callbacks.
    pub fn is_finished(&self) -> bool {
        !matches!(self, RunState::Running)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Position of a run over its step list.
///
/// Only the sequencer advances a run. Invariants, checked by [`is_consistent`](Self::is_consistent):
/// - indices before `current_index` are `Completed`
/// - indices after it are `Pending`
/// - at most one step is `Active`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRun {
    current_index: Option<usize>,
    statuses: Vec<StepStatus>,
}

impl SequenceRun {
    /// Create a run over `len` steps, none started.
    pub fn new(len: usize) -> Self {
        Self {
            current_index: None,
            statuses: vec![StepStatus::Pending; len],
        }
    }

    /// Index of the step most recently reached, `None` before the first tick.
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Status of every step, in order.
    pub fn statuses(&self) -> &[StepStatus] {
        &self.statuses
    }

    /// Status of one step.
    pub fn status(&self, index: usize) -> Option<StepStatus> {
        self.statuses.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Whether the current step is the last one.
    pub fn is_at_last(&self) -> bool {
        matches!(self.current_index, Some(i) if i + 1 == self.statuses.len())
    }

    /// Whether every step has been completed.
    pub fn is_done(&self) -> bool {
        !self.statuses.is_empty() && self.statuses.iter().all(|s| *s == StepStatus::Completed)
    }

    /// Number of steps with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }

    /// Check the ordering invariants.
    pub fn is_consistent(&self) -> bool {
        if self.count(StepStatus::Active) > 1 {
            return false;
        }

        let completed_prefix = self
            .statuses
            .iter()
            .take_while(|s| **s == StepStatus::Completed)
            .count();
        let rest = &self.statuses[completed_prefix..];

        match rest.split_first() {
            None => true,
            Some((StepStatus::Active, tail)) => tail.iter().all(|s| *s == StepStatus::Pending),
            Some(_) => rest.iter().all(|s| *s == StepStatus::Pending),
        }
    }

    /// Complete the current step and activate the next one.
    ///
    /// Returns the newly active index, or `None` when there is no next step.
    pub(crate) fn advance(&mut self) -> Option<usize> {
        let next = self.current_index.map_or(0, |i| i + 1);
        if next >= self.statuses.len() {
            return None;
        }

        if let Some(current) = self.current_index {
            self.statuses[current] = StepStatus::Completed;
        }
        self.statuses[next] = StepStatus::Active;
        self.current_index = Some(next);

        Some(next)
    }

    /// Complete the current step without activating another.
    pub(crate) fn finish(&mut self) {
        if let Some(current) = self.current_index {
            self.statuses[current] = StepStatus::Completed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_is_pending() {
        let run = SequenceRun::new(3);
        assert_eq!(run.current_index(), None);
        assert_eq!(run.count(StepStatus::Pending), 3);
        assert!(run.is_consistent());
        assert!(!run.is_done());
    }

    #[test]
    fn test_advance_keeps_invariants() {
        let mut run = SequenceRun::new(4);

        for expected in 0..4 {
            assert_eq!(run.advance(), Some(expected));
            assert_eq!(run.current_index(), Some(expected));
            assert_eq!(run.count(StepStatus::Active), 1);
            assert_eq!(run.count(StepStatus::Completed), expected);
            assert!(run.is_consistent());
        }

        assert!(run.is_at_last());
        assert_eq!(run.advance(), None);
        assert_eq!(run.current_index(), Some(3));
    }

    #[test]
    fn test_finish_completes_everything() {
        let mut run = SequenceRun::new(2);
        run.advance();
        run.advance();
        run.finish();

        assert!(run.is_done());
        assert_eq!(run.count(StepStatus::Active), 0);
        assert!(run.is_consistent());
    }

    #[test]
    fn test_finish_before_start_is_noop() {
        let mut run = SequenceRun::new(2);
        run.finish();
        assert_eq!(run, SequenceRun::new(2));
    }

    #[test]
    fn test_inconsistent_runs_detected() {
        let gap = SequenceRun {
            current_index: Some(2),
            statuses: vec![
                StepStatus::Completed,
                StepStatus::Pending,
                StepStatus::Active,
            ],
        };
        assert!(!gap.is_consistent());

        let two_active = SequenceRun {
            current_index: Some(1),
            statuses: vec![StepStatus::Active, StepStatus::Active],
        };
        assert!(!two_active.is_consistent());
    }

    #[test]
    fn test_run_state() {
        assert!(!RunState::Running.is_finished());
        assert!(RunState::Completed.is_finished());
        assert!(RunState::Stopped.is_finished());
        assert_eq!(RunState::Stopped.to_string(), "stopped");
    }
}
