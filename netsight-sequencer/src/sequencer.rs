//! The step sequencer and its run handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Result, SequencerError};
use crate::run::{RunState, SequenceRun};
use crate::step::{Step, validate_steps};

/// Receives the events of a run.
///
/// Callbacks run on the tick task; they must not block. Calling
/// [`RunHandle::stop`] from inside a callback is allowed.
pub trait SequenceObserver<P>: Send + 'static {
    /// A step became active; `run` holds the statuses right after the tick.
    fn on_step(&mut self, index: usize, step: &Step<P>, run: &SequenceRun);

    /// The last step was reached. Called at most once per run.
    fn on_complete(&mut self);
}

/// Adapter that lets a pair of closures act as an observer.
struct Callbacks<S, C> {
    on_step: S,
    on_complete: Option<C>,
}

impl<P, S, C> SequenceObserver<P> for Callbacks<S, C>
where
    S: FnMut(usize, &Step<P>) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    fn on_step(&mut self, index: usize, step: &Step<P>, _run: &SequenceRun) {
        (self.on_step)(index, step);
    }

    fn on_complete(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete();
        }
    }
}

/// State shared between a run's tick task and its handles.
struct RunShared {
    sequencer: String,
    run_id: u64,
    run: Mutex<SequenceRun>,
    cancelled: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<RunState>,
}

impl RunShared {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Move a running run to `state`. Returns false if it had already ended.
    fn settle(&self, state: RunState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == RunState::Running {
                *current = state;
                true
            } else {
                false
            }
        })
    }
}

/// Owned by the tick task; a task that ends without completing leaves the
/// run `Stopped`, including when an observer panics.
struct TaskGuard(Arc<RunShared>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        if self.0.settle(RunState::Stopped) {
            tracing::warn!(
                sequencer = %self.0.sequencer,
                run = self.0.run_id,
                "Run ended before completing"
            );
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to one run.
///
/// Cloning is cheap; every clone controls the same run. Dropping a handle does
/// not stop the run, dropping the owning [`Sequencer`] does.
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<RunShared>,
}

impl RunHandle {
    /// Cancel any pending tick.
    ///
    /// Idempotent and safe after natural completion. Once this returns no
    /// further callback of this run is started.
    pub fn stop(&self) {
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(task) = lock(&self.shared.task).take() {
            task.abort();
        }

        if self.shared.settle(RunState::Stopped) {
            tracing::debug!(
                sequencer = %self.shared.sequencer,
                run = self.shared.run_id,
                "Run stopped"
            );
        }
    }

    /// Sequence number of this run within its sequencer, starting at 1.
    pub fn run_id(&self) -> u64 {
        self.shared.run_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        *self.shared.state.borrow()
    }

    /// Whether ticks are still scheduled.
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Copy of the step statuses at this instant.
    pub fn snapshot(&self) -> SequenceRun {
        lock(&self.shared.run).clone()
    }

    /// Wait until the run completes or is stopped, and return how it ended.
    pub async fn finished(&self) -> RunState {
        let mut rx = self.shared.state.subscribe();
        if let Ok(state) = rx.wait_for(|state| state.is_finished()).await {
            return *state;
        }
        self.state()
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("sequencer", &self.shared.sequencer)
            .field("run_id", &self.shared.run_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Drives one run at a time over a fixed step list.
///
/// Starting a new run stops the previous one, so callbacks from two runs never
/// interleave. Dropping the sequencer stops its run.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use netsight_sequencer::{Sequencer, Step};
///
/// let mut sequencer = Sequencer::new("dns");
/// let steps = vec![
///     Step::bare("browser", "Browser Cache", Duration::from_millis(400)),
///     Step::bare("os", "OS Cache", Duration::from_millis(420)),
/// ];
///
/// let run = sequencer.start(
///     steps,
///     |index, step| println!("{index}: {}", step.label),
///     || println!("resolved"),
/// )?;
///
/// run.finished().await;
/// ```
pub struct Sequencer {
    name: String,
    current: Option<RunHandle>,
    runs_started: u64,
}

impl Sequencer {
    /// Create an idle sequencer. The name only appears in logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: None,
            runs_started: 0,
        }
    }

    /// Start a run driven by two closures.
    ///
    /// `on_step` receives the index and step each time a step becomes active,
    /// `on_complete` fires once after the last step.
    pub fn start<P, S, C>(
        &mut self,
        steps: impl Into<Arc<[Step<P>]>>,
        on_step: S,
        on_complete: C,
    ) -> Result<RunHandle>
    where
        P: Send + Sync + 'static,
        S: FnMut(usize, &Step<P>) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.start_with(
            steps,
            Callbacks {
                on_step,
                on_complete: Some(on_complete),
            },
        )
    }

    /// Start a run reporting to an observer.
    ///
    /// The step list is validated before the previous run is touched, so a
    /// rejected call leaves the current run playing.
    pub fn start_with<P, O>(
        &mut self,
        steps: impl Into<Arc<[Step<P>]>>,
        observer: O,
    ) -> Result<RunHandle>
    where
        P: Send + Sync + 'static,
        O: SequenceObserver<P>,
    {
        let steps: Arc<[Step<P>]> = steps.into();
        validate_steps(&steps)?;
        let runtime = Handle::try_current().map_err(|_| SequencerError::NoRuntime)?;

        self.stop();
        self.runs_started += 1;

        let (state, _) = watch::channel(RunState::Running);
        let shared = Arc::new(RunShared {
            sequencer: self.name.clone(),
            run_id: self.runs_started,
            run: Mutex::new(SequenceRun::new(steps.len())),
            cancelled: AtomicBool::new(false),
            task: Mutex::new(None),
            state,
        });

        tracing::debug!(
            sequencer = %self.name,
            run = shared.run_id,
            steps = steps.len(),
            "Run started"
        );

        let task = runtime.spawn(drive(Arc::clone(&shared), steps, observer));
        *lock(&shared.task) = Some(task);

        let handle = RunHandle { shared };
        self.current = Some(handle.clone());
        Ok(handle)
    }

    /// Stop the active run, if any.
    pub fn stop(&mut self) {
        if let Some(run) = self.current.take() {
            run.stop();
        }
    }

    /// Handle to the most recent run.
    pub fn current(&self) -> Option<&RunHandle> {
        self.current.as_ref()
    }

    /// Whether a run is still ticking.
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(RunHandle::is_running)
    }

    /// Number of runs started over the sequencer's lifetime.
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("name", &self.name)
            .field("current", &self.current)
            .field("runs_started", &self.runs_started)
            .finish()
    }
}

/// Tick loop of one run.
///
/// Each tick waits for the duration of the step it activates, so tick n+1 is
/// only scheduled once tick n's callback has returned.
async fn drive<P, O>(shared: Arc<RunShared>, steps: Arc<[Step<P>]>, mut observer: O)
where
    P: Send + Sync + 'static,
    O: SequenceObserver<P>,
{
    let _guard = TaskGuard(Arc::clone(&shared));

    for step in steps.iter() {
        tokio::time::sleep(step.duration).await;

        if shared.is_cancelled() {
            return;
        }

        let (index, snapshot) = {
            let mut run = lock(&shared.run);
            match run.advance() {
                Some(index) => (index, run.clone()),
                None => return,
            }
        };
        let is_last = snapshot.is_at_last();

        tracing::trace!(
            sequencer = %shared.sequencer,
            run = shared.run_id,
            step = %step.id,
            index,
            "Tick"
        );

        observer.on_step(index, step, &snapshot);

        if is_last {
            if shared.is_cancelled() {
                return;
            }

            lock(&shared.run).finish();
            observer.on_complete();

            shared.settle(RunState::Completed);

            tracing::debug!(
                sequencer = %shared.sequencer,
                run = shared.run_id,
                "Run completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn steps(durations: &[u64]) -> Vec<Step<()>> {
        durations
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                Step::bare(
                    format!("s{i}"),
                    format!("Step {i}"),
                    Duration::from_millis(*ms),
                )
            })
            .collect()
    }

    #[test]
    fn test_start_without_runtime() {
        let mut sequencer = Sequencer::new("no-runtime");
        let result = sequencer.start(steps(&[10]), |_, _| {}, || {});
        assert!(matches!(result, Err(SequencerError::NoRuntime)));
        assert_eq!(sequencer.runs_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_start_keeps_previous_run() {
        let mut sequencer = Sequencer::new("keep");
        let first = sequencer.start(steps(&[50, 50]), |_, _| {}, || {}).unwrap();

        let rejected = sequencer.start(Vec::<Step<()>>::new(), |_, _| {}, || {});
        assert_eq!(rejected.unwrap_err(), SequencerError::EmptySequence);

        assert!(first.is_running());
        assert_eq!(sequencer.current().map(RunHandle::run_id), Some(1));
        assert_eq!(first.finished().await, RunState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let mut sequencer = Sequencer::new("idem");
        let run = sequencer.start(steps(&[10]), |_, _| {}, || {}).unwrap();

        run.stop();
        run.stop();
        sequencer.stop();

        assert_eq!(run.state(), RunState::Stopped);
        assert!(!sequencer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_completion_keeps_completed() {
        let mut sequencer = Sequencer::new("done");
        let run = sequencer.start(steps(&[10, 10]), |_, _| {}, || {}).unwrap();

        assert_eq!(run.finished().await, RunState::Completed);
        run.stop();
        assert_eq!(run.state(), RunState::Completed);
        assert!(run.snapshot().is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_run() {
        let mut sequencer = Sequencer::new("drop");
        let run = sequencer.start(steps(&[10, 10]), |_, _| {}, || {}).unwrap();

        drop(sequencer);

        assert_eq!(run.state(), RunState::Stopped);
        assert_eq!(run.finished().await, RunState::Stopped);
    }
}
