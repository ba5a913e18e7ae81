//! Scenario player for lifecycle management.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::signal;
use tokio::sync::mpsc;

use netsight_common::Category;
use netsight_sequencer::{RunHandle, SequenceObserver, SequenceRun, Sequencer, Step, StepStatus};

use crate::error::{AppError, Result};
use crate::metrics::MetricSource;
use crate::render;
use crate::scenario::{Outcome, Scenario, StepDetail};

/// How events are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One human-readable line per event.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Why playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEnd {
    /// A non-looping scenario reached its outcome.
    Finished,
    /// The wall-clock budget ran out.
    BudgetExhausted,
    /// Shutdown was requested.
    Interrupted,
}

impl std::fmt::Display for PlaybackEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackEnd::Finished => write!(f, "finished"),
            PlaybackEnd::BudgetExhausted => write!(f, "budget exhausted"),
            PlaybackEnd::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Summary returned when playback ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackReport {
    pub category: Category,
    /// Passes that reached their outcome.
    pub passes: u64,
    /// Sequencer runs started, one per phase played.
    pub runs_started: u64,
    pub end: PlaybackEnd,
    /// Outcome of the last completed pass.
    pub outcome: Option<Outcome>,
}

/// Events forwarded from the sequencer callbacks.
#[derive(Debug)]
enum PlayerEvent {
    /// A step became active; carries the run as of that tick.
    Step(usize, SequenceRun),
    Complete,
}

/// Forwards the events of one phase to the player loop.
struct PhaseObserver {
    tx: mpsc::UnboundedSender<PlayerEvent>,
}

impl SequenceObserver<StepDetail> for PhaseObserver {
    fn on_step(&mut self, index: usize, _step: &Step<StepDetail>, run: &SequenceRun) {
        let _ = self.tx.send(PlayerEvent::Step(index, run.clone()));
    }

    fn on_complete(&mut self) {
        let _ = self.tx.send(PlayerEvent::Complete);
    }
}

/// One line of JSON output.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Record<'a> {
    Phase {
        name: &'a str,
        number: usize,
        total: usize,
    },
    Step {
        phase: &'a str,
        index: usize,
        id: &'a str,
        label: &'a str,
        statuses: &'a [StepStatus],
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<&'a str>,
    },
    Outcome {
        pass: u64,
        #[serde(flatten)]
        outcome: &'a Outcome,
    },
    End {
        #[serde(flatten)]
        report: &'a PlaybackReport,
    },
}

/// Plays one scenario on a sequencer.
///
/// Handles:
/// - Phase sequencing and looping
/// - Step annotation through the scenario
/// - The playback budget
/// - Graceful shutdown on Ctrl+C
///
/// # Example
///
/// ```ignore
/// let config = AppConfig::load(None)?;
/// let scenario = config.scenarios.build(Category::Dns)?;
///
/// let mut player = Player::new(scenario, Box::new(RandomMetrics::new(None)), std::io::stdout())
///     .with_budget(config.budget(Category::Dns));
///
/// let report = player.run().await?;
/// ```
pub struct Player<W> {
    scenario: Box<dyn Scenario>,
    metrics: Box<dyn MetricSource>,
    sequencer: Sequencer,
    output: W,
    format: OutputFormat,
    speed: f64,
    budget: Duration,
}

impl<W: Write> Player<W> {
    /// Create a player with speed 1.0 and the category's default budget.
    pub fn new(scenario: Box<dyn Scenario>, metrics: Box<dyn MetricSource>, output: W) -> Self {
        let category = scenario.category();
        Self {
            scenario,
            metrics,
            sequencer: Sequencer::new(category.as_str()),
            output,
            format: OutputFormat::default(),
            speed: 1.0,
            budget: category.default_budget(),
        }
    }

    /// Set the speed factor applied to step durations.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Set the wall-clock budget.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn category(&self) -> Category {
        self.scenario.category()
    }

    /// The sequencer driving the phases; its current run outlives playback.
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Consume the player and return its output.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Play until the scenario finishes, the budget runs out or Ctrl+C is received.
    pub async fn run(&mut self) -> Result<PlaybackReport> {
        self.run_until(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await
    }

    /// Play until the scenario finishes, the budget runs out or `shutdown` resolves.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<PlaybackReport>
    where
        F: Future<Output = ()>,
    {
        let category = self.scenario.category();
        let playbook = self.scenario.playbook().clone();
        let phases = playbook.phase_steps(self.speed);
        let pass_steps = playbook.step_count();

        tracing::info!(
            category = %category,
            phases = phases.len(),
            looping = playbook.looping,
            speed = self.speed,
            budget = %render::format_duration(self.budget),
            "Playback started"
        );

        let budget = tokio::time::sleep(self.budget);
        tokio::pin!(budget);
        tokio::pin!(shutdown);

        let mut passes = 0;
        let mut last_outcome = None;

        let end = 'playback: loop {
            self.scenario.begin(self.metrics.as_mut());
            let mut done = 0;

            for (phase_index, steps) in phases.iter().enumerate() {
                let name = playbook.phases[phase_index].name.as_str();
                self.emit_phase(name, phase_index + 1, phases.len(), steps.len())?;

                let (run, mut events) = self.start_phase(category, steps)?;

                loop {
                    tokio::select! {
                        event = events.recv() => match event {
                            Some(PlayerEvent::Step(index, snapshot)) => {
                                let Some(step) = steps.get(index) else {
                                    continue;
                                };
                                let detail = self.scenario.on_step(phase_index, step, self.metrics.as_mut());
                                done += 1;
                                self.emit_step(name, &snapshot, index, step, detail.as_deref(), done, pass_steps)?;
                            }
                            Some(PlayerEvent::Complete) => break,
                            None => break 'playback PlaybackEnd::Interrupted,
                        },
                        _ = &mut budget => {
                            run.stop();
                            break 'playback PlaybackEnd::BudgetExhausted;
                        }
                        _ = &mut shutdown => {
                            run.stop();
                            break 'playback PlaybackEnd::Interrupted;
                        }
                    }
                }
            }

            let outcome = self.scenario.outcome(self.metrics.as_mut());
            passes += 1;
            tracing::debug!(category = %category, pass = passes, "Pass completed");
            self.emit_outcome(passes, &outcome)?;
            last_outcome = Some(outcome);

            if !playbook.looping {
                break PlaybackEnd::Finished;
            }
        };

        if let Some(run) = self.sequencer.current() {
            run.stop();
        }

        let report = PlaybackReport {
            category,
            passes,
            runs_started: self.sequencer.runs_started(),
            end,
            outcome: last_outcome,
        };

        tracing::info!(
            category = %category,
            passes,
            end = %end,
            "Playback ended"
        );
        self.emit_end(&report)?;

        Ok(report)
    }

    /// Start one phase; callbacks forward to a channel owned by this phase.
    fn start_phase(
        &mut self,
        category: Category,
        steps: &Arc<[Step<StepDetail>]>,
    ) -> Result<(RunHandle, mpsc::UnboundedReceiver<PlayerEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let run = self
            .sequencer
            .start_with(Arc::clone(steps), PhaseObserver { tx })
            .map_err(|e| AppError::sequencer(category, e))?;

        Ok((run, rx))
    }

    fn emit_phase(&mut self, name: &str, number: usize, total: usize, steps: usize) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.output, "{}", render::phase_header(name, number, total, steps))?;
            }
            OutputFormat::Json => self.write_json(&Record::Phase {
                name,
                number,
                total,
            })?,
        }
        self.output.flush()?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_step(
        &mut self,
        phase: &str,
        run: &SequenceRun,
        index: usize,
        step: &Step<StepDetail>,
        detail: Option<&str>,
        done: usize,
        pass_steps: usize,
    ) -> Result<()> {
        let statuses = run.statuses();

        match self.format {
            OutputFormat::Text => {
                writeln!(
                    self.output,
                    "{} {}",
                    render::progress_bar(done, pass_steps, 10),
                    render::step_line(statuses, index, step, detail)
                )?;
            }
            OutputFormat::Json => self.write_json(&Record::Step {
                phase,
                index,
                id: &step.id,
                label: &step.label,
                statuses,
                detail,
            })?,
        }
        self.output.flush()?;
        Ok(())
    }

    fn emit_outcome(&mut self, pass: u64, outcome: &Outcome) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.output, "=> {outcome}")?,
            OutputFormat::Json => self.write_json(&Record::Outcome { pass, outcome })?,
        }
        self.output.flush()?;
        Ok(())
    }

    fn emit_end(&mut self, report: &PlaybackReport) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(
                self.output,
                "-- {}: {} after {} pass(es)",
                report.category.title(),
                report.end,
                report.passes
            )?,
            OutputFormat::Json => self.write_json(&Record::End { report })?,
        }
        self.output.flush()?;
        Ok(())
    }

    fn write_json(&mut self, record: &Record<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.output, record)?;
        writeln!(self.output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_end_serde() {
        assert_eq!(
            serde_json::to_string(&PlaybackEnd::BudgetExhausted).unwrap(),
            "\"budget_exhausted\""
        );
        assert_eq!(PlaybackEnd::Interrupted.to_string(), "interrupted");
    }
}
