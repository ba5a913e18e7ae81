//! Per-category scenarios.
//!
//! A scenario is a [`Playbook`] of phases loaded from configuration plus the
//! domain logic that annotates steps and derives the final [`Outcome`].

pub mod cdn;
pub mod dns;
pub mod http;
pub mod loadbalancer;
pub mod tcp;
pub mod vpn;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use netsight_common::Category;
use netsight_sequencer::Step;

use crate::error::{AppError, Result};
use crate::metrics::MetricSource;

pub use cdn::{CdnConfig, CdnDelivery, CdnScenario};
pub use dns::{DnsConfig, DnsResolution, DnsScenario, QueryType};
pub use http::{HttpConfig, HttpResponse, HttpScenario};
pub use loadbalancer::{Algorithm, LoadBalancerConfig, LoadBalancerScenario, Routing};
pub use tcp::{TcpConfig, TcpOutcome, TcpScenario, TcpState};
pub use vpn::{TunnelReport, VpnConfig, VpnScenario};

/// One step as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Identifier, also used by the scenario to pick its annotation.
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Time from the previous step to this one, at speed 1.0.
    pub duration_ms: u64,
}

/// Payload carried by every played step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDetail {
    pub description: String,
}

/// Named list of steps played in one sequencer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    pub steps: Vec<StepSpec>,
}

impl PhaseConfig {
    /// Build the sequencer steps, dividing every duration by `speed`.
    pub fn to_steps(&self, speed: f64) -> Vec<Step<StepDetail>> {
        self.steps
            .iter()
            .map(|spec| {
                Step::new(
                    spec.id.clone(),
                    spec.label.clone(),
                    scale(Duration::from_millis(spec.duration_ms), speed),
                    StepDetail {
                        description: spec.description.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Divide a duration by the playback speed.
///
/// Never rounds a positive duration down to zero; saturates at
/// [`Duration::MAX`] when the quotient does not fit.
pub fn scale(duration: Duration, speed: f64) -> Duration {
    if duration.is_zero() {
        return duration;
    }
    let scaled =
        Duration::try_from_secs_f64(duration.as_secs_f64() / speed).unwrap_or(Duration::MAX);
    scaled.max(Duration::from_millis(1))
}

/// Phases of a scenario and whether they repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub phases: Vec<PhaseConfig>,
    /// Replay from the first phase after the outcome is shown.
    #[serde(default)]
    pub looping: bool,
}

impl Playbook {
    /// Validate the playbook of the given category.
    pub fn validate(&self, category: Category) -> Result<()> {
        if self.phases.is_empty() {
            return Err(AppError::validation(format!(
                "scenarios.{}: at least one phase is required",
                category.as_str()
            )));
        }

        for phase in &self.phases {
            if phase.steps.is_empty() {
                return Err(AppError::validation(format!(
                    "scenarios.{}: phase '{}' has no steps",
                    category.as_str(),
                    phase.name
                )));
            }
            if let Some(step) = phase.steps.iter().find(|s| s.duration_ms == 0) {
                return Err(AppError::validation(format!(
                    "scenarios.{}: step '{}' must have a positive duration_ms",
                    category.as_str(),
                    step.id
                )));
            }
        }

        Ok(())
    }

    /// Steps of every phase, scaled by `speed`.
    pub fn phase_steps(&self, speed: f64) -> Vec<Arc<[Step<StepDetail>]>> {
        self.phases
            .iter()
            .map(|phase| phase.to_steps(speed).into())
            .collect()
    }

    /// Duration of one pass over every phase at speed 1.0.
    pub fn pass_duration(&self) -> Duration {
        let ms = self
            .phases
            .iter()
            .flat_map(|phase| &phase.steps)
            .map(|step| step.duration_ms)
            .sum();
        Duration::from_millis(ms)
    }

    /// Total number of steps across phases.
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|phase| phase.steps.len()).sum()
    }
}

/// Domain logic of one category.
///
/// The player calls [`Scenario::begin`] at the start of every pass,
/// [`Scenario::on_step`] for every activated step and [`Scenario::outcome`]
/// once the last phase completes.
pub trait Scenario: Send {
    fn category(&self) -> Category;

    fn playbook(&self) -> &Playbook;

    /// Prepare a new pass.
    fn begin(&mut self, _metrics: &mut dyn MetricSource) {}

    /// Annotate an activated step. Returns a detail line to show next to it.
    fn on_step(
        &mut self,
        phase: usize,
        step: &Step<StepDetail>,
        metrics: &mut dyn MetricSource,
    ) -> Option<String>;

    /// Result of the pass that just completed.
    fn outcome(&mut self, metrics: &mut dyn MetricSource) -> Outcome;
}

/// Result computed when a pass completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum Outcome {
    Dns(DnsResolution),
    #[serde(rename = "loadbalancer")]
    LoadBalancer(Routing),
    Tcp(TcpOutcome),
    Http(HttpResponse),
    Cdn(CdnDelivery),
    Vpn(TunnelReport),
}

impl Outcome {
    pub fn category(&self) -> Category {
        match self {
            Outcome::Dns(_) => Category::Dns,
            Outcome::LoadBalancer(_) => Category::LoadBalancer,
            Outcome::Tcp(_) => Category::Tcp,
            Outcome::Http(_) => Category::Http,
            Outcome::Cdn(_) => Category::Cdn,
            Outcome::Vpn(_) => Category::Vpn,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Dns(outcome) => outcome.fmt(f),
            Outcome::LoadBalancer(outcome) => outcome.fmt(f),
            Outcome::Tcp(outcome) => outcome.fmt(f),
            Outcome::Http(outcome) => outcome.fmt(f),
            Outcome::Cdn(outcome) => outcome.fmt(f),
            Outcome::Vpn(outcome) => outcome.fmt(f),
        }
    }
}

#[cfg(test)]
pub(crate) fn playbook(ids: &[&str], duration_ms: u64) -> Playbook {
    Playbook {
        phases: vec![PhaseConfig {
            name: "test".to_string(),
            steps: ids
                .iter()
                .map(|id| StepSpec {
                    id: id.to_string(),
                    label: id.to_string(),
                    description: String::new(),
                    duration_ms,
                })
                .collect(),
        }],
        looping: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_speed() {
        let base = Duration::from_millis(1000);
        assert_eq!(scale(base, 1.0), base);
        assert_eq!(scale(base, 4.0), Duration::from_millis(250));
        assert_eq!(scale(base, 0.5), Duration::from_millis(2000));
        assert_eq!(scale(Duration::from_millis(1), 1000.0), Duration::from_millis(1));
        assert_eq!(scale(base, 1e-20), Duration::MAX);
    }

    #[test]
    fn test_phase_to_steps() {
        let book = playbook(&["a", "b"], 400);
        let steps = book.phases[0].to_steps(2.0);

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].id, "b");
        assert_eq!(steps[1].duration, Duration::from_millis(200));
        assert_eq!(book.pass_duration(), Duration::from_millis(800));
        assert_eq!(book.step_count(), 2);
    }

    #[test]
    fn test_validate_playbook() {
        assert!(playbook(&["a"], 100).validate(Category::Dns).is_ok());

        let empty = Playbook {
            phases: vec![],
            looping: false,
        };
        assert!(empty.validate(Category::Dns).is_err());

        let zero = playbook(&["a"], 0);
        let err = zero.validate(Category::Tcp).unwrap_err();
        assert!(err.to_string().contains("scenarios.tcp"));

        let mut no_steps = playbook(&["a"], 10);
        no_steps.phases[0].steps.clear();
        assert!(no_steps.validate(Category::Http).is_err());
    }
}
