//! NetSight - Animated walkthroughs of networking concepts.
//!
//! This library exposes the scenario, configuration and player components for
//! the `netsight` binary and its tests.

pub mod args;
pub mod config;
pub mod error;
pub mod metrics;
pub mod player;
pub mod render;
pub mod scenario;

// Re-export commonly used types
pub use args::Args;
pub use config::{AppConfig, ScenarioSet};
pub use error::{AppError, Result};
pub use metrics::{FixedMetrics, MetricSource, RandomMetrics};
pub use player::{OutputFormat, PlaybackEnd, PlaybackReport, Player};
pub use scenario::{Outcome, Playbook, Scenario};
