//! Application configuration.
//!
//! The scenarios shipped with the binary live in `scenarios.json5`. A user file
//! is merged on top of them, so it only needs the keys it changes.

use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use netsight_common::{Category, LoggingConfig, PlaybackConfig, load_config, parse_config};

use crate::error::{AppError, Result};
use crate::scenario::{
    CdnConfig, CdnScenario, DnsConfig, DnsScenario, HttpConfig, HttpScenario, LoadBalancerConfig,
    LoadBalancerScenario, Playbook, Scenario, TcpConfig, TcpScenario, VpnConfig, VpnScenario,
};

const BUNDLED: &str = include_str!("../scenarios.json5");

/// Accepted range of `playback.speed`.
pub const SPEED_RANGE: RangeInclusive<f64> = 0.01..=1000.0;

/// Complete configuration of the `netsight` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    pub scenarios: ScenarioSet,
}

impl AppConfig {
    /// The bundled configuration.
    pub fn bundled() -> Result<Self> {
        Self::from_overlay(None)
    }

    /// Load the bundled configuration, merged with the file at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let overlay = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration");
                Some(load_config::<Value>(path)?)
            }
            None => None,
        };
        Self::from_overlay(overlay)
    }

    /// Parse a JSON5 document merged over the bundled configuration.
    pub fn parse(content: &str) -> Result<Self> {
        Self::from_overlay(Some(parse_config::<Value>(content)?))
    }

    fn from_overlay(overlay: Option<Value>) -> Result<Self> {
        let mut merged: Value = parse_config(BUNDLED)?;
        if let Some(overlay) = overlay {
            merge(&mut merged, overlay);
        }

        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let speed = self.playback.speed;
        if !SPEED_RANGE.contains(&speed) {
            return Err(AppError::validation(format!(
                "playback.speed must be between {} and {}, got {speed}",
                SPEED_RANGE.start(),
                SPEED_RANGE.end()
            )));
        }
        if self.playback.budget_secs == Some(0) {
            return Err(AppError::validation("playback.budget_secs must be positive"));
        }

        self.scenarios.validate()
    }

    /// Wall-clock budget for a category.
    ///
    /// An explicit `budget_secs` wins; otherwise the category default is
    /// scaled by the playback speed.
    pub fn budget(&self, category: Category) -> Duration {
        match self.playback.budget_secs {
            Some(secs) => Duration::from_secs(secs),
            None => crate::scenario::scale(category.default_budget(), self.playback.speed),
        }
    }
}

/// Merge `overlay` into `base`: objects merge key by key, anything else replaces.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Configuration of every category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub dns: DnsConfig,
    pub loadbalancer: LoadBalancerConfig,
    pub tcp: TcpConfig,
    pub http: HttpConfig,
    pub cdn: CdnConfig,
    pub vpn: VpnConfig,
}

impl ScenarioSet {
    pub fn playbook(&self, category: Category) -> &Playbook {
        match category {
            Category::Dns => &self.dns.playbook,
            Category::LoadBalancer => &self.loadbalancer.playbook,
            Category::Tcp => &self.tcp.playbook,
            Category::Http => &self.http.playbook,
            Category::Cdn => &self.cdn.playbook,
            Category::Vpn => &self.vpn.playbook,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            self.playbook(category).validate(category)?;
        }
        self.loadbalancer.validate()?;
        self.cdn.validate()?;
        self.vpn.validate()?;
        Ok(())
    }

    /// Build the scenario of a category.
    pub fn build(&self, category: Category) -> Result<Box<dyn Scenario>> {
        let scenario: Box<dyn Scenario> = match category {
            Category::Dns => Box::new(DnsScenario::new(self.dns.clone())),
            Category::LoadBalancer => {
                Box::new(LoadBalancerScenario::new(self.loadbalancer.clone()))
            }
            Category::Tcp => Box::new(TcpScenario::new(self.tcp.clone())),
            Category::Http => Box::new(HttpScenario::new(self.http.clone())),
            Category::Cdn => Box::new(CdnScenario::new(self.cdn.clone())),
            Category::Vpn => Box::new(VpnScenario::new(self.vpn.clone())?),
        };
        Ok(scenario)
    }
}
