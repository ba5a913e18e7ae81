//! Edge caching in a content delivery network.

use serde::{Deserialize, Serialize};

use netsight_common::Category;
use netsight_sequencer::Step;

use super::{Outcome, Playbook, Scenario, StepDetail};
use crate::error::{AppError, Result};
use crate::metrics::MetricSource;
use crate::render::format_size_kb;

/// A cache roll must exceed this for a hit.
const HIT_THRESHOLD: f64 = 0.3;

/// How content reaches the edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStrategy {
    /// Edges fetch from origin on the first miss.
    #[default]
    Pull,
    /// Origin uploads content to the edges ahead of time.
    Push,
}

/// One edge location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRegion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub servers: u32,
    /// Load in percent.
    #[serde(default)]
    pub load: u32,
    pub latency_ms: u64,
    /// Content kinds this edge keeps cached.
    #[serde(default)]
    pub cached: Vec<String>,
}

impl EdgeRegion {
    pub fn caches(&self, kind: &str) -> bool {
        self.cached.iter().any(|cached| cached.eq_ignore_ascii_case(kind))
    }
}

/// A kind of asset users request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    pub kind: String,
    pub size_kb: u64,
    pub cacheable: bool,
}

/// CDN scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdnConfig {
    #[serde(default)]
    pub strategy: CacheStrategy,
    pub user_regions: Vec<String>,
    pub regions: Vec<EdgeRegion>,
    pub content: Vec<ContentType>,
    #[serde(flatten)]
    pub playbook: Playbook,
}

impl CdnConfig {
    pub fn validate(&self) -> Result<()> {
        if self.user_regions.is_empty() {
            return Err(AppError::validation("scenarios.cdn: user_regions is empty"));
        }
        if self.regions.is_empty() {
            return Err(AppError::validation("scenarios.cdn: regions is empty"));
        }
        if self.content.is_empty() {
            return Err(AppError::validation("scenarios.cdn: content is empty"));
        }
        Ok(())
    }
}

/// Whether an edge can answer a request from cache.
pub fn is_cache_hit(content: &ContentType, edge: &EdgeRegion, roll: f64) -> bool {
    content.cacheable && roll > HIT_THRESHOLD && edge.caches(&content.kind)
}

/// Result of one delivered request, with running totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CdnDelivery {
    pub user_region: String,
    pub edge: String,
    pub content: String,
    pub size_kb: u64,
    pub hit: bool,
    pub latency_ms: u64,
    pub hits: u64,
    pub misses: u64,
    pub bandwidth_saved_kb: u64,
}

impl CdnDelivery {
    /// Hit rate in percent over every delivery so far.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 * 100.0 / total as f64
    }
}

impl std::fmt::Display for CdnDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) for {} via {}: {} in {} ms | hit rate {:.1}%, saved {}",
            self.content,
            format_size_kb(self.size_kb),
            self.user_region,
            self.edge,
            if self.hit { "HIT" } else { "MISS" },
            self.latency_ms,
            self.hit_rate(),
            format_size_kb(self.bandwidth_saved_kb)
        )
    }
}

/// Request being played in the current pass.
#[derive(Debug, Clone)]
struct Request {
    user_region: usize,
    content: usize,
    edge: usize,
    hit: bool,
}

pub struct CdnScenario {
    config: CdnConfig,
    request: Option<Request>,
    hits: u64,
    misses: u64,
    bandwidth_saved_kb: u64,
}

impl CdnScenario {
    pub fn new(config: CdnConfig) -> Self {
        Self {
            config,
            request: None,
            hits: 0,
            misses: 0,
            bandwidth_saved_kb: 0,
        }
    }

    fn draw(&self, metrics: &mut dyn MetricSource) -> Option<Request> {
        let user_region = metrics.pick(self.config.user_regions.len());
        let content = metrics.pick(self.config.content.len());
        let edge = metrics.pick(self.config.regions.len());
        let hit = is_cache_hit(
            self.config.content.get(content)?,
            self.config.regions.get(edge)?,
            metrics.ratio(),
        );

        Some(Request {
            user_region,
            content,
            edge,
            hit,
        })
    }

    fn parts(&self, request: &Request) -> Option<(&str, &ContentType, &EdgeRegion)> {
        Some((
            self.config.user_regions.get(request.user_region)?,
            self.config.content.get(request.content)?,
            self.config.regions.get(request.edge)?,
        ))
    }
}

impl Scenario for CdnScenario {
    fn category(&self) -> Category {
        Category::Cdn
    }

    fn playbook(&self) -> &Playbook {
        &self.config.playbook
    }

    fn begin(&mut self, metrics: &mut dyn MetricSource) {
        self.request = self.draw(metrics);
    }

    fn on_step(
        &mut self,
        _phase: usize,
        step: &Step<StepDetail>,
        _metrics: &mut dyn MetricSource,
    ) -> Option<String> {
        let request = self.request.as_ref()?;
        let (user_region, content, edge) = self.parts(request)?;

        match step.id.as_str() {
            "request" => Some(format!(
                "{user_region} asks for {} ({})",
                content.kind,
                format_size_kb(content.size_kb)
            )),
            "route" => Some(format!(
                "{} in {}, {} ms, load {}%",
                edge.name, edge.location, edge.latency_ms, edge.load
            )),
            "lookup" => Some(if request.hit {
                "HIT".to_string()
            } else if !content.cacheable {
                "MISS (not cacheable)".to_string()
            } else {
                "MISS".to_string()
            }),
            "fetch" => Some(match (request.hit, self.config.strategy) {
                (true, _) => "served from edge".to_string(),
                (false, CacheStrategy::Pull) if content.cacheable => {
                    "pulled from origin and cached".to_string()
                }
                (false, CacheStrategy::Push) if content.cacheable => {
                    "not pushed yet, fetched from origin".to_string()
                }
                (false, _) => "fetched from origin".to_string(),
            }),
            "deliver" => Some(format_size_kb(content.size_kb)),
            _ => None,
        }
    }

    fn outcome(&mut self, metrics: &mut dyn MetricSource) -> Outcome {
        let request = self.request.take();
        let parts = request
            .as_ref()
            .and_then(|request| Some((request.hit, self.parts(request)?)));

        let Some((hit, (user_region, content, edge))) = parts else {
            return Outcome::Cdn(CdnDelivery {
                user_region: String::new(),
                edge: String::new(),
                content: String::new(),
                size_kb: 0,
                hit: false,
                latency_ms: 0,
                hits: self.hits,
                misses: self.misses,
                bandwidth_saved_kb: self.bandwidth_saved_kb,
            });
        };

        let latency_ms = if hit {
            edge.latency_ms
        } else {
            edge.latency_ms + metrics.latency_ms(80..250)
        };
        let delivery = CdnDelivery {
            user_region: user_region.to_string(),
            edge: edge.name.clone(),
            content: content.kind.clone(),
            size_kb: content.size_kb,
            hit,
            latency_ms,
            hits: 0,
            misses: 0,
            bandwidth_saved_kb: 0,
        };

        if hit {
            self.hits += 1;
            self.bandwidth_saved_kb += delivery.size_kb;
        } else {
            self.misses += 1;
        }

        Outcome::Cdn(CdnDelivery {
            hits: self.hits,
            misses: self.misses,
            bandwidth_saved_kb: self.bandwidth_saved_kb,
            ..delivery
        })
    }
}
