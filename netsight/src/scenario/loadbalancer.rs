//! Request distribution across a server pool.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use netsight_common::Category;
use netsight_sequencer::Step;

use super::{Outcome, Playbook, Scenario, StepDetail};
use crate::error::{AppError, Result};
use crate::metrics::MetricSource;

/// Server selection strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    LeastConnections,
    /// Random pick weighted by spare CPU.
    Weighted,
    /// Sticky pick from the client address.
    IpHash,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round-robin",
            Algorithm::LeastConnections => "least-connections",
            Algorithm::Weighted => "weighted",
            Algorithm::IpHash => "ip-hash",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health classification of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Healthy,
    Warning,
    Critical,
    Offline,
}

impl ServerStatus {
    /// Classify from resource usage in percent.
    pub fn from_load(cpu: f64, memory: f64) -> Self {
        if cpu > 85.0 || memory > 85.0 {
            ServerStatus::Critical
        } else if cpu > 70.0 || memory > 70.0 {
            ServerStatus::Warning
        } else {
            ServerStatus::Healthy
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Healthy => write!(f, "healthy"),
            ServerStatus::Warning => write!(f, "warning"),
            ServerStatus::Critical => write!(f, "critical"),
            ServerStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Backend server as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    /// CPU usage in percent.
    pub cpu: f64,
    /// Memory usage in percent.
    pub memory: f64,
    pub connections: u32,
    #[serde(default)]
    pub region: String,
    /// Offline servers never receive traffic.
    #[serde(default)]
    pub offline: bool,
}

/// Load balancer scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerConfig {
    #[serde(default)]
    pub algorithm: Algorithm,
    pub servers: Vec<ServerConfig>,
    #[serde(flatten)]
    pub playbook: Playbook,
}

impl LoadBalancerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.servers.iter().any(|server| !server.offline) {
            return Err(AppError::validation(
                "scenarios.loadbalancer: at least one online server is required",
            ));
        }
        Ok(())
    }
}

/// Load of one server after a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerLoad {
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
    pub connections: u32,
    pub status: ServerStatus,
}

impl ServerLoad {
    fn from_config(server: &ServerConfig) -> Self {
        let status = if server.offline {
            ServerStatus::Offline
        } else {
            ServerStatus::from_load(server.cpu, server.memory)
        };

        Self {
            name: server.name.clone(),
            cpu: server.cpu,
            memory: server.memory,
            connections: server.connections,
            status,
        }
    }

    fn is_online(&self) -> bool {
        self.status != ServerStatus::Offline
    }

    /// The request landed here.
    fn take_request(&mut self, metrics: &mut dyn MetricSource) {
        self.connections += 1;
        self.cpu = (self.cpu + metrics.ratio() * 5.0).min(95.0);
        self.memory = (self.memory + metrics.ratio() * 3.0).min(95.0);
        self.status = ServerStatus::from_load(self.cpu, self.memory);
    }

    /// Another server took the request; this one cools down.
    fn cool_down(&mut self, metrics: &mut dyn MetricSource) {
        self.cpu = (self.cpu - metrics.ratio() * 2.0).max(10.0);
        self.memory = (self.memory - metrics.ratio()).max(10.0);
        let released = (metrics.ratio() * 5.0).floor() as u32;
        self.connections = self.connections.saturating_sub(released).max(50);
    }
}

/// Result of routing one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routing {
    /// Requests routed so far, including this one.
    pub request: u64,
    pub client_ip: Ipv4Addr,
    pub algorithm: Algorithm,
    pub server: Option<String>,
    pub latency_ms: u64,
    pub servers: Vec<ServerLoad>,
}

impl std::fmt::Display for Routing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.server {
            Some(server) => write!(
                f,
                "request #{} from {} routed to {} by {} in {} ms",
                self.request, self.client_ip, server, self.algorithm, self.latency_ms
            )?,
            None => write!(
                f,
                "request #{} from {} dropped: no server online",
                self.request, self.client_ip
            )?,
        }

        for server in &self.servers {
            write!(
                f,
                "\n    {:<10} cpu {:>5.1}%  mem {:>5.1}%  conn {:>4}  {}",
                server.name, server.cpu, server.memory, server.connections, server.status
            )?;
        }
        Ok(())
    }
}

pub struct LoadBalancerScenario {
    config: LoadBalancerConfig,
    servers: Vec<ServerLoad>,
    cursor: usize,
    requests: u64,
    client_ip: Ipv4Addr,
    target: Option<usize>,
}

impl LoadBalancerScenario {
    pub fn new(config: LoadBalancerConfig) -> Self {
        let servers = config.servers.iter().map(ServerLoad::from_config).collect();
        Self {
            config,
            servers,
            cursor: 0,
            requests: 0,
            client_ip: Ipv4Addr::UNSPECIFIED,
            target: None,
        }
    }

    pub fn servers(&self) -> &[ServerLoad] {
        &self.servers
    }

    /// Pick the server for a request from `client_ip`.
    ///
    /// Returns an index into [`Self::servers`].
    pub fn select(&mut self, client_ip: Ipv4Addr, metrics: &mut dyn MetricSource) -> Option<usize> {
        let online: Vec<usize> = self
            .servers
            .iter()
            .enumerate()
            .filter(|(_, server)| server.is_online())
            .map(|(index, _)| index)
            .collect();

        if online.is_empty() {
            return None;
        }

        let chosen = match self.config.algorithm {
            Algorithm::RoundRobin => {
                self.cursor = (self.cursor + 1) % online.len();
                online[self.cursor]
            }
            Algorithm::LeastConnections => *online
                .iter()
                .min_by_key(|&&index| self.servers[index].connections)?,
            Algorithm::Weighted => {
                let weights: Vec<f64> = online
                    .iter()
                    .map(|&index| (100.0 - self.servers[index].cpu).max(0.0))
                    .collect();
                let mut roll = metrics.ratio() * weights.iter().sum::<f64>();

                let mut chosen = online[0];
                for (&index, weight) in online.iter().zip(&weights) {
                    if roll <= *weight {
                        chosen = index;
                        break;
                    }
                    roll -= weight;
                }
                chosen
            }
            Algorithm::IpHash => {
                let hash: usize = client_ip.octets().iter().map(|&octet| octet as usize).sum();
                online[hash % online.len()]
            }
        };

        Some(chosen)
    }

    /// Apply the load change of a routed request.
    fn settle(&mut self, target: Option<usize>, metrics: &mut dyn MetricSource) {
        for (index, server) in self.servers.iter_mut().enumerate() {
            if Some(index) == target {
                server.take_request(metrics);
            } else if server.is_online() {
                server.cool_down(metrics);
            }
        }
    }

    fn target_name(&self) -> Option<&str> {
        self.target
            .and_then(|index| self.servers.get(index))
            .map(|server| server.name.as_str())
    }
}

impl Scenario for LoadBalancerScenario {
    fn category(&self) -> Category {
        Category::LoadBalancer
    }

    fn playbook(&self) -> &Playbook {
        &self.config.playbook
    }

    fn begin(&mut self, metrics: &mut dyn MetricSource) {
        self.client_ip = metrics.client_ip();
        self.target = self.select(self.client_ip, metrics);
        self.requests += 1;

        tracing::debug!(
            client = %self.client_ip,
            algorithm = %self.config.algorithm,
            target = ?self.target_name(),
            "Request routed"
        );
    }

    fn on_step(
        &mut self,
        _phase: usize,
        step: &Step<StepDetail>,
        _metrics: &mut dyn MetricSource,
    ) -> Option<String> {
        match step.id.as_str() {
            "request" => Some(format!("client {}", self.client_ip)),
            "select" => Some(match self.target_name() {
                Some(name) => format!("{} picks {name}", self.config.algorithm),
                None => "no server online".to_string(),
            }),
            "forward" | "respond" => self.target_name().map(str::to_string),
            _ => None,
        }
    }

    fn outcome(&mut self, metrics: &mut dyn MetricSource) -> Outcome {
        let target = self.target.take();
        self.settle(target, metrics);

        Outcome::LoadBalancer(Routing {
            request: self.requests,
            client_ip: self.client_ip,
            algorithm: self.config.algorithm,
            server: target.and_then(|index| self.servers.get(index)).map(|s| s.name.clone()),
            latency_ms: metrics.latency_ms(20..100),
            servers: self.servers.clone(),
        })
    }
}
