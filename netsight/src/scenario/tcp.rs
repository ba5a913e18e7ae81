//! TCP connection establishment and teardown.

use serde::{Deserialize, Serialize};

use netsight_common::Category;
use netsight_sequencer::Step;

use super::{Outcome, Playbook, Scenario, StepDetail};
use crate::metrics::MetricSource;

/// Connection state of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    #[serde(rename = "FIN_WAIT_1")]
    FinWait1,
    #[serde(rename = "FIN_WAIT_2")]
    FinWait2,
    CloseWait,
    LastAck,
    TimeWait,
}

impl std::fmt::Display for TcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TcpState::Closed => "CLOSED",
            TcpState::Listen => "LISTEN",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynReceived => "SYN_RECEIVED",
            TcpState::Established => "ESTABLISHED",
            TcpState::FinWait1 => "FIN_WAIT_1",
            TcpState::FinWait2 => "FIN_WAIT_2",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::TimeWait => "TIME_WAIT",
        };
        write!(f, "{name}")
    }
}

/// Direction of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// A control segment exchanged during the walkthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub flags: &'static str,
    pub seq: u32,
    pub ack: u32,
    pub direction: Direction,
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arrow = match self.direction {
            Direction::ClientToServer => "client -> server",
            Direction::ServerToClient => "server -> client",
        };
        write!(f, "{} {arrow} SEQ={} ACK={}", self.flags, self.seq, self.ack)
    }
}

/// TCP scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Initial sequence number of the client.
    pub client_isn: u32,
    /// Initial sequence number of the server.
    pub server_isn: u32,
    #[serde(default = "default_window")]
    pub window: u32,
    #[serde(default = "default_mss")]
    pub mss: u32,
    #[serde(flatten)]
    pub playbook: Playbook,
}

fn default_window() -> u32 {
    65535
}

fn default_mss() -> u32 {
    1460
}

/// Final state of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcpOutcome {
    pub client: TcpState,
    pub server: TcpState,
    pub window: u32,
    pub mss: u32,
    pub segments: Vec<Segment>,
}

impl std::fmt::Display for TcpOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "client {} / server {} after {} segments (window {}, MSS {})",
            self.client,
            self.server,
            self.segments.len(),
            self.window,
            self.mss
        )
    }
}

pub struct TcpScenario {
    config: TcpConfig,
    client: TcpState,
    server: TcpState,
    segments: Vec<Segment>,
}

impl TcpScenario {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            client: TcpState::Closed,
            server: TcpState::Listen,
            segments: Vec::new(),
        }
    }

    pub fn states(&self) -> (TcpState, TcpState) {
        (self.client, self.server)
    }

    fn send(&mut self, flags: &'static str, direction: Direction, seq: u32, ack: u32) -> String {
        let segment = Segment {
            flags,
            seq,
            ack,
            direction,
        };
        let line = segment.to_string();
        self.segments.push(segment);
        line
    }

    fn describe(&self, segment: Option<String>) -> String {
        let states = format!("client {} / server {}", self.client, self.server);
        match segment {
            Some(segment) => format!("{segment}  [{states}]"),
            None => states,
        }
    }
}

impl Scenario for TcpScenario {
    fn category(&self) -> Category {
        Category::Tcp
    }

    fn playbook(&self) -> &Playbook {
        &self.config.playbook
    }

    fn begin(&mut self, _metrics: &mut dyn MetricSource) {
        self.client = TcpState::Closed;
        self.server = TcpState::Listen;
        self.segments.clear();
    }

    fn on_step(
        &mut self,
        _phase: usize,
        step: &Step<StepDetail>,
        _metrics: &mut dyn MetricSource,
    ) -> Option<String> {
        let client_isn = self.config.client_isn;
        let server_isn = self.config.server_isn;

        let segment = match step.id.as_str() {
            "closed" => {
                self.client = TcpState::Closed;
                self.server = TcpState::Listen;
                None
            }
            "syn" => {
                self.client = TcpState::SynSent;
                Some(self.send("SYN", Direction::ClientToServer, client_isn, 0))
            }
            "syn-ack" => {
                self.server = TcpState::SynReceived;
                Some(self.send(
                    "SYN,ACK",
                    Direction::ServerToClient,
                    server_isn,
                    client_isn.wrapping_add(1),
                ))
            }
            "ack" => {
                self.client = TcpState::Established;
                self.server = TcpState::Established;
                Some(self.send(
                    "ACK",
                    Direction::ClientToServer,
                    client_isn.wrapping_add(1),
                    server_isn.wrapping_add(1),
                ))
            }
            "established" => {
                return Some(format!(
                    "{}  window {} MSS {}",
                    self.describe(None),
                    self.config.window,
                    self.config.mss
                ));
            }
            "fin" => {
                self.client = TcpState::FinWait1;
                Some(self.send(
                    "FIN,ACK",
                    Direction::ClientToServer,
                    client_isn.wrapping_add(1),
                    server_isn.wrapping_add(1),
                ))
            }
            "fin-ack" => {
                self.client = TcpState::FinWait2;
                self.server = TcpState::CloseWait;
                Some(self.send(
                    "ACK",
                    Direction::ServerToClient,
                    server_isn.wrapping_add(1),
                    client_isn.wrapping_add(2),
                ))
            }
            "passive-fin" => {
                self.server = TcpState::LastAck;
                Some(self.send(
                    "FIN,ACK",
                    Direction::ServerToClient,
                    server_isn.wrapping_add(1),
                    client_isn.wrapping_add(2),
                ))
            }
            "final-ack" => {
                self.client = TcpState::TimeWait;
                self.server = TcpState::Closed;
                Some(self.send(
                    "ACK",
                    Direction::ClientToServer,
                    client_isn.wrapping_add(2),
                    server_isn.wrapping_add(2),
                ))
            }
            _ => return None,
        };

        Some(self.describe(segment))
    }

    fn outcome(&mut self, _metrics: &mut dyn MetricSource) -> Outcome {
        Outcome::Tcp(TcpOutcome {
            client: self.client,
            server: self.server,
            window: self.config.window,
            mss: self.config.mss,
            segments: std::mem::take(&mut self.segments),
        })
    }
}
