//! Packet journey through a VPN tunnel.

use serde::{Deserialize, Serialize};

use netsight_common::Category;
use netsight_sequencer::Step;

use super::{Outcome, Playbook, Scenario, StepDetail};
use crate::error::{AppError, Result};
use crate::metrics::MetricSource;

/// A tunneling protocol offered by the demo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnProtocol {
    pub id: String,
    pub name: String,
    pub port: String,
    pub encryption: String,
    #[serde(default)]
    pub security: String,
    #[serde(default)]
    pub speed: String,
}

/// VPN scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VpnConfig {
    /// Id of the protocol in use.
    pub protocol: String,
    pub device_ip: String,
    pub tunnel_ip: String,
    pub destination: String,
    pub protocols: Vec<VpnProtocol>,
    #[serde(flatten)]
    pub playbook: Playbook,
}

impl VpnConfig {
    /// The selected protocol.
    pub fn selected(&self) -> Option<&VpnProtocol> {
        self.protocols.iter().find(|p| p.id == self.protocol)
    }

    pub fn validate(&self) -> Result<()> {
        if self.selected().is_none() {
            let known: Vec<&str> = self.protocols.iter().map(|p| p.id.as_str()).collect();
            return Err(AppError::validation(format!(
                "scenarios.vpn: unknown protocol '{}' (known: {})",
                self.protocol,
                known.join(", ")
            )));
        }
        Ok(())
    }
}

/// Summary of one tunneled packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelReport {
    pub protocol: String,
    pub encryption: String,
    pub port: String,
    pub security: String,
    pub device_ip: String,
    pub tunnel_ip: String,
    pub destination: String,
    pub latency_ms: u64,
    /// Packets tunneled so far.
    pub packets: u64,
}

impl std::fmt::Display for TunnelReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "packet #{} {} -> {} via {} ({}, port {}) as {} in {} ms",
            self.packets,
            self.device_ip,
            self.destination,
            self.protocol,
            self.encryption,
            self.port,
            self.tunnel_ip,
            self.latency_ms
        )
    }
}

pub struct VpnScenario {
    config: VpnConfig,
    protocol: VpnProtocol,
    latency_ms: u64,
    packets: u64,
}

impl VpnScenario {
    /// Fails when the configured protocol is not in the protocol list.
    pub fn new(config: VpnConfig) -> Result<Self> {
        config.validate()?;
        let protocol = config
            .selected()
            .cloned()
            .ok_or_else(|| AppError::validation("scenarios.vpn: no protocol selected"))?;

        Ok(Self {
            config,
            protocol,
            latency_ms: 0,
            packets: 0,
        })
    }
}

impl Scenario for VpnScenario {
    fn category(&self) -> Category {
        Category::Vpn
    }

    fn playbook(&self) -> &Playbook {
        &self.config.playbook
    }

    fn begin(&mut self, metrics: &mut dyn MetricSource) {
        self.latency_ms = metrics.latency_ms(20..80);
    }

    fn on_step(
        &mut self,
        _phase: usize,
        step: &Step<StepDetail>,
        _metrics: &mut dyn MetricSource,
    ) -> Option<String> {
        let config = &self.config;
        let protocol = &self.protocol;

        match step.id.as_str() {
            "original" => Some(format!(
                "{} -> {} in plaintext",
                config.device_ip, config.destination
            )),
            "encrypt" => Some(protocol.encryption.clone()),
            "encapsulate" => Some(format!(
                "outer header {} -> VPN server port {}",
                config.tunnel_ip, protocol.port
            )),
            "transit" => Some(format!("{} tunnel, {} ms", protocol.name, self.latency_ms)),
            "decrypt" => Some(format!("{} removed at VPN server", protocol.encryption)),
            "forward" => Some(format!("VPN server -> {}", config.destination)),
            _ => None,
        }
    }

    fn outcome(&mut self, _metrics: &mut dyn MetricSource) -> Outcome {
        self.packets += 1;

        Outcome::Vpn(TunnelReport {
            protocol: self.protocol.name.clone(),
            encryption: self.protocol.encryption.clone(),
            port: self.protocol.port.clone(),
            security: self.protocol.security.clone(),
            device_ip: self.config.device_ip.clone(),
            tunnel_ip: self.config.tunnel_ip.clone(),
            destination: self.config.destination.clone(),
            latency_ms: self.latency_ms,
            packets: self.packets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FixedMetrics;
    use crate::scenario::playbook;

    fn config(protocol: &str) -> VpnConfig {
        VpnConfig {
            protocol: protocol.to_string(),
            device_ip: "192.168.1.100".to_string(),
            tunnel_ip: "10.8.0.2".to_string(),
            destination: "example.com".to_string(),
            protocols: vec![
                VpnProtocol {
                    id: "wireguard".to_string(),
                    name: "WireGuard".to_string(),
                    port: "51820".to_string(),
                    encryption: "ChaCha20-Poly1305".to_string(),
                    security: "Very High".to_string(),
                    speed: "Fast".to_string(),
                },
                VpnProtocol {
                    id: "openvpn".to_string(),
                    name: "OpenVPN".to_string(),
                    port: "1194".to_string(),
                    encryption: "AES-256".to_string(),
                    security: "High".to_string(),
                    speed: "Moderate".to_string(),
                },
            ],
            playbook: playbook(&["original", "encrypt", "encapsulate", "transit"], 200),
        }
    }

    #[test]
    fn test_unknown_protocol_rejected() {
        let err = VpnScenario::new(config("pptp")).err().unwrap();
        assert!(err.to_string().contains("pptp"));
        assert!(err.to_string().contains("wireguard, openvpn"));
    }

    #[test]
    fn test_tunnel_report() {
        let mut vpn = VpnScenario::new(config("openvpn")).unwrap();
        let mut metrics = FixedMetrics::new(0.5, std::net::Ipv4Addr::LOCALHOST);

        vpn.begin(&mut metrics);
        let steps = vpn.playbook().phases[0].to_steps(1.0);
        assert_eq!(
            vpn.on_step(0, &steps[1], &mut metrics).as_deref(),
            Some("AES-256")
        );
        assert_eq!(
            vpn.on_step(0, &steps[3], &mut metrics).as_deref(),
            Some("OpenVPN tunnel, 50 ms")
        );

        let Outcome::Vpn(report) = vpn.outcome(&mut metrics) else {
            panic!("expected a tunnel report");
        };
        assert_eq!(report.port, "1194");
        assert_eq!(report.packets, 1);

        vpn.begin(&mut metrics);
        let Outcome::Vpn(report) = vpn.outcome(&mut metrics) else {
            panic!("expected a tunnel report");
        };
        assert_eq!(report.packets, 2);
    }
}
