//! Recursive DNS resolution.

use serde::{Deserialize, Serialize};

use netsight_common::Category;
use netsight_sequencer::Step;

use super::{Outcome, Playbook, Scenario, StepDetail};
use crate::metrics::MetricSource;

/// Hops with an index below this may be answered from a local cache.
const CACHEABLE_HOPS: usize = 3;

/// Record type being resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    #[default]
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::A => "A",
            QueryType::Aaaa => "AAAA",
            QueryType::Cname => "CNAME",
            QueryType::Mx => "MX",
            QueryType::Txt => "TXT",
            QueryType::Ns => "NS",
        }
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// DNS scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsConfig {
    pub domain: String,
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(flatten)]
    pub playbook: Playbook,
}

/// Answer record returned by the authoritative server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: QueryType,
    pub value: String,
    pub ttl: u32,
    pub class: &'static str,
    pub info: &'static str,
}

impl DnsRecord {
    /// The canned answer for a query type.
    pub fn answer(query_type: QueryType, domain: &str) -> Self {
        let (value, ttl, info) = match query_type {
            QueryType::A => ("192.168.1.100".to_string(), 3600, "IPv4 Address"),
            QueryType::Aaaa => (
                "2001:0db8:85a3:0000:0000:8a2e:0370:7334".to_string(),
                3600,
                "IPv6 Address",
            ),
            QueryType::Mx => (format!("10 mail.{domain}"), 7200, "Mail Exchange"),
            QueryType::Cname => (format!("alias.{domain}"), 3600, "Canonical Name"),
            QueryType::Txt => (
                "v=spf1 include:_spf.google.com ~all".to_string(),
                300,
                "Text Record",
            ),
            QueryType::Ns => (format!("ns1.{domain}"), 172_800, "Name Server"),
        };

        Self {
            record_type: query_type,
            value,
            ttl,
            class: "IN",
            info,
        }
    }
}

/// One server visited during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub server: String,
    pub latency_ms: u64,
    pub cached: bool,
}

/// Result of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsResolution {
    pub domain: String,
    pub record: DnsRecord,
    pub total_ms: u64,
    pub packet_bytes: u64,
    pub hops: Vec<Hop>,
}

impl DnsResolution {
    pub fn cache_hits(&self) -> usize {
        self.hops.iter().filter(|hop| hop.cached).count()
    }
}

impl std::fmt::Display for DnsResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} (TTL {}s, {}) in {} ms over {} hops, {} cached",
            self.domain,
            self.record.class,
            self.record.record_type,
            self.record.value,
            self.record.ttl,
            self.record.info,
            self.total_ms,
            self.hops.len(),
            self.cache_hits()
        )
    }
}

pub struct DnsScenario {
    config: DnsConfig,
    hops: Vec<Hop>,
}

impl DnsScenario {
    pub fn new(config: DnsConfig) -> Self {
        Self {
            config,
            hops: Vec::new(),
        }
    }
}

impl Scenario for DnsScenario {
    fn category(&self) -> Category {
        Category::Dns
    }

    fn playbook(&self) -> &Playbook {
        &self.config.playbook
    }

    fn begin(&mut self, _metrics: &mut dyn MetricSource) {
        self.hops.clear();
    }

    fn on_step(
        &mut self,
        _phase: usize,
        step: &Step<StepDetail>,
        metrics: &mut dyn MetricSource,
    ) -> Option<String> {
        let latency_ms = metrics.latency_ms(10..60);
        let cached = self.hops.len() < CACHEABLE_HOPS && metrics.ratio() > 0.5;

        self.hops.push(Hop {
            server: step.label.clone(),
            latency_ms,
            cached,
        });

        Some(if cached {
            format!("{latency_ms} ms (cache hit)")
        } else {
            format!("{latency_ms} ms")
        })
    }

    fn outcome(&mut self, metrics: &mut dyn MetricSource) -> Outcome {
        let hops = std::mem::take(&mut self.hops);
        let total_ms = hops.iter().map(|hop| hop.latency_ms).sum();

        Outcome::Dns(DnsResolution {
            domain: self.config.domain.clone(),
            record: DnsRecord::answer(self.config.query_type, &self.config.domain),
            total_ms,
            packet_bytes: 512 + metrics.latency_ms(0..512),
            hops,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FixedMetrics;
    use crate::scenario::playbook;
    use std::net::Ipv4Addr;

    fn scenario(query_type: QueryType) -> DnsScenario {
        DnsScenario::new(DnsConfig {
            domain: "example.com".to_string(),
            query_type,
            playbook: playbook(&["browser", "os", "router", "isp", "root"], 100),
        })
    }

    fn play(scenario: &mut DnsScenario, metrics: &mut dyn MetricSource) -> DnsResolution {
        scenario.begin(metrics);
        for step in scenario.playbook().phases[0].to_steps(1.0) {
            scenario.on_step(0, &step, metrics);
        }
        match scenario.outcome(metrics) {
            Outcome::Dns(resolution) => resolution,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_record_table() {
        let a = DnsRecord::answer(QueryType::A, "example.com");
        assert_eq!(a.value, "192.168.1.100");
        assert_eq!(a.ttl, 3600);
        assert_eq!(a.class, "IN");

        let mx = DnsRecord::answer(QueryType::Mx, "example.org");
        assert_eq!(mx.value, "10 mail.example.org");
        assert_eq!(mx.ttl, 7200);

        assert_eq!(DnsRecord::answer(QueryType::Txt, "x").ttl, 300);
        assert_eq!(DnsRecord::answer(QueryType::Ns, "x").ttl, 172_800);
        assert_eq!(DnsRecord::answer(QueryType::Cname, "a.io").value, "alias.a.io");
        assert!(DnsRecord::answer(QueryType::Aaaa, "x").value.starts_with("2001:"));
    }

    #[test]
    fn test_query_type_serde() {
        let qt: QueryType = serde_json::from_str("\"AAAA\"").unwrap();
        assert_eq!(qt, QueryType::Aaaa);
        assert_eq!(serde_json::to_string(&QueryType::Cname).unwrap(), "\"CNAME\"");
    }

    #[test]
    fn test_only_early_hops_cached() {
        let mut metrics = FixedMetrics::new(0.9, Ipv4Addr::LOCALHOST);
        let resolution = play(&mut scenario(QueryType::A), &mut metrics);

        assert_eq!(resolution.hops.len(), 5);
        assert_eq!(resolution.cache_hits(), 3);
        assert!(resolution.hops[..3].iter().all(|hop| hop.cached));
        assert!(!resolution.hops[3].cached);
        // 10 + floor(50 * 0.9) per hop
        assert_eq!(resolution.total_ms, 5 * 55);
    }

    #[test]
    fn test_low_roll_never_cached() {
        let mut metrics = FixedMetrics::new(0.2, Ipv4Addr::LOCALHOST);
        let resolution = play(&mut scenario(QueryType::Mx), &mut metrics);

        assert_eq!(resolution.cache_hits(), 0);
        assert_eq!(resolution.record.record_type, QueryType::Mx);
        assert_eq!(resolution.total_ms, 5 * 20);
        assert!(resolution.to_string().contains("MX 10 mail.example.com"));
    }

    #[test]
    fn test_begin_resets_hops() {
        let mut metrics = FixedMetrics::default();
        let mut dns = scenario(QueryType::A);

        play(&mut dns, &mut metrics);
        let second = play(&mut dns, &mut metrics);
        assert_eq!(second.hops.len(), 5);
    }
}
