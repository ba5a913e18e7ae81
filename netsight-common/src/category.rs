use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// The networking concepts NetSight can walk through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Dns,
    #[serde(alias = "lb", alias = "load-balancer")]
    LoadBalancer,
    Tcp,
    Http,
    Cdn,
    Vpn,
}

impl Category {
    /// All categories, in menu order.
    pub const ALL: [Category; 6] = [
        Category::Dns,
        Category::LoadBalancer,
        Category::Tcp,
        Category::Http,
        Category::Cdn,
        Category::Vpn,
    ];

    /// Get the identifier used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dns => "dns",
            Category::LoadBalancer => "loadbalancer",
            Category::Tcp => "tcp",
            Category::Http => "http",
            Category::Cdn => "cdn",
            Category::Vpn => "vpn",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Dns => "DNS Resolution",
            Category::LoadBalancer => "Load Balancer",
            Category::Tcp => "TCP Connection",
            Category::Http => "HTTP Request",
            Category::Cdn => "CDN Network",
            Category::Vpn => "VPN Tunnel",
        }
    }

    /// One-line summary shown in listings.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Dns => "How the Domain Name System translates names to IP addresses",
            Category::LoadBalancer => "How load balancers distribute traffic across servers",
            Category::Tcp => "The TCP handshake and connection teardown",
            Category::Http => "How an HTTP request and response travel end to end",
            Category::Cdn => "How Content Delivery Networks serve from the edge",
            Category::Vpn => "How a VPN wraps traffic in an encrypted tunnel",
        }
    }

    /// Default wall-clock budget before playback is stopped.
    pub fn default_budget(&self) -> Duration {
        match self {
            Category::Dns => Duration::from_secs(8),
            Category::LoadBalancer => Duration::from_secs(10),
            Category::Http => Duration::from_secs(12),
            Category::Tcp | Category::Cdn | Category::Vpn => Duration::from_secs(60),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dns" => Ok(Category::Dns),
            "loadbalancer" | "load-balancer" | "lb" => Ok(Category::LoadBalancer),
            "tcp" => Ok(Category::Tcp),
            "http" => Ok(Category::Http),
            "cdn" => Ok(Category::Cdn),
            "vpn" => Ok(Category::Vpn),
            _ => Err(Error::UnknownCategory(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_category_aliases() {
        assert_eq!("LB".parse::<Category>().unwrap(), Category::LoadBalancer);
        assert_eq!(
            "load-balancer".parse::<Category>().unwrap(),
            Category::LoadBalancer
        );
        assert!(matches!(
            "smtp".parse::<Category>(),
            Err(Error::UnknownCategory(name)) if name == "smtp"
        ));
    }

    #[test]
    fn test_default_budgets() {
        assert_eq!(Category::Dns.default_budget(), Duration::from_secs(8));
        assert_eq!(Category::Http.default_budget(), Duration::from_secs(12));
        assert_eq!(Category::Vpn.default_budget(), Duration::from_secs(60));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Category::LoadBalancer).unwrap();
        assert_eq!(json, "\"loadbalancer\"");
        let parsed: Category = serde_json::from_str("\"vpn\"").unwrap();
        assert_eq!(parsed, Category::Vpn);
    }
}
