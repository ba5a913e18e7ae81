//! Cosmetic metric generation.
//!
//! Latencies, loads and cache rolls only decorate the walkthroughs; nothing
//! depends on their distribution. They are drawn through [`MetricSource`] so
//! tests and reproducible demos can swap in fixed values.

use std::net::Ipv4Addr;
use std::ops::Range;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of pseudo-random display values.
pub trait MetricSource: Send {
    /// A value in `[0, 1)`.
    fn ratio(&mut self) -> f64;

    /// A latency in milliseconds within `range` (end exclusive).
    fn latency_ms(&mut self, range: Range<u64>) -> u64;

    /// An index in `0..len`. `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize;

    /// A client address for routing demos.
    fn client_ip(&mut self) -> Ipv4Addr;
}

/// Metric source backed by a small, fast RNG.
pub struct RandomMetrics {
    rng: SmallRng,
}

impl RandomMetrics {
    /// Create a source. A seed makes every playback identical.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl MetricSource for RandomMetrics {
    fn ratio(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn latency_ms(&mut self, range: Range<u64>) -> u64 {
        if range.is_empty() {
            return range.start;
        }
        self.rng.random_range(range)
    }

    fn pick(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        self.rng.random_range(0..len)
    }

    fn client_ip(&mut self) -> Ipv4Addr {
        Ipv4Addr::new(
            self.rng.random_range(0..255),
            self.rng.random_range(0..255),
            self.rng.random_range(0..255),
            self.rng.random_range(0..255),
        )
    }
}

/// Deterministic source: every draw is derived from one fixed ratio.
#[derive(Debug, Clone)]
pub struct FixedMetrics {
    ratio: f64,
    client_ip: Ipv4Addr,
}

impl FixedMetrics {
    /// `ratio` is clamped to `[0, 1)`.
    pub fn new(ratio: f64, client_ip: Ipv4Addr) -> Self {
        Self {
            ratio: ratio.clamp(0.0, 0.999_999),
            client_ip,
        }
    }
}

impl Default for FixedMetrics {
    fn default() -> Self {
        Self::new(0.5, Ipv4Addr::new(203, 0, 113, 7))
    }
}

impl MetricSource for FixedMetrics {
    fn ratio(&mut self) -> f64 {
        self.ratio
    }

    fn latency_ms(&mut self, range: Range<u64>) -> u64 {
        if range.is_empty() {
            return range.start;
        }
        let span = (range.end - range.start) as f64;
        range.start + (span * self.ratio) as u64
    }

    fn pick(&mut self, len: usize) -> usize {
        ((len as f64 * self.ratio) as usize).min(len.saturating_sub(1))
    }

    fn client_ip(&mut self) -> Ipv4Addr {
        self.client_ip
    }
}
