//! A single latency measurement.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// One latency measurement tagged with its host and its position in that
/// host's series.
///
/// Samples are immutable once built: the fields are private and only
/// readable through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    host: Arc<str>,
    latency_ms: f64,
    seq: u64,
    observed_at: Instant,
}

impl Sample {
    /// Build a sample, stamping it with the current instant.
    ///
    /// Returns `None` for negative or non-finite latencies.
    pub fn new(host: Arc<str>, latency_ms: f64, seq: u64) -> Option<Self> {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return None;
        }
        Some(Self {
            host,
            latency_ms,
            seq,
            observed_at: Instant::now(),
        })
    }

    /// Host the reply came from, as given on the command line.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Round-trip time in milliseconds.
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    /// Per-host sequence number, strictly increasing in production order.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// When the probe parsed the reply.
    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} {:.1} ms", self.host, self.seq, self.latency_ms)
    }
}
