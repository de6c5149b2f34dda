//! Per-host latency series.

/// Ordered, append-only sequence of latencies for one host.
///
/// The index of each value is its arrival order and doubles as the
/// "ping count" on the chart's x axis. Only the coordinator owns and
/// writes a `SeriesBuffer`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesBuffer {
    values: Vec<f64>,
}

impl SeriesBuffer {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a latency and return the index it was stored at.
    pub fn push(&mut self, latency_ms: f64) -> usize {
        self.values.push(latency_ms);
        self.values.len() - 1
    }

    /// All values in arrival order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Most recent value, if any.
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}
