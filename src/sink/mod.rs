//! Display sinks: where a host's latency series ends up.
//!
//! The coordinator is the only caller of a [`DisplaySink`]. Each host gets
//! its own sink, configured once at registration and then fed one point per
//! sample. Two implementations ship with the crate:
//!
//! - [`ChartSink`]: keeps what the terminal chart needs to redraw a series
//! - [`LineSink`]: writes one text line per sample (for `--plain` output)

mod chart;
mod line;

pub use chart::ChartSink;
pub use line::{LineSink, PlainFrontend};

use crate::data::bounds::DEFAULT_BOUNDS;

/// Static presentation settings for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Vertical range shown until the autoscale rule takes over.
    pub y_bounds: (f64, f64),
}

impl ChartConfig {
    /// Default labels for a latency chart with the given title.
    pub fn latency(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: "Ping Count".to_string(),
            y_label: "Latency (ms)".to_string(),
            y_bounds: DEFAULT_BOUNDS,
        }
    }

    pub fn with_y_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.y_bounds = (lower, upper);
        self
    }
}

/// Abstract rendering target for one host's series.
pub trait DisplaySink {
    /// Apply title, axis labels and the static vertical range.
    fn configure(&mut self, config: &ChartConfig);

    /// Extend the series with the point `(index, latency_ms)`.
    fn update(&mut self, index: usize, latency_ms: f64);

    /// Show (`Some(reason)`) or clear (`None`) the stalled indicator.
    fn set_stalled(&mut self, reason: Option<&str>);

    /// Commit pending updates so the next frame shows them.
    fn flush(&mut self);
}
