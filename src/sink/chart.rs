//! Chart state for the terminal frontend.

use crate::data::AxisBounds;

use super::{ChartConfig, DisplaySink};

/// Holds everything needed to redraw one host's latency chart.
///
/// Updates are staged until [`DisplaySink::flush`], so a frame never shows
/// half of a tick's samples.
#[derive(Debug, Clone)]
pub struct ChartSink {
    title: String,
    x_label: String,
    y_label: String,
    bounds: AxisBounds,
    points: Vec<(f64, f64)>,
    pending: Vec<(f64, f64)>,
    stalled: Option<String>,
}

impl Default for ChartSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartSink {
    pub fn new() -> Self {
        let config = ChartConfig::latency("");
        Self {
            title: config.title,
            x_label: config.x_label,
            y_label: config.y_label,
            bounds: AxisBounds::new(config.y_bounds.0, config.y_bounds.1),
            points: Vec::new(),
            pending: Vec::new(),
            stalled: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn x_label(&self) -> &str {
        &self.x_label
    }

    pub fn y_label(&self) -> &str {
        &self.y_label
    }

    /// Committed points as `(ping count, latency)`.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Latest committed latency.
    pub fn latest(&self) -> Option<f64> {
        self.points.last().map(|&(_, y)| y)
    }

    /// Current vertical range after autoscaling.
    pub fn y_bounds(&self) -> (f64, f64) {
        self.bounds.current()
    }

    pub fn is_autoscaled(&self) -> bool {
        self.bounds.is_autoscaled()
    }

    /// Horizontal range covering every committed point.
    pub fn x_bounds(&self) -> (f64, f64) {
        let last = self.points.last().map(|&(x, _)| x).unwrap_or(0.0);
        (0.0, last.max(1.0))
    }

    pub fn stalled(&self) -> Option<&str> {
        self.stalled.as_deref()
    }
}

impl DisplaySink for ChartSink {
    fn configure(&mut self, config: &ChartConfig) {
        self.title = config.title.clone();
        self.x_label = config.x_label.clone();
        self.y_label = config.y_label.clone();
        self.bounds = AxisBounds::new(config.y_bounds.0, config.y_bounds.1);
        for &(_, y) in self.points.iter().chain(&self.pending) {
            self.bounds.observe(y);
        }
    }

    fn update(&mut self, index: usize, latency_ms: f64) {
        self.pending.push((index as f64, latency_ms));
    }

    fn set_stalled(&mut self, reason: Option<&str>) {
        self.stalled = reason.map(str::to_string);
    }

    fn flush(&mut self) {
        for &(_, y) in &self.pending {
            self.bounds.observe(y);
        }
        self.points.append(&mut self.pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_visible_after_flush() {
        let mut sink = ChartSink::new();
        sink.configure(&ChartConfig::latency("Google DNS"));
        sink.update(0, 10.0);
        sink.update(1, 15.0);
        assert!(sink.points().is_empty());

        sink.flush();
        assert_eq!(sink.points(), &[(0.0, 10.0), (1.0, 15.0)]);
        assert_eq!(sink.latest(), Some(15.0));
        assert_eq!(sink.title(), "Google DNS");
        assert_eq!(sink.x_bounds(), (0.0, 1.0));
    }

    #[test]
    fn test_autoscale_follows_flushed_points() {
        let mut sink = ChartSink::new();
        sink.configure(&ChartConfig::latency("h").with_y_bounds(0.0, 1000.0));
        sink.update(0, 1200.0);
        assert_eq!(sink.y_bounds(), (0.0, 1000.0));

        sink.flush();
        let (lower, upper) = sink.y_bounds();
        assert_eq!(lower, 0.0);
        assert!((upper - 1320.0).abs() < 1e-9);
        assert!(sink.is_autoscaled());
    }

    #[test]
    fn test_stalled_indicator() {
        let mut sink = ChartSink::new();
        assert_eq!(sink.stalled(), None);
        sink.set_stalled(Some("ping not found"));
        assert_eq!(sink.stalled(), Some("ping not found"));
        sink.set_stalled(None);
        assert_eq!(sink.stalled(), None);
    }
}
