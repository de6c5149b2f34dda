//! Vertical axis bounds with a deterministic autoscale rule.
//!
//! The axis starts at the configured `[lower, upper]` range. Once the largest
//! observed value exceeds `upper`, the range becomes
//! `[lower, max_observed * AUTOSCALE_HEADROOM]`. Observed maxima only grow, so
//! the bounds never shrink back.

/// Headroom factor applied to the observed maximum once it leaves the
/// configured range.
pub const AUTOSCALE_HEADROOM: f64 = 1.1;

/// Default vertical range in milliseconds.
pub const DEFAULT_BOUNDS: (f64, f64) = (0.0, 1000.0);

#[derive(Debug, Clone, PartialEq)]
pub struct AxisBounds {
    lower: f64,
    upper: f64,
    observed_max: Option<f64>,
}

impl Default for AxisBounds {
    fn default() -> Self {
        Self::new(DEFAULT_BOUNDS.0, DEFAULT_BOUNDS.1)
    }
}

impl AxisBounds {
    /// Create bounds with a static `[lower, upper]` range.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            observed_max: None,
        }
    }

    /// Record a value shown on this axis.
    pub fn observe(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.observed_max = Some(match self.observed_max {
            Some(max) => max.max(value),
            None => value,
        });
    }

    /// Largest value observed so far.
    pub fn observed_max(&self) -> Option<f64> {
        self.observed_max
    }

    /// Whether the autoscale rule has taken over from the static range.
    pub fn is_autoscaled(&self) -> bool {
        matches!(self.observed_max, Some(max) if max > self.upper)
    }

    /// Current `[lower, upper]` range.
    pub fn current(&self) -> (f64, f64) {
        match self.observed_max {
            Some(max) if max > self.upper => (self.lower, max * AUTOSCALE_HEADROOM),
            _ => (self.lower, self.upper),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_range_until_exceeded() {
        let mut bounds = AxisBounds::default();
        bounds.observe(15.0);
        bounds.observe(999.0);
        bounds.observe(1000.0);
        assert_eq!(bounds.current(), (0.0, 1000.0));
        assert!(!bounds.is_autoscaled());
    }

    #[test]
    fn test_autoscale_expands_by_headroom() {
        let mut bounds = AxisBounds::new(0.0, 1000.0);
        bounds.observe(1200.0);
        let (lower, upper) = bounds.current();
        assert_eq!(lower, 0.0);
        assert!((upper - 1320.0).abs() < 1e-9);
        assert!(bounds.is_autoscaled());
    }

    #[test]
    fn test_bounds_never_shrink() {
        let mut bounds = AxisBounds::new(0.0, 100.0);
        bounds.observe(200.0);
        bounds.observe(5.0);
        let (_, upper) = bounds.current();
        assert!((upper - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let mut bounds = AxisBounds::new(0.0, 100.0);
        bounds.observe(f64::INFINITY);
        bounds.observe(f64::NAN);
        assert_eq!(bounds.observed_max(), None);
        assert_eq!(bounds.current(), (0.0, 100.0));
    }
}
