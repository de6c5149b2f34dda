//! Data models for latency samples and their per-host series.
//!
//! ## Submodules
//!
//! - [`sample`]: The immutable [`Sample`] a probe emits for every parsed reply
//! - [`series`]: The append-only [`SeriesBuffer`] the coordinator keeps per host
//! - [`bounds`]: The deterministic vertical autoscale rule ([`AxisBounds`])
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "50ms", "2s")
//!
//! ## Data Flow
//!
//! ```text
//! Probe ──▶ Sample ──▶ SampleChannel
//!                           │
//!                           ▼
//!              Coordinator::tick()
//!                           │
//!                           ├──▶ SeriesBuffer::push() (x = ping count)
//!                           │
//!                           └──▶ DisplaySink::update() ──▶ AxisBounds::observe()
//! ```

pub mod bounds;
pub mod duration;
pub mod sample;
pub mod series;

pub use bounds::AxisBounds;
pub use sample::Sample;
pub use series::SeriesBuffer;
