//! # pingscope
//!
//! Live round-trip latency charts for several hosts at once.
//!
//! Each host gets a continuously running system `ping`, read line by line
//! on its own tokio task. Latencies are extracted from the output and handed
//! to a single render loop that owns every chart. A slow, silent or dead ping
//! only ever affects its own chart.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  tokio runtime (one task per host)                               │
//! │  ┌─────────┐   ┌────────────┐   ┌───────────────┐                │
//! │  │  ping   │──▶│ LineStream │──▶│ LatencyParser │──▶ Probe ──┐   │
//! │  └─────────┘   └────────────┘   └───────────────┘            │   │
//! └──────────────────────────────────────────────────────────────┼───┘
//!                                         SampleChannel (per host)│
//! ┌──────────────────────────────────────────────────────────────▼───┐
//! │  main thread                                                     │
//! │  Coordinator::tick ──▶ SeriesBuffer ──▶ DisplaySink ──▶ Frontend  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`probe`]**: launching ping, parsing its output, per-host channels
//! - **[`data`]**: samples, series buffers, axis bounds, duration strings
//! - **[`sink`]**: the [`DisplaySink`] boundary and its chart/line implementations
//! - **[`coordinator`]**: the render loop and probe lifecycle
//! - **[`ui`]**, **[`app`]**, **[`events`]**, **[`terminal`]**: the ratatui frontend
//! - **[`config`]**: layered settings
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Chart two hosts
//! pingscope 8.8.8.8 "Cloudflare=1.1.1.1"
//!
//! # Plain text output, restarting dead pings after 5s
//! pingscope --plain --restart 5s example.com
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//! use pingscope::{ChartConfig, Coordinator, CoordinatorSettings, LatencyParser, LineSink, PlainFrontend, SystemPing};
//!
//! # fn main() -> anyhow::Result<()> {
//! let runtime = tokio::runtime::Runtime::new()?;
//! let mut coordinator = Coordinator::new(
//!     CoordinatorSettings::default(),
//!     Arc::new(SystemPing::for_platform()),
//!     Arc::new(LatencyParser::default()),
//!     runtime.handle().clone(),
//! );
//! coordinator.register("8.8.8.8", LineSink::stdout(), &ChartConfig::latency("dns"))?;
//!
//! let interrupted = Arc::new(std::sync::atomic::AtomicBool::new(false));
//! coordinator.run(&mut PlainFrontend::new(interrupted))?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod events;
pub mod probe;
pub mod sink;
pub mod terminal;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::{HostEntry, Overrides, Settings};
pub use coordinator::{
    Coordinator, CoordinatorError, CoordinatorSettings, Frontend, HostState, Pump, RestartPolicy,
    TickReport,
};
pub use data::{AxisBounds, Sample, SeriesBuffer};
pub use probe::{
    ChannelPolicy, LatencyParser, LineStream, PingLauncher, Probe, ProbeError, ProbeStatus,
    SampleChannel, SystemPing,
};
pub use sink::{ChartConfig, ChartSink, DisplaySink, LineSink, PlainFrontend};
pub use terminal::TerminalFrontend;
