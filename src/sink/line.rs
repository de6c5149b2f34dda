//! Plain text output for terminals that should not be taken over.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use super::{ChartConfig, DisplaySink};
use crate::coordinator::{Frontend, Pump};

/// Writes `title #index latency ms` for every sample, one line each.
#[derive(Debug)]
pub struct LineSink<W: Write> {
    title: String,
    writer: W,
    pending: Vec<String>,
    stalled: Option<String>,
}

impl LineSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            title: String::new(),
            writer,
            pending: Vec::new(),
            stalled: None,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn stalled(&self) -> Option<&str> {
        self.stalled.as_deref()
    }
}

impl<W: Write> DisplaySink for LineSink<W> {
    fn configure(&mut self, config: &ChartConfig) {
        self.title = config.title.clone();
    }

    fn update(&mut self, index: usize, latency_ms: f64) {
        self.pending
            .push(format!("{} #{} {:.1} ms", self.title, index, latency_ms));
    }

    fn set_stalled(&mut self, reason: Option<&str>) {
        if let Some(reason) = reason {
            if self.stalled.as_deref() != Some(reason) {
                self.pending.push(format!("{} stalled: {}", self.title, reason));
            }
        }
        self.stalled = reason.map(str::to_string);
    }

    fn flush(&mut self) {
        for line in self.pending.drain(..) {
            if let Err(e) = writeln!(self.writer, "{}", line) {
                tracing::warn!(error = %e, "Failed to write sample line");
                break;
            }
        }
        if let Err(e) = self.writer.flush() {
            tracing::warn!(error = %e, "Failed to flush sample output");
        }
    }
}

/// Frontend for [`LineSink`] output: nothing to draw, quits on interrupt.
#[derive(Debug, Clone)]
pub struct PlainFrontend {
    interrupted: Arc<AtomicBool>,
}

impl PlainFrontend {
    /// `interrupted` is set from outside, typically by a Ctrl-C handler.
    pub fn new(interrupted: Arc<AtomicBool>) -> Self {
        Self { interrupted }
    }
}

impl<S> Frontend<S> for PlainFrontend {
    fn pump(&mut self, _sinks: &[S]) -> Result<Pump> {
        if self.interrupted.load(Ordering::SeqCst) {
            Ok(Pump::Quit)
        } else {
            Ok(Pump::Continue)
        }
    }
}
