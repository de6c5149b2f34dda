//! Per-host latency probes.
//!
//! A [`Probe`] runs as its own tokio task. It launches a continuous ping
//! through a [`PingLauncher`], parses one latency per output line with a
//! [`LatencyParser`], and pushes each [`Sample`] onto its [`SampleChannel`].
//! Failures are reported once on a `watch` side channel as a
//! [`ProbeStatus`]; the probe never touches display state.
//!
//! ```text
//! PingLauncher ──▶ LineStream ──▶ LatencyParser ──▶ SampleSender ══▶ SampleChannel
//!                                                        │
//!                                   watch<ProbeStatus> ◀─┘ (start/io failures)
//! ```

mod channel;
mod error;
mod launcher;
mod parser;

pub use channel::{ChannelClosed, ChannelPolicy, SampleChannel, SampleSender};
pub use error::{FailureKind, ProbeError};
pub use launcher::{LineStream, PingLauncher, SystemPing, Termination, HOST_PLACEHOLDER};
pub use parser::{LatencyParser, DEFAULT_LABELS};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::data::Sample;

/// How long to wait for the ping process to report its exit status once
/// its output has ended.
const EXIT_STATUS_WAIT: Duration = Duration::from_millis(500);

/// Timing limits for a probe.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Maximum wait for the first output line before giving up.
    pub start_timeout: Duration,
    /// Time between SIGTERM and a forced kill on cancellation.
    pub grace_period: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(10),
            grace_period: Duration::from_secs(2),
        }
    }
}

/// A failure as seen by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ProbeError> for ProbeFailure {
    fn from(err: &ProbeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Lifecycle of one probe task, published on its status channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProbeStatus {
    #[default]
    Starting,
    /// The ping is running; `pid` is `None` for process-less streams.
    Running { pid: Option<u32> },
    /// The probe gave up and its task has ended (or is about to).
    Failed(ProbeFailure),
    /// The probe was cancelled and its process is gone.
    Stopped,
}

/// Continuously obtains latency samples for one host until cancelled.
#[derive(Debug)]
pub struct Probe {
    host: Arc<str>,
    sender: SampleSender,
    status: watch::Sender<ProbeStatus>,
    launcher: Arc<dyn PingLauncher>,
    parser: Arc<LatencyParser>,
    settings: ProbeSettings,
    next_seq: u64,
}

impl Probe {
    /// Create a probe.
    ///
    /// Returns the probe together with the receiving end of its status
    /// channel. `first_seq` is the sequence number of the first sample it
    /// will emit, so a restarted probe can continue where the last one ended.
    pub fn new(
        host: Arc<str>,
        sender: SampleSender,
        launcher: Arc<dyn PingLauncher>,
        parser: Arc<LatencyParser>,
        settings: ProbeSettings,
        first_seq: u64,
    ) -> (Self, watch::Receiver<ProbeStatus>) {
        let (status, status_rx) = watch::channel(ProbeStatus::Starting);
        let probe = Self {
            host,
            sender,
            status,
            launcher,
            parser,
            settings,
            next_seq: first_seq,
        };
        (probe, status_rx)
    }

    /// Spawn [`Probe::run`] on the current tokio runtime.
    pub fn spawn(self, cancel: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run until cancelled, the stream fails, or the consumer goes away.
    ///
    /// `cancel` flips to `true` (or its sender is dropped) to request
    /// shutdown; the ping process is terminated before this returns.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        if *cancel.borrow() {
            self.status.send_replace(ProbeStatus::Stopped);
            return;
        }

        if self.host.trim().is_empty() {
            self.fail(ProbeError::EmptyHost);
            return;
        }

        let mut stream = match self.launcher.start_continuous_ping(&self.host) {
            Ok(stream) => stream,
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        info!(host = %self.host, pid = ?stream.pid(), "Probe started");
        self.status.send_replace(ProbeStatus::Running { pid: stream.pid() });

        let start_deadline = tokio::time::sleep(self.settings.start_timeout);
        tokio::pin!(start_deadline);
        let mut seen_output = false;
        let mut produced: u64 = 0;

        loop {
            tokio::select! {
                // The watch guard must not outlive this arm; `stop` awaits.
                _ = async { cancel.wait_for(|cancelled| *cancelled).await.map(|_| ()) } => {
                    self.stop(&mut stream).await;
                    return;
                }
                () = &mut start_deadline, if !seen_output => {
                    self.terminate(&mut stream).await;
                    self.fail(ProbeError::StartTimeout {
                        host: self.host.to_string(),
                        waited: self.settings.start_timeout,
                    });
                    return;
                }
                line = stream.next_line() => match line {
                    Ok(Some(line)) => {
                        seen_output = true;
                        let Some(latency_ms) = self.parser.parse(&line) else {
                            trace!(host = %self.host, line = %line, "Skipping line without latency");
                            continue;
                        };
                        if !self.emit(latency_ms) {
                            debug!(host = %self.host, "Sample consumer gone, stopping probe");
                            self.stop(&mut stream).await;
                            return;
                        }
                        produced += 1;
                    }
                    Ok(None) => {
                        let exit = stream.wait_exit(EXIT_STATUS_WAIT).await;
                        self.terminate(&mut stream).await;
                        let host = self.host.to_string();
                        let status = exit
                            .map(|code| code.to_string())
                            .unwrap_or_else(|| "no exit status".to_string());
                        self.fail(match exit {
                            Some(code) if produced == 0 && !code.success() => {
                                ProbeError::EarlyExit { host, status }
                            }
                            _ => ProbeError::StreamEnded { host, status },
                        });
                        return;
                    }
                    Err(source) => {
                        self.terminate(&mut stream).await;
                        self.fail(ProbeError::Read {
                            host: self.host.to_string(),
                            source,
                        });
                        return;
                    }
                }
            }
        }
    }

    /// Push one sample; `false` once the consumer is gone.
    fn emit(&mut self, latency_ms: f64) -> bool {
        let Some(sample) = Sample::new(self.host.clone(), latency_ms, self.next_seq) else {
            return true;
        };
        self.next_seq += 1;
        self.sender.push(sample).is_ok()
    }

    async fn stop(&self, stream: &mut LineStream) {
        self.terminate(stream).await;
        info!(host = %self.host, "Probe stopped");
        self.status.send_replace(ProbeStatus::Stopped);
    }

    async fn terminate(&self, stream: &mut LineStream) {
        if stream.terminate(self.settings.grace_period).await == Termination::Forced {
            warn!(
                host = %self.host,
                grace = ?self.settings.grace_period,
                "Ping process ignored termination, killed"
            );
        }
    }

    fn fail(&self, err: ProbeError) {
        warn!(host = %self.host, error = %err, "Probe failed");
        self.status.send_replace(ProbeStatus::Failed(ProbeFailure::from(&err)));
    }
}
