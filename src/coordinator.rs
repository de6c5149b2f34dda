//! The render loop: sole owner of series buffers and display sinks.
//!
//! The coordinator registers hosts, spawns one [`Probe`] task per host on a
//! tokio runtime, and then runs a fixed-cadence loop on the calling thread:
//!
//! ```text
//! every tick:
//!   for host in registration order:
//!     SampleChannel::try_pop_all() ──▶ SeriesBuffer::push() ──▶ DisplaySink::update()
//!     status side channel ──▶ stall / schedule restart
//!   DisplaySink::flush() for every host
//!   Frontend::pump()        (draw one frame, read input, never blocks)
//!   sleep until next tick
//! ```
//!
//! The loop only ever reads from channels. It never blocks on I/O and never
//! calls into a probe, so a slow or crash-looping host cannot freeze the
//! display.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::data::duration::format_duration;
use crate::data::SeriesBuffer;
use crate::probe::{
    ChannelPolicy, FailureKind, LatencyParser, PingLauncher, Probe, ProbeFailure, ProbeSettings,
    ProbeStatus, SampleChannel,
};
use crate::sink::{ChartConfig, DisplaySink};

/// What the frontend wants after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    Continue,
    /// The user asked to stop; the coordinator shuts down and returns.
    Quit,
}

/// The display technology's own refresh mechanism.
pub trait Frontend<S> {
    /// Draw one frame from `sinks` and process pending input without blocking.
    fn pump(&mut self, sinks: &[S]) -> Result<Pump>;
}

/// What to do when a running probe's stream dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    /// Mark the host stalled.
    #[default]
    Never,
    /// Launch a fresh probe after the backoff.
    After(Duration),
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Interval between drains.
    pub tick: Duration,
    pub channel: ChannelPolicy,
    pub restart: RestartPolicy,
    /// Total time allowed for all probes to stop on shutdown.
    pub shutdown_timeout: Duration,
    pub probe: ProbeSettings,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            channel: ChannelPolicy::Unbounded,
            restart: RestartPolicy::Never,
            shutdown_timeout: Duration::from_secs(3),
            probe: ProbeSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Host name is empty")]
    EmptyHost,

    #[error("Cannot register {0} after probes have started")]
    AlreadyStarted(String),
}

/// Where a host stands from the coordinator's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum HostState {
    /// Registered, probe not started yet.
    Pending,
    Live,
    /// The probe failed and a new one is due at `at`.
    Restarting { reason: String, at: Instant },
    /// No further samples will arrive for this host.
    Stalled { reason: String },
    /// Shut down.
    Stopped,
}

impl HostState {
    pub fn is_stalled(&self) -> bool {
        matches!(self, HostState::Stalled { .. })
    }
}

/// Outcome of one [`Coordinator::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Samples appended across all hosts.
    pub samples: usize,
    /// Samples lost to a full channel since the previous tick.
    pub dropped: u64,
    /// Hosts that became stalled during this tick.
    pub stalled: Vec<usize>,
    /// Hosts whose probe was relaunched during this tick.
    pub restarted: Vec<usize>,
}

#[derive(Debug)]
struct HostSlot {
    host: Arc<str>,
    channel: Option<SampleChannel>,
    status: Option<watch::Receiver<ProbeStatus>>,
    task: Option<JoinHandle<()>>,
    series: SeriesBuffer,
    state: HostState,
    next_seq: u64,
    dropped: u64,
}

impl HostSlot {
    fn new(host: &str) -> Self {
        Self {
            host: Arc::from(host),
            channel: None,
            status: None,
            task: None,
            series: SeriesBuffer::new(),
            state: HostState::Pending,
            next_seq: 0,
            dropped: 0,
        }
    }
}

/// Single-threaded loop owning every [`SeriesBuffer`] and [`DisplaySink`].
///
/// The host mapping is fixed once [`Coordinator::start`] runs: host `i`,
/// its channel, its series and `sinks()[i]` always belong together.
pub struct Coordinator<S> {
    runtime: Handle,
    launcher: Arc<dyn PingLauncher>,
    parser: Arc<LatencyParser>,
    settings: CoordinatorSettings,
    cancel: watch::Sender<bool>,
    slots: Vec<HostSlot>,
    sinks: Vec<S>,
    started: bool,
    stopped: bool,
}

impl<S: DisplaySink> Coordinator<S> {
    /// Create a coordinator whose probes run on `runtime`.
    ///
    /// The coordinator itself must be driven from outside any async context:
    /// [`Coordinator::shutdown`] blocks on the runtime.
    pub fn new(
        settings: CoordinatorSettings,
        launcher: Arc<dyn PingLauncher>,
        parser: Arc<LatencyParser>,
        runtime: Handle,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            runtime,
            launcher,
            parser,
            settings,
            cancel,
            slots: Vec::new(),
            sinks: Vec::new(),
            started: false,
            stopped: false,
        }
    }

    /// Register a host with its sink and return the host's index.
    pub fn register(
        &mut self,
        host: &str,
        mut sink: S,
        config: &ChartConfig,
    ) -> Result<usize, CoordinatorError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(CoordinatorError::EmptyHost);
        }
        if self.started {
            return Err(CoordinatorError::AlreadyStarted(host.to_string()));
        }

        sink.configure(config);
        self.slots.push(HostSlot::new(host));
        self.sinks.push(sink);
        Ok(self.slots.len() - 1)
    }

    /// Spawn a probe for every registered host. Idempotent.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for index in 0..self.slots.len() {
            self.launch(index);
        }
        info!(hosts = self.slots.len(), tick = ?self.settings.tick, "Coordinator started");
    }

    /// Drain every channel once and push the results to the sinks.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let now = Instant::now();

        for index in 0..self.slots.len() {
            let (samples, dropped) = self.drain(index);
            report.samples += samples;
            report.dropped += dropped;

            if let Some(failure) = self.failure(index) {
                // Whatever the probe pushed before publishing its failure.
                let (samples, dropped) = self.drain(index);
                report.samples += samples;
                report.dropped += dropped;
                self.handle_failure(index, failure, now, &mut report);
            }

            if let HostState::Restarting { at, .. } = self.slots[index].state {
                if now >= at && !self.is_cancelled() {
                    info!(host = %self.slots[index].host, "Restarting probe");
                    self.launch(index);
                    self.sinks[index].set_stalled(None);
                    report.restarted.push(index);
                }
            }
        }

        for sink in &mut self.sinks {
            sink.flush();
        }
        report
    }

    /// Run the render loop until the frontend quits, then shut down.
    ///
    /// Control returns to the caller after the probes have stopped and a
    /// final frame has been pumped; the process is left running.
    pub fn run<F: Frontend<S>>(&mut self, frontend: &mut F) -> Result<()> {
        self.start();
        let result = self.render_loop(frontend);
        self.shutdown();
        let final_frame = frontend.pump(&self.sinks).map(|_| ());
        result.and(final_frame)
    }

    fn render_loop<F: Frontend<S>>(&mut self, frontend: &mut F) -> Result<()> {
        loop {
            let started = Instant::now();
            let report = self.tick();
            if report.dropped > 0 {
                tracing::debug!(dropped = report.dropped, "Consumer fell behind");
            }

            if frontend.pump(&self.sinks)? == Pump::Quit {
                return Ok(());
            }

            if let Some(rest) = self.settings.tick.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }

    /// Cancel every probe, wait (bounded) for them, and flush once more.
    ///
    /// Tasks still running when `shutdown_timeout` expires are aborted; their
    /// ping processes are killed when the task drops them. Idempotent.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.cancel.send_replace(true);

        let tasks: Vec<(Arc<str>, JoinHandle<()>)> = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.task.take().map(|task| (slot.host.clone(), task)))
            .collect();
        let timeout = self.settings.shutdown_timeout;

        self.runtime.block_on(async move {
            let deadline = tokio::time::Instant::now() + timeout;
            for (host, task) in tasks {
                let abort = task.abort_handle();
                match tokio::time::timeout_at(deadline, task).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(host = %host, error = %e, "Probe task ended abnormally"),
                    Err(_) => {
                        warn!(host = %host, timeout = ?timeout, "Probe did not stop in time, aborting");
                        abort.abort();
                    }
                }
            }
        });

        for index in 0..self.slots.len() {
            self.drain(index);
            let slot = &mut self.slots[index];
            if !slot.state.is_stalled() {
                slot.state = HostState::Stopped;
            }
        }
        for sink in &mut self.sinks {
            sink.flush();
        }
        info!("Coordinator stopped");
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Host identifiers in registration order.
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| &*slot.host)
    }

    pub fn series(&self, index: usize) -> Option<&SeriesBuffer> {
        self.slots.get(index).map(|slot| &slot.series)
    }

    pub fn host_state(&self, index: usize) -> Option<&HostState> {
        self.slots.get(index).map(|slot| &slot.state)
    }

    /// Samples lost to drop-oldest for this host so far.
    pub fn dropped(&self, index: usize) -> Option<u64> {
        self.slots.get(index).map(|slot| slot.dropped)
    }

    pub fn sinks(&self) -> &[S] {
        &self.sinks
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn launch(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        let (sender, channel) = SampleChannel::create(self.settings.channel);
        let (probe, status) = Probe::new(
            slot.host.clone(),
            sender,
            self.launcher.clone(),
            self.parser.clone(),
            self.settings.probe.clone(),
            slot.next_seq,
        );
        let task = self.runtime.spawn(probe.run(self.cancel.subscribe()));

        slot.channel = Some(channel);
        slot.status = Some(status);
        slot.task = Some(task);
        slot.state = HostState::Live;
    }

    /// Move everything queued for `index` into its series and sink.
    fn drain(&mut self, index: usize) -> (usize, u64) {
        let slot = &mut self.slots[index];
        let Some(channel) = slot.channel.as_mut() else {
            return (0, 0);
        };

        let dropped_before = channel.dropped();
        let samples = channel.try_pop_all();
        let dropped = channel.dropped() - dropped_before;
        slot.dropped += dropped;

        if let Some(oldest) = samples.first() {
            tracing::trace!(
                host = oldest.host(),
                count = samples.len(),
                lag_ms = oldest.observed_at().elapsed().as_millis() as u64,
                "Drained samples"
            );
        }

        let sink = &mut self.sinks[index];
        for sample in &samples {
            let at = slot.series.push(sample.latency_ms());
            slot.next_seq = sample.seq() + 1;
            sink.update(at, sample.latency_ms());
        }
        (samples.len(), dropped)
    }

    /// A failure of a live probe that has not been handled yet.
    fn failure(&self, index: usize) -> Option<ProbeFailure> {
        let slot = &self.slots[index];
        if slot.state != HostState::Live {
            return None;
        }

        let status = slot.status.as_ref()?.borrow().clone();
        match status {
            ProbeStatus::Failed(failure) => Some(failure),
            ProbeStatus::Starting | ProbeStatus::Running { .. }
                if slot.task.as_ref().is_some_and(JoinHandle::is_finished) =>
            {
                Some(ProbeFailure {
                    kind: FailureKind::Io,
                    message: "Probe task ended unexpectedly".to_string(),
                })
            }
            _ => None,
        }
    }

    fn handle_failure(
        &mut self,
        index: usize,
        failure: ProbeFailure,
        now: Instant,
        report: &mut TickReport,
    ) {
        let cancelled = self.is_cancelled();
        let slot = &mut self.slots[index];
        slot.task = None;

        match (failure.kind, self.settings.restart) {
            (FailureKind::Io, RestartPolicy::After(backoff)) if !cancelled => {
                info!(
                    host = %slot.host,
                    error = %failure.message,
                    backoff = ?backoff,
                    "Probe failed, scheduling restart"
                );
                self.sinks[index].set_stalled(Some(&format!(
                    "{} (retry in {})",
                    failure.message,
                    format_duration(backoff)
                )));
                slot.state = HostState::Restarting {
                    reason: failure.message,
                    at: now + backoff,
                };
            }
            _ => {
                warn!(host = %slot.host, error = %failure.message, "Host stalled");
                self.sinks[index].set_stalled(Some(&failure.message));
                slot.state = HostState::Stalled {
                    reason: failure.message,
                };
                report.stalled.push(index);
            }
        }
    }
}

impl<S> Drop for Coordinator<S> {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}
