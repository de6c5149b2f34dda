//! End-to-end: launcher output through probes and the coordinator into sinks.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use pingscope::{
    ChannelPolicy, ChartConfig, Coordinator, CoordinatorSettings, DisplaySink, Frontend,
    HostState, LatencyParser, LineStream, PingLauncher, ProbeError, Pump,
};
use tokio::io::AsyncWriteExt;

/// What a fake host does when pinged.
#[derive(Debug, Clone)]
enum Script {
    /// Print these lines, then end the stream.
    Lines(Vec<&'static str>),
    /// Print `time=<n>` forever, every `interval`.
    Forever(Duration),
    /// The ping program cannot be started.
    Missing,
}

#[derive(Debug, Default)]
struct FakeLauncher {
    scripts: HashMap<String, Script>,
}

impl FakeLauncher {
    fn with(mut self, host: &str, script: Script) -> Self {
        self.scripts.insert(host.to_string(), script);
        self
    }
}

impl PingLauncher for FakeLauncher {
    fn start_continuous_ping(&self, host: &str) -> Result<LineStream, ProbeError> {
        match self.scripts.get(host).cloned().unwrap_or(Script::Missing) {
            Script::Lines(lines) => {
                let text = lines.join("\n");
                Ok(LineStream::from_reader(Cursor::new(text.into_bytes())))
            }
            Script::Forever(interval) => {
                let (reader, mut writer) = tokio::io::duplex(1024);
                tokio::spawn(async move {
                    let mut n: u64 = 1;
                    loop {
                        let line = format!("reply: time={} ms\n", n);
                        if writer.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                        n += 1;
                        tokio::time::sleep(interval).await;
                    }
                });
                Ok(LineStream::from_reader(reader))
            }
            Script::Missing => Err(ProbeError::Spawn {
                host: host.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "ping not found"),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct RecordingSink {
    config: Option<ChartConfig>,
    updates: Vec<(usize, f64)>,
    stalled: Option<String>,
    flushes: usize,
}

impl DisplaySink for RecordingSink {
    fn configure(&mut self, config: &ChartConfig) {
        self.config = Some(config.clone());
    }

    fn update(&mut self, index: usize, latency_ms: f64) {
        self.updates.push((index, latency_ms));
    }

    fn set_stalled(&mut self, reason: Option<&str>) {
        self.stalled = reason.map(str::to_string);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}

fn coordinator(
    runtime: &tokio::runtime::Runtime,
    launcher: FakeLauncher,
    settings: CoordinatorSettings,
) -> Coordinator<RecordingSink> {
    Coordinator::new(
        settings,
        Arc::new(launcher),
        Arc::new(LatencyParser::default()),
        runtime.handle().clone(),
    )
}

fn tick_until(
    coordinator: &mut Coordinator<RecordingSink>,
    mut done: impl FnMut(&Coordinator<RecordingSink>) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(coordinator) {
        assert!(Instant::now() < deadline, "condition not reached in time");
        coordinator.tick();
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_ping_output_becomes_exactly_three_points() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let launcher = FakeLauncher::default().with(
        "8.8.8.8",
        Script::Lines(vec![
            "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.",
            "time=10ms",
            "time=15ms",
            "request timed out",
            "time=12ms",
        ]),
    );
    let mut coordinator = coordinator(&runtime, launcher, CoordinatorSettings::default());
    let config = ChartConfig::latency("Ping Results to 8.8.8.8");
    coordinator
        .register("8.8.8.8", RecordingSink::default(), &config)
        .unwrap();
    coordinator.start();

    tick_until(&mut coordinator, |c| c.host_state(0).unwrap().is_stalled());

    assert_eq!(coordinator.series(0).unwrap().values(), &[10.0, 15.0, 12.0]);
    let sink = &coordinator.sinks()[0];
    assert_eq!(sink.updates, vec![(0, 10.0), (1, 15.0), (2, 12.0)]);
    assert_eq!(sink.config.as_ref(), Some(&config));
    assert!(sink.flushes > 0);

    coordinator.shutdown();
}

#[test]
fn test_failed_host_does_not_affect_others() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let launcher =
        FakeLauncher::default().with("good", Script::Forever(Duration::from_millis(5)));
    let mut coordinator = coordinator(&runtime, launcher, CoordinatorSettings::default());
    coordinator
        .register("good", RecordingSink::default(), &ChartConfig::latency("good"))
        .unwrap();
    coordinator
        .register("bad", RecordingSink::default(), &ChartConfig::latency("bad"))
        .unwrap();
    coordinator.start();

    tick_until(&mut coordinator, |c| {
        c.host_state(1).unwrap().is_stalled() && c.series(0).unwrap().len() >= 5
    });

    // The good host keeps growing after the bad one stalled
    let before = coordinator.series(0).unwrap().len();
    tick_until(&mut coordinator, |c| c.series(0).unwrap().len() > before + 3);

    assert_eq!(coordinator.host_state(0), Some(&HostState::Live));
    assert!(coordinator.series(1).unwrap().is_empty());
    assert!(coordinator.sinks()[0].stalled.is_none());
    let reason = coordinator.sinks()[1].stalled.as_deref().unwrap();
    assert!(reason.contains("ping not found"), "reason: {reason}");

    let good = coordinator.series(0).unwrap().values();
    assert_eq!(&good[..3], &[1.0, 2.0, 3.0]);

    coordinator.shutdown();
    assert_eq!(coordinator.host_state(0), Some(&HostState::Stopped));
    assert!(coordinator.host_state(1).unwrap().is_stalled());
}

#[test]
fn test_slow_consumer_drops_oldest_samples() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let lines: Vec<&'static str> = vec!["time=1", "time=2", "time=3", "time=4", "time=5", "time=6"];
    let launcher = FakeLauncher::default().with("h", Script::Lines(lines));
    let settings = CoordinatorSettings {
        channel: ChannelPolicy::DropOldest { capacity: 4 },
        ..CoordinatorSettings::default()
    };
    let mut coordinator = coordinator(&runtime, launcher, settings);
    coordinator
        .register("h", RecordingSink::default(), &ChartConfig::latency("h"))
        .unwrap();
    coordinator.start();

    // Let the probe run to completion before the first drain
    thread::sleep(Duration::from_millis(300));
    tick_until(&mut coordinator, |c| c.host_state(0).unwrap().is_stalled());

    assert_eq!(coordinator.series(0).unwrap().values(), &[3.0, 4.0, 5.0, 6.0]);
    assert_eq!(coordinator.dropped(0), Some(2));
    // Indices stay contiguous in the series even though samples were lost
    let indices: Vec<usize> = coordinator.sinks()[0].updates.iter().map(|u| u.0).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);

    coordinator.shutdown();
}

/// Quits once every sink has seen `target` updates.
struct QuitAfter {
    target: usize,
    frames: usize,
}

impl Frontend<RecordingSink> for QuitAfter {
    fn pump(&mut self, sinks: &[RecordingSink]) -> Result<Pump> {
        self.frames += 1;
        if sinks.iter().all(|s| s.updates.len() >= self.target) {
            Ok(Pump::Quit)
        } else {
            Ok(Pump::Continue)
        }
    }
}

#[test]
fn test_run_returns_after_quit() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let launcher = FakeLauncher::default()
        .with("a", Script::Forever(Duration::from_millis(5)))
        .with("b", Script::Forever(Duration::from_millis(7)));
    let settings = CoordinatorSettings {
        tick: Duration::from_millis(10),
        ..CoordinatorSettings::default()
    };
    let mut coordinator = coordinator(&runtime, launcher, settings);
    coordinator
        .register("a", RecordingSink::default(), &ChartConfig::latency("a"))
        .unwrap();
    coordinator
        .register("b", RecordingSink::default(), &ChartConfig::latency("b"))
        .unwrap();

    let mut frontend = QuitAfter {
        target: 3,
        frames: 0,
    };
    let started = Instant::now();
    coordinator.run(&mut frontend).unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(frontend.frames >= 2, "final frame is pumped after shutdown");
    for index in 0..2 {
        assert_eq!(coordinator.host_state(index), Some(&HostState::Stopped));
        assert!(coordinator.series(index).unwrap().len() >= 3);
    }
}

#[cfg(unix)]
#[test]
fn test_run_stops_real_subprocesses() {
    use pingscope::SystemPing;

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let launcher = SystemPing::with_command(
        "sh",
        vec![
            "-c".to_string(),
            "while true; do echo '64 bytes from {host}: icmp_seq=1 ttl=64 time=0.042 ms'; sleep 0.02; done"
                .to_string(),
        ],
    );
    let mut coordinator: Coordinator<RecordingSink> = Coordinator::new(
        CoordinatorSettings::default(),
        Arc::new(launcher),
        Arc::new(LatencyParser::default()),
        runtime.handle().clone(),
    );
    coordinator
        .register("localhost", RecordingSink::default(), &ChartConfig::latency("lo"))
        .unwrap();

    let mut frontend = QuitAfter {
        target: 2,
        frames: 0,
    };
    let started = Instant::now();
    coordinator.run(&mut frontend).unwrap();

    // Cancellation reached the probe well before the shutdown deadline
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(coordinator.host_state(0), Some(&HostState::Stopped));
    assert!(coordinator.sinks()[0].updates.iter().all(|&(_, ms)| ms == 0.042));
}
