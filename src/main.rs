use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pingscope::data::duration::parse_duration;
use pingscope::ui::Theme;
use pingscope::{
    ChartSink, Coordinator, DisplaySink, LineSink, Overrides, PingLauncher, PlainFrontend,
    Settings, TerminalFrontend,
};

#[derive(Parser, Debug)]
#[command(name = "pingscope")]
#[command(about = "Live latency charts for several hosts, fed by the system ping")]
struct Args {
    /// Hosts to ping; `title=host` sets the chart title
    hosts: Vec<String>,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render interval (e.g. "50ms")
    #[arg(short, long, value_parser = parse_duration)]
    tick: Option<Duration>,

    /// Samples kept per host between frames; 0 keeps all
    #[arg(long)]
    capacity: Option<usize>,

    /// Latency labels to look for, comma separated (e.g. "time,zeit")
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,

    /// Relaunch a ping whose output ended after this delay (e.g. "5s")
    #[arg(short, long, value_parser = parse_duration)]
    restart: Option<Duration>,

    /// Print one line per sample instead of drawing charts
    #[arg(long)]
    plain: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            hosts: self.hosts.clone(),
            tick: self.tick,
            channel_capacity: self.capacity,
            labels: self.labels.clone(),
            restart_backoff: self.restart,
            log_file: self.log_file.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply(args.overrides());
    settings.validate()?;

    init_logging(&settings, args.plain)?;
    tracing::info!(hosts = settings.hosts.len(), plain = args.plain, "pingscope starting");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let launcher: Arc<dyn PingLauncher> = Arc::new(settings.launcher());
    let parser = Arc::new(settings.parser()?);
    let coordinator_settings = settings.coordinator_settings();
    let handle = runtime.handle().clone();

    let result = if args.plain {
        let mut coordinator = Coordinator::new(coordinator_settings, launcher, parser, handle);
        register_hosts(&mut coordinator, &settings, LineSink::stdout)
            .and_then(|()| run_plain(&mut coordinator))
    } else {
        let mut coordinator = Coordinator::new(coordinator_settings, launcher, parser, handle);
        register_hosts(&mut coordinator, &settings, ChartSink::new)
            .and_then(|()| run_tui(&mut coordinator, &settings))
    };

    runtime.shutdown_timeout(settings.shutdown_timeout);
    tracing::info!("pingscope exiting");
    result
}

fn register_hosts<S: DisplaySink>(
    coordinator: &mut Coordinator<S>,
    settings: &Settings,
    mut make_sink: impl FnMut() -> S,
) -> Result<()> {
    for entry in &settings.hosts {
        coordinator
            .register(&entry.host, make_sink(), &settings.chart_config(entry))
            .with_context(|| format!("Cannot chart {}", entry.host))?;
    }
    Ok(())
}

/// Run with the full-screen chart frontend
fn run_tui(coordinator: &mut Coordinator<ChartSink>, settings: &Settings) -> Result<()> {
    // Detect the background before raw mode takes over the terminal
    let theme = Theme::from_choice(settings.theme);
    let mut frontend = TerminalFrontend::enter(coordinator.len(), theme)?;
    let result = coordinator.run(&mut frontend);
    keep_first_error(result, frontend.restore())
}

/// The run's own error wins over a failed terminal restore, which is logged.
fn keep_first_error(result: Result<()>, restored: Result<()>) -> Result<()> {
    match (result, restored) {
        (Err(e), Err(restore)) => {
            tracing::warn!(error = %restore, "Failed to restore terminal");
            Err(e)
        }
        (result, restored) => result.and(restored),
    }
}

/// Run with line output; Ctrl-C stops
fn run_plain<W: std::io::Write>(coordinator: &mut Coordinator<LineSink<W>>) -> Result<()> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    coordinator.run(&mut PlainFrontend::new(interrupted))
}

/// Log to the configured file, or to stderr in plain mode.
///
/// The chart owns the terminal, so without a log file nothing is logged.
fn init_logging(settings: &Settings, plain: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .with_context(|| format!("Invalid log filter: {}", settings.log_filter))?;

    if let Some(path) = &settings.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else if plain {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
