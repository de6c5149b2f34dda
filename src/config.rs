//! Layered settings.
//!
//! Built-in defaults, then an optional TOML file, then `PINGSCOPE_*`
//! environment variables, then command-line overrides.
//!
//! ```toml
//! tick = "50ms"
//! y_max = 500
//! restart_backoff = "5s"
//! labels = ["time", "zeit"]
//!
//! [[hosts]]
//! host = "8.8.8.8"
//! title = "Google DNS"
//!
//! [[hosts]]
//! host = "1.1.1.1"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::coordinator::{CoordinatorSettings, RestartPolicy};
use crate::data::bounds::DEFAULT_BOUNDS;
use crate::data::duration::{deserialize_duration, deserialize_optional_duration};
use crate::probe::{ChannelPolicy, LatencyParser, ProbeSettings, SystemPing, DEFAULT_LABELS};
use crate::sink::ChartConfig;
use crate::ui::ThemeChoice;

/// Prefix for environment overrides, e.g. `PINGSCOPE_TICK=100ms`.
pub const ENV_PREFIX: &str = "PINGSCOPE";

/// One host to ping and the title of its chart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawHost")]
pub struct HostEntry {
    pub host: String,
    pub title: Option<String>,
}

/// Hosts may be written as `"title=host"` strings or as tables.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawHost {
    Spec(String),
    Table { host: String, title: Option<String> },
}

impl From<RawHost> for HostEntry {
    fn from(raw: RawHost) -> Self {
        match raw {
            RawHost::Spec(spec) => HostEntry::parse(&spec),
            RawHost::Table { host, title } => HostEntry {
                host: host.trim().to_string(),
                title: title.filter(|t| !t.trim().is_empty()),
            },
        }
    }
}

impl HostEntry {
    /// Parse `host` or `title=host`.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('=') {
            Some((title, host)) if !title.trim().is_empty() => HostEntry {
                host: host.trim().to_string(),
                title: Some(title.trim().to_string()),
            },
            Some((_, host)) => HostEntry {
                host: host.trim().to_string(),
                title: None,
            },
            None => HostEntry {
                host: spec.trim().to_string(),
                title: None,
            },
        }
    }

    /// Chart title: the configured one, or `Ping Results to <host>`.
    pub fn title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!("Ping Results to {}", self.host),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hosts: Vec<HostEntry>,

    /// Render loop interval.
    #[serde(deserialize_with = "deserialize_duration")]
    pub tick: Duration,

    pub y_min: f64,
    pub y_max: f64,

    /// Latency labels recognised in ping output.
    pub labels: Vec<String>,

    /// Per-host channel capacity; 0 keeps every sample.
    pub channel_capacity: usize,

    #[serde(deserialize_with = "deserialize_duration")]
    pub start_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub grace_period: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    /// Delay before relaunching a dead ping; absent means never.
    #[serde(deserialize_with = "deserialize_optional_duration")]
    pub restart_backoff: Option<Duration>,

    pub ping_program: Option<String>,
    /// Argument template; `{host}` is replaced by the host.
    pub ping_args: Option<Vec<String>>,

    pub log_file: Option<PathBuf>,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,

    pub theme: ThemeChoice,
}

impl Default for Settings {
    fn default() -> Self {
        let coordinator = CoordinatorSettings::default();
        Self {
            hosts: Vec::new(),
            tick: coordinator.tick,
            y_min: DEFAULT_BOUNDS.0,
            y_max: DEFAULT_BOUNDS.1,
            labels: DEFAULT_LABELS.iter().map(|l| l.to_string()).collect(),
            channel_capacity: 0,
            start_timeout: coordinator.probe.start_timeout,
            grace_period: coordinator.probe.grace_period,
            shutdown_timeout: coordinator.shutdown_timeout,
            restart_backoff: None,
            ping_program: None,
            ping_args: None,
            log_file: None,
            log_filter: "info".to_string(),
            theme: ThemeChoice::Auto,
        }
    }
}

/// Command-line values that win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces the configured hosts when non-empty.
    pub hosts: Vec<String>,
    pub tick: Option<Duration>,
    pub channel_capacity: Option<usize>,
    pub labels: Option<Vec<String>>,
    pub restart_backoff: Option<Duration>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Load defaults, the optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading environment overrides from `env`
    /// instead of the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("hosts")
                .with_list_parse_key("labels")
                .with_list_parse_key("ping_args")
                .source(env),
        );

        let config = builder.build().with_context(|| match path {
            Some(path) => format!("Failed to read config from {}", path.display()),
            None => "Failed to read environment settings".to_string(),
        })?;
        config
            .try_deserialize()
            .context("Invalid pingscope settings")
    }

    /// Apply command-line overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if !overrides.hosts.is_empty() {
            self.hosts = overrides.hosts.iter().map(|h| HostEntry::parse(h)).collect();
        }
        if let Some(tick) = overrides.tick {
            self.tick = tick;
        }
        if let Some(capacity) = overrides.channel_capacity {
            self.channel_capacity = capacity;
        }
        if let Some(labels) = overrides.labels {
            self.labels = labels;
        }
        if let Some(backoff) = overrides.restart_backoff {
            self.restart_backoff = Some(backoff);
        }
        if let Some(log_file) = overrides.log_file {
            self.log_file = Some(log_file);
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            bail!("No hosts to ping: pass them as arguments or list them under `hosts`");
        }
        if let Some(position) = self.hosts.iter().position(|h| h.host.is_empty()) {
            bail!("Host #{} is empty", position + 1);
        }
        if self.labels.iter().all(|l| l.trim().is_empty()) {
            bail!("At least one latency label is required");
        }
        if self.tick.is_zero() {
            bail!("tick must be greater than zero");
        }
        if !self.y_min.is_finite() || !self.y_max.is_finite() || self.y_min >= self.y_max {
            bail!(
                "y_min must be below y_max (got {} and {})",
                self.y_min,
                self.y_max
            );
        }
        Ok(())
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            tick: self.tick,
            channel: ChannelPolicy::from_capacity(self.channel_capacity),
            restart: match self.restart_backoff {
                Some(backoff) => RestartPolicy::After(backoff),
                None => RestartPolicy::Never,
            },
            shutdown_timeout: self.shutdown_timeout,
            probe: ProbeSettings {
                start_timeout: self.start_timeout,
                grace_period: self.grace_period,
            },
        }
    }

    /// The platform ping, with the configured program and arguments if any.
    pub fn launcher(&self) -> SystemPing {
        let platform = SystemPing::for_platform();
        let program = self
            .ping_program
            .clone()
            .unwrap_or_else(|| platform.program().to_string());
        match &self.ping_args {
            Some(args) => SystemPing::with_command(program, args.clone()),
            None if self.ping_program.is_some() => SystemPing::with_command(program, Vec::new()),
            None => platform,
        }
    }

    pub fn parser(&self) -> Result<LatencyParser> {
        let labels: Vec<&str> = self
            .labels
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        LatencyParser::new(&labels)
    }

    pub fn chart_config(&self, entry: &HostEntry) -> ChartConfig {
        ChartConfig::latency(entry.title()).with_y_bounds(self.y_min, self.y_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn no_env() -> Option<config::Map<String, String>> {
        Some(config::Map::new())
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_with_env(None, no_env()).unwrap();
        assert!(settings.hosts.is_empty());
        assert_eq!(settings.tick, Duration::from_millis(50));
        assert_eq!((settings.y_min, settings.y_max), (0.0, 1000.0));
        assert_eq!(settings.restart_backoff, None);
        assert_eq!(settings.channel_capacity, 0);
        assert!(settings.labels.iter().any(|l| l == "time"));
    }

    #[test]
    fn test_load_toml_file() {
        let file = write_config(
            r#"
tick = "100ms"
y_max = 500
restart_backoff = "5s"
labels = ["zeit"]
theme = "light"

[[hosts]]
host = "8.8.8.8"
title = "Google DNS"

[[hosts]]
host = "1.1.1.1"
"#,
        );
        let settings = Settings::load_with_env(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings.tick, Duration::from_millis(100));
        assert_eq!(settings.y_max, 500.0);
        assert_eq!(settings.restart_backoff, Some(Duration::from_secs(5)));
        assert_eq!(settings.labels, vec!["zeit"]);
        assert_eq!(settings.theme, ThemeChoice::Light);
        assert_eq!(settings.hosts.len(), 2);
        assert_eq!(settings.hosts[0].title(), "Google DNS");
        assert_eq!(settings.hosts[1].title(), "Ping Results to 1.1.1.1");
        settings.validate().unwrap();
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("tick = \"100ms\"\nhosts = [\"a.example\"]\n");
        let mut env = config::Map::new();
        env.insert("PINGSCOPE_TICK".to_string(), "20ms".to_string());
        env.insert("PINGSCOPE_CHANNEL_CAPACITY".to_string(), "64".to_string());
        env.insert("PINGSCOPE_HOSTS".to_string(), "dns=8.8.8.8,1.1.1.1".to_string());

        let settings = Settings::load_with_env(Some(file.path()), Some(env)).unwrap();
        assert_eq!(settings.tick, Duration::from_millis(20));
        assert_eq!(settings.channel_capacity, 64);
        assert_eq!(
            settings.hosts,
            vec![
                HostEntry {
                    host: "8.8.8.8".to_string(),
                    title: Some("dns".to_string())
                },
                HostEntry {
                    host: "1.1.1.1".to_string(),
                    title: None
                },
            ]
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Settings::load_with_env(Some(Path::new("/nonexistent/pingscope.toml")), no_env())
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pingscope.toml"));
    }

    #[test]
    fn test_bad_duration_is_an_error() {
        let file = write_config("tick = \"soon\"\n");
        assert!(Settings::load_with_env(Some(file.path()), no_env()).is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut settings = Settings {
            hosts: vec![HostEntry::parse("config.example")],
            ..Settings::default()
        };
        settings.apply(Overrides {
            hosts: vec!["local=127.0.0.1".to_string()],
            tick: Some(Duration::from_millis(10)),
            restart_backoff: Some(Duration::from_secs(1)),
            ..Overrides::default()
        });
        assert_eq!(settings.hosts, vec![HostEntry::parse("local=127.0.0.1")]);
        assert_eq!(settings.tick, Duration::from_millis(10));
        assert_eq!(
            settings.coordinator_settings().restart,
            RestartPolicy::After(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let valid = Settings {
            hosts: vec![HostEntry::parse("h")],
            ..Settings::default()
        };
        valid.validate().unwrap();

        assert!(Settings::default().validate().is_err());

        let mut inverted = valid.clone();
        inverted.y_min = 10.0;
        inverted.y_max = 5.0;
        assert!(inverted.validate().is_err());

        let mut no_labels = valid.clone();
        no_labels.labels = vec![" ".to_string()];
        assert!(no_labels.validate().is_err());

        let mut zero_tick = valid.clone();
        zero_tick.tick = Duration::ZERO;
        assert!(zero_tick.validate().is_err());

        let mut empty_host = valid;
        empty_host.hosts.push(HostEntry::parse("title="));
        assert!(empty_host.validate().is_err());
    }

    #[test]
    fn test_host_entry_parse() {
        assert_eq!(HostEntry::parse(" 8.8.8.8 ").host, "8.8.8.8");
        let entry = HostEntry::parse("Cloudflare = 1.1.1.1");
        assert_eq!(entry.host, "1.1.1.1");
        assert_eq!(entry.title(), "Cloudflare");
        assert_eq!(HostEntry::parse("=h").title, None);
    }

    #[test]
    fn test_custom_ping_command() {
        let settings = Settings {
            ping_program: Some("ping6".to_string()),
            ping_args: Some(vec!["-n".to_string(), "{host}".to_string()]),
            ..Settings::default()
        };
        let launcher = settings.launcher();
        assert_eq!(launcher.program(), "ping6");
        assert_eq!(launcher.args_for("::1"), vec!["-n", "::1"]);
    }
}
