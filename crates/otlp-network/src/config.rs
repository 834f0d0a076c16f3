//! Daemon configuration: YAML file, environment and command-line flags.
//!
//! Precedence, highest first: flag, `OTLP_NETWORK_*` environment variable,
//! config file, built-in default. Flags and environment variables are both
//! handled by clap, so the file is loaded first and [`Overrides`] applied on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use otlp_network_core::collector::{CollectorKind, CollectorOptions, DeviceOptions};

const APP_NAME: &str = "otlp-network";
const FILE_NAME: &str = "otlp-network.yaml";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Mount point of the proc filesystem. Default: /proc.
    #[serde(default = "default_proc_path")]
    pub proc_path: PathBuf,

    /// OTLP push export.
    #[serde(default)]
    pub otel: OtelConfig,

    /// Prometheus scrape endpoint.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Which collectors run. Uptime is always on.
    #[serde(default)]
    pub collectors: CollectorsConfig,
}

/// OTLP/HTTP push export. An empty endpoint disables pushing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub endpoint: String,

    /// Use plain HTTP when the endpoint has no scheme. Default: true.
    #[serde(default = "default_true")]
    pub insecure: bool,

    /// Export period. Default: 60s.
    #[serde(default = "default_otel_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Per-request timeout. Default: 10s.
    #[serde(default = "default_otel_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Prometheus scrape endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrometheusConfig {
    /// Listen host; empty listens on all interfaces.
    #[serde(default)]
    pub host: String,

    /// Listen port. Default: 9464.
    #[serde(default = "default_prometheus_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// How long in-flight scrapes and pushes may run after a shutdown signal. Default: 5s.
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CollectorsConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub wifi: Toggle,
    #[serde(default)]
    pub tcp: Toggle,
    #[serde(default)]
    pub udp: Toggle,
    #[serde(default)]
    pub conntrack: Toggle,
    #[serde(default)]
    pub softnet: Toggle,
    #[serde(default)]
    pub sockstat: Toggle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Toggle {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Skip interfaces whose name starts with `lo`.
    #[serde(default)]
    pub exclude_loopback: bool,
}

fn default_proc_path() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_true() -> bool {
    true
}

fn default_otel_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_otel_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_prometheus_port() -> u16 {
    9464
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proc_path: default_proc_path(),
            otel: OtelConfig::default(),
            prometheus: PrometheusConfig::default(),
            server: ServerConfig::default(),
            collectors: CollectorsConfig::default(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            insecure: true,
            interval: default_otel_interval(),
            timeout: default_otel_timeout(),
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_prometheus_port(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// Settings that can come from flags or `OTLP_NETWORK_*` variables.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Path to /proc filesystem.
    #[arg(long, env = "OTLP_NETWORK_PROC_PATH", value_name = "PATH")]
    pub proc_path: Option<PathBuf>,

    /// OTLP/HTTP collector endpoint (host:port or URL). Enables pushing.
    #[arg(long, env = "OTLP_NETWORK_OTEL_ENDPOINT", value_name = "ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// Use plain HTTP for endpoints without a scheme.
    #[arg(long, env = "OTLP_NETWORK_OTEL_INSECURE", action = clap::ArgAction::Set, value_name = "BOOL")]
    pub otel_insecure: Option<bool>,

    /// Push interval (e.g. "30s", "1m").
    #[arg(long, env = "OTLP_NETWORK_OTEL_INTERVAL", value_parser = parse_duration, value_name = "DURATION")]
    pub otel_interval: Option<Duration>,

    /// Push request timeout.
    #[arg(long, env = "OTLP_NETWORK_OTEL_TIMEOUT", value_parser = parse_duration, value_name = "DURATION")]
    pub otel_timeout: Option<Duration>,

    /// Host the scrape endpoint listens on.
    #[arg(long, env = "OTLP_NETWORK_PROMETHEUS_HOST", value_name = "HOST")]
    pub prometheus_host: Option<String>,

    /// Port the scrape endpoint listens on.
    #[arg(long, env = "OTLP_NETWORK_PROMETHEUS_PORT", value_name = "PORT")]
    pub prometheus_port: Option<u16>,

    /// Grace period for in-flight work on shutdown.
    #[arg(long, env = "OTLP_NETWORK_SHUTDOWN_GRACE", value_parser = parse_duration, value_name = "DURATION")]
    pub shutdown_grace: Option<Duration>,

    /// Enable collectors in addition to those enabled in the config file
    /// (comma-separated: tcp,udp,device,softnet,conntrack,wifi,sockstat).
    #[arg(
        long = "collector",
        env = "OTLP_NETWORK_COLLECTORS",
        value_delimiter = ',',
        value_name = "NAME"
    )]
    pub collectors: Vec<CollectorKind>,

    /// Skip loopback interfaces in the device collector.
    #[arg(long, env = "OTLP_NETWORK_EXCLUDE_LOOPBACK")]
    pub exclude_loopback: bool,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| format!("invalid duration '{s}': {e}"))
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        // An empty file is a valid, all-defaults configuration.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Loads `explicit` if given, otherwise the first file found in the
    /// standard locations, otherwise the defaults.
    ///
    /// Returns the path that was loaded, if any.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let candidates = candidate_paths(
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
            std::env::var("XDG_CONFIG_DIRS").ok(),
        );
        for path in candidates {
            if path.is_file() {
                return Ok((Self::load(&path)?, Some(path)));
            }
            debug!(path = %path.display(), "no config file");
        }
        Ok((Self::default(), None))
    }

    /// Applies flag and environment overrides on top of the file values.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.proc_path {
            self.proc_path = path.clone();
        }
        if let Some(endpoint) = &overrides.otel_endpoint {
            self.otel.endpoint = endpoint.clone();
        }
        if let Some(insecure) = overrides.otel_insecure {
            self.otel.insecure = insecure;
        }
        if let Some(interval) = overrides.otel_interval {
            self.otel.interval = interval;
        }
        if let Some(timeout) = overrides.otel_timeout {
            self.otel.timeout = timeout;
        }
        if let Some(host) = &overrides.prometheus_host {
            self.prometheus.host = host.clone();
        }
        if let Some(port) = overrides.prometheus_port {
            self.prometheus.port = port;
        }
        if let Some(grace) = overrides.shutdown_grace {
            self.server.shutdown_grace = grace;
        }
        for kind in &overrides.collectors {
            self.collectors.enable(*kind);
        }
        if overrides.exclude_loopback {
            self.collectors.device.exclude_loopback = true;
        }
    }

    /// Validates the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.proc_path.as_os_str().is_empty() {
            bail!("proc_path must not be empty");
        }
        if self.prometheus.port == 0 {
            bail!("prometheus.port must be non-zero");
        }
        if self.otel.interval.is_zero() {
            bail!("otel.interval must be positive");
        }
        if self.otel.timeout.is_zero() {
            bail!("otel.timeout must be positive");
        }
        if self.server.shutdown_grace.is_zero() {
            bail!("server.shutdown_grace must be positive");
        }
        Ok(())
    }

    /// Collectors to register, uptime first.
    pub fn enabled_collectors(&self) -> Vec<CollectorKind> {
        CollectorKind::ALL
            .into_iter()
            .filter(|kind| self.collectors.is_enabled(*kind))
            .collect()
    }

    pub fn collector_options(&self) -> CollectorOptions {
        CollectorOptions {
            device: DeviceOptions {
                exclude_loopback: self.collectors.device.exclude_loopback,
            },
        }
    }

    /// `host:port` for the scrape listener.
    pub fn listen_addr(&self) -> String {
        let host = match self.prometheus.host.as_str() {
            "" => "0.0.0.0",
            host => host,
        };
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.prometheus.port)
        } else {
            format!("{host}:{}", self.prometheus.port)
        }
    }
}

impl CollectorsConfig {
    pub fn is_enabled(&self, kind: CollectorKind) -> bool {
        match kind {
            CollectorKind::Uptime => true,
            CollectorKind::Tcp => self.tcp.enabled,
            CollectorKind::Udp => self.udp.enabled,
            CollectorKind::Device => self.device.enabled,
            CollectorKind::Softnet => self.softnet.enabled,
            CollectorKind::Conntrack => self.conntrack.enabled,
            CollectorKind::Wifi => self.wifi.enabled,
            CollectorKind::Sockstat => self.sockstat.enabled,
        }
    }

    pub fn enable(&mut self, kind: CollectorKind) {
        match kind {
            CollectorKind::Uptime => {}
            CollectorKind::Tcp => self.tcp.enabled = true,
            CollectorKind::Udp => self.udp.enabled = true,
            CollectorKind::Device => self.device.enabled = true,
            CollectorKind::Softnet => self.softnet.enabled = true,
            CollectorKind::Conntrack => self.conntrack.enabled = true,
            CollectorKind::Wifi => self.wifi.enabled = true,
            CollectorKind::Sockstat => self.sockstat.enabled = true,
        }
    }
}

/// Standard config file locations, most specific first.
fn candidate_paths(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    xdg_config_dirs: Option<String>,
) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    let config_home = xdg_config_home
        .filter(|p| p.is_absolute())
        .or_else(|| home.map(|h| h.join(".config")));
    if let Some(dir) = config_home {
        paths.push(dir.join(APP_NAME).join(FILE_NAME));
    }

    let config_dirs = xdg_config_dirs
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| "/etc/xdg".to_string());
    for dir in config_dirs.split(':').filter(|d| !d.is_empty()) {
        paths.push(Path::new(dir).join(APP_NAME).join(FILE_NAME));
    }

    paths.push(Path::new("/etc").join(APP_NAME).join(FILE_NAME));
    paths.push(PathBuf::from(FILE_NAME));
    paths
}
