use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-process storage. Only correct with a single engine process.
    #[serde(rename = "none")]
    None,

    /// SQLite database shared by every engine process on the host
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./montool.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub prober: ProberConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Every interval and timeout must be non-zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        let durations = [
            ("poller.interval_secs", self.poller.interval_secs),
            ("poller.cache_ttl_secs", self.poller.cache_ttl_secs),
            ("prober.interval_secs", self.prober.interval_secs),
            ("prober.timeout_ms", self.prober.timeout_ms),
            ("executor.connect_timeout_secs", self.executor.connect_timeout_secs),
            ("telegram.timeout_ms", self.telegram.timeout_ms),
        ];

        for (name, value) in durations {
            if value == 0 {
                bail!("{name} must be greater than zero");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            poller: PollerConfig::default(),
            prober: ProberConfig::default(),
            executor: ExecutorConfig::default(),
            telegram: TelegramConfig::default(),
            api: ApiSettings::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PollerConfig {
    /// Pause between two collections for the same server
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Lifetime of a cached stats record
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}

fn default_cache_ttl() -> u64 {
    3600
}

/// When the prober alerts about an unreachable server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Alert on every sweep the server stays offline
    #[default]
    EveryCycle,

    /// Alert only when a server goes offline from any other status
    OnTransition,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProberConfig {
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,

    /// A probe without an answer within this window counts as no reply
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,

    /// TCP port the reachability probe knocks on
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default)]
    pub alert_policy: AlertPolicy,
}

impl ProberConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_probe_interval(),
            timeout_ms: default_probe_timeout(),
            port: default_ssh_port(),
            alert_policy: AlertPolicy::default(),
        }
    }
}

fn default_probe_interval() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_ssh_port() -> u16 {
    22
}

/// How the executor treats remote host keys
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Trust-on-first-use: any host key is accepted. This is a trust boundary,
    /// anyone able to intercept the connection receives the login password.
    #[default]
    AcceptAny,

    /// Only hosts present in an OpenSSH known_hosts file are accepted
    KnownHosts { path: PathBuf },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Bound on TCP connect, handshake and every blocking session call
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
}

impl ExecutorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            ssh_port: default_ssh_port(),
            connect_timeout_secs: default_connect_timeout(),
            host_key_policy: HostKeyPolicy::default(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_api")]
    pub api_base: String,

    /// Bound on one `sendMessage` request
    #[serde(default = "default_telegram_timeout")]
    pub timeout_ms: u64,
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api(),
            timeout_ms: default_telegram_timeout(),
        }
    }
}

fn default_telegram_timeout() -> u64 {
    10_000
}

fn default_telegram_api() -> String {
    String::from("https://api.telegram.org")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    #[serde(default)]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            enable_cors: false,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_log_level() -> String {
    String::from("info")
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration file {path}"))?;
    parse_config(&file_content)
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    let config: Config = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
