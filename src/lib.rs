pub mod actors;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod engine;
pub mod executor;
pub mod monitors;
pub mod storage;
pub mod telegram;
pub mod util;
pub mod vault;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub i64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram chat identity an owner linked through the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsKind {
    Linux,
    Windows,
}

impl OsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsKind::Linux => "Linux",
            OsKind::Windows => "Windows",
        }
    }
}

impl fmt::Display for OsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Linux" | "linux" => Ok(OsKind::Linux),
            "Windows" | "windows" => Ok(OsKind::Windows),
            other => Err(format!("unknown os kind: {other}")),
        }
    }
}

/// Connection quality of a server as last seen by the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Unknown,
    Excellent,
    Good,
    Poor,
    Offline,
}

/// Upper bound (inclusive) of the Excellent band.
pub const EXCELLENT_MAX: Duration = Duration::from_millis(30);

/// Upper bound (inclusive) of the Good band.
pub const GOOD_MAX: Duration = Duration::from_millis(100);

impl ServerStatus {
    /// Classify a probe result.
    ///
    /// `None` means the host never answered. Round trips above the Good band
    /// are all Poor, so every non-negative latency maps to exactly one tier.
    pub fn from_round_trip(rtt: Option<Duration>) -> ServerStatus {
        match rtt {
            None => ServerStatus::Offline,
            Some(rtt) if rtt <= EXCELLENT_MAX => ServerStatus::Excellent,
            Some(rtt) if rtt <= GOOD_MAX => ServerStatus::Good,
            Some(_) => ServerStatus::Poor,
        }
    }

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Unknown => "unknown",
            ServerStatus::Excellent => "excellent",
            ServerStatus::Good => "good",
            ServerStatus::Poor => "poor",
            ServerStatus::Offline => "offline",
        }
    }

    /// Label shown to owners
    pub fn label(&self) -> &'static str {
        match self {
            ServerStatus::Unknown => "Unknown",
            ServerStatus::Excellent => "🌟Excellent",
            ServerStatus::Good => "✅Good",
            ServerStatus::Poor => "⚠️Poor",
            ServerStatus::Offline => "❌Offline",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(ServerStatus::Unknown),
            "excellent" => Ok(ServerStatus::Excellent),
            "good" => Ok(ServerStatus::Good),
            "poor" => Ok(ServerStatus::Poor),
            "offline" => Ok(ServerStatus::Offline),
            other => Err(format!("unknown server status: {other}")),
        }
    }
}

/// A monitored server as registered by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub address: String,
    pub os: OsKind,
    pub owner: OwnerId,
    pub username: String,

    /// Vault ciphertext of the login password. Never the clear secret.
    pub encrypted_secret: String,

    pub status: ServerStatus,
    pub created_at: DateTime<Utc>,
}

impl Server {
    pub fn summary(&self) -> ServerSummary {
        ServerSummary {
            id: self.id,
            name: self.name.clone(),
            address: self.address.clone(),
            os: self.os,
            owner: self.owner,
            status: self.status,
        }
    }
}

/// The subset of a server the prober needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub id: ServerId,
    pub name: String,
    pub address: String,
    pub os: OsKind,
    pub owner: OwnerId,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub chat_id: Option<ChatId>,
}

/// CPU load as reported by the remote OS.
///
/// Linux hosts report the 1-minute load average, Windows hosts the average
/// processor load percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CpuLoad {
    LoadAverage(f64),
    Percent(f64),
}

impl CpuLoad {
    pub fn value(&self) -> f64 {
        match self {
            CpuLoad::LoadAverage(v) | CpuLoad::Percent(v) => *v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CpuLoad::LoadAverage(_) => "load_average",
            CpuLoad::Percent(_) => "percent",
        }
    }

    pub fn from_parts(kind: &str, value: f64) -> Option<CpuLoad> {
        match kind {
            "load_average" => Some(CpuLoad::LoadAverage(value)),
            "percent" => Some(CpuLoad::Percent(value)),
            _ => None,
        }
    }
}

impl fmt::Display for CpuLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuLoad::LoadAverage(v) => write!(f, "{v}"),
            CpuLoad::Percent(v) => write!(f, "{v}%"),
        }
    }
}

/// Last known resource stats of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub free_memory_mb: u64,
    pub free_disk_gb: f64,
    pub cpu_load: CpuLoad,
}
