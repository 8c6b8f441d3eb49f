//! API response types

use serde::Serialize;

use crate::storage::RegistryToken;
use crate::{OsKind, ServerId, ServerSummary, StatsRecord};

/// Placeholder shown for stats that are not cached
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub id: ServerId,
    pub name: String,
    pub address: String,
    pub os: OsKind,
    pub status: &'static str,
    pub status_label: &'static str,
}

impl From<ServerSummary> for ServerInfo {
    fn from(server: ServerSummary) -> Self {
        Self {
            id: server.id,
            name: server.name,
            address: server.address,
            os: server.os,
            status: server.status.as_str(),
            status_label: server.status.label(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServersResponse {
    pub servers: Vec<ServerInfo>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MonitoringResponse {
    pub server_id: ServerId,
    pub monitoring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<RegistryToken>,
}

/// A cached reading, or the `"unknown"` placeholder when nothing is cached.
#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading<T> {
    Known(T),
    Unknown(&'static str),
}

impl<T> Reading<T> {
    fn from_option(value: Option<T>) -> Self {
        value.map_or(Reading::Unknown(UNKNOWN), Reading::Known)
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub server_id: ServerId,
    pub status: &'static str,
    pub status_label: &'static str,
    pub free_memory_mb: Reading<u64>,
    pub free_disk_gb: Reading<f64>,
    pub cpu_load: Reading<String>,
    pub cpu_load_kind: Option<&'static str>,
}

impl StatsResponse {
    pub fn new(
        server_id: ServerId,
        status: crate::ServerStatus,
        stats: Option<StatsRecord>,
    ) -> Self {
        Self {
            server_id,
            status: status.as_str(),
            status_label: status.label(),
            free_memory_mb: Reading::from_option(stats.as_ref().map(|s| s.free_memory_mb)),
            free_disk_gb: Reading::from_option(stats.as_ref().map(|s| s.free_disk_gb)),
            cpu_load: Reading::from_option(stats.as_ref().map(|s| s.cpu_load.to_string())),
            cpu_load_kind: stats.as_ref().map(|s| s.cpu_load.kind()),
        }
    }
}
