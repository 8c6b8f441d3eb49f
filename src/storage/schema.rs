//! Row mapping between SQLite and the domain types
//!
//! Timestamps are stored as Unix milliseconds, enums as their text form. A
//! value that does not map back is reported as [`StorageError::Corrupt`]
//! rather than silently defaulted.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::error::{StorageError, StorageResult};
use crate::{CpuLoad, OsKind, OwnerId, Server, ServerId, ServerStatus, ServerSummary, StatsRecord};

pub(crate) fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp out of range: {millis}")))
}

fn os_from_row(row: &SqliteRow) -> StorageResult<OsKind> {
    let os: String = row.try_get("os")?;
    os.parse().map_err(StorageError::Corrupt)
}

fn status_from_row(row: &SqliteRow) -> StorageResult<ServerStatus> {
    let status: String = row.try_get("status")?;
    status.parse().map_err(StorageError::Corrupt)
}

pub(crate) fn server_from_row(row: &SqliteRow) -> StorageResult<Server> {
    Ok(Server {
        id: ServerId(row.try_get("id")?),
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        os: os_from_row(row)?,
        owner: OwnerId(row.try_get("owner_id")?),
        username: row.try_get("username")?,
        encrypted_secret: row.try_get("encrypted_secret")?,
        status: status_from_row(row)?,
        created_at: millis_to_timestamp(row.try_get("created_at")?)?,
    })
}

pub(crate) fn summary_from_row(row: &SqliteRow) -> StorageResult<ServerSummary> {
    Ok(ServerSummary {
        id: ServerId(row.try_get("id")?),
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        os: os_from_row(row)?,
        owner: OwnerId(row.try_get("owner_id")?),
        status: status_from_row(row)?,
    })
}

pub(crate) fn stats_from_row(row: &SqliteRow) -> StorageResult<StatsRecord> {
    let memory: i64 = row.try_get("free_memory_mb")?;
    let kind: String = row.try_get("cpu_kind")?;
    let value: f64 = row.try_get("cpu_value")?;

    Ok(StatsRecord {
        free_memory_mb: u64::try_from(memory)
            .map_err(|_| StorageError::Corrupt(format!("negative free memory: {memory}")))?,
        free_disk_gb: row.try_get("free_disk_gb")?,
        cpu_load: CpuLoad::from_parts(&kind, value)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown cpu load kind: {kind}")))?,
    })
}
