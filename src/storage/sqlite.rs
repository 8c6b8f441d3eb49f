//! SQLite storage backend
//!
//! Backs the directory, the monitoring registry and the stats cache with one
//! database file. Every registry and cache operation is a single statement, so
//! several engine processes sharing the file see linearizable start, stop and
//! is_current semantics.
//!
//! - **WAL mode**: readers are not blocked by the prober's status writes
//! - **Migrations**: schema versioning with sqlx
//! - **Expiry**: cache rows carry an absolute `expires_at` and are filtered on
//!   read, then overwritten by the next put

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::{MonitoringRegistry, RegistryToken, ServerDirectory, StatsCache};
use super::error::{StorageError, StorageResult};
use super::schema::{server_from_row, stats_from_row, summary_from_row, timestamp_to_millis};
use crate::{ChatId, Owner, OwnerId, Server, ServerId, ServerStatus, ServerSummary, StatsRecord};

pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database file and run migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub async fn insert_owner(&self, owner: &Owner) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO owners (id, chat_id) VALUES (?, ?)
            ON CONFLICT (id) DO UPDATE SET chat_id = excluded.chat_id
            "#,
        )
        .bind(owner.id.0)
        .bind(owner.chat_id.map(|chat| chat.0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_server(&self, server: &Server) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO servers (
                id, name, address, os, owner_id, username,
                encrypted_secret, status, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                os = excluded.os,
                owner_id = excluded.owner_id,
                username = excluded.username,
                encrypted_secret = excluded.encrypted_secret
            "#,
        )
        .bind(server.id.0)
        .bind(&server.name)
        .bind(&server.address)
        .bind(server.os.as_str())
        .bind(server.owner.0)
        .bind(&server.username)
        .bind(&server.encrypted_secret)
        .bind(server.status.as_str())
        .bind(timestamp_to_millis(&server.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a server together with its registry and cache rows.
    #[instrument(skip(self))]
    pub async fn remove_server(&self, id: ServerId) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        for sql in [
            "DELETE FROM monitoring_registry WHERE server_id = ?",
            "DELETE FROM stats_cache WHERE server_id = ?",
            "DELETE FROM servers WHERE id = ?",
        ] {
            sqlx::query(sql).bind(id.0).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn close(&self) {
        debug!("closing SQLite connection pool");
        self.pool.close().await;
    }
}

#[async_trait]
impl ServerDirectory for SqliteBackend {
    async fn list_servers(&self) -> StorageResult<Vec<ServerSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, address, os, owner_id, status
            FROM servers
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }

    async fn fetch_server(&self, id: ServerId) -> StorageResult<Option<Server>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, address, os, owner_id, username,
                   encrypted_secret, status, created_at
            FROM servers
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(server_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn update_status(&self, id: ServerId, status: ServerStatus) -> StorageResult<()> {
        sqlx::query("UPDATE servers SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn owner_chat_id(&self, owner: OwnerId) -> StorageResult<Option<ChatId>> {
        let chat: Option<Option<i64>> =
            sqlx::query_scalar("SELECT chat_id FROM owners WHERE id = ?")
                .bind(owner.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(chat.flatten().map(ChatId))
    }
}

#[async_trait]
impl MonitoringRegistry for SqliteBackend {
    #[instrument(skip(self))]
    async fn start(&self, id: ServerId) -> StorageResult<RegistryToken> {
        let token = RegistryToken::new();

        sqlx::query(
            r#"
            INSERT INTO monitoring_registry (server_id, token, started_at)
            VALUES (?, ?, ?)
            ON CONFLICT (server_id) DO UPDATE SET
                token = excluded.token,
                started_at = excluded.started_at
            "#,
        )
        .bind(id.0)
        .bind(token.to_string())
        .bind(timestamp_to_millis(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    async fn is_current(&self, id: ServerId, token: &RegistryToken) -> StorageResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM monitoring_registry WHERE server_id = ? AND token = ?",
        )
        .bind(id.0)
        .bind(token.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    #[instrument(skip(self))]
    async fn stop(&self, id: ServerId) -> StorageResult<()> {
        sqlx::query("DELETE FROM monitoring_registry WHERE server_id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn release(&self, id: ServerId, token: &RegistryToken) -> StorageResult<bool> {
        let result =
            sqlx::query("DELETE FROM monitoring_registry WHERE server_id = ? AND token = ?")
                .bind(id.0)
                .bind(token.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StatsCache for SqliteBackend {
    async fn put(&self, id: ServerId, record: &StatsRecord, ttl: Duration) -> StorageResult<()> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = timestamp_to_millis(&Utc::now()).saturating_add(ttl_millis);
        let memory = i64::try_from(record.free_memory_mb).unwrap_or(i64::MAX);

        sqlx::query(
            r#"
            INSERT INTO stats_cache (
                server_id, free_memory_mb, free_disk_gb, cpu_kind, cpu_value, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (server_id) DO UPDATE SET
                free_memory_mb = excluded.free_memory_mb,
                free_disk_gb = excluded.free_disk_gb,
                cpu_kind = excluded.cpu_kind,
                cpu_value = excluded.cpu_value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(id.0)
        .bind(memory)
        .bind(record.free_disk_gb)
        .bind(record.cpu_load.kind())
        .bind(record.cpu_load.value())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: ServerId) -> StorageResult<Option<StatsRecord>> {
        let row = sqlx::query(
            r#"
            SELECT free_memory_mb, free_disk_gb, cpu_kind, cpu_value
            FROM stats_cache
            WHERE server_id = ? AND expires_at > ?
            "#,
        )
        .bind(id.0)
        .bind(timestamp_to_millis(&Utc::now()))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(stats_from_row).transpose()
    }
}
