//! Storage traits
//!
//! The engine talks to three narrow stores. Each backend implements all of
//! them over the same underlying state, but the engine only ever holds them as
//! separate trait objects so a deployment could split them across stores.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageResult;
use crate::{ChatId, OwnerId, Server, ServerId, ServerStatus, ServerSummary, StatsRecord};

/// Identifies one polling loop instance.
///
/// Tokens are random, so a loop started on another worker can never be
/// mistaken for the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryToken(Uuid);

impl RegistryToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistryToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RegistryToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Read access to the servers and owners maintained by the CRUD collaborators,
/// plus the one column the engine owns: the probed status.
#[async_trait]
pub trait ServerDirectory: Send + Sync {
    /// All registered servers, newest first.
    async fn list_servers(&self) -> StorageResult<Vec<ServerSummary>>;

    async fn fetch_server(&self, id: ServerId) -> StorageResult<Option<Server>>;

    /// Persist a probed status. Unknown servers are ignored.
    async fn update_status(&self, id: ServerId, status: ServerStatus) -> StorageResult<()>;

    /// The chat an owner linked through the bot, if any.
    async fn owner_chat_id(&self, owner: OwnerId) -> StorageResult<Option<ChatId>>;
}

/// Which polling loop is authoritative for a server.
///
/// Every operation is a single atomic step on one key.
#[async_trait]
pub trait MonitoringRegistry: Send + Sync {
    /// Install a fresh token, superseding whatever loop held the entry.
    async fn start(&self, id: ServerId) -> StorageResult<RegistryToken>;

    async fn is_current(&self, id: ServerId, token: &RegistryToken) -> StorageResult<bool>;

    /// Remove the entry. Removing an absent entry is a no-op.
    async fn stop(&self, id: ServerId) -> StorageResult<()>;

    /// Remove the entry only while `token` still holds it. Returns whether
    /// an entry was removed; a newer loop's entry is left alone.
    async fn release(&self, id: ServerId, token: &RegistryToken) -> StorageResult<bool>;
}

/// Short lived snapshot of the last successful collection per server.
#[async_trait]
pub trait StatsCache: Send + Sync {
    /// Replace the record and reset its expiry.
    async fn put(&self, id: ServerId, record: &StatsRecord, ttl: Duration) -> StorageResult<()>;

    /// `None` when nothing was stored or the entry expired.
    async fn get(&self, id: ServerId) -> StorageResult<Option<StatsRecord>>;
}
