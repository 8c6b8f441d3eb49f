//! In-memory storage backend
//!
//! Holds directory, registry and cache in process memory. Suitable for a
//! single worker and for tests; nothing survives a restart. Cache expiry uses
//! tokio's clock, so paused-time tests can step over a TTL.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::backend::{MonitoringRegistry, RegistryToken, ServerDirectory, StatsCache};
use super::error::StorageResult;
use crate::{ChatId, Owner, OwnerId, Server, ServerId, ServerStatus, ServerSummary, StatsRecord};

#[derive(Default)]
pub struct MemoryBackend {
    servers: RwLock<HashMap<ServerId, Server>>,
    owners: RwLock<HashMap<OwnerId, Owner>>,
    registry: RwLock<HashMap<ServerId, RegistryToken>>,
    /// `None` expiry: the TTL reaches past what the clock can represent
    cache: RwLock<HashMap<ServerId, (StatsRecord, Option<Instant>)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_owner(&self, owner: Owner) {
        self.owners.write().await.insert(owner.id, owner);
    }

    pub async fn insert_server(&self, server: Server) {
        self.servers.write().await.insert(server.id, server);
    }

    /// Delete a server. Its registry and cache entries go with it.
    pub async fn remove_server(&self, id: ServerId) {
        self.servers.write().await.remove(&id);
        self.registry.write().await.remove(&id);
        self.cache.write().await.remove(&id);
    }
}

#[async_trait]
impl ServerDirectory for MemoryBackend {
    async fn list_servers(&self) -> StorageResult<Vec<ServerSummary>> {
        let servers = self.servers.read().await;
        let mut listed: Vec<&Server> = servers.values().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(listed.into_iter().map(Server::summary).collect())
    }

    async fn fetch_server(&self, id: ServerId) -> StorageResult<Option<Server>> {
        Ok(self.servers.read().await.get(&id).cloned())
    }

    async fn update_status(&self, id: ServerId, status: ServerStatus) -> StorageResult<()> {
        if let Some(server) = self.servers.write().await.get_mut(&id) {
            server.status = status;
        }
        Ok(())
    }

    async fn owner_chat_id(&self, owner: OwnerId) -> StorageResult<Option<ChatId>> {
        Ok(self
            .owners
            .read()
            .await
            .get(&owner)
            .and_then(|owner| owner.chat_id))
    }
}

#[async_trait]
impl MonitoringRegistry for MemoryBackend {
    async fn start(&self, id: ServerId) -> StorageResult<RegistryToken> {
        let token = RegistryToken::new();
        if let Some(previous) = self.registry.write().await.insert(id, token) {
            debug!("server {id}: token {previous} superseded by {token}");
        }
        Ok(token)
    }

    async fn is_current(&self, id: ServerId, token: &RegistryToken) -> StorageResult<bool> {
        Ok(self.registry.read().await.get(&id) == Some(token))
    }

    async fn stop(&self, id: ServerId) -> StorageResult<()> {
        self.registry.write().await.remove(&id);
        Ok(())
    }

    async fn release(&self, id: ServerId, token: &RegistryToken) -> StorageResult<bool> {
        let mut registry = self.registry.write().await;
        if registry.get(&id) == Some(token) {
            registry.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[async_trait]
impl StatsCache for MemoryBackend {
    async fn put(&self, id: ServerId, record: &StatsRecord, ttl: Duration) -> StorageResult<()> {
        let expires_at = Instant::now().checked_add(ttl);
        self.cache
            .write()
            .await
            .insert(id, (record.clone(), expires_at));
        Ok(())
    }

    async fn get(&self, id: ServerId) -> StorageResult<Option<StatsRecord>> {
        let cache = self.cache.read().await;
        Ok(cache
            .get(&id)
            .filter(|(_, expires_at)| expires_at.is_none_or(|at| Instant::now() < at))
            .map(|(record, _)| record.clone()))
    }
}
