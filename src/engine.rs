//! The monitoring engine
//!
//! Ties the stores, the vault and the executor together and exposes the
//! operations collaborators trigger: start and stop polling a server, read its
//! cached stats and probed status, and run the connection prober.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::actors::{ProberHandle, StatsPoller};
use crate::alerts::{AlertManager, Notifier};
use crate::config::{PollerConfig, ProberConfig};
use crate::executor::RemoteExecutor;
use crate::monitors::ReachabilityProbe;
use crate::storage::{RegistryToken, StorageError, Stores};
use crate::vault::Vault;
use crate::{ServerId, ServerStatus, ServerSummary, StatsRecord};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("server {0} is not registered")]
    UnknownServer(ServerId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone)]
pub struct Engine {
    stores: Stores,
    vault: Arc<Vault>,
    executor: Arc<dyn RemoteExecutor>,
    poller: PollerConfig,
}

impl Engine {
    pub fn new(
        stores: Stores,
        vault: Arc<Vault>,
        executor: Arc<dyn RemoteExecutor>,
        poller: PollerConfig,
    ) -> Self {
        Self {
            stores,
            vault,
            executor,
            poller,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Install a new registry token and spawn its polling loop.
    ///
    /// Starting a server that is already polled supersedes the old loop,
    /// which ends at its next registry check.
    #[instrument(skip(self))]
    pub async fn start_polling(&self, id: ServerId) -> Result<RegistryToken, EngineError> {
        if self.stores.directory.fetch_server(id).await?.is_none() {
            return Err(EngineError::UnknownServer(id));
        }

        let token = self.stores.registry.start(id).await?;
        StatsPoller::new(
            id,
            token,
            &self.stores,
            self.vault.clone(),
            self.executor.clone(),
            &self.poller,
        )
        .spawn();

        info!("polling of server {id} started");
        Ok(token)
    }

    /// Remove the registry entry. A no-op when nothing is polling.
    #[instrument(skip(self))]
    pub async fn stop_polling(&self, id: ServerId) -> Result<(), EngineError> {
        self.stores.registry.stop(id).await?;
        info!("polling of server {id} stopped");
        Ok(())
    }

    pub async fn cached_stats(&self, id: ServerId) -> Result<Option<StatsRecord>, EngineError> {
        Ok(self.stores.cache.get(id).await?)
    }

    pub async fn server_status(&self, id: ServerId) -> Result<ServerStatus, EngineError> {
        self.stores
            .directory
            .fetch_server(id)
            .await?
            .map(|server| server.status)
            .ok_or(EngineError::UnknownServer(id))
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerSummary>, EngineError> {
        Ok(self.stores.directory.list_servers().await?)
    }

    pub fn spawn_prober(
        &self,
        probe: Arc<dyn ReachabilityProbe>,
        notifier: Arc<dyn Notifier>,
        config: &ProberConfig,
    ) -> ProberHandle {
        let alerts = AlertManager::new(
            self.stores.directory.clone(),
            notifier,
            config.alert_policy,
        );
        ProberHandle::spawn(
            self.stores.directory.clone(),
            probe,
            alerts,
            config.interval(),
        )
    }
}
