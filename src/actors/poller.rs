//! StatsPoller - per-server statistics polling loop
//!
//! One loop instance runs per started server. It polls right away, then
//! alternates sleeping and polling for as long as the monitoring registry
//! still names its token as authoritative.
//!
//! ## Cycle
//!
//! ```text
//! fetch server → decrypt secret → collect stats → cache.put(ttl)
//!      ↑                                               │
//!      └──── is_current(token)? ←──── sleep(interval) ←┘
//!                  │ no
//!                  ↓
//!             terminate
//! ```
//!
//! Any failure inside a cycle is logged and the cycle counts as done, so the
//! next cycle is the retry. Stopping is cooperative: the loop notices a stop
//! or a newer token at its next check, at most one interval plus one
//! collection later.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use super::messages::LoopExit;
use crate::config::PollerConfig;
use crate::executor::{RemoteExecutor, RemoteTarget};
use crate::storage::{MonitoringRegistry, RegistryToken, ServerDirectory, StatsCache, Stores};
use crate::vault::Vault;
use crate::ServerId;

pub struct StatsPoller {
    server_id: ServerId,
    token: RegistryToken,
    directory: Arc<dyn ServerDirectory>,
    registry: Arc<dyn MonitoringRegistry>,
    cache: Arc<dyn StatsCache>,
    vault: Arc<Vault>,
    executor: Arc<dyn RemoteExecutor>,
    interval: Duration,
    cache_ttl: Duration,
}

impl StatsPoller {
    pub fn new(
        server_id: ServerId,
        token: RegistryToken,
        stores: &Stores,
        vault: Arc<Vault>,
        executor: Arc<dyn RemoteExecutor>,
        config: &PollerConfig,
    ) -> Self {
        Self {
            server_id,
            token,
            directory: stores.directory.clone(),
            registry: stores.registry.clone(),
            cache: stores.cache.clone(),
            vault,
            executor,
            interval: config.interval(),
            cache_ttl: config.cache_ttl(),
        }
    }

    pub fn spawn(self) -> JoinHandle<LoopExit> {
        tokio::spawn(self.run())
    }

    #[instrument(skip(self), fields(server_id = %self.server_id, token = %self.token))]
    pub async fn run(self) -> LoopExit {
        info!("polling loop started");

        let exit = loop {
            if let Some(exit) = self.poll_once().await {
                if exit == LoopExit::ServerRemoved {
                    self.release_entry().await;
                }
                break exit;
            }

            tokio::time::sleep(self.interval).await;

            if !self.still_current().await {
                break LoopExit::Superseded;
            }
        };

        info!("polling loop terminated: {exit:?}");
        exit
    }

    /// Run one collection. Returns an exit reason only when the loop must end.
    async fn poll_once(&self) -> Option<LoopExit> {
        let server = match self.directory.fetch_server(self.server_id).await {
            Ok(Some(server)) => server,
            Ok(None) => return Some(LoopExit::ServerRemoved),
            Err(e) => {
                warn!("cannot load server record, skipping cycle: {e}");
                return None;
            }
        };

        let secret = match self.vault.decrypt(&server.encrypted_secret) {
            Ok(secret) => secret,
            Err(e) => {
                warn!("cannot decrypt login secret, skipping cycle: {e}");
                return None;
            }
        };

        let target = RemoteTarget {
            address: server.address,
            username: server.username,
            os: server.os,
        };

        let collected = self.executor.collect_stats(&target, &secret).await;
        drop(secret);

        match collected {
            Ok(record) => {
                trace!("collected {record:?}");
                match self.cache.put(self.server_id, &record, self.cache_ttl).await {
                    Ok(()) => debug!("cached stats of {}", target.address),
                    Err(e) => warn!("cannot cache stats: {e}"),
                }
            }
            Err(e) => warn!("stats collection failed: {e}"),
        }

        None
    }

    /// Drop the registry entry of a deleted server, unless a newer loop owns it.
    async fn release_entry(&self) {
        match self.registry.release(self.server_id, &self.token).await {
            Ok(true) => debug!("registry entry released"),
            Ok(false) => debug!("registry entry already taken over"),
            Err(e) => warn!("cannot release registry entry: {e}"),
        }
    }

    /// Registry check after a sleep. A failing store is retried every
    /// interval without polling in between.
    async fn still_current(&self) -> bool {
        loop {
            match self.registry.is_current(self.server_id, &self.token).await {
                Ok(current) => return current,
                Err(e) => {
                    warn!("cannot check monitoring registry: {e}");
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}
