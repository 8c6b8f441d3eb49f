//! Test doubles and fixtures shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use montool::alerts::{AlertMessage, Delivery, Notifier};
use montool::config::PollerConfig;
use montool::engine::Engine;
use montool::executor::{ExecutorError, ParseError, RemoteExecutor, RemoteTarget};
use montool::monitors::{ProbeError, ReachabilityProbe};
use montool::storage::{MemoryBackend, Stores};
use montool::vault::{Secret, Vault};
use montool::{
    ChatId, CpuLoad, OsKind, Owner, OwnerId, Server, ServerId, ServerStatus, StatsRecord,
};

pub const PASSWORD: &str = "correct horse battery staple";

pub fn test_vault() -> Arc<Vault> {
    Arc::new(Vault::from_base64_key(&Vault::generate_key()).unwrap())
}

pub fn reference_stats() -> StatsRecord {
    StatsRecord {
        free_memory_mb: 2048,
        free_disk_gb: 15.5,
        cpu_load: CpuLoad::LoadAverage(0.42),
    }
}

pub fn test_server(id: i64, address: &str, owner: i64, vault: &Vault) -> Server {
    Server {
        id: ServerId(id),
        name: format!("server-{id}"),
        address: address.to_string(),
        os: OsKind::Linux,
        owner: OwnerId(owner),
        username: "monitor".to_string(),
        encrypted_secret: vault.encrypt(PASSWORD.as_bytes()).unwrap(),
        status: ServerStatus::Unknown,
        created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
    }
}

/// Owner 1 has a linked chat (id 1001), owner 2 has none.
pub async fn seeded_backend(servers: &[(i64, &str, i64)], vault: &Vault) -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .insert_owner(Owner {
            id: OwnerId(1),
            chat_id: Some(ChatId(1001)),
        })
        .await;
    backend
        .insert_owner(Owner {
            id: OwnerId(2),
            chat_id: None,
        })
        .await;

    for (id, address, owner) in servers {
        backend
            .insert_server(test_server(*id, address, *owner, vault))
            .await;
    }

    backend
}

pub fn test_engine(
    backend: Arc<MemoryBackend>,
    vault: Arc<Vault>,
    executor: Arc<ScriptedExecutor>,
) -> Engine {
    Engine::new(
        Stores::from_backend(backend),
        vault,
        executor,
        PollerConfig::default(),
    )
}

#[derive(Debug, Clone)]
pub enum Script {
    Stats(StatsRecord),
    Unreachable,
    Garbage,
}

/// Executor answering per address, counting every collection.
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    calls: AtomicUsize,
    per_address: Mutex<HashMap<String, usize>>,
}

impl ScriptedExecutor {
    pub fn new<A: Into<String>>(scripts: impl IntoIterator<Item = (A, Script)>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(address, script)| (address.into(), script))
                .collect(),
            calls: AtomicUsize::new(0),
            per_address: Mutex::new(HashMap::new()),
        }
    }

    /// Every address is unreachable.
    pub fn empty() -> Self {
        Self::new(Vec::<(String, Script)>::new())
    }

    pub fn always(address: &str, stats: StatsRecord) -> Self {
        Self::new([(address, Script::Stats(stats))])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, address: &str) -> usize {
        self.per_address
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn collect_stats(
        &self,
        target: &RemoteTarget,
        secret: &Secret,
    ) -> Result<StatsRecord, ExecutorError> {
        assert_eq!(secret.expose(), PASSWORD);
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .per_address
            .lock()
            .unwrap()
            .entry(target.address.clone())
            .or_default() += 1;

        match self.scripts.get(&target.address) {
            Some(Script::Stats(stats)) => Ok(stats.clone()),
            Some(Script::Garbage) => Err(ExecutorError::Parse {
                address: target.address.clone(),
                source: ParseError::FieldCount {
                    count: 1,
                    output: "command not found".to_string(),
                },
            }),
            Some(Script::Unreachable) | None => {
                Err(ExecutorError::connect(&target.address, "connection timed out"))
            }
        }
    }
}

/// Probe answering per address; unknown addresses fail the probe itself.
pub struct ScriptedProbe(pub HashMap<String, Option<Duration>>);

impl ScriptedProbe {
    pub fn new(answers: impl IntoIterator<Item = (&'static str, Option<u64>)>) -> Self {
        Self(
            answers
                .into_iter()
                .map(|(address, ms)| (address.to_string(), ms.map(Duration::from_millis)))
                .collect(),
        )
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self, address: &str) -> Result<Option<Duration>, ProbeError> {
        self.0
            .get(address)
            .copied()
            .ok_or_else(|| ProbeError::InvalidAddress(address.to_string()))
    }
}

/// Notifier that records every alert it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(ChatId, AlertMessage)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(ChatId, AlertMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, chat: ChatId, message: &AlertMessage) -> Delivery {
        self.sent.lock().unwrap().push((chat, message.clone()));
        if self.fail {
            Delivery::Failed
        } else {
            Delivery::Sent
        }
    }
}
