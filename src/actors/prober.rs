//! ConnectionProber - periodic reachability sweep over every server
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → list servers → probe all concurrently → classify → update_status
//!     ↑                                                               │ Offline
//!     └─── Commands (SweepNow, Shutdown)                   AlertManager → Notifier
//! ```
//!
//! Probes run concurrently and each server is handled in isolation: a failing
//! probe, status write or alert only affects the outcome of that server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

use super::messages::{ProbeOutcome, ProberCommand, SweepReport};
use crate::alerts::AlertManager;
use crate::monitors::ReachabilityProbe;
use crate::storage::ServerDirectory;
use crate::{ServerStatus, ServerSummary};

pub struct ConnectionProber {
    directory: Arc<dyn ServerDirectory>,
    probe: Arc<dyn ReachabilityProbe>,
    alerts: AlertManager,
    interval: Duration,
    command_rx: mpsc::Receiver<ProberCommand>,
}

impl ConnectionProber {
    pub fn new(
        directory: Arc<dyn ServerDirectory>,
        probe: Arc<dyn ReachabilityProbe>,
        alerts: AlertManager,
        interval: Duration,
        command_rx: mpsc::Receiver<ProberCommand>,
    ) -> Self {
        Self {
            directory,
            probe,
            alerts,
            interval,
            command_rx,
        }
    }

    /// Runs until a Shutdown command arrives or every handle is dropped.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting connection prober, sweeping every {:?}", self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep().await;
                    debug!(
                        "sweep finished: {} servers, {} probe failures",
                        report.outcomes.len(),
                        report.failures()
                    );
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        ProberCommand::SweepNow { respond_to } => {
                            debug!("received SweepNow command");
                            let report = self.sweep().await;
                            let _ = respond_to.send(report);
                        }

                        ProberCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("connection prober stopped");
    }

    /// Probe every registered server once.
    pub async fn sweep(&self) -> SweepReport {
        let started_at = Utc::now();

        let servers = match self.directory.list_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                error!("cannot list servers, sweep skipped: {e}");
                return SweepReport {
                    started_at,
                    outcomes: Vec::new(),
                };
            }
        };

        let outcomes = join_all(servers.iter().map(|server| self.probe_server(server))).await;

        SweepReport {
            started_at,
            outcomes,
        }
    }

    #[instrument(skip_all, fields(server_id = %server.id, address = %server.address))]
    async fn probe_server(&self, server: &ServerSummary) -> ProbeOutcome {
        let mut outcome = ProbeOutcome {
            server_id: server.id,
            address: server.address.clone(),
            status: None,
            round_trip: None,
            alert: None,
            error: None,
        };

        let round_trip = match self.probe.probe(&server.address).await {
            Ok(round_trip) => round_trip,
            Err(e) => {
                warn!("probe failed, keeping status {}: {e}", server.status.as_str());
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };

        let status = ServerStatus::from_round_trip(round_trip);
        outcome.status = Some(status);
        outcome.round_trip = round_trip;

        if status != server.status {
            info!("status changed: {} -> {}", server.status.as_str(), status.as_str());
        }

        if let Err(e) = self.directory.update_status(server.id, status).await {
            error!("cannot persist status: {e}");
            outcome.error = Some(e.to_string());
        }

        if status == ServerStatus::Offline {
            outcome.alert = self.alerts.server_offline(server, server.status).await;
        }

        outcome
    }
}

/// Handle to a spawned [`ConnectionProber`]
pub struct ProberHandle {
    sender: mpsc::Sender<ProberCommand>,
    task: JoinHandle<()>,
}

impl ProberHandle {
    pub fn spawn(
        directory: Arc<dyn ServerDirectory>,
        probe: Arc<dyn ReachabilityProbe>,
        alerts: AlertManager,
        interval: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let actor = ConnectionProber::new(directory, probe, alerts, interval, cmd_rx);
        let task = tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            task,
        }
    }

    /// Sweep now and wait for the report.
    pub async fn sweep_now(&self) -> Result<SweepReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ProberCommand::SweepNow { respond_to: tx })
            .await
            .context("prober is not running")?;

        rx.await.context("prober stopped before answering")
    }

    /// Stop the prober and wait until it has exited.
    pub async fn shutdown(self) {
        let _ = self.sender.send(ProberCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            error!("prober task failed: {e}");
        }
    }
}
