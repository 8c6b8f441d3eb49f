//! Message types for actor communication
//!
//! Commands travel to an actor over its mpsc channel; replies come back on a
//! oneshot channel carried inside the command.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::alerts::Delivery;
use crate::{ServerId, ServerStatus};

/// Commands that can be sent to the connection prober
#[derive(Debug)]
pub enum ProberCommand {
    /// Run a sweep immediately, outside the regular schedule
    SweepNow {
        respond_to: oneshot::Sender<SweepReport>,
    },

    /// Finish the running sweep, then exit
    Shutdown,
}

/// Why a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    /// Registry entry removed or taken over by a newer loop
    Superseded,

    /// The server was deleted from the directory
    ServerRemoved,
}

/// Result of probing one server
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub server_id: ServerId,
    pub address: String,

    /// `None` when the probe itself failed and the stored status was kept
    pub status: Option<ServerStatus>,

    #[serde(with = "optional_millis")]
    pub round_trip: Option<Duration>,

    /// Set when an alert delivery was attempted
    #[serde(skip)]
    pub alert: Option<Delivery>,

    pub error: Option<String>,
}

/// Everything a single sweep found
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<ProbeOutcome>,
}

impl SweepReport {
    pub fn status_of(&self, id: ServerId) -> Option<ServerStatus> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.server_id == id)
            .and_then(|outcome| outcome.status)
    }

    pub fn alerts_attempted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.alert.is_some()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(rtt) => s.serialize_some(&(rtt.as_secs_f64() * 1000.0)),
            None => s.serialize_none(),
        }
    }
}
