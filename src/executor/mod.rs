//! Remote command execution
//!
//! An executor opens a remote shell on a monitored server, runs the OS specific
//! stats command and hands back the parsed [`StatsRecord`]. Executors never
//! retry: a failed collection is reported to the caller, which decides when to
//! try again.

pub mod command;
pub mod ssh;

use async_trait::async_trait;

use crate::vault::Secret;
use crate::{OsKind, StatsRecord};

pub use command::{LinuxStats, ParseError, StatsCommand, WindowsStats};
pub use ssh::SshExecutor;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Authentication failure, timeout, refused or unreachable host
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    /// The remote command ran but its output had an unexpected shape
    #[error("unexpected stats output from {address}: {source}")]
    Parse {
        address: String,
        #[source]
        source: ParseError,
    },
}

impl ExecutorError {
    pub fn connect(address: &str, reason: impl ToString) -> Self {
        ExecutorError::Connect {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Where and as whom to run the stats command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub address: String,
    pub username: String,
    pub os: OsKind,
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Collect free memory, free disk and CPU load from the target.
    ///
    /// The secret is only borrowed for the duration of the call.
    async fn collect_stats(
        &self,
        target: &RemoteTarget,
        secret: &Secret,
    ) -> Result<StatsRecord, ExecutorError>;
}
