//! SSH executor backed by libssh2
//!
//! libssh2 is blocking, so every collection runs on tokio's blocking pool with
//! a fresh session. The session is disconnected by [`SessionGuard`] on every
//! exit path, including errors raised after the handshake.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use ssh2::{CheckResult, KnownHostFileKind, Session};
use tracing::{debug, instrument, trace, warn};

use crate::StatsRecord;
use crate::config::{ExecutorConfig, HostKeyPolicy};
use crate::util::host_and_port;
use crate::vault::Secret;

use super::{ExecutorError, RemoteExecutor, RemoteTarget};

#[derive(Debug, Clone)]
pub struct SshExecutor {
    config: ExecutorConfig,
}

impl SshExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        if config.host_key_policy == HostKeyPolicy::AcceptAny {
            warn!("SSH host keys are not verified (trust-on-first-use)");
        }
        Self { config }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, secret), fields(address = %target.address, os = %target.os))]
    async fn collect_stats(
        &self,
        target: &RemoteTarget,
        secret: &Secret,
    ) -> Result<StatsRecord, ExecutorError> {
        let config = self.config.clone();
        let target = target.clone();
        let secret = secret.clone();
        let address = target.address.clone();

        tokio::task::spawn_blocking(move || collect_blocking(&config, &target, &secret))
            .await
            .map_err(|e| ExecutorError::connect(&address, format!("collection task failed: {e}")))?
    }
}

/// Disconnects the wrapped session when dropped.
struct SessionGuard(Session);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.disconnect(None, "montool: collection finished", None) {
            trace!("SSH disconnect failed: {e}");
        }
    }
}

fn collect_blocking(
    config: &ExecutorConfig,
    target: &RemoteTarget,
    secret: &Secret,
) -> Result<StatsRecord, ExecutorError> {
    let address = target.address.as_str();
    let timeout = config.connect_timeout();
    let (host, port) = host_and_port(address, config.ssh_port)
        .ok_or_else(|| ExecutorError::connect(address, "invalid address"))?;

    let session = connect(address, &host, port, timeout)?;
    verify_host_key(&session.0, &config.host_key_policy, &host, port)?;

    session
        .0
        .userauth_password(&target.username, secret.expose())
        .map_err(|e| ExecutorError::connect(address, format!("authentication failed: {e}")))?;

    if !session.0.authenticated() {
        return Err(ExecutorError::connect(address, "authentication failed"));
    }

    let command = target.os.stats_command();
    let output = exec(&session.0, command.command_line())
        .map_err(|e| ExecutorError::connect(address, e))?;

    trace!("raw stats output: {output:?}");

    command.parse(&output).map_err(|source| ExecutorError::Parse {
        address: address.to_string(),
        source,
    })
}

fn connect(
    address: &str,
    host: &str,
    port: u16,
    timeout: Duration,
) -> Result<SessionGuard, ExecutorError> {
    let socket_addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| ExecutorError::connect(address, format!("cannot resolve: {e}")))?
        .next()
        .ok_or_else(|| ExecutorError::connect(address, "address resolved to nothing"))?;

    let tcp = TcpStream::connect_timeout(&socket_addr, timeout)
        .map_err(|e| ExecutorError::connect(address, format!("TCP connect failed: {e}")))?;
    tcp.set_read_timeout(Some(timeout))
        .and_then(|_| tcp.set_write_timeout(Some(timeout)))
        .map_err(|e| ExecutorError::connect(address, e))?;

    let mut session = Session::new()
        .map_err(|e| ExecutorError::connect(address, format!("cannot create session: {e}")))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);

    let mut session = SessionGuard(session);
    session
        .0
        .handshake()
        .map_err(|e| ExecutorError::connect(address, format!("SSH handshake failed: {e}")))?;

    debug!("SSH session established with {socket_addr}");

    Ok(session)
}

fn verify_host_key(
    session: &Session,
    policy: &HostKeyPolicy,
    host: &str,
    port: u16,
) -> Result<(), ExecutorError> {
    let path = match policy {
        HostKeyPolicy::AcceptAny => return Ok(()),
        HostKeyPolicy::KnownHosts { path } => path,
    };

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| ExecutorError::connect(host, e))?;
    known_hosts
        .read_file(path, KnownHostFileKind::OpenSSH)
        .map_err(|e| {
            ExecutorError::connect(host, format!("cannot read {}: {e}", path.display()))
        })?;

    let (key, _) = session
        .host_key()
        .ok_or_else(|| ExecutorError::connect(host, "server sent no host key"))?;

    match known_hosts.check_port(host, port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(ExecutorError::connect(host, "host key is not known")),
        CheckResult::Mismatch => Err(ExecutorError::connect(host, "host key mismatch")),
        CheckResult::Failure => Err(ExecutorError::connect(host, "host key check failed")),
    }
}

fn exec(session: &Session, command: &str) -> Result<String, String> {
    let mut channel = session
        .channel_session()
        .map_err(|e| format!("channel open failed: {e}"))?;

    channel
        .exec(command)
        .map_err(|e| format!("exec failed: {e}"))?;

    let mut output = String::new();
    channel
        .read_to_string(&mut output)
        .map_err(|e| format!("read failed: {e}"))?;

    match channel.wait_close().and_then(|_| channel.exit_status()) {
        Ok(0) => {}
        Ok(code) => debug!("stats command exited with status {code}"),
        Err(e) => debug!("cannot read exit status: {e}"),
    }

    Ok(output)
}
