//! Offline alerts
//!
//! The prober hands every server it found Offline to the [`AlertManager`],
//! which applies the alert policy, resolves the owner's linked chat and passes
//! the message to a [`Notifier`]. Delivery failures end here: they are logged
//! and never reach the prober.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AlertPolicy;
use crate::storage::ServerDirectory;
use crate::{ChatId, ServerStatus, ServerSummary};

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed,
}

/// An alert text, formatted with Telegram's HTML subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub text: String,
}

impl AlertMessage {
    pub fn server_unreachable(server: &ServerSummary) -> Self {
        Self {
            text: format!(
                "⚠️ <b>Server unreachable</b>\n\
                 Your server <b>{}</b> at <code>{}</code> did not answer the connection check. \
                 Please check it immediately.",
                escape_html(&server.name),
                escape_html(&server.address),
            ),
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Outbound channel to an owner's chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Never fails the caller, a failed delivery is reported as such.
    async fn notify(&self, chat: ChatId, message: &AlertMessage) -> Delivery;
}

/// Notifier used when no bot token is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, chat: ChatId, message: &AlertMessage) -> Delivery {
        warn!("no bot token configured, alert for chat {chat} dropped: {}", message.text);
        Delivery::Failed
    }
}

impl AlertPolicy {
    /// Whether a server now seen Offline should be alerted on.
    pub fn should_alert(&self, previous: ServerStatus) -> bool {
        match self {
            AlertPolicy::EveryCycle => true,
            AlertPolicy::OnTransition => previous != ServerStatus::Offline,
        }
    }
}

#[derive(Clone)]
pub struct AlertManager {
    directory: Arc<dyn ServerDirectory>,
    notifier: Arc<dyn Notifier>,
    policy: AlertPolicy,
}

impl AlertManager {
    pub fn new(
        directory: Arc<dyn ServerDirectory>,
        notifier: Arc<dyn Notifier>,
        policy: AlertPolicy,
    ) -> Self {
        Self {
            directory,
            notifier,
            policy,
        }
    }

    /// Alert the owner of a server the prober just found Offline.
    ///
    /// Returns `None` when no delivery was attempted.
    #[instrument(skip_all, fields(server_id = %server.id))]
    pub async fn server_offline(
        &self,
        server: &ServerSummary,
        previous: ServerStatus,
    ) -> Option<Delivery> {
        if !self.policy.should_alert(previous) {
            debug!("{} still offline, alert suppressed", server.address);
            return None;
        }

        let chat = match self.directory.owner_chat_id(server.owner).await {
            Ok(Some(chat)) => chat,
            Ok(None) => {
                debug!("owner {} has no linked chat", server.owner);
                return None;
            }
            Err(e) => {
                error!("cannot look up chat of owner {}: {e}", server.owner);
                return None;
            }
        };

        let delivery = self
            .notifier
            .notify(chat, &AlertMessage::server_unreachable(server))
            .await;

        match delivery {
            Delivery::Sent => info!("offline alert for {} sent", server.address),
            Delivery::Failed => error!("offline alert for {} not delivered", server.address),
        }

        Some(delivery)
    }
}
