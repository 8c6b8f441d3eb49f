//! Telegram Bot API notifier
//!
//! Alerts go out through `sendMessage` with HTML parse mode. The bot token is
//! part of the request path, so it is stripped from every logged error.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::ChatId;
use crate::alerts::{AlertMessage, Delivery, Notifier};
use crate::config::TelegramConfig;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request to the Bot API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bot API rejected the message ({status}): {description}")]
    Rejected { status: u16, description: String },
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Every request, including reading the reply, is bounded by the
    /// configured timeout, so a hung Bot API connection fails the delivery
    /// instead of stalling the prober.
    pub fn new(config: &TelegramConfig, token: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = SendMessage {
            chat_id: chat.0,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let reply = response
            .json::<ApiResponse>()
            .await
            .map_err(reqwest::Error::without_url);

        match reply {
            Ok(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Ok(ApiResponse { description, .. }) => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
            Err(_) if !status.is_success() => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: "unreadable error body".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, message))]
    async fn notify(&self, chat: ChatId, message: &AlertMessage) -> Delivery {
        match self.send_message(chat, &message.text).await {
            Ok(()) => {
                info!("Successfully sent Telegram message");
                Delivery::Sent
            }
            Err(e) => {
                error!("Failed to send Telegram message: {e}");
                Delivery::Failed
            }
        }
    }
}
