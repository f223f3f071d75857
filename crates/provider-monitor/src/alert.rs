//! Alert formatting and Telegram delivery.

use crate::{DispatchError, settings::TelegramSettings, thresholds::Violation};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use mockall::automock;
use serde::Serialize;
use tracing::{error, info, warn};

/// What went wrong during a check.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertBody {
    /// Rendered violation lines, in evaluation order
    Violations(Vec<String>),
    /// The check itself failed
    Failure(String),
}

/// One alert, rendered as Telegram Markdown right before it is sent.
#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub provider: String,
    pub timestamp: DateTime<Local>,
    pub body: AlertBody,
}

impl AlertMessage {
    pub fn violations(
        provider: impl Into<String>,
        violations: &[Violation],
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            provider: provider.into(),
            timestamp,
            body: AlertBody::Violations(violations.iter().map(ToString::to_string).collect()),
        }
    }

    pub fn failure(
        provider: impl Into<String>,
        detail: impl Into<String>,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            provider: provider.into(),
            timestamp,
            body: AlertBody::Failure(detail.into()),
        }
    }

    pub fn render(&self) -> String {
        let (title, lines) = match &self.body {
            AlertBody::Violations(lines) => ("*FLARE PROVIDER ALERT*", lines.join("\n")),
            AlertBody::Failure(detail) => {
                ("*FLARE PROVIDER MONITOR ERROR*", escape_markdown(detail))
            }
        };

        format!(
            "{title}\n\nProvider: `{}`\n\n{lines}\n\n_Timestamp: {}_",
            self.provider,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Escape the entity markers of Telegram's legacy Markdown so free-form text
/// (error details, raw agent output) is shown literally.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[automock]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a pre-formatted message. Returns whether it was delivered;
    /// never fails.
    async fn send(&self, text: &str) -> bool;
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Posts alerts to a Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base_url: String,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(settings: &TelegramSettings) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(DispatchError::Client)?;

        Ok(Self {
            client,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            bot_token: settings.bot_token.clone(),
            chat_id: settings.chat_id.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    async fn send_message(&self, token: &str, chat_id: &str, text: &str) -> Result<(), DispatchError> {
        let url = format!("{}/bot{token}/sendMessage", self.api_base_url);

        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "Markdown",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status, body });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> bool {
        let (Some(token), Some(chat_id)) = (self.bot_token.as_deref(), self.chat_id.as_deref())
        else {
            warn!("Telegram bot token or chat ID not configured; cannot send alert");
            return false;
        };

        match self.send_message(token, chat_id, text).await {
            Ok(()) => {
                info!(text, "telegram alert sent");
                metrics::counter!("ftso_monitor_alert_sent").increment(1);
                true
            }
            Err(err) => {
                error!(%err, "failed to send telegram alert");
                metrics::counter!("ftso_monitor_alert_failed").increment(1);
                false
            }
        }
    }
}
