//! Outbound Telegram notifications
//!
//! Transport only: the ledger never waits on this. A failed send is logged
//! and surfaced to the caller, never rolled into a committed ledger mutation.

use crate::error::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct Notifier {
    http: Client,
    bot_token: String,
    chat_id: String,
    enabled: bool,
    notify_errors: bool,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    chat_id: String,
    text: String,
    parse_mode: String,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest {
    chat_id: String,
    message_id: i64,
    text: String,
    parse_mode: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    result: Option<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    message_id: i64,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: Client::new(),
            bot_token,
            chat_id,
            enabled: true,
            notify_errors: true,
        }
    }

    /// Suppress operational error reports to the group while keeping
    /// regular announcements.
    pub fn with_error_reports(mut self, enabled: bool) -> Self {
        self.notify_errors = enabled;
        self
    }

    /// No-op notifier for runs without Telegram configured.
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            bot_token: String::new(),
            chat_id: String::new(),
            enabled: false,
            notify_errors: false,
        }
    }

    /// Send an HTML-formatted message; returns the message id so the caller
    /// can edit the announcement later.
    pub async fn send(&self, text: &str) -> Result<Option<i64>> {
        if !self.enabled {
            return Ok(None);
        }

        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let request = SendMessageRequest {
            chat_id: self.chat_id.clone(),
            text: text.to_string(),
            parse_mode: "HTML".to_string(),
        };

        let response: SendMessageResponse =
            self.http.post(&url).json(&request).send().await?.json().await?;
        if !response.ok {
            tracing::warn!("telegram rejected sendMessage");
        }
        Ok(response.result.map(|m| m.message_id))
    }

    /// Replace the text of a previously sent message.
    pub async fn edit_message(&self, message_id: i64, text: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let url = format!(
            "https://api.telegram.org/bot{}/editMessageText",
            self.bot_token
        );
        let request = EditMessageRequest {
            chat_id: self.chat_id.clone(),
            message_id,
            text: text.to_string(),
            parse_mode: "HTML".to_string(),
        };

        self.http.post(&url).json(&request).send().await?;
        Ok(())
    }

    /// Operational error report to the group.
    pub async fn error(&self, context: &str, detail: &str) -> Result<()> {
        if !self.notify_errors {
            return Ok(());
        }
        let text = format!("⚠️ <b>{context}</b>\n\n{detail}");
        self.send(&text).await?;
        Ok(())
    }
}
