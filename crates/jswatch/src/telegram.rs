//! Report delivery through the Telegram Bot API (`sendDocument`).
//!
//! Notes:
//! - The report file is uploaded as a multipart document with the cycle summary as caption.
//! - `thread_id` targets a forum topic inside the chat when set.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use jswatch_core::{Notifier, NotifyError};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub api_key: String,
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self::with_base_url(config, API_BASE)
    }

    /// Points the notifier at a different Bot API host (self-hosted server, tests).
    pub fn with_base_url(config: TelegramConfig, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendDocument", self.base_url, self.config.api_key)
    }

    fn form(&self, file_name: String, bytes: Vec<u8>, caption: &str) -> Form {
        let mut form = Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .text("caption", caption.to_string())
            .text("disable_notification", "false");
        if let Some(thread) = &self.config.thread_id {
            form = form.text("message_thread_id", thread.clone());
        }
        form.part("document", Part::bytes(bytes).file_name(file_name))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, report: &Path, caption: &str) -> Result<(), NotifyError> {
        let bytes = tokio::fs::read(report).await.map_err(|source| NotifyError::Read {
            path: report.to_path_buf(),
            source,
        })?;
        let file_name = report
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());

        debug!(chat = %self.config.chat_id, file = %file_name, "sending report to telegram");
        let resp = self
            .client
            .post(self.endpoint())
            .multipart(self.form(file_name, bytes, caption))
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Delivery(format!(
                "telegram responded {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}
