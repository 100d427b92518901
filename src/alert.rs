//! Phone Sentinel - Alert Sender
//!
//! Formats the theft alert and relays it to a Telegram bot endpoint:
//! `sendPhoto` (multipart, photo + caption) when a photo file exists,
//! `sendMessage` (form-encoded) otherwise. Fire-and-forget: any failure
//! is logged and dropped, never retried and never surfaced to the user.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{TheftAlert, TheftKind};
use crate::prefs::Preferences;

const TEXT_TIMEOUT: Duration = Duration::from_secs(15);
const PHOTO_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound relay to the Telegram bot API
pub struct TelegramSender {
    prefs: Arc<Preferences>,
    client: reqwest::Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new(prefs: Arc<Preferences>, bot_token: &str) -> Self {
        Self {
            prefs,
            client: reqwest::Client::new(),
            api_base: format!("https://api.telegram.org/bot{}", bot_token),
        }
    }

    /// Endpoint override for tests and self-hosted bot API servers
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Drain the alert channel until it closes, delivering each alert.
    pub fn spawn(self: Arc<Self>, mut rx: mpsc::Receiver<TheftAlert>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                let delivered = self.send(&alert).await;
                if !delivered {
                    log::warn!("Alert [{}] not delivered", alert.id);
                }
            }
            log::debug!("Alert channel closed, sender task exiting");
        })
    }

    /// Deliver one alert. Photo + caption in a single request when the
    /// file exists, text-only otherwise. Returns delivery success.
    pub async fn send(&self, alert: &TheftAlert) -> bool {
        let Some(chat_id) = self.prefs.chat_id().filter(|id| !id.is_empty()) else {
            log::warn!("No chat id configured - dropping alert [{}]", alert.id);
            return false;
        };

        let message = build_message(alert.kind, Some(&alert.location));

        match &alert.photo_path {
            Some(path) if path.exists() => self.send_photo(&chat_id, path, &message).await,
            Some(path) => {
                log::warn!("Photo file missing ({}), sending text only", path.display());
                self.send_text(&chat_id, &message).await
            }
            None => self.send_text(&chat_id, &message).await,
        }
    }

    /// `sendMessage`: form-encoded chat id, text and Markdown parse mode
    async fn send_text(&self, chat_id: &str, text: &str) -> bool {
        let url = format!("{}/sendMessage", self.api_base);
        let form = [
            ("chat_id", chat_id),
            ("text", text),
            ("parse_mode", "Markdown"),
        ];

        let result = self
            .client
            .post(&url)
            .timeout(TEXT_TIMEOUT)
            .form(&form)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                log::info!("Text alert delivered");
                true
            }
            Ok(response) => {
                log::warn!("sendMessage returned HTTP {}", response.status());
                false
            }
            Err(e) => {
                log::warn!("sendMessage failed: {}", e);
                false
            }
        }
    }

    /// `sendPhoto`: multipart chat id, caption and binary image part.
    /// The local photo file is deleted after a confirmed delivery and
    /// left on disk otherwise.
    async fn send_photo(&self, chat_id: &str, photo: &Path, caption: &str) -> bool {
        let bytes = match tokio::fs::read(photo).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Cannot read photo {}: {}", photo.display(), e);
                return self.send_text(chat_id, caption).await;
            }
        };

        let file_name = photo
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "evidence.jpg".to_string());

        let part = match reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
        {
            Ok(part) => part,
            Err(e) => {
                log::warn!("Photo part rejected: {}", e);
                return self.send_text(chat_id, caption).await;
            }
        };

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let url = format!("{}/sendPhoto", self.api_base);
        let result = self
            .client
            .post(&url)
            .timeout(PHOTO_TIMEOUT)
            .multipart(form)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                log::info!("Photo alert delivered");
                if let Err(e) = tokio::fs::remove_file(photo).await {
                    log::warn!("Delivered photo not cleaned up: {}", e);
                }
                true
            }
            Ok(response) => {
                log::warn!("sendPhoto returned HTTP {}", response.status());
                false
            }
            Err(e) => {
                log::warn!("sendPhoto failed: {}", e);
                false
            }
        }
    }
}

/// Fixed-format alert body: header, timestamp, theft-type description,
/// location block (or a not-available fallback) and closing note.
pub fn build_message(kind: TheftKind, location: Option<&str>) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    let mut message = String::new();
    message.push_str("🚨 **ANTI-THEFT ALERT** 🚨\n\n");
    message.push_str("⚠️ **THEFT DETECTED!**\n");
    message.push_str(&format!("📅 Time: {}\n", timestamp));
    message.push_str(&format!("🔍 Type: {}\n\n", kind.description()));

    message.push_str("📍 **LOCATION:**\n");
    match location.filter(|l| !l.is_empty()) {
        Some(location) => {
            message.push_str(location);
            message.push('\n');
        }
        None => {
            message.push_str("📍 Location: Not available\n");
            message.push_str("⚠️ GPS may be disabled or permission denied\n");
        }
    }
    message.push('\n');

    message.push_str("🛡️ Your device has been secured!\n");
    message.push_str("🔊 Alarm is now active\n\n");
    message.push_str("⚡ Powered by Phone Sentinel");
    message
}
