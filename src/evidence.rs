//! Phone Sentinel - Evidence Collector
//!
//! Once a trigger fires, race a silent camera capture and a location fix
//! against independent timeouts, merge whatever arrived and hand exactly
//! one alert to the sender. The collector never blocks its caller past
//! the slower of the two bounds and never skips the send - worst case
//! the alert carries placeholders.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::device::{Camera, Locator};
use crate::models::{TheftAlert, TheftKind};

/// Bounded wait for the camera hardware callback
const PHOTO_TIMEOUT: Duration = Duration::from_secs(8);
/// Bounded wait for a live location fix
const LOCATION_TIMEOUT: Duration = Duration::from_secs(6);

/// Orchestrates the evidence providers and feeds the alert channel
pub struct EvidenceCollector {
    camera: Arc<dyn Camera>,
    locator: Arc<dyn Locator>,
    alert_tx: mpsc::Sender<TheftAlert>,
    photo_timeout: Duration,
    location_timeout: Duration,
}

impl EvidenceCollector {
    pub fn new(
        camera: Arc<dyn Camera>,
        locator: Arc<dyn Locator>,
        alert_tx: mpsc::Sender<TheftAlert>,
    ) -> Self {
        Self {
            camera,
            locator,
            alert_tx,
            photo_timeout: PHOTO_TIMEOUT,
            location_timeout: LOCATION_TIMEOUT,
        }
    }

    /// Override the provider bounds (tests exercise elapse with short ones)
    pub fn with_timeouts(mut self, photo: Duration, location: Duration) -> Self {
        self.photo_timeout = photo;
        self.location_timeout = location;
        self
    }

    /// Collect evidence for one trigger and enqueue exactly one alert.
    ///
    /// Both branches always settle: success, provider failure and timeout
    /// all merge into the same alert. The returned alert mirrors what was
    /// sent, for callers that want to log or display it.
    pub async fn collect(&self, kind: TheftKind) -> TheftAlert {
        log::info!("Collecting evidence for {}", kind.as_str());

        let (photo, location) = tokio::join!(self.gather_photo(), self.gather_location());

        let alert = TheftAlert::new(kind, location, photo);
        log::info!(
            "Evidence merged [{}]: photo={}, kind={}",
            alert.id,
            alert.photo_path.is_some(),
            kind.as_str()
        );

        if self.alert_tx.send(alert.clone()).await.is_err() {
            log::error!("Alert channel closed - alert [{}] dropped", alert.id);
        }
        alert
    }

    /// Photo branch: bounded capture, `None` on any failure.
    /// A capture that outlives the bound finishes on its blocking thread
    /// and its result is discarded.
    async fn gather_photo(&self) -> Option<PathBuf> {
        let camera = Arc::clone(&self.camera);
        let capture = tokio::task::spawn_blocking(move || camera.capture_still());

        match timeout(self.photo_timeout, capture).await {
            Ok(Ok(Ok(path))) => {
                log::debug!("Photo captured: {}", path.display());
                Some(path)
            }
            Ok(Ok(Err(e))) => {
                log::warn!("Photo capture failed: {}", e);
                None
            }
            Ok(Err(e)) => {
                log::warn!("Photo capture task failed: {}", e);
                None
            }
            Err(_) => {
                log::warn!("Photo capture timed out after {:?}", self.photo_timeout);
                None
            }
        }
    }

    /// Location branch: last-known fix wins without waiting, otherwise a
    /// bounded live update. Always yields a location line.
    async fn gather_location(&self) -> String {
        let locator = Arc::clone(&self.locator);
        match tokio::task::spawn_blocking(move || locator.last_known()).await {
            Ok(Some(fix)) => {
                log::debug!("Using last-known fix from {}", fix.fixed_at);
                return fix.formatted();
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("Last-known lookup task failed: {}", e);
            }
        }

        let locator = Arc::clone(&self.locator);
        let bound = self.location_timeout;
        let update = tokio::task::spawn_blocking(move || locator.request_update(bound));

        match timeout(self.location_timeout, update).await {
            Ok(Ok(Ok(fix))) => fix.formatted(),
            Ok(Ok(Err(e))) => {
                log::warn!("Location fix failed: {}", e);
                unavailable_line(&e.to_string())
            }
            Ok(Err(e)) => {
                log::warn!("Location task failed: {}", e);
                unavailable_line("Provider error")
            }
            Err(_) => {
                log::warn!("Location fix timed out after {:?}", self.location_timeout);
                unavailable_line("Timeout")
            }
        }
    }
}

/// Fallback location block - the alert always carries a location line
fn unavailable_line(reason: &str) -> String {
    format!(
        "📍 Location: {}\n🕐 Time: {}",
        reason,
        Local::now().format("%H:%M:%S")
    )
}
