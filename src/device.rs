//! Phone Sentinel - Platform Capability Interfaces
//!
//! The core never touches OS sensor/camera/location APIs directly.
//! A platform adapter implements these traits; the core treats every
//! capability as best-effort and degrades when one is missing.
//!
//! Capture and fix calls are blocking - the evidence collector runs them
//! on `spawn_blocking` with its own timeouts.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::SentinelResult;

/// Front-camera capability: one still image, no viewfinder.
pub trait Camera: Send + Sync {
    /// Capture a single still and return the saved file.
    /// Blocks until the hardware reports success or failure.
    fn capture_still(&self) -> SentinelResult<PathBuf>;
}

/// Location capability
pub trait Locator: Send + Sync {
    /// Best-effort cached position, no waiting.
    fn last_known(&self) -> Option<GeoFix>;

    /// Request a fresh fix, blocking up to `timeout`.
    fn request_update(&self, timeout: Duration) -> SentinelResult<GeoFix>;
}

/// Device takeover capability used while the alarm is active:
/// audio output, vibration, wake lock and the blocking PIN surface.
///
/// Every method is infallible except sound loading; the alarm controller
/// guards each call independently during teardown.
pub trait AlarmDevice: Send + Sync {
    fn alarm_volume(&self) -> u32;
    fn max_alarm_volume(&self) -> u32;
    fn set_alarm_volume(&self, level: u32);

    /// Start looping the named alarm sound at full player volume.
    fn play_looping(&self, sound: &str) -> SentinelResult<()>;
    /// Default system alarm sound, used when the chosen one cannot load.
    fn play_fallback(&self);
    fn stop_playback(&self);

    /// Repeating vibration; pattern is delay/on/off milliseconds.
    fn vibrate(&self, pattern: &[u64]);
    fn cancel_vibration(&self);

    fn acquire_wake_lock(&self);
    fn release_wake_lock(&self);

    /// Surface the blocking PIN-entry screen over everything else.
    fn show_pin_screen(&self);
    fn dismiss_pin_screen(&self);
}

/// Power-event and accelerometer subscription owned by the platform.
/// The adapter pushes events into the detection monitor while started.
pub trait SensorSource: Send + Sync {
    fn start(&self) -> SentinelResult<()>;
    fn stop(&self);
}

/// One location fix
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy in meters
    pub accuracy_m: f32,
    pub fixed_at: DateTime<Utc>,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f32) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m,
            fixed_at: Utc::now(),
        }
    }

    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }

    /// The location block embedded in alert messages
    pub fn formatted(&self) -> String {
        format!(
            "📍 Location: Coordinates: {:.4}, {:.4}\n\
             🌐 Coordinates: {}, {}\n\
             🎯 Accuracy: {}m\n\
             🔗 Maps: {}",
            self.latitude,
            self.longitude,
            self.latitude,
            self.longitude,
            self.accuracy_m,
            self.maps_url()
        )
    }
}
