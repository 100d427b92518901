//! # Phone Sentinel
//!
//! Anti-theft trap core: arm a phone while it charges in public, and a
//! charger pull or a violent grab locks the screen behind a PIN, sounds
//! an alarm at max volume, snaps a silent front-camera photo, grabs a
//! location fix and relays everything to a Telegram bot.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        PHONE SENTINEL                        │
//! │  ┌───────────────┐   ┌───────────────┐   ┌───────────────┐   │
//! │  │   DETECTION   │──▶│     ALARM     │──▶│   EVIDENCE    │   │
//! │  │   MONITOR     │   │  CONTROLLER   │   │   COLLECTOR   │   │
//! │  │ power+motion  │   │ audio/vibra/  │   │ photo ∥ fix   │   │
//! │  │ trigger policy│   │ PIN lockdown  │   │ + timeouts    │   │
//! │  └───────┬───────┘   └───────┬───────┘   └───────┬───────┘   │
//! │          │                   │                   ▼           │
//! │  ┌───────┴───────────────────┴───────┐   ┌───────────────┐   │
//! │  │          SESSION STATE            │   │ ALERT SENDER  │   │
//! │  │  reconciliation + watch snapshots │   │ Telegram bot  │   │
//! │  └───────────────────────────────────┘   └───────────────┘   │
//! │                                                              │
//! │  ┌───────────────┐   ┌──────────────────────────────────┐    │
//! │  │  PREFERENCES  │   │  PLATFORM CAPABILITIES (traits)  │    │
//! │  │  JSON store   │   │  camera / locator / device / hw  │    │
//! │  └───────────────┘   └──────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Degradation model
//!
//! - Nothing on the detection-to-alert path throws out to a caller
//! - Missing capabilities no-op; evidence falls back to placeholders
//! - Every alert always carries a location line
//! - Delivery is fire-and-forget: failures are logged and dropped

pub mod alarm;
pub mod alert;
pub mod device;
pub mod error;
pub mod evidence;
pub mod models;
pub mod monitor;
pub mod prefs;
pub mod session;

pub use alarm::AlarmController;
pub use alert::TelegramSender;
pub use device::{AlarmDevice, Camera, GeoFix, Locator, SensorSource};
pub use error::{SentinelError, SentinelResult};
pub use evidence::EvidenceCollector;
pub use models::{AlarmSettings, AttemptCounter, EmergencyContact, TheftAlert, TheftKind};
pub use monitor::DetectionMonitor;
pub use prefs::Preferences;
pub use session::{SessionController, SessionSnapshot};

/// Phone Sentinel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
