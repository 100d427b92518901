//! Phone Sentinel - Preference Store
//!
//! JSON-file-backed key-value store for everything that survives a
//! restart: PIN, emergency contact, alarm choice, protection flag and
//! the first-time-setup marker. Single writer per key; readers get
//! snapshot values.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::SentinelResult;
use crate::models::{AlarmSettings, EmergencyContact};
use crate::SentinelError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PrefsData {
    pin_code: Option<String>,
    contact_name: Option<String>,
    telegram_chat_id: Option<String>,
    #[serde(default)]
    selected_alarm: usize,
    #[serde(default)]
    protection_enabled: bool,
    #[serde(default)]
    first_time_setup: bool,
}

/// Persistent preference store
pub struct Preferences {
    path: PathBuf,
    data: RwLock<PrefsData>,
}

impl Preferences {
    /// Open the store at `path`, creating an empty one if absent.
    /// Unreadable or corrupt files start over empty rather than failing.
    pub fn open<P: AsRef<Path>>(path: P) -> SentinelResult<Self> {
        let path = path.as_ref().to_path_buf();

        let data = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!("Preference file corrupt, starting fresh: {}", e);
                PrefsData::default()
            }),
            Err(_) => PrefsData::default(),
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn persist(&self) -> SentinelResult<()> {
        let snapshot = self.data.read().clone();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&snapshot)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PIN CODE
    // ═══════════════════════════════════════════════════════════════════════

    /// Store the PIN. Kept as entered and compared byte-for-byte;
    /// see DESIGN.md on the plaintext storage contract.
    pub fn save_pin(&self, pin: &str) -> SentinelResult<()> {
        if pin.len() != 4 || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(SentinelError::InvalidPinFormat);
        }
        log::debug!("Saving PIN code");
        self.data.write().pin_code = Some(pin.to_string());
        self.persist()
    }

    pub fn pin(&self) -> Option<String> {
        self.data.read().pin_code.clone()
    }

    pub fn is_pin_set(&self) -> bool {
        self.data.read().pin_code.as_deref().is_some_and(|p| !p.is_empty())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // EMERGENCY CONTACT
    // ═══════════════════════════════════════════════════════════════════════

    /// Validate and store the contact. Invalid contacts are rejected
    /// before anything touches disk.
    pub fn save_contact(&self, contact: &EmergencyContact) -> SentinelResult<()> {
        contact
            .validate()
            .map_err(|errors| SentinelError::InvalidContact(errors.join("; ")))?;

        log::debug!("Saving emergency contact: {}", contact.name);
        {
            let mut data = self.data.write();
            data.contact_name = Some(contact.name.clone());
            data.telegram_chat_id = Some(contact.chat_id.clone());
        }
        self.persist()
    }

    pub fn contact(&self) -> Option<EmergencyContact> {
        let data = self.data.read();
        match (&data.contact_name, &data.telegram_chat_id) {
            (Some(name), Some(chat_id)) => Some(EmergencyContact::new(name, chat_id)),
            _ => None,
        }
    }

    pub fn chat_id(&self) -> Option<String> {
        self.data.read().telegram_chat_id.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ALARM CHOICE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn save_selected_alarm(&self, index: usize) -> SentinelResult<()> {
        log::debug!("Saving selected alarm: {}", index);
        self.data.write().selected_alarm = index;
        self.persist()
    }

    pub fn alarm_settings(&self) -> AlarmSettings {
        AlarmSettings {
            selected_index: self.data.read().selected_alarm,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PROTECTION FLAG
    // ═══════════════════════════════════════════════════════════════════════

    pub fn set_protection_enabled(&self, enabled: bool) -> SentinelResult<()> {
        log::debug!("Setting protection enabled: {}", enabled);
        self.data.write().protection_enabled = enabled;
        self.persist()
    }

    /// Defaults to false - protection never survives a fresh install
    pub fn protection_enabled(&self) -> bool {
        self.data.read().protection_enabled
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SETUP STATUS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn mark_initial_setup_completed(&self) -> SentinelResult<()> {
        log::debug!("Marking initial setup as completed");
        self.data.write().first_time_setup = true;
        self.persist()
    }

    pub fn is_first_time_setup_completed(&self) -> bool {
        self.data.read().first_time_setup
    }

    /// All three required pieces configured: PIN, contact name, chat id.
    /// The alarm choice always has a valid default.
    pub fn is_setup_complete(&self) -> bool {
        let data = self.data.read();
        let pin_set = data.pin_code.as_deref().is_some_and(|p| !p.is_empty());
        let contact_set = data.contact_name.as_deref().is_some_and(|n| !n.is_empty());
        let chat_set = data.telegram_chat_id.as_deref().is_some_and(|c| !c.is_empty());
        pin_set && contact_set && chat_set
    }

    pub fn is_initial_setup_completed(&self) -> bool {
        self.is_first_time_setup_completed() && self.is_setup_complete()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RESET
    // ═══════════════════════════════════════════════════════════════════════

    /// Wipe everything. Protection is explicitly left disabled afterwards.
    pub fn clear_all(&self) -> SentinelResult<()> {
        log::warn!("Clearing all stored preferences");
        *self.data.write() = PrefsData::default();
        self.persist()
    }
}
