//! Phone Sentinel - Core Data Models
//!
//! Theft events, emergency contact validation, alarm sound settings and
//! the PIN attempt counter used by the PIN-entry surface.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What tripped the trap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TheftKind {
    ChargerDisconnected,
    DeviceMoved,
    UnauthorizedAccess,
    ManualTest,
}

impl TheftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChargerDisconnected => "CHARGER_DISCONNECTED",
            Self::DeviceMoved => "DEVICE_MOVED",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::ManualTest => "MANUAL_TEST",
        }
    }

    /// Human-readable description used in the alert message
    pub fn description(&self) -> &'static str {
        match self {
            Self::ChargerDisconnected => "Charger disconnected",
            Self::DeviceMoved => "Device moved/shaken",
            Self::UnauthorizedAccess => "Unauthorized access attempt",
            Self::ManualTest => "Manual test (not real theft)",
        }
    }
}

/// One detected trigger with whatever evidence was gathered for it.
/// Ephemeral: created per trigger, consumed once by the alert sender.
#[derive(Debug, Clone)]
pub struct TheftAlert {
    /// Correlation id for log lines across the alert cycle
    pub id: Uuid,
    pub kind: TheftKind,
    pub detected_at: DateTime<Utc>,
    /// Always present - falls back to a textual "unavailable" line
    pub location: String,
    /// Absent when capture failed or timed out
    pub photo_path: Option<PathBuf>,
}

impl TheftAlert {
    pub fn new(kind: TheftKind, location: String, photo_path: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            detected_at: Utc::now(),
            location,
            photo_path,
        }
    }
}

/// Emergency contact - the person the bot relays alerts to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    /// Telegram chat id: digits with an optional leading '-', length >= 5
    pub chat_id: String,
}

impl EmergencyContact {
    pub fn new(name: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Check the contact against the validation rules
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let name_len = self.name.trim().chars().count();
        if !(2..=20).contains(&name_len) {
            errors.push("Contact name must be 2-20 characters".to_string());
        }

        let digits = self.chat_id.strip_prefix('-').unwrap_or(&self.chat_id);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            errors.push("Chat id must be numeric (optional leading '-')".to_string());
        }
        if self.chat_id.len() < 5 {
            errors.push("Chat id must be at least 5 characters".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Catalog of bundled alarm sounds, in selection order
pub const ALARM_SOUNDS: &[&str] = &[
    "police_warning",
    "police_siren",
    "clock",
    "fbi",
    "scream",
    "hacker",
];

/// The user's alarm sound choice
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AlarmSettings {
    pub selected_index: usize,
}

impl AlarmSettings {
    /// Selected sound name; out-of-range falls back to the first entry
    pub fn sound_name(&self) -> &'static str {
        ALARM_SOUNDS.get(self.selected_index).copied().unwrap_or(ALARM_SOUNDS[0])
    }
}

/// Lockout after 3 wrong attempts
const SHORT_LOCK: Duration = Duration::from_secs(10);
/// Lockout after 5 wrong attempts
const LONG_LOCK: Duration = Duration::from_secs(30);

/// Failed-PIN counter for one opening of the PIN-entry surface.
///
/// Created fresh each time the surface opens; the count keeps climbing
/// across lockouts, but lock durations do not stack.
#[derive(Debug, Default)]
pub struct AttemptCounter {
    failed_attempts: u32,
    blocked_until: Option<Instant>,
}

impl AttemptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Record a wrong attempt. Returns the lockout applied, if any.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.failed_attempts += 1;

        let lock = if self.failed_attempts >= 5 {
            Some(LONG_LOCK)
        } else if self.failed_attempts >= 3 {
            Some(SHORT_LOCK)
        } else {
            None
        };

        if let Some(duration) = lock {
            self.blocked_until = Some(Instant::now() + duration);
        }
        lock
    }

    /// Correct PIN entered - counter resets to zero
    pub fn reset(&mut self) {
        self.failed_attempts = 0;
        self.blocked_until = None;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_until.is_some_and(|until| Instant::now() < until)
    }

    pub fn block_remaining(&self) -> Option<Duration> {
        self.blocked_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_validation() {
        assert!(EmergencyContact::new("Mom", "123456").is_valid());

        // Name too short
        assert!(!EmergencyContact::new("M", "123456").is_valid());

        // Non-numeric chat id
        assert!(!EmergencyContact::new("Mom", "12a6").is_valid());

        // Group chat ids carry a leading '-'
        assert!(EmergencyContact::new("Family", "-100123").is_valid());

        // Too short even though numeric
        assert!(!EmergencyContact::new("Mom", "1234").is_valid());
    }

    #[test]
    fn contact_validation_reports_all_errors() {
        let errors = EmergencyContact::new("M", "1a").validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn attempt_counter_escalation() {
        let mut counter = AttemptCounter::new();

        // Attempts 1 and 2: no lockout
        assert_eq!(counter.record_failure(), None);
        assert_eq!(counter.record_failure(), None);
        assert!(!counter.is_blocked());

        // Attempt 3: 10 second lock
        assert_eq!(counter.record_failure(), Some(Duration::from_secs(10)));
        assert!(counter.is_blocked());

        // Attempt 4: still the short lock tier
        assert_eq!(counter.record_failure(), Some(Duration::from_secs(10)));

        // Attempt 5: escalates to 30 seconds
        assert_eq!(counter.record_failure(), Some(Duration::from_secs(30)));
        assert_eq!(counter.failed_attempts(), 5);
    }

    #[test]
    fn attempt_counter_reset() {
        let mut counter = AttemptCounter::new();
        for _ in 0..5 {
            counter.record_failure();
        }
        counter.reset();
        assert_eq!(counter.failed_attempts(), 0);
        assert!(!counter.is_blocked());
    }

    #[test]
    fn alarm_sound_fallback() {
        let settings = AlarmSettings { selected_index: 99 };
        assert_eq!(settings.sound_name(), "police_warning");

        let settings = AlarmSettings { selected_index: 3 };
        assert_eq!(settings.sound_name(), "fbi");
    }

    #[test]
    fn theft_kind_descriptions() {
        assert_eq!(TheftKind::ChargerDisconnected.description(), "Charger disconnected");
        assert_eq!(TheftKind::ManualTest.as_str(), "MANUAL_TEST");
    }
}
