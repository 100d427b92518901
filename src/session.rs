//! Phone Sentinel - Session State & Facade
//!
//! The thin reconciliation layer the UI reads. It owns no detection or
//! alarm logic itself: it keeps the persisted protection flag and the
//! live alarm flag consistent, publishes snapshots on a watch channel
//! and exposes the setup/control operations as one surface. The refresh
//! runs as an explicitly cancellable scheduled task, not a busy poll.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::alarm::AlarmController;
use crate::error::SentinelResult;
use crate::evidence::EvidenceCollector;
use crate::models::{EmergencyContact, TheftAlert, TheftKind};
use crate::monitor::DetectionMonitor;
use crate::prefs::Preferences;

/// Read-only view of the cross-component state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub protection_enabled: bool,
    pub alarm_active: bool,
    pub setup_complete: bool,
}

/// Summary for the settings/status surface
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub protection_enabled: bool,
    pub alarm_active: bool,
    pub setup_complete: bool,
    pub pin_set: bool,
    pub contact: Option<EmergencyContact>,
    pub selected_alarm: usize,
}

/// Session facade over the monitor, alarm controller and preferences
pub struct SessionController {
    prefs: Arc<Preferences>,
    monitor: Arc<DetectionMonitor>,
    alarm: Arc<AlarmController>,
    evidence: Arc<EvidenceCollector>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// Build the facade and reconcile persisted state with reality:
    /// protection flagged on with no alarm in flight means the process
    /// died while armed - the flag is cleared rather than trusted.
    pub fn new(
        prefs: Arc<Preferences>,
        monitor: Arc<DetectionMonitor>,
        alarm: Arc<AlarmController>,
        evidence: Arc<EvidenceCollector>,
    ) -> SentinelResult<Self> {
        if prefs.protection_enabled() && !alarm.is_active() {
            log::info!("Protection was flagged enabled with no active alarm - disabling");
            prefs.set_protection_enabled(false)?;
        }

        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let controller = Self {
            prefs,
            monitor,
            alarm,
            evidence,
            snapshot_tx,
        };
        controller.refresh();
        Ok(controller)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATE OBSERVATION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot_tx.borrow()
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Recompute the snapshot and publish it if anything changed.
    /// An alarm that cleared while protection is still flagged gives the
    /// user back a disarmed device.
    pub fn refresh(&self) {
        let previous = *self.snapshot_tx.borrow();
        let alarm_active = self.alarm.is_active();

        if previous.alarm_active && !alarm_active && self.prefs.protection_enabled() {
            log::info!("Alarm cleared - disabling protection");
            if let Err(e) = self.monitor.disarm() {
                log::warn!("Disarm during reconciliation failed: {}", e);
            }
        }

        let current = SessionSnapshot {
            protection_enabled: self.prefs.protection_enabled(),
            alarm_active,
            setup_complete: self.prefs.is_setup_complete(),
        };

        if current != previous {
            log::debug!("Session snapshot updated: {:?}", current);
            self.snapshot_tx.send_replace(current);
        }
    }

    /// Run `refresh` on a fixed interval until the handle is stopped.
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> RefreshHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let controller = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => controller.refresh(),
                    _ = shutdown_rx.changed() => {
                        log::debug!("Session refresh task stopping");
                        break;
                    }
                }
            }
        });

        RefreshHandle { shutdown_tx, task }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SETUP OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn save_pin(&self, pin: &str) -> SentinelResult<()> {
        self.prefs.save_pin(pin)?;
        self.refresh();
        Ok(())
    }

    /// Validate-then-persist; invalid contacts never reach disk
    pub fn save_contact(&self, contact: &EmergencyContact) -> SentinelResult<()> {
        self.prefs.save_contact(contact)?;
        self.refresh();
        Ok(())
    }

    pub fn save_alarm_choice(&self, index: usize) -> SentinelResult<()> {
        self.prefs.save_selected_alarm(index)
    }

    pub fn mark_setup_complete(&self) -> SentinelResult<()> {
        self.prefs.mark_initial_setup_completed()?;
        self.refresh();
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PROTECTION CONTROL
    // ═══════════════════════════════════════════════════════════════════════

    pub fn enable_protection(&self) -> SentinelResult<()> {
        self.monitor.arm()?;
        self.refresh();
        Ok(())
    }

    pub fn disable_protection(&self) -> SentinelResult<()> {
        self.monitor.disarm()?;
        self.refresh();
        Ok(())
    }

    /// PIN attempt from the entry surface. A correct PIN during an
    /// active alarm stops the alarm and disarms protection - the user
    /// has control back.
    pub fn submit_pin(&self, candidate: &str) -> bool {
        let was_active = self.alarm.is_active();
        let valid = self.alarm.validate_pin(candidate);

        if valid && was_active {
            log::info!("Alarm was active - disabling protection as well");
            if let Err(e) = self.monitor.disarm() {
                log::warn!("Disarm after PIN success failed: {}", e);
            }
        }
        self.refresh();
        valid
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TESTING / STATUS
    // ═══════════════════════════════════════════════════════════════════════

    /// Full manual drill: alarm takeover plus evidence and alert
    pub fn simulate_theft(&self, kind: TheftKind) {
        log::info!("Simulating theft: {}", kind.as_str());
        self.alarm.trigger(kind);
        self.refresh();
    }

    /// Evidence-and-alert test without the alarm takeover
    pub async fn test_alert(&self) -> TheftAlert {
        log::info!("Running alert integration test");
        self.evidence.collect(TheftKind::ManualTest).await
    }

    pub fn status_info(&self) -> StatusInfo {
        StatusInfo {
            protection_enabled: self.prefs.protection_enabled(),
            alarm_active: self.alarm.is_active(),
            setup_complete: self.prefs.is_setup_complete(),
            pin_set: self.prefs.is_pin_set(),
            contact: self.prefs.contact(),
            selected_alarm: self.prefs.alarm_settings().selected_index,
        }
    }

    /// Disarm and wipe every stored setting
    pub fn reset_all(&self) -> SentinelResult<()> {
        log::warn!("Resetting all settings");
        self.monitor.disarm()?;
        self.prefs.clear_all()?;
        self.refresh();
        Ok(())
    }
}

/// Cancellation handle for the scheduled refresh task
pub struct RefreshHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the task and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
