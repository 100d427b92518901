//! Phone Sentinel - Alarm Controller
//!
//! Owns the process-wide alarm-active flag. On trigger it takes over
//! device audio/vibration/screen and demands a PIN; on the correct PIN
//! (or a stop request from disarm) it tears everything down. Trigger is
//! idempotent and teardown runs at most once per activation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::AlarmDevice;
use crate::evidence::EvidenceCollector;
use crate::models::TheftKind;
use crate::prefs::Preferences;

/// Repeating vibration pattern: delay, on, off, on, off (ms)
const VIBRATION_PATTERN: &[u64] = &[0, 1000, 500, 1000, 500];

/// State machine: Idle -> Active -> Idle
pub struct AlarmController {
    prefs: Arc<Preferences>,
    device: Arc<dyn AlarmDevice>,
    evidence: Arc<EvidenceCollector>,
    active: AtomicBool,
    /// Volume recorded on activation, restored on teardown
    saved_volume: Mutex<Option<u32>>,
}

impl AlarmController {
    pub fn new(
        prefs: Arc<Preferences>,
        device: Arc<dyn AlarmDevice>,
        evidence: Arc<EvidenceCollector>,
    ) -> Self {
        Self {
            prefs,
            device,
            evidence,
            active: AtomicBool::new(false),
            saved_volume: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Idle -> Active. No-op if an alarm is already in flight.
    ///
    /// Engages audio at max volume, vibration, wake lock and the PIN
    /// surface, then fires the evidence collector without waiting for it.
    /// Must be called from within the tokio runtime.
    pub fn trigger(&self, kind: TheftKind) {
        if self.active.swap(true, Ordering::SeqCst) {
            log::warn!("Alarm already active - ignoring {} trigger", kind.as_str());
            return;
        }

        log::warn!("ALARM TRIGGERED: {}", kind.as_str());

        // Record current volume, then force max
        let current = self.device.alarm_volume();
        *self.saved_volume.lock() = Some(current);
        self.device.set_alarm_volume(self.device.max_alarm_volume());

        // Chosen sound, device default if it cannot load
        let sound = self.prefs.alarm_settings().sound_name();
        if let Err(e) = self.device.play_looping(sound) {
            log::warn!("Alarm sound '{}' failed to load ({}), using fallback", sound, e);
            self.device.play_fallback();
        }

        self.device.vibrate(VIBRATION_PATTERN);
        self.device.acquire_wake_lock();
        self.device.show_pin_screen();

        // Evidence runs in the background; the alarm does not wait on it
        let evidence = Arc::clone(&self.evidence);
        tokio::spawn(async move {
            evidence.collect(kind).await;
        });
    }

    /// Compare the candidate against the stored PIN. On a match while
    /// the alarm is active, tear down and return to Idle. A mismatch
    /// changes nothing; attempt counting lives in the PIN surface.
    pub fn validate_pin(&self, candidate: &str) -> bool {
        let valid = match self.prefs.pin() {
            Some(stored) => candidate == stored,
            None => false,
        };

        if valid {
            log::info!("Correct PIN entered");
            self.teardown();
        } else {
            log::debug!("PIN mismatch");
        }
        valid
    }

    /// Stop request from disarm or a remote command. Same teardown path
    /// as PIN success.
    pub fn stop(&self) {
        self.teardown();
    }

    /// Active -> Idle, at most once per activation. Each resource release
    /// runs unconditionally so no single step can leave the others
    /// engaged; once the flag is Idle, no audio/vibration/wake-lock
    /// remains held.
    fn teardown(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        log::info!("Stopping alarm - releasing device resources");

        self.device.stop_playback();
        self.device.cancel_vibration();

        if let Some(volume) = self.saved_volume.lock().take() {
            self.device.set_alarm_volume(volume);
        }

        self.device.release_wake_lock();
        self.device.dismiss_pin_screen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Camera, GeoFix, Locator};
    use crate::error::{SentinelError, SentinelResult};
    use crate::models::{EmergencyContact, TheftAlert};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct MockDevice {
        volume: AtomicU32,
        playing: AtomicBool,
        vibrating: AtomicBool,
        wake_locked: AtomicBool,
        pin_screen: AtomicBool,
        stop_calls: AtomicU32,
        fail_sound: bool,
        fallback_used: AtomicBool,
    }

    impl AlarmDevice for MockDevice {
        fn alarm_volume(&self) -> u32 {
            self.volume.load(Ordering::SeqCst)
        }
        fn max_alarm_volume(&self) -> u32 {
            15
        }
        fn set_alarm_volume(&self, level: u32) {
            self.volume.store(level, Ordering::SeqCst);
        }
        fn play_looping(&self, _sound: &str) -> SentinelResult<()> {
            if self.fail_sound {
                return Err(SentinelError::CaptureFailure("decoder".into()));
            }
            self.playing.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn play_fallback(&self) {
            self.fallback_used.store(true, Ordering::SeqCst);
            self.playing.store(true, Ordering::SeqCst);
        }
        fn stop_playback(&self) {
            self.playing.store(false, Ordering::SeqCst);
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
        fn vibrate(&self, _pattern: &[u64]) {
            self.vibrating.store(true, Ordering::SeqCst);
        }
        fn cancel_vibration(&self) {
            self.vibrating.store(false, Ordering::SeqCst);
        }
        fn acquire_wake_lock(&self) {
            self.wake_locked.store(true, Ordering::SeqCst);
        }
        fn release_wake_lock(&self) {
            self.wake_locked.store(false, Ordering::SeqCst);
        }
        fn show_pin_screen(&self) {
            self.pin_screen.store(true, Ordering::SeqCst);
        }
        fn dismiss_pin_screen(&self) {
            self.pin_screen.store(false, Ordering::SeqCst);
        }
    }

    struct StubCamera;
    impl Camera for StubCamera {
        fn capture_still(&self) -> SentinelResult<PathBuf> {
            Ok(PathBuf::from("/tmp/still.jpg"))
        }
    }

    struct StubLocator;
    impl Locator for StubLocator {
        fn last_known(&self) -> Option<GeoFix> {
            Some(GeoFix::new(1.0, 2.0, 3.0))
        }
        fn request_update(&self, _timeout: Duration) -> SentinelResult<GeoFix> {
            Ok(GeoFix::new(1.0, 2.0, 3.0))
        }
    }

    fn build(
        fail_sound: bool,
    ) -> (
        AlarmController,
        Arc<MockDevice>,
        mpsc::Receiver<TheftAlert>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Arc::new(Preferences::open(dir.path().join("prefs.json")).unwrap());
        prefs.save_pin("4321").unwrap();
        prefs
            .save_contact(&EmergencyContact::new("Mom", "123456"))
            .unwrap();

        let device = Arc::new(MockDevice {
            volume: AtomicU32::new(4),
            fail_sound,
            ..Default::default()
        });

        let (tx, rx) = mpsc::channel(4);
        let evidence = Arc::new(EvidenceCollector::new(
            Arc::new(StubCamera),
            Arc::new(StubLocator),
            tx,
        ));

        let controller = AlarmController::new(prefs, device.clone() as Arc<dyn AlarmDevice>, evidence);
        (controller, device, rx, dir)
    }

    #[tokio::test]
    async fn trigger_engages_all_resources() {
        let (controller, device, mut rx, _dir) = build(false);

        controller.trigger(TheftKind::ChargerDisconnected);

        assert!(controller.is_active());
        assert_eq!(device.alarm_volume(), 15);
        assert!(device.playing.load(Ordering::SeqCst));
        assert!(device.vibrating.load(Ordering::SeqCst));
        assert!(device.wake_locked.load(Ordering::SeqCst));
        assert!(device.pin_screen.load(Ordering::SeqCst));

        // Evidence fired asynchronously, exactly one alert
        let alert = rx.recv().await.expect("evidence alert");
        assert_eq!(alert.kind, TheftKind::ChargerDisconnected);
    }

    #[tokio::test]
    async fn trigger_is_idempotent() {
        let (controller, _device, mut rx, _dir) = build(false);

        controller.trigger(TheftKind::DeviceMoved);
        controller.trigger(TheftKind::DeviceMoved);

        // Second trigger was a no-op: only one evidence cycle
        rx.recv().await.expect("first alert");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broken_sound_falls_back() {
        let (controller, device, _rx, _dir) = build(true);

        controller.trigger(TheftKind::DeviceMoved);
        assert!(device.fallback_used.load(Ordering::SeqCst));
        assert!(device.playing.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wrong_pin_changes_nothing() {
        let (controller, device, _rx, _dir) = build(false);
        controller.trigger(TheftKind::DeviceMoved);

        assert!(!controller.validate_pin("0000"));
        assert!(controller.is_active());
        assert!(device.playing.load(Ordering::SeqCst));
        assert_eq!(device.alarm_volume(), 15);
    }

    #[tokio::test]
    async fn correct_pin_tears_down_once() {
        let (controller, device, _rx, _dir) = build(false);
        controller.trigger(TheftKind::DeviceMoved);

        assert!(controller.validate_pin("4321"));
        assert!(!controller.is_active());
        assert!(!device.playing.load(Ordering::SeqCst));
        assert!(!device.vibrating.load(Ordering::SeqCst));
        assert!(!device.wake_locked.load(Ordering::SeqCst));
        assert!(!device.pin_screen.load(Ordering::SeqCst));
        assert_eq!(device.alarm_volume(), 4);

        // A second valid entry is still true but releases nothing again
        assert!(controller.validate_pin("4321"));
        assert_eq!(device.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_teardown_releases_once() {
        let (controller, device, _rx, _dir) = build(false);
        controller.trigger(TheftKind::DeviceMoved);

        let controller = Arc::new(controller);
        let a = controller.clone();
        let b = controller.clone();
        let t1 = std::thread::spawn(move || a.validate_pin("4321"));
        let t2 = std::thread::spawn(move || b.stop());
        assert!(t1.join().unwrap());
        t2.join().unwrap();

        assert!(!controller.is_active());
        assert_eq!(device.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_trigger_is_noop() {
        let (controller, device, _rx, _dir) = build(false);
        controller.stop();
        assert_eq!(device.stop_calls.load(Ordering::SeqCst), 0);
    }
}
