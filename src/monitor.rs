//! Phone Sentinel - Detection Monitor
//!
//! Owns the armed state and the trigger policy. The platform adapter
//! pushes power events and accelerometer samples in; the monitor decides
//! when they amount to a theft trigger and hands the alarm controller
//! the event kind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::alarm::AlarmController;
use crate::device::SensorSource;
use crate::error::{SentinelError, SentinelResult};
use crate::models::TheftKind;
use crate::prefs::Preferences;

/// Raw delta-sum threshold in sensor units - deliberately unfiltered
const MOVEMENT_THRESHOLD: f32 = 25.0;
/// Suppress further motion triggers for this long after one fires
const MOVEMENT_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct MotionState {
    last_sample: [f32; 3],
    cooldown_until: Option<Instant>,
}

/// Detection Monitor - armed/disarmed state plus the trigger policy
pub struct DetectionMonitor {
    prefs: Arc<Preferences>,
    alarm: Arc<AlarmController>,
    sensors: Arc<dyn SensorSource>,
    armed: AtomicBool,
    /// Only ever true while armed; cleared on each disconnect trigger
    charger_monitored: AtomicBool,
    motion: Mutex<MotionState>,
    cooldown: Duration,
}

impl DetectionMonitor {
    pub fn new(
        prefs: Arc<Preferences>,
        alarm: Arc<AlarmController>,
        sensors: Arc<dyn SensorSource>,
    ) -> Self {
        Self {
            prefs,
            alarm,
            sensors,
            armed: AtomicBool::new(false),
            charger_monitored: AtomicBool::new(false),
            motion: Mutex::new(MotionState::default()),
            cooldown: MOVEMENT_COOLDOWN,
        }
    }

    /// Override the motion cooldown (tests exercise elapse with short ones)
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn is_charger_monitored(&self) -> bool {
        self.charger_monitored.load(Ordering::SeqCst)
    }

    /// Enable protection. Fails with `SetupIncomplete` unless PIN and
    /// emergency contact are configured. A sensor subscription that
    /// cannot be established leaves the monitor armed but trigger-less -
    /// accepted best-effort degradation.
    pub fn arm(&self) -> SentinelResult<()> {
        if !self.prefs.is_setup_complete() {
            log::warn!("Cannot arm - setup not complete");
            return Err(SentinelError::SetupIncomplete);
        }

        log::info!("Arming protection");
        self.armed.store(true, Ordering::SeqCst);
        self.prefs.set_protection_enabled(true)?;

        if let Err(e) = self.sensors.start() {
            log::warn!("Sensor subscription failed, armed without triggers: {}", e);
        }
        Ok(())
    }

    /// Disable protection, stop subscriptions and stop any alarm in flight.
    pub fn disarm(&self) -> SentinelResult<()> {
        log::info!("Disarming protection");
        self.armed.store(false, Ordering::SeqCst);
        self.charger_monitored.store(false, Ordering::SeqCst);
        self.prefs.set_protection_enabled(false)?;
        self.sensors.stop();

        if self.alarm.is_active() {
            self.alarm.stop();
        }
        Ok(())
    }

    /// Charger plugged in. Begins watching the charger, but only while
    /// armed - the monitored flag can never outlive the armed flag.
    pub fn on_power_connected(&self) {
        if self.is_armed() {
            log::debug!("Charger connected - monitoring it");
            self.charger_monitored.store(true, Ordering::SeqCst);
        }
    }

    /// Charger pulled. One alert per disconnect: the monitored flag
    /// clears and is not re-set until the next connect-while-armed.
    pub fn on_power_disconnected(&self) {
        let was_monitored = self.charger_monitored.swap(false, Ordering::SeqCst);
        if self.is_armed() && was_monitored {
            log::warn!("Charger pulled while monitored");
            self.alarm.trigger(TheftKind::ChargerDisconnected);
        }
    }

    /// Periodic accelerometer sample. Ignored unless armed and outside
    /// the cooldown window. The previous sample updates on every
    /// processed sample, trigger or not.
    pub fn on_motion_sample(&self, x: f32, y: f32, z: f32) {
        if !self.is_armed() {
            return;
        }

        let mut motion = self.motion.lock();

        if let Some(until) = motion.cooldown_until {
            if Instant::now() < until {
                return;
            }
            motion.cooldown_until = None;
        }

        let [px, py, pz] = motion.last_sample;
        let delta = (x - px).abs() + (y - py).abs() + (z - pz).abs();
        motion.last_sample = [x, y, z];

        if delta > MOVEMENT_THRESHOLD {
            log::warn!("Movement detected (delta {:.1})", delta);
            motion.cooldown_until = Some(Instant::now() + self.cooldown);
            drop(motion);
            self.alarm.trigger(TheftKind::DeviceMoved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AlarmDevice, Camera, GeoFix, Locator};
    use crate::error::SentinelResult;
    use crate::evidence::EvidenceCollector;
    use crate::models::{EmergencyContact, TheftAlert};
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    struct QuietDevice;
    impl AlarmDevice for QuietDevice {
        fn alarm_volume(&self) -> u32 {
            5
        }
        fn max_alarm_volume(&self) -> u32 {
            10
        }
        fn set_alarm_volume(&self, _level: u32) {}
        fn play_looping(&self, _sound: &str) -> SentinelResult<()> {
            Ok(())
        }
        fn play_fallback(&self) {}
        fn stop_playback(&self) {}
        fn vibrate(&self, _pattern: &[u64]) {}
        fn cancel_vibration(&self) {}
        fn acquire_wake_lock(&self) {}
        fn release_wake_lock(&self) {}
        fn show_pin_screen(&self) {}
        fn dismiss_pin_screen(&self) {}
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

    struct NoopSensors;
    impl SensorSource for NoopSensors {
        fn start(&self) -> SentinelResult<()> {
            Ok(())
        }
        fn stop(&self) {}
    }

    struct FailingSensors;
    impl SensorSource for FailingSensors {
        fn start(&self) -> SentinelResult<()> {
            Err(SentinelError::SensorUnavailable("accelerometer missing".into()))
        }
        fn stop(&self) {}
    }

    struct Harness {
        monitor: DetectionMonitor,
        alarm: Arc<AlarmController>,
        rx: mpsc::Receiver<TheftAlert>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(sensors: Arc<dyn SensorSource>, configured: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Arc::new(Preferences::open(dir.path().join("prefs.json")).unwrap());
        if configured {
            prefs.save_pin("1234").unwrap();
            prefs
                .save_contact(&EmergencyContact::new("Mom", "123456"))
                .unwrap();
        }

        let (tx, rx) = mpsc::channel(8);
        let evidence = Arc::new(EvidenceCollector::new(
            Arc::new(StubCamera),
            Arc::new(StubLocator),
            tx,
        ));
        let alarm = Arc::new(AlarmController::new(
            prefs.clone(),
            Arc::new(QuietDevice),
            evidence,
        ));
        let monitor = DetectionMonitor::new(prefs, alarm.clone(), sensors)
            .with_cooldown(Duration::from_millis(50));

        Harness {
            monitor,
            alarm,
            rx,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(NoopSensors), true)
    }

    #[tokio::test]
    async fn arm_requires_setup() {
        let h = harness_with(Arc::new(NoopSensors), false);
        assert!(matches!(h.monitor.arm(), Err(SentinelError::SetupIncomplete)));
        assert!(!h.monitor.is_armed());
    }

    #[tokio::test]
    async fn armed_reflects_most_recent_call() {
        let h = harness();
        h.monitor.arm().unwrap();
        assert!(h.monitor.is_armed());

        h.monitor.disarm().unwrap();
        assert!(!h.monitor.is_armed());
        assert!(!h.monitor.is_charger_monitored());

        h.monitor.arm().unwrap();
        assert!(h.monitor.is_armed());
    }

    #[tokio::test]
    async fn failed_subscription_still_arms() {
        let h = harness_with(Arc::new(FailingSensors), true);
        h.monitor.arm().unwrap();
        assert!(h.monitor.is_armed());
    }

    #[tokio::test]
    async fn charger_cycle_one_alert_per_disconnect() {
        let mut h = harness();
        h.monitor.arm().unwrap();

        h.monitor.on_power_connected();
        assert!(h.monitor.is_charger_monitored());

        h.monitor.on_power_disconnected();
        let alert = h.rx.recv().await.expect("disconnect alert");
        assert_eq!(alert.kind, TheftKind::ChargerDisconnected);
        assert!(!h.monitor.is_charger_monitored());

        // Cleared alarm, then a second disconnect without a reconnect:
        // nothing new fires
        h.alarm.stop();
        h.monitor.on_power_disconnected();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn power_connect_ignored_while_disarmed() {
        let h = harness();
        h.monitor.on_power_connected();
        assert!(!h.monitor.is_charger_monitored());
    }

    #[tokio::test]
    async fn motion_below_threshold_ignored() {
        let mut h = harness();
        h.monitor.arm().unwrap();

        h.monitor.on_motion_sample(0.0, 0.0, 9.8);
        h.monitor.on_motion_sample(2.0, 1.0, 9.8);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn motion_over_threshold_triggers_with_cooldown() {
        let mut h = harness();
        h.monitor.arm().unwrap();

        h.monitor.on_motion_sample(0.0, 0.0, 0.0);
        h.monitor.on_motion_sample(10.0, 10.0, 10.0);

        let alert = h.rx.recv().await.expect("movement alert");
        assert_eq!(alert.kind, TheftKind::DeviceMoved);

        // Inside the cooldown: an equally violent jolt is suppressed
        h.alarm.stop();
        h.monitor.on_motion_sample(-10.0, -10.0, -10.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.rx.try_recv().is_err());

        // After the cooldown elapses: exactly one new event
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.monitor.on_motion_sample(20.0, 20.0, 20.0);
        let alert = h.rx.recv().await.expect("post-cooldown alert");
        assert_eq!(alert.kind, TheftKind::DeviceMoved);
    }

    #[tokio::test]
    async fn motion_ignored_while_disarmed() {
        let mut h = harness();
        h.monitor.on_motion_sample(0.0, 0.0, 0.0);
        h.monitor.on_motion_sample(30.0, 30.0, 30.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disarm_stops_active_alarm() {
        let h = harness();
        h.monitor.arm().unwrap();
        h.monitor.on_power_connected();
        h.monitor.on_power_disconnected();
        assert!(h.alarm.is_active());

        h.monitor.disarm().unwrap();
        assert!(!h.alarm.is_active());
    }
}
