//! Phone Sentinel - CLI
//!
//! Demo harness over the library: setup commands against the preference
//! store, plus a simulated theft cycle using console implementations of
//! the platform capability traits.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use phone_sentinel::{
    models::ALARM_SOUNDS, AlarmController, AlarmDevice, AttemptCounter, Camera,
    DetectionMonitor, EmergencyContact, EvidenceCollector, GeoFix, Locator, Preferences,
    SensorSource, SentinelResult, SessionController, TelegramSender, TheftKind,
};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version = phone_sentinel::VERSION)]
#[command(about = "Phone Sentinel - Anti-theft trap core")]
struct Cli {
    /// Preference store path
    #[arg(short, long, default_value = "./sentinel_prefs.json")]
    prefs: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the 4-digit PIN
    SetPin {
        pin: String,
    },

    /// Store the emergency contact (Telegram chat)
    SetContact {
        name: String,
        chat_id: String,
    },

    /// Choose the alarm sound by index
    SetAlarm {
        index: usize,
    },

    /// List the bundled alarm sounds
    ListAlarms,

    /// Show setup and protection status
    Status,

    /// Run a full theft drill: alarm takeover, evidence, alert, PIN entry
    Simulate {
        /// Trigger kind to simulate
        #[arg(short, long, value_enum, default_value_t = SimKind::ManualTest)]
        kind: SimKind,

        /// Telegram bot token (omit to skip real delivery)
        #[arg(short, long)]
        token: Option<String>,

        /// Existing image file to use as the "captured" photo
        #[arg(long)]
        photo: Option<PathBuf>,

        /// Fake GPS fix
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
    },

    /// Send a test alert without the alarm takeover
    TestAlert {
        /// Telegram bot token (omit to skip real delivery)
        #[arg(short, long)]
        token: Option<String>,

        /// Existing image file to use as the "captured" photo
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// Wipe all stored settings
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SimKind {
    Charger,
    Moved,
    Access,
    ManualTest,
}

impl From<SimKind> for TheftKind {
    fn from(kind: SimKind) -> Self {
        match kind {
            SimKind::Charger => TheftKind::ChargerDisconnected,
            SimKind::Moved => TheftKind::DeviceMoved,
            SimKind::Access => TheftKind::UnauthorizedAccess,
            SimKind::ManualTest => TheftKind::ManualTest,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONSOLE ADAPTERS
// ═══════════════════════════════════════════════════════════════════════════

/// Prints the device-takeover actions a phone adapter would perform
struct ConsoleDevice;

impl AlarmDevice for ConsoleDevice {
    fn alarm_volume(&self) -> u32 {
        7
    }
    fn max_alarm_volume(&self) -> u32 {
        15
    }
    fn set_alarm_volume(&self, level: u32) {
        println!("🔊 Alarm volume -> {}", level);
    }
    fn play_looping(&self, sound: &str) -> SentinelResult<()> {
        println!("🎵 Looping alarm sound: {}", sound);
        Ok(())
    }
    fn play_fallback(&self) {
        println!("🎵 Fallback system alarm sound");
    }
    fn stop_playback(&self) {
        println!("🔇 Alarm sound stopped");
    }
    fn vibrate(&self, pattern: &[u64]) {
        println!("📳 Vibrating, pattern {:?}", pattern);
    }
    fn cancel_vibration(&self) {
        println!("📳 Vibration cancelled");
    }
    fn acquire_wake_lock(&self) {
        println!("🔆 Wake lock acquired");
    }
    fn release_wake_lock(&self) {
        println!("🔅 Wake lock released");
    }
    fn show_pin_screen(&self) {
        println!("🔒 PIN screen raised - device locked down");
    }
    fn dismiss_pin_screen(&self) {
        println!("🔓 PIN screen dismissed");
    }
}

/// "Captures" a photo by handing back a copy of a prepared file
struct FileCamera {
    source: Option<PathBuf>,
}

impl Camera for FileCamera {
    fn capture_still(&self) -> SentinelResult<PathBuf> {
        let source = self.source.as_ref().ok_or_else(|| {
            phone_sentinel::SentinelError::CaptureFailure("no camera on this host".into())
        })?;
        let copy = std::env::temp_dir().join(format!(
            "sentinel_evidence_{}.jpg",
            chrono::Utc::now().timestamp_millis()
        ));
        std::fs::copy(source, &copy)?;
        Ok(copy)
    }
}

/// Fixed coordinates, or no provider at all
struct StaticLocator {
    fix: Option<GeoFix>,
}

impl Locator for StaticLocator {
    fn last_known(&self) -> Option<GeoFix> {
        self.fix.clone()
    }
    fn request_update(&self, _timeout: Duration) -> SentinelResult<GeoFix> {
        self.fix.clone().ok_or_else(|| {
            phone_sentinel::SentinelError::LocationFailure(
                "Location services are disabled".into(),
            )
        })
    }
}

struct NoopSensors;

impl SensorSource for NoopSensors {
    fn start(&self) -> SentinelResult<()> {
        Ok(())
    }
    fn stop(&self) {}
}

// ═══════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let prefs = Arc::new(Preferences::open(&cli.prefs)?);

    match cli.command {
        Commands::SetPin { pin } => {
            prefs.save_pin(&pin)?;
            println!("✅ PIN stored");
        }

        Commands::SetContact { name, chat_id } => {
            prefs.save_contact(&EmergencyContact::new(&name, &chat_id))?;
            prefs.mark_initial_setup_completed()?;
            println!("✅ Emergency contact stored: {} ({})", name, chat_id);
        }

        Commands::SetAlarm { index } => {
            if index >= ALARM_SOUNDS.len() {
                anyhow::bail!("Alarm index out of range (0-{})", ALARM_SOUNDS.len() - 1);
            }
            prefs.save_selected_alarm(index)?;
            println!("✅ Alarm sound: {}", ALARM_SOUNDS[index]);
        }

        Commands::ListAlarms => {
            println!("🔔 Bundled alarm sounds:");
            let selected = prefs.alarm_settings().selected_index;
            for (i, name) in ALARM_SOUNDS.iter().enumerate() {
                let marker = if i == selected { "▶" } else { " " };
                println!(" {} [{}] {}", marker, i, name);
            }
        }

        Commands::Status => {
            println!("📊 Phone Sentinel Status");
            println!("{:-<40}", "");
            println!("Setup complete:     {}", prefs.is_setup_complete());
            println!("PIN set:            {}", prefs.is_pin_set());
            match prefs.contact() {
                Some(contact) => {
                    println!("Contact:            {} ({})", contact.name, contact.chat_id)
                }
                None => println!("Contact:            not set"),
            }
            println!("Alarm sound:        {}", prefs.alarm_settings().sound_name());
            println!("Protection enabled: {}", prefs.protection_enabled());
        }

        Commands::Simulate {
            kind,
            token,
            photo,
            lat,
            lon,
        } => {
            simulate(prefs, kind.into(), token, photo, make_fix(lat, lon)).await?;
        }

        Commands::TestAlert { token, photo } => {
            test_alert(prefs, token, photo).await?;
        }

        Commands::Reset => {
            prefs.clear_all()?;
            println!("✅ All settings wiped");
        }
    }

    Ok(())
}

fn make_fix(lat: Option<f64>, lon: Option<f64>) -> Option<GeoFix> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Some(GeoFix::new(lat, lon, 10.0)),
        _ => None,
    }
}

fn build_stack(
    prefs: Arc<Preferences>,
    photo: Option<PathBuf>,
    fix: Option<GeoFix>,
) -> (Arc<SessionController>, mpsc::Receiver<phone_sentinel::TheftAlert>) {
    let (tx, rx) = mpsc::channel(4);
    let evidence = Arc::new(EvidenceCollector::new(
        Arc::new(FileCamera { source: photo }),
        Arc::new(StaticLocator { fix }),
        tx,
    ));
    let alarm = Arc::new(AlarmController::new(
        prefs.clone(),
        Arc::new(ConsoleDevice),
        evidence.clone(),
    ));
    let monitor = Arc::new(DetectionMonitor::new(
        prefs.clone(),
        alarm.clone(),
        Arc::new(NoopSensors),
    ));
    let session = SessionController::new(prefs, monitor, alarm, evidence)
        .expect("session init");
    (Arc::new(session), rx)
}

async fn simulate(
    prefs: Arc<Preferences>,
    kind: TheftKind,
    token: Option<String>,
    photo: Option<PathBuf>,
    fix: Option<GeoFix>,
) -> anyhow::Result<()> {
    if !prefs.is_setup_complete() {
        anyhow::bail!("Setup incomplete - set a PIN and contact first");
    }

    let (session, rx) = build_stack(prefs.clone(), photo, fix);
    let sender_task = spawn_delivery(prefs.clone(), token, rx);

    println!("🚨 Simulating theft: {}", kind.as_str());
    session.enable_protection()?;
    session.simulate_theft(kind);

    // PIN loop with the same lockout ladder the phone surface uses
    let mut counter = AttemptCounter::new();
    let stdin = std::io::stdin();
    loop {
        if let Some(remaining) = counter.block_remaining() {
            println!("⛔ Too many attempts - wait {}s", remaining.as_secs());
            tokio::time::sleep(remaining).await;
        }

        println!("Enter PIN to stop the alarm:");
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;

        if session.submit_pin(line.trim()) {
            println!("✅ Alarm stopped, protection disabled");
            break;
        }

        match counter.record_failure() {
            Some(lock) => println!("❌ Wrong PIN - locked for {}s", lock.as_secs()),
            None => println!("❌ Wrong PIN ({} attempts)", counter.failed_attempts()),
        }
    }

    // Dropping the stack closes the alert channel; the sender drains it
    drop(session);
    println!("📨 Waiting for alert delivery...");
    sender_task.await?;

    Ok(())
}

async fn test_alert(
    prefs: Arc<Preferences>,
    token: Option<String>,
    photo: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (session, rx) = build_stack(prefs.clone(), photo, None);
    let sender_task = spawn_delivery(prefs.clone(), token, rx);

    println!("🧪 Running alert test (no alarm takeover)...");
    let alert = session.test_alert().await;

    println!("Alert [{}]:", alert.id);
    println!("  kind:     {}", alert.kind.as_str());
    println!("  photo:    {:?}", alert.photo_path);
    println!("  location: {}", alert.location.replace('\n', " | "));

    drop(session);
    println!("📨 Waiting for alert delivery...");
    sender_task.await?;

    Ok(())
}

/// Real Telegram delivery when a token is given, dry-run print otherwise
fn spawn_delivery(
    prefs: Arc<Preferences>,
    token: Option<String>,
    mut rx: mpsc::Receiver<phone_sentinel::TheftAlert>,
) -> tokio::task::JoinHandle<()> {
    match token {
        Some(token) => Arc::new(TelegramSender::new(prefs, &token)).spawn(rx),
        None => tokio::spawn(async move {
            while let Some(alert) = rx.recv().await {
                println!("📨 (dry run) alert message:");
                println!(
                    "{}",
                    phone_sentinel::alert::build_message(alert.kind, Some(&alert.location))
                );
            }
        }),
    }
}
