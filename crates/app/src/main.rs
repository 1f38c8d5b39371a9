use std::{
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use ar_dancer_core::{
    channel, AppConfig, ArDancerError, AssetStore, AudioInput, AudioLevelMonitor,
    CharacterAssets, EventSender, FixedHitTester, PlaneCenter, PlaneExtent, RecordingScene,
    SceneProbe, ScreenPoint, Session, SignalInput, StreamFormat, Ticker, Vec3,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> ar_dancer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            config,
            seconds,
            tick_ms,
            voice_at,
            live_mic,
            mic_device,
        } => {
            let source = if live_mic {
                MicSource::Live(mic_device)
            } else {
                MicSource::Scripted(voice_at)
            };
            run_simulate(config.as_deref(), seconds, tick_ms, source)
        }
        Commands::Config { output } => run_config(output.as_deref()),
    };

    if let Err(err) = &result {
        tracing::error!(%err, fatal = err.is_fatal(), "ar-dancer terminated");
    }
    result
}

fn load_config(path: Option<&Path>) -> ar_dancer_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

/// Where the session hears its loudness from.
#[derive(Debug)]
enum MicSource {
    /// Synthetic speech bursts at the given offsets in seconds.
    Scripted(Vec<f32>),
    /// A host input device, optionally picked by name.
    Live(Option<String>),
}

const LANDING_POINT: Vec3 = Vec3::new(0.0, -1.0, -1.5);

fn run_simulate(
    config_path: Option<&Path>,
    seconds: f32,
    tick_ms: Option<u64>,
    source: MicSource,
) -> ar_dancer_core::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(tick_ms) = tick_ms {
        config.character.tick_interval_ms = tick_ms;
    }
    config.validate()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ArDancerError::InvalidInput("duration must be a non-negative number"));
    }

    let tick_interval = config.character.tick_interval();
    tracing::info!(seconds, ?tick_interval, ?source, "starting simulated session");

    let format = StreamFormat::from(&config.audio);
    let microphone: Box<dyn AudioInput> = match source {
        MicSource::Scripted(voice_at) => {
            // Speech bursts outlast a tick so at least one tick observes them.
            let burst_seconds = tick_interval.as_secs_f32() * 1.5;
            Box::new(SignalInput::with_bursts(format, &voice_at, burst_seconds))
        }
        MicSource::Live(device) => live_microphone(format, device)?,
    };
    let mut monitor = AudioLevelMonitor::new(&config.audio);
    let level = monitor.start(microphone)?;

    let scene = RecordingScene::new(AssetStore::from_config(&config.assets));
    let probe = scene.probe();
    probe.set_viewer_yaw(Some(0.0))?;

    let session = Session::new(
        &config.character,
        CharacterAssets::new(&config.assets),
        Box::new(scene),
        Box::new(FixedHitTester::hitting(LANDING_POINT)),
        level,
    );

    let (events, queue) = channel();
    let consumer = thread::Builder::new()
        .name("session".to_string())
        .spawn(move || session.run(queue))?;
    let mut ticker = Ticker::spawn(events.clone(), tick_interval)?;

    let scripted = drive_runtime(&events, &probe, seconds);

    ticker.stop()?;
    // The consumer may already have aborted; its error takes precedence below.
    let _ = events.shutdown();
    drop(events);

    let report = consumer
        .join()
        .map_err(|_| ArDancerError::msg("session thread panicked"))??;
    scripted?;
    monitor.stop()?;

    tracing::info!(
        ticks = report.ticks,
        transitions = report.transitions.len(),
        scene_commands = probe.commands()?.len(),
        "simulated session complete"
    );
    println!("{}", report.to_json_pretty()?);
    Ok(())
}

#[cfg(feature = "microphone")]
fn live_microphone(
    format: StreamFormat,
    device: Option<String>,
) -> ar_dancer_core::Result<Box<dyn AudioInput>> {
    use ar_dancer_core::MicrophoneInput;

    Ok(match device {
        Some(query) => Box::new(MicrophoneInput::with_device(format, query)),
        None => Box::new(MicrophoneInput::new(format)),
    })
}

#[cfg(not(feature = "microphone"))]
fn live_microphone(
    _format: StreamFormat,
    _device: Option<String>,
) -> ar_dancer_core::Result<Box<dyn AudioInput>> {
    Err(ArDancerError::audio(
        "built without microphone support; rebuild with `--features microphone`",
    ))
}

/// Stand-in for the AR runtime: one floor plane that grows once, a tap on it,
/// and the character landing shortly after. The viewer then slowly walks
/// around the character.
fn drive_runtime(events: &EventSender, probe: &SceneProbe, seconds: f32) -> ar_dancer_core::Result<()> {
    events.plane_detected(
        "floor",
        PlaneExtent::new(1.0, 1.0),
        PlaneCenter::new(0.0, 0.0),
    )?;
    thread::sleep(Duration::from_millis(100));
    events.plane_updated(
        "floor",
        PlaneExtent::new(2.0, 1.5),
        PlaneCenter::new(0.1, 0.2),
    )?;
    events.tap(ScreenPoint::new(195.0, 422.0))?;
    thread::sleep(Duration::from_millis(300));
    probe.set_character_position(Some(LANDING_POINT))?;
    events.contact()?;

    let started = Instant::now();
    let run_for = Duration::from_secs_f32(seconds);
    while started.elapsed() < run_for {
        let yaw = (started.elapsed().as_secs_f32() * 0.2) % std::f32::consts::TAU;
        probe.set_viewer_yaw(Some(yaw))?;
        thread::sleep(Duration::from_millis(250));
    }
    Ok(())
}

fn run_config(output: Option<&Path>) -> ar_dancer_core::Result<()> {
    let rendered = AppConfig::default().to_json_pretty()?;
    match output {
        Some(path) => {
            tracing::info!(?path, "writing default configuration");
            std::fs::write(path, rendered)?;
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Augmented-reality dancing character demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted session against a synthetic AR runtime and a scripted or
    /// live microphone.
    Simulate {
        /// JSON configuration file; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How long to keep the session running after the character lands.
        #[arg(short, long, default_value_t = 12.0)]
        seconds: f32,
        /// Override the character tick period in milliseconds.
        #[arg(long)]
        tick_ms: Option<u64>,
        /// Offsets in seconds at which someone starts talking.
        #[arg(long = "voice-at", value_delimiter = ',', conflicts_with = "live_mic")]
        voice_at: Vec<f32>,
        /// Listen to a real input device instead of scripted speech.
        #[arg(long)]
        live_mic: bool,
        /// Substring of the input device name; the default device otherwise.
        #[arg(long, requires = "live_mic")]
        mic_device: Option<String>,
    },
    /// Print or write the default configuration as JSON.
    Config {
        /// Output path; prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
