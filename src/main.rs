//! Biosignal Monitor CLI
//!
//! Single-channel heartbeat monitor with a local dashboard.

use anyhow::Context;
use biosignal_monitor::{
    config::Config,
    runner::{read_report, Runner},
    sensor::{LeadOffWindow, ReplaySource, SampleSource, SyntheticConfig, SyntheticSensor},
    telemetry::{create_shared_stats, create_shared_stats_with_persistence},
    SAFETY_NOTICE, VERSION,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use statrs::statistics::Statistics;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "server")]
use biosignal_monitor::server::{self, DashboardState, ServerConfig};

#[derive(Parser)]
#[command(name = "biosignal-monitor")]
#[command(version = VERSION)]
#[command(about = "Single-channel heartbeat monitor with a local dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring a simulated bio-amplifier
    Start {
        /// Simulated heart rate in beats per minute
        #[arg(long, default_value = "72")]
        bpm: u16,

        /// Peak noise added to the simulated signal (ADC counts)
        #[arg(long, default_value = "40")]
        noise: u16,

        /// Seed for the simulated noise
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Stop after this many seconds (runs until Ctrl+C if omitted)
        #[arg(long)]
        duration: Option<u64>,

        /// Dashboard port (overrides the configuration)
        #[arg(long)]
        port: Option<u16>,

        /// Do not start the dashboard
        #[arg(long)]
        no_server: bool,

        /// Simulate electrode detachment starting at this many seconds
        #[arg(long)]
        lead_off_at: Option<f64>,

        /// Length of the simulated detachment in seconds
        #[arg(long, default_value = "2.0")]
        lead_off_for: f64,
    },

    /// Run a recorded sample file through the pipeline
    Replay {
        /// Recording with one `value[,timestamp_ms[,leads]]` row per sample
        file: PathBuf,

        /// Print every detected beat
        #[arg(long, short)]
        verbose: bool,
    },

    /// Show configuration
    Config {
        /// Overwrite the configuration file with defaults
        #[arg(long)]
        reset: bool,
    },

    /// Display the safety notice
    Notice,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            bpm,
            noise,
            seed,
            duration,
            port,
            no_server,
            lead_off_at,
            lead_off_for,
        } => lead_off_window(lead_off_at, lead_off_for).and_then(|lead_off| {
            cmd_start(StartOptions {
                bpm,
                noise,
                seed,
                duration: duration.map(Duration::from_secs),
                port,
                serve: !no_server,
                lead_off,
            })
        }),
        Commands::Replay { file, verbose } => cmd_replay(&file, verbose),
        Commands::Config { reset } => cmd_config(reset),
        Commands::Notice => {
            println!("{SAFETY_NOTICE}");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load configuration, using defaults: {e}");
            Config::default()
        }
    }
}

/// Build the simulated detachment window from CLI seconds.
fn lead_off_window(at: Option<f64>, length: f64) -> anyhow::Result<Option<LeadOffWindow>> {
    let Some(at) = at else {
        return Ok(None);
    };
    let start = Duration::try_from_secs_f64(at)
        .with_context(|| format!("invalid --lead-off-at value: {at}"))?;
    let duration = Duration::try_from_secs_f64(length)
        .with_context(|| format!("invalid --lead-off-for value: {length}"))?;
    Ok(Some(LeadOffWindow { start, duration }))
}

struct StartOptions {
    bpm: u16,
    noise: u16,
    seed: u64,
    duration: Option<Duration>,
    port: Option<u16>,
    serve: bool,
    lead_off: Option<LeadOffWindow>,
}

fn cmd_start(options: StartOptions) -> anyhow::Result<()> {
    println!("Biosignal Monitor v{VERSION}");
    println!("{SAFETY_NOTICE}");

    let mut config = load_config();
    if let Some(port) = options.port {
        config.server.port = port;
    }
    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create data directory: {e}");
    }

    println!("Starting monitor...");
    println!("  Sample rate: {} Hz", config.sampling.sample_rate_hz);
    println!("  Beat threshold: {}", config.pipeline.beat_threshold);
    println!(
        "  Windows: {} samples, filter {}, {} intervals",
        config.pipeline.sample_window, config.pipeline.filter_window, config.pipeline.interval_window
    );
    println!("  Simulated heart rate: {} BPM", options.bpm);

    let stats = create_shared_stats_with_persistence(config.data_path.join("session_stats.json"));
    let mut runner = Runner::new(&config, stats.clone());

    // Dashboard runs on its own runtime; the sampling loop stays synchronous
    #[cfg(feature = "server")]
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    #[cfg(feature = "server")]
    let shutdown = if options.serve {
        let server_config = ServerConfig::from_settings(&config.server);
        let state = Arc::new(DashboardState::new(
            &server_config,
            runner.pipeline().clone(),
            runner.report().clone(),
            stats.clone(),
            config.sampling.sample_rate_hz,
        ));
        let (addr, shutdown_tx) = runtime.block_on(server::run(server_config, state))?;
        println!("  Dashboard: http://{addr}");
        Some(shutdown_tx)
    } else {
        println!("  Dashboard: disabled");
        None
    };
    #[cfg(not(feature = "server"))]
    if options.serve {
        tracing::warn!("Dashboard unavailable (server feature not enabled at compile time)");
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut sensor = SyntheticSensor::new(SyntheticConfig {
        sampling: config.sampling.clone(),
        bpm: options.bpm,
        noise: options.noise,
        seed: options.seed,
        lead_off: options.lead_off,
        ..SyntheticConfig::default()
    });

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    sensor.start().context("failed to start sensor")?;
    let receiver = sensor.receiver().clone();
    let started = Instant::now();
    let mut last_status = Instant::now();

    while running.load(Ordering::SeqCst) {
        if let Some(limit) = options.duration {
            if started.elapsed() >= limit {
                break;
            }
        }

        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(reading) => {
                runner.handle(reading);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                tracing::error!("Sensor disconnected unexpectedly");
                break;
            }
        }

        if last_status.elapsed() >= config.monitor.status_interval {
            let snapshot = runner.pipeline().snapshot();
            let report = read_report(runner.report());
            println!(
                "[{}] HR: {:>3} BPM | quality: {:>3}% | leads: {} | {}",
                Utc::now().format("%H:%M:%S"),
                snapshot.bpm,
                snapshot.quality,
                if report.leads_connected { "on " } else { "off" },
                report.condition.description()
            );
            last_status = Instant::now();
        }
    }

    println!();
    println!("Stopping monitor...");
    sensor.stop();

    #[cfg(feature = "server")]
    if let Some(shutdown_tx) = shutdown {
        let _ = shutdown_tx.send(());
        runtime.shutdown_timeout(Duration::from_secs(1));
    }

    if let Err(e) = stats.save() {
        tracing::warn!("Could not save session stats: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_replay(file: &Path, verbose: bool) -> anyhow::Result<()> {
    let config = load_config();
    let adc = config.sampling.adc();
    let source = ReplaySource::from_path(file, &config.sampling)
        .with_context(|| format!("failed to read recording {}", file.display()))?;

    println!(
        "Replaying {} samples ({:.1} s) from {:?}",
        source.len(),
        source.duration_ms() as f64 / 1000.0,
        file
    );

    let stats = create_shared_stats();
    let mut runner = Runner::new(&config, stats.clone());
    let mut rates: Vec<f64> = Vec::new();

    for reading in source {
        let tick = runner.handle(reading);
        if let (true, Some(snapshot)) = (tick.beat, tick.snapshot) {
            rates.push(f64::from(snapshot.bpm));
            if verbose {
                println!(
                    "[{:>8} ms] beat | HR: {} BPM | quality: {}%",
                    reading.timestamp_ms, snapshot.bpm, snapshot.quality
                );
            }
        }
    }

    let (snapshot, statistics, intervals) = runner
        .pipeline()
        .with(|p| (p.snapshot(), p.statistics(), p.valid_intervals()));
    let report = read_report(runner.report());

    println!();
    println!("Replay Summary:");
    println!(
        "  Final heart rate: {} BPM (from {} intervals)",
        snapshot.bpm, intervals
    );
    println!("  Final signal quality: {}%", snapshot.quality);
    println!(
        "  Raw window mean/variance: {} ({:.3} V) / {}",
        statistics.mean,
        adc.to_voltage(statistics.mean),
        statistics.variance
    );
    println!("  Condition: {}", report.condition.description());
    if !rates.is_empty() {
        let mean = rates.iter().mean();
        let std_dev = if rates.len() > 1 {
            rates.iter().std_dev()
        } else {
            0.0
        };
        println!("  Heart rate over beats: {mean:.1} ± {std_dev:.1} BPM");
    }
    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_config(reset: bool) -> anyhow::Result<()> {
    let config = if reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults.");
        config
    } else {
        Config::load()?
    };

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_off_window_from_seconds() {
        assert_eq!(lead_off_window(None, 2.0).unwrap(), None);

        let window = lead_off_window(Some(1.5), 0.25).unwrap().unwrap();
        assert_eq!(window.start, Duration::from_millis(1500));
        assert_eq!(window.duration, Duration::from_millis(250));
    }

    #[test]
    fn test_lead_off_window_rejects_unrepresentable_values() {
        assert!(lead_off_window(Some(f64::INFINITY), 2.0).is_err());
        assert!(lead_off_window(Some(f64::NAN), 2.0).is_err());
        assert!(lead_off_window(Some(1e30), 2.0).is_err());
        assert!(lead_off_window(Some(-1.0), 2.0).is_err());
        assert!(lead_off_window(Some(1.0), f64::INFINITY).is_err());
    }
}
