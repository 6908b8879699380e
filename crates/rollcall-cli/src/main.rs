//! Rollcall CLI
//!
//! Main entry point for the attendance station.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rollcall_directory::{Credentials, FirestoreDirectory};
use rollcall_hardware::{IndicatorLight, LightDriver, LineTagReader, LogLight, TagReader};
use rollcall_station::{
    probe_until, Config, IndicatorBackend, ProbeReading, SessionSummary, Station, StationError,
};
use tracing_subscriber::EnvFilter;

/// Rollcall - RFID Attendance Station
///
/// Reads student tags, looks the student up, draws a course, and records
/// attendance in the remote store. Results are shown on a tri-color light.
#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: rollcall.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,

    /// Print every tag the reader sees without touching the remote store
    #[arg(long)]
    probe: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Rollcall starting");
    tracing::debug!(config = ?args.config, probe = args.probe, "Arguments");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads the configuration, wires the backends, and runs the station (or
/// the probe) until interrupted.
async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print_config(&config);

    if args.probe {
        let light = IndicatorLight::acquire(open_indicator(&config)?)?;
        let mut reader = open_reader(&config).await?;
        println!();
        println!("Probe mode: present tags to the reader, Ctrl+C to stop");
        let seen = probe_until(light, &mut reader, shutdown_signal(), print_reading).await?;
        println!("Probe stopped after {seen} tag(s)");
        return Ok(());
    }

    // The directory is set up first so a bad credentials file fails before
    // the indicator is claimed.
    let directory = connect_directory(&config)?;
    let light = IndicatorLight::acquire(open_indicator(&config)?)?;
    let reader = open_reader(&config).await?;

    let station = Station::new(light, reader, directory, &config);
    let summary = station.run_until(shutdown_signal()).await?;

    print_summary(&summary);
    Ok(())
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Ok(Config::load_from_file(path)?)
        }
        None => Ok(Config::load()?),
    }
}

/// Opens the configured indicator backend.
fn open_indicator(config: &Config) -> Result<Box<dyn LightDriver>, StationError> {
    tracing::info!(backend = config.indicator.as_str(), "Opening indicator");
    match config.indicator {
        IndicatorBackend::Log => Ok(Box::new(LogLight::new())),
        IndicatorBackend::Gpio => open_gpio(config),
    }
}

#[cfg(feature = "rpi")]
fn open_gpio(config: &Config) -> Result<Box<dyn LightDriver>, StationError> {
    Ok(Box::new(rollcall_hardware::GpioLight::open(config.pins)?))
}

#[cfg(not(feature = "rpi"))]
fn open_gpio(_config: &Config) -> Result<Box<dyn LightDriver>, StationError> {
    Err(StationError::indicator_unavailable(
        IndicatorBackend::Gpio.as_str(),
    ))
}

/// Opens the reader device, or standard input when none is configured.
async fn open_reader(config: &Config) -> Result<Box<dyn TagReader>, StationError> {
    match &config.reader.device {
        Some(device) => {
            tracing::info!(device = %device.display(), "Opening tag reader");
            Ok(Box::new(LineTagReader::open(device).await?))
        }
        None => {
            tracing::info!("Reading tags from standard input");
            Ok(Box::new(LineTagReader::stdin()?))
        }
    }
}

/// Loads the credentials and builds the Firestore client.
fn connect_directory(config: &Config) -> Result<FirestoreDirectory, StationError> {
    let credentials = Credentials::load(&config.credentials_path)?;
    tracing::info!(
        project = %credentials.project_id,
        database = %credentials.database_id,
        "Credentials loaded"
    );
    Ok(FirestoreDirectory::new(
        credentials,
        config.service_timeout(),
    )?)
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Credentials: {}", config.credentials_path.display());
    println!("  Courses: {}", config.courses.join(", "));
    println!("  Armed delay: {}ms", config.armed_delay_ms);
    println!("  Service timeout: {}ms", config.service_timeout_ms);
    println!("  Retry attempts: {}", config.retry.max_attempts);
    println!("  Indicator: {}", config.indicator.as_str());
    match &config.reader.device {
        Some(device) => println!("  Reader: {}", device.display()),
        None => println!("  Reader: stdin"),
    }
}

/// Prints one probe reading.
fn print_reading(reading: &ProbeReading) {
    match (&reading.student_id, reading.rejection) {
        (Some(id), _) => println!("{:?}  valid, student {id}", reading.payload),
        (None, Some(reason)) => println!("{:?}  invalid: {reason}", reading.payload),
        (None, None) => println!("{:?}", reading.payload),
    }
}

/// Prints the session counts.
fn print_summary(summary: &SessionSummary) {
    println!("=== Rollcall Session Summary ===");
    println!("Scans: {}", summary.scans());
    println!("Recorded: {}", summary.recorded);
    println!("Invalid tags: {}", summary.invalid);
    println!("Unknown students: {}", summary.student_not_found);
    println!("No professor for course: {}", summary.professor_not_found);
    println!("Directory faults: {}", summary.faults);
}
