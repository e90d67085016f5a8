//! # Trak Motion Binary
//!
//! Runs one motion command against the simulated platform and prints the
//! result and the console messages it produced as JSON.
//!
//! # Usage
//!
//! ```bash
//! # Drive forward 10 mm at 600 mm/min (clamped to $110/$111)
//! trak_motion drive --direction forward --distance 10 --feed 600
//!
//! # Lower the tool head 2 mm
//! trak_motion depth --distance 2 --feed 100
//!
//! # Home Z, verbose JSON logs
//! trak_motion -v --json home
//!
//! # Edit machine settings
//! trak_motion --config trak.toml settings set '$100' 80
//! ```

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;
use trak_common::command::{DepthRequest, DirectionCode, DriveRequest, SpindleRequest};
use trak_common::config::{ConfigLoader, LogLevel, ServiceConfig};
use trak_common::console::ConsoleMessage;
use trak_common::settings::{self, FileBackend, SettingKey, SettingsStore};
use trak_hal::SimulatedHardware;
use trak_motion::console::{BestEffort, ChannelConsole};
use trak_motion::{Command, Machine};

/// Trak Motion - motion coordinator for a tracked platform with a Z tool head
#[derive(Parser, Debug)]
#[command(name = "trak_motion")]
#[command(version)]
#[command(about = "Motion coordinator and Z homing for a tracked platform")]
#[command(long_about = None)]
struct Args {
    /// Path to the service configuration (trak.toml). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Tank-drive both tracks
    Drive {
        /// Direction code 0-7 or name (forward, turnLeft, ...)
        #[arg(short, long)]
        direction: DirectionCode,
        /// Travel [mm]
        #[arg(long)]
        distance: f64,
        /// Feed [mm/min]
        #[arg(long)]
        feed: f64,
    },
    /// Move the Z tool head (positive is down)
    Depth {
        /// Travel [mm]
        #[arg(long, allow_negative_numbers = true)]
        distance: f64,
        /// Feed [mm/min]
        #[arg(long)]
        feed: f64,
    },
    /// Run the Z homing sequence
    Home,
    /// Print machine status
    Status,
    /// Emergency stop
    Estop,
    /// Switch the spindle and/or set its speed
    Spindle {
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
        /// Speed in percent of the $31..$30 RPM range
        #[arg(long)]
        percent: Option<f64>,
    },
    /// Inspect or edit the $n machine settings
    Settings {
        #[command(subcommand)]
        action: SettingsCmd,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCmd {
    /// List every setting
    List,
    /// Show one setting ($n or n)
    Get { key: SettingKey },
    /// Set one setting
    Set {
        key: SettingKey,
        #[arg(allow_negative_numbers = true)]
        value: String,
    },
    /// Restore every default
    Reset,
}

impl Cmd {
    fn into_command(self) -> Command {
        match self {
            Cmd::Drive {
                direction,
                distance,
                feed,
            } => Command::Drive(DriveRequest {
                direction,
                speed: feed,
                step: distance,
            }),
            Cmd::Depth { distance, feed } => Command::Depth(DepthRequest {
                speed: feed,
                step: distance,
            }),
            Cmd::Home => Command::Home,
            Cmd::Status => Command::Status,
            Cmd::Estop => Command::EmergencyStop,
            Cmd::Spindle { on, off, percent } => Command::Spindle(SpindleRequest {
                enable: if on {
                    Some(true)
                } else if off {
                    Some(false)
                } else {
                    None
                },
                speed: percent,
            }),
            Cmd::Settings { action } => match action {
                SettingsCmd::List => Command::ListSettings,
                SettingsCmd::Get { key } => Command::GetSetting(key),
                SettingsCmd::Set { key, value } => Command::SetSetting { key, value },
                SettingsCmd::Reset => Command::ResetSettings,
            },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("FATAL: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    setup_tracing(&args, config.shared.log_level);
    config.validate()?;

    info!(
        "{} v{} starting",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION")
    );

    let store = SettingsStore::open(FileBackend::open(&config.settings.path)?)?;
    let shared_settings = settings::shared(store);

    let hardware = SimulatedHardware::new(&config.pins, &config.simulation);
    let (console, console_rx) = ChannelConsole::bounded(config.console.capacity);
    let mut machine = Machine::new(
        shared_settings,
        hardware.into(),
        config.homing.clone(),
        BestEffort::new(console),
    );

    let result = machine.execute(args.command.into_command());
    let messages = drain(&console_rx);

    let output = match &result {
        Ok(response) => json!({ "ok": true, "response": response, "console": messages }),
        Err(e) => json!({
            "ok": false,
            "error": e.to_string(),
            "clientError": e.is_client_error(),
            "console": messages,
        }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    result?;
    Ok(())
}

fn drain(rx: &Receiver<ConsoleMessage>) -> Vec<ConsoleMessage> {
    rx.try_iter().collect()
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
