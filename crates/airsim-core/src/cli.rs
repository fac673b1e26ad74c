use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::settings::{SettingsEdit, DEFAULT_LIDAR_SENSOR};

// ── Cli ────────────────────────────────────────────────────────────────────────

/// AirSim Car Simulation CLI: run examples, tweak settings, and control API.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "airsim-cli",
    about = "AirSim Car Simulation CLI: run examples, tweak settings, and control API.",
    version
)]
pub struct Cli {
    /// Simulator RPC host
    #[arg(long, global = true, env = "AIRSIM_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Simulator RPC port
    #[arg(long, global = true, env = "AIRSIM_PORT", default_value_t = 41451)]
    pub port: u16,

    /// Vehicle name used by commands that talk to a vehicle
    #[arg(long, global = true, env = "CAR_NAME", default_value = "Car1")]
    pub car_name: String,

    /// Path to the simulator's settings.json (discovered if not specified)
    #[arg(long, global = true, env = "AIRSIM_SETTINGS")]
    pub settings_file: Option<PathBuf>,

    /// Seconds to wait for the simulator to accept a connection
    #[arg(
        long,
        global = true,
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..=300)
    )]
    pub connect_timeout: u64,

    /// Seconds to wait for a single RPC reply
    #[arg(
        long,
        global = true,
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    pub rpc_timeout: u64,

    /// Pause between steps in the bundled examples, in milliseconds
    #[arg(long, global = true, default_value = "3000")]
    pub drive_step_ms: u64,

    /// Directory the bundled examples write their output under
    #[arg(long, global = true, default_value = "data/examples")]
    pub examples_out: PathBuf,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AIRSIM_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

// ── Command ────────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List available examples with a short description
    Examples,

    /// Show detailed description and path for an example
    Describe {
        /// Example name, e.g. hello_car
        name: String,
    },

    /// Run an example by name and optionally yield control back to the simulator
    Run {
        /// Example name, e.g. hello_car
        name: String,

        /// Release API control of the vehicle after the example finishes
        #[arg(long)]
        yield_control: bool,
    },

    /// View and tweak settings.json
    Settings(SettingsArgs),

    /// Capture scene images from a camera and save PNGs
    CaptureImages(CaptureImagesArgs),

    /// Grab a single lidar scan and dump it to CSV
    LidarDump(LidarDumpArgs),

    /// Yield control back to keyboard for the configured car
    YieldControl,
}

// ── settings ───────────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Print the (possibly modified) settings document
    #[arg(long)]
    pub show: bool,

    /// Set SimMode (e.g. Car, ComputerVision)
    #[arg(long)]
    pub sim_mode: Option<String>,

    /// Vehicle key under Vehicles to modify (defaults to --car-name)
    #[arg(long)]
    pub vehicle: Option<String>,

    /// Sensor key under the vehicle's Sensors that the lidar flags modify
    #[arg(long, default_value = DEFAULT_LIDAR_SENSOR)]
    pub lidar_sensor: String,

    /// Enable the lidar sensor
    #[arg(long, conflicts_with = "disable_lidar")]
    pub enable_lidar: bool,

    /// Disable the lidar sensor
    #[arg(long)]
    pub disable_lidar: bool,

    /// Lidar points per second
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub lidar_pps: Option<u64>,

    /// Write changes to the settings file
    #[arg(long)]
    pub save: bool,
}

impl SettingsArgs {
    /// Tri-state lidar flag: `Some(true)` / `Some(false)` when one of the
    /// flags was given, `None` otherwise.
    pub fn lidar_enabled(&self) -> Option<bool> {
        match (self.enable_lidar, self.disable_lidar) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }

    /// Translate the flags into a [`SettingsEdit`], falling back to
    /// `default_vehicle` when `--vehicle` was not given.
    pub fn to_edit(&self, default_vehicle: &str) -> SettingsEdit {
        SettingsEdit {
            sim_mode: self.sim_mode.clone(),
            vehicle: self
                .vehicle
                .clone()
                .unwrap_or_else(|| default_vehicle.to_string()),
            sensor: self.lidar_sensor.clone(),
            lidar_enabled: self.lidar_enabled(),
            lidar_points_per_second: self.lidar_pps,
        }
    }
}

// ── capture-images ─────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct CaptureImagesArgs {
    /// Camera name or index as string
    #[arg(long, default_value = "0")]
    pub camera: String,

    /// Number of frames to capture
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// Seconds between captures
    #[arg(long, default_value = "0.5", value_parser = parse_interval)]
    pub interval: f64,

    /// Output directory
    #[arg(long, default_value = "data/images")]
    pub out_dir: PathBuf,
}

// ── lidar-dump ─────────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct LidarDumpArgs {
    /// Lidar sensor name as configured in settings.json
    #[arg(long, default_value = DEFAULT_LIDAR_SENSOR)]
    pub sensor_name: String,

    /// CSV output file
    #[arg(long, default_value = "data/lidar/points.csv")]
    pub out_file: PathBuf,
}

/// Accept finite, non-negative seconds.
fn parse_interval(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", raw))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("interval must be >= 0 seconds, got {}", raw));
    }
    Ok(secs)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn test_cli_default_values() {
        let cli = parse(&["airsim-cli", "examples"]);
        assert_eq!(cli.port, 41451);
        assert_eq!(cli.connect_timeout, 5);
        assert_eq!(cli.rpc_timeout, 60);
        assert_eq!(cli.drive_step_ms, 3000);
        assert!(cli.settings_file.is_none());
        assert_eq!(cli.examples_out, PathBuf::from("data/examples"));
        assert!(matches!(cli.command, Command::Examples));
    }

    #[test]
    fn test_cli_run_with_yield_and_car_name() {
        let cli = parse(&[
            "airsim-cli",
            "run",
            "hello_car",
            "--yield-control",
            "--car-name",
            "Car7",
        ]);
        assert_eq!(cli.car_name, "Car7");
        match cli.command {
            Command::Run { name, yield_control } => {
                assert_eq!(name, "hello_car");
                assert!(yield_control);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_describe_requires_name() {
        assert!(Cli::try_parse_from(["airsim-cli", "describe"]).is_err());
    }

    #[test]
    fn test_cli_settings_flags() {
        let cli = parse(&[
            "airsim-cli",
            "settings",
            "--sim-mode",
            "Car",
            "--vehicle",
            "Car2",
            "--disable-lidar",
            "--lidar-pps",
            "20000",
            "--save",
        ]);
        let Command::Settings(args) = cli.command else {
            panic!("expected settings command");
        };
        assert!(args.save);
        assert!(!args.show);
        assert_eq!(args.lidar_enabled(), Some(false));

        let edit = args.to_edit("Car1");
        assert_eq!(edit.vehicle, "Car2");
        assert_eq!(edit.sensor, "Lidar360");
        assert_eq!(edit.sim_mode.as_deref(), Some("Car"));
        assert_eq!(edit.lidar_points_per_second, Some(20_000));
        assert!(edit.has_mutations());
    }

    #[test]
    fn test_cli_settings_vehicle_defaults_to_car_name() {
        let cli = parse(&["airsim-cli", "--car-name", "Rover", "settings", "--enable-lidar"]);
        let Command::Settings(args) = cli.command else {
            panic!("expected settings command");
        };
        assert_eq!(args.to_edit(&cli.car_name).vehicle, "Rover");
    }

    #[test]
    fn test_cli_settings_conflicting_lidar_flags() {
        assert!(Cli::try_parse_from([
            "airsim-cli",
            "settings",
            "--enable-lidar",
            "--disable-lidar"
        ])
        .is_err());
    }

    #[test]
    fn test_cli_settings_rejects_zero_pps() {
        assert!(Cli::try_parse_from(["airsim-cli", "settings", "--lidar-pps", "0"]).is_err());
    }

    #[test]
    fn test_cli_capture_images_defaults() {
        let cli = parse(&["airsim-cli", "capture-images"]);
        let Command::CaptureImages(args) = cli.command else {
            panic!("expected capture-images command");
        };
        assert_eq!(args.camera, "0");
        assert_eq!(args.count, 10);
        assert!((args.interval - 0.5).abs() < f64::EPSILON);
        assert_eq!(args.out_dir, PathBuf::from("data/images"));
    }

    #[test]
    fn test_cli_capture_images_validation() {
        assert!(Cli::try_parse_from(["airsim-cli", "capture-images", "--count", "0"]).is_err());
        assert!(
            Cli::try_parse_from(["airsim-cli", "capture-images", "--interval", "-1"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["airsim-cli", "capture-images", "--interval", "0"]).is_ok()
        );
    }

    #[test]
    fn test_cli_lidar_dump_defaults() {
        let cli = parse(&["airsim-cli", "lidar-dump"]);
        let Command::LidarDump(args) = cli.command else {
            panic!("expected lidar-dump command");
        };
        assert_eq!(args.sensor_name, "Lidar360");
        assert_eq!(args.out_file, PathBuf::from("data/lidar/points.csv"));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1.5"), Ok(1.5));
        assert!(parse_interval("abc").is_err());
        assert!(parse_interval("NaN").is_err());
    }
}
