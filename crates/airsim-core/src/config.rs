use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

/// Default simulator RPC port.
pub const DEFAULT_PORT: u16 = 41451;

/// Immutable per-invocation configuration.
///
/// Built once at startup from flags and environment, then passed by
/// reference to every component. Nothing reads the environment after this.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Simulator RPC host.
    pub host: String,
    /// Simulator RPC port.
    pub port: u16,
    /// Vehicle that control and sensor calls address.
    pub vehicle: String,
    /// Resolved location of `settings.json`.
    pub settings_path: PathBuf,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Upper bound on a single RPC round trip.
    pub rpc_timeout: Duration,
    /// Pause between steps in the bundled examples.
    pub drive_step: Duration,
    /// Root directory for files the bundled examples write.
    pub examples_out: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            vehicle: "Car1".to_string(),
            settings_path: PathBuf::from("settings.json"),
            connect_timeout: Duration::from_secs(5),
            rpc_timeout: Duration::from_secs(60),
            drive_step: Duration::from_millis(3000),
            examples_out: PathBuf::from("data/examples"),
        }
    }
}

impl AppConfig {
    /// Build from parsed CLI arguments and an already-resolved settings path.
    pub fn from_cli(cli: &Cli, settings_path: PathBuf) -> Self {
        Self {
            host: cli.host.clone(),
            port: cli.port,
            vehicle: cli.car_name.clone(),
            settings_path,
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            rpc_timeout: Duration::from_secs(cli.rpc_timeout),
            drive_step: Duration::from_millis(cli.drive_step_ms),
            examples_out: cli.examples_out.clone(),
        }
    }

    /// `host:port` of the simulator.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
