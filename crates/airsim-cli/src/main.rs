mod bootstrap;
mod commands;

use anyhow::Result;
use clap::Parser;

use airsim_core::cli::{Cli, Command};
use airsim_core::AppConfig;
use airsim_runtime::ExampleRegistry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    bootstrap::setup_logging(&cli.log_level)?;
    tracing::debug!("airsim-cli v{} starting", env!("CARGO_PKG_VERSION"));

    let settings_path = bootstrap::resolve_settings_path(cli.settings_file.as_deref());
    let config = AppConfig::from_cli(&cli, settings_path);
    tracing::debug!(
        address = %config.address(),
        vehicle = %config.vehicle,
        settings = %config.settings_path.display(),
        "configuration resolved"
    );

    let registry = ExampleRegistry::builtin();
    let mut out = std::io::stdout().lock();

    match &cli.command {
        Command::Examples => commands::list_examples(&registry, &mut out),
        Command::Describe { name } => commands::describe_example(&registry, name, &mut out),
        Command::Run {
            name,
            yield_control,
        } => commands::run_example(&config, &registry, name, *yield_control),
        Command::Settings(args) => commands::settings(&config, args, &mut out),
        Command::CaptureImages(args) => commands::capture_images(&config, args, &mut out),
        Command::LidarDump(args) => commands::lidar_dump(&config, args, &mut out),
        Command::YieldControl => commands::yield_control(&config, &mut out),
    }
}
