use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name the simulator reads its configuration from.
const SETTINGS_FILE_NAME: &str = "settings.json";

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive and
/// may be a bare level or a full directive such as `airsim_rpc=debug`. Falls
/// back to `"info"` if it does not parse. Output goes to stderr so stdout
/// carries only command output.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let lower = log_level.to_lowercase();
    let normalised = match lower.as_str() {
        "warning" => "warn",
        "critical" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Settings-path discovery ────────────────────────────────────────────────────

/// Resolve the settings file for this invocation.
///
/// An explicit path wins. Otherwise `./settings.json` is used when present,
/// then `<Documents>/AirSim/settings.json` when present, and finally
/// `./settings.json` as the default location to create.
pub fn resolve_settings_path(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    discover_settings_path(explicit, &cwd, dirs::document_dir().as_deref())
}

fn discover_settings_path(
    explicit: Option<&Path>,
    cwd: &Path,
    documents: Option<&Path>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = cwd.join(SETTINGS_FILE_NAME);
    let candidates = [
        Some(local.clone()),
        documents.map(|d| d.join("AirSim").join(SETTINGS_FILE_NAME)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find(|p| p.is_file())
        .unwrap_or(local)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
