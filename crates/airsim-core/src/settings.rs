//! The simulator's `settings.json` document.
//!
//! [`SettingsStore`] owns the file on disk; [`SettingsDocument`] is the
//! in-memory tree it loads and saves; [`SettingsEdit`] is the set of
//! mutations the `settings` command knows how to make.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::path::SettingsPath;

/// Sensor key the lidar flags target when none is given.
pub const DEFAULT_LIDAR_SENSOR: &str = "Lidar360";

// ── SettingsDocument ──────────────────────────────────────────────────────────

/// A JSON object tree addressed by [`SettingsPath`]s.
///
/// Key order is preserved from the source text, so a load → patch → save
/// cycle only changes the keys that were patched.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    root: Value,
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl SettingsDocument {
    /// An empty `{}` document.
    pub fn empty() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Parse settings text. The root must be a JSON object.
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| SimError::Config(format!("malformed settings document: {}", e)))?;
        Self::from_value(root)
    }

    /// Wrap an existing value, rejecting anything that is not an object.
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(SimError::Config(
                "settings document root must be a JSON object".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// The node at `path`, if present.
    pub fn get(&self, path: &SettingsPath) -> Option<&Value> {
        path.get(&self.root)
    }

    /// Set the leaf at `path`, creating intermediate objects as needed.
    ///
    /// Returns `true` when the stored value actually changed.
    pub fn patch(&mut self, path: &SettingsPath, value: Value) -> Result<bool> {
        let previous = path.set(&mut self.root, value.clone())?;
        let changed = previous.as_ref() != Some(&value);
        debug!(%path, changed, "patched settings value");
        Ok(changed)
    }

    /// Render the document as 2-space indented JSON.
    pub fn show(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_default()
    }

    /// Borrow the underlying tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// `true` when the document has no keys at all.
    pub fn is_empty(&self) -> bool {
        self.root.as_object().map(Map::is_empty).unwrap_or(true)
    }
}

// ── SettingsStore ─────────────────────────────────────────────────────────────

/// Loads and atomically persists a settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the settings file.
    ///
    /// A missing file yields an empty document only when `allow_missing` is
    /// set (a read-only invocation); otherwise it is a [`SimError::Config`].
    pub fn load(&self, allow_missing: bool) -> Result<SettingsDocument> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if allow_missing {
                    warn!("settings file not found at {}", self.path.display());
                    return Ok(SettingsDocument::empty());
                }
                return Err(SimError::Config(format!(
                    "settings file not found at {}",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(SimError::Config(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        SettingsDocument::parse(&text).map_err(|e| match e {
            SimError::Config(msg) => {
                SimError::Config(format!("{} ({})", msg, self.path.display()))
            }
            other => other,
        })
    }

    /// Atomically replace the settings file with `doc`.
    ///
    /// The document is written to a temporary file in the same directory,
    /// synced, then renamed over the target.
    pub fn save(&self, doc: &SettingsDocument) -> Result<()> {
        let mut rendered = doc.show();
        rendered.push('\n');
        self.write_atomic(|file| file.write_all(rendered.as_bytes()))?;
        info!("saved settings to {}", self.path.display());
        Ok(())
    }

    fn write_atomic<F>(&self, write: F) -> Result<()>
    where
        F: FnOnce(&mut std::fs::File) -> std::io::Result<()>,
    {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_err = |source: std::io::Error| SimError::FileWrite {
            path: self.path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(file_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(file_err)?;

        // Dropping `tmp` on any early return removes the partial file.
        write(tmp.as_file_mut()).map_err(file_err)?;
        tmp.as_file().sync_all().map_err(file_err)?;
        tmp.persist(&self.path).map_err(|e| file_err(e.error))?;

        Ok(())
    }
}

// ── SettingsEdit ──────────────────────────────────────────────────────────────

/// The mutations the `settings` command can apply.
#[derive(Debug, Clone, Default)]
pub struct SettingsEdit {
    /// New top-level `SimMode`.
    pub sim_mode: Option<String>,
    /// Key under `Vehicles` the sensor edits target.
    pub vehicle: String,
    /// Key under `Vehicles.<vehicle>.Sensors` the lidar edits target.
    pub sensor: String,
    /// New `Enabled` flag for the sensor.
    pub lidar_enabled: Option<bool>,
    /// New `PointsPerSecond` for the sensor (positive).
    pub lidar_points_per_second: Option<u64>,
}

impl SettingsEdit {
    /// `true` when at least one flag maps to a mutation target.
    pub fn has_mutations(&self) -> bool {
        self.sim_mode.as_deref().is_some_and(|m| !m.is_empty())
            || self.lidar_enabled.is_some()
            || self.lidar_points_per_second.is_some()
    }

    /// Path of `Vehicles.<vehicle>.Sensors.<sensor>.<field>`.
    pub fn sensor_path(&self, field: &str) -> Result<SettingsPath> {
        SettingsPath::from_segments([
            "Vehicles",
            self.vehicle.as_str(),
            "Sensors",
            self.sensor.as_str(),
            field,
        ])
    }

    /// Apply every requested mutation to `doc` in memory.
    ///
    /// Returns the number of values that actually changed; setting a key to
    /// the value it already holds does not count. Nothing is persisted.
    pub fn apply(&self, doc: &mut SettingsDocument) -> Result<usize> {
        let mut applied = 0;

        if let Some(mode) = self.sim_mode.as_deref().filter(|m| !m.is_empty()) {
            let path = SettingsPath::from_segments(["SimMode"])?;
            applied += usize::from(doc.patch(&path, Value::from(mode))?);
        }

        if let Some(enabled) = self.lidar_enabled {
            let path = self.sensor_path("Enabled")?;
            applied += usize::from(doc.patch(&path, Value::Bool(enabled))?);
        }

        if let Some(pps) = self.lidar_points_per_second {
            if pps == 0 {
                return Err(SimError::Config(
                    "PointsPerSecond must be a positive integer".to_string(),
                ));
            }
            let path = self.sensor_path("PointsPerSecond")?;
            applied += usize::from(doc.patch(&path, Value::from(pps))?);
        }

        Ok(applied)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
