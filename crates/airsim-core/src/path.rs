//! Dotted-path addressing for the settings document.
//!
//! A [`SettingsPath`] names one node in a JSON tree, e.g.
//! `Vehicles.Car1.Sensors.Lidar360.Enabled`. Writes through a path create any
//! missing intermediate objects but refuse to replace a node that has the
//! wrong shape.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SimError};

/// Label used in conflict errors when the document root itself is not an object.
const ROOT_LABEL: &str = "<root>";

/// A non-empty sequence of object keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPath {
    segments: Vec<String>,
}

impl SettingsPath {
    /// Build a path from individual keys.
    ///
    /// Keys are taken verbatim, so a vehicle called `"car.1"` stays a single
    /// segment. Empty keys and empty paths are rejected.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(SimError::Config("settings path must not be empty".to_string()));
        }
        if let Some(pos) = segments.iter().position(|s| s.is_empty()) {
            return Err(SimError::Config(format!(
                "settings path has an empty segment at position {}",
                pos
            )));
        }
        Ok(Self { segments })
    }

    /// The keys making up this path, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Look up the node this path names, if every segment exists.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, seg| node.as_object()?.get(seg))
    }

    /// Write `value` at this path inside `root`.
    ///
    /// Missing intermediate nodes are created as empty objects. An existing
    /// intermediate node that is not an object, or an existing terminal node
    /// that is an object or array, yields [`SimError::PathConflict`] and
    /// leaves `root` untouched apart from any objects created on the way.
    ///
    /// Returns the value previously stored at the terminal key.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<Option<Value>> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(SimError::Config("settings path must not be empty".to_string()));
        };

        let mut node = root;
        let mut holder = ROOT_LABEL;
        for seg in parents {
            let map = match node {
                Value::Object(map) => map,
                other => return Err(self.conflict(holder, other)),
            };
            if !map.contains_key(seg.as_str()) {
                debug!(path = %self, segment = %seg, "creating intermediate settings node");
            }
            node = map
                .entry(seg.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            holder = seg.as_str();
        }

        let map = match node {
            Value::Object(map) => map,
            other => return Err(self.conflict(holder, other)),
        };

        match map.get_mut(last.as_str()) {
            Some(existing) if existing.is_object() || existing.is_array() => {
                Err(self.conflict(last, existing))
            }
            Some(existing) => Ok(Some(std::mem::replace(existing, value))),
            None => {
                map.insert(last.clone(), value);
                Ok(None)
            }
        }
    }

    fn conflict(&self, segment: &str, found: &Value) -> SimError {
        SimError::PathConflict {
            path: self.to_string(),
            segment: segment.to_string(),
            found: describe_kind(found),
        }
    }
}

impl FromStr for SettingsPath {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_segments(s.split('.'))
    }
}

impl fmt::Display for SettingsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Human-readable shape of a JSON node, with its article.
fn describe_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
