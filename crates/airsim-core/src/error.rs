use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the AirSim control plane.
#[derive(Error, Debug)]
pub enum SimError {
    /// The simulator could not be reached, or a call was issued before the
    /// session was confirmed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// An example or sensor name did not resolve.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The settings document is missing, malformed, or cannot take the
    /// requested edit.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dotted settings path runs through a node that is not a mapping.
    #[error("Configuration error: path conflict at '{path}': segment '{segment}' is {found}")]
    PathConflict {
        path: String,
        segment: String,
        found: &'static str,
    },

    /// An example's entry point failed. The original message is preserved.
    #[error("Example '{name}' failed: {message}")]
    ExampleExecution { name: String, message: String },

    /// A camera or lidar acquisition failed.
    #[error("Capture error: {0}")]
    Capture(String),

    /// An RPC call failed on our side of the wire: the request could not be
    /// encoded or the result did not have the expected shape.
    #[error("RPC error in '{method}': {message}")]
    Rpc { method: String, message: String },

    /// The simulator answered a call with an error payload.
    #[error("Simulator rejected '{method}': {message}")]
    Remote { method: String, message: String },

    /// A file could not be written to disk.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed or serialized.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimError {
    /// Shorthand for an RPC failure on `method`.
    pub fn rpc(method: &str, message: impl Into<String>) -> Self {
        SimError::Rpc {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for an error payload returned by the simulator for `method`.
    pub fn remote(method: &str, message: impl Into<String>) -> Self {
        SimError::Remote {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// `true` for the settings-document class of failures.
    pub fn is_config(&self) -> bool {
        matches!(self, SimError::Config(_) | SimError::PathConflict { .. })
    }
}

/// Convenience alias used throughout the airsim crates.
pub type Result<T> = std::result::Result<T, SimError>;
