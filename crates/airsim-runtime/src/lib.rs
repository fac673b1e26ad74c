//! Runtime layer for the AirSim control plane.
//!
//! Holds the example registry and runner, the bundled examples, and the
//! capture service that turns camera and lidar responses into files.

pub mod builtin;
pub mod capture;
pub mod frames;
pub mod points;
pub mod registry;
pub mod runner;

pub use airsim_core as core;
pub use airsim_rpc as rpc;
pub use capture::{CaptureJob, CaptureService};
pub use registry::{ExampleDescriptor, ExampleRegistry};
pub use runner::ExampleRunner;
