//! Simulator RPC layer for the AirSim control plane.
//!
//! Frames msgpack-rpc calls over TCP, defines the wire types, and owns the
//! session lifecycle ([`Connection`]) including scoped vehicle control.

pub mod client;
pub mod connection;
pub mod mock;
pub mod rpc;
pub mod types;

pub use airsim_core as core;
pub use client::{RpcClient, SimulatorApi};
pub use connection::{Connection, ControlGuard};
pub use mock::MockSimulator;
