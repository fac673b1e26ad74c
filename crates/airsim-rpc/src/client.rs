//! The simulator API surface the control plane relies on.

use std::time::Duration;

use airsim_core::error::Result;

use crate::rpc::RpcTransport;
use crate::types::{CarControls, CarState, ImageRequest, ImageResponse, LidarData};

/// Positional parameters for calls that take none.
const NO_PARAMS: [u8; 0] = [];

/// Vehicle control and sensor calls exposed by the simulator.
///
/// [`RpcClient`] talks to a live simulator; [`crate::mock::MockSimulator`]
/// stands in for it in tests.
pub trait SimulatorApi {
    /// Liveness check.
    fn ping(&mut self) -> Result<bool>;

    /// Server protocol version.
    fn server_version(&mut self) -> Result<i32>;

    /// Grant (`true`) or give up (`false`) API control of `vehicle`.
    fn enable_api_control(&mut self, enabled: bool, vehicle: &str) -> Result<()>;

    fn is_api_control_enabled(&mut self, vehicle: &str) -> Result<bool>;

    /// Return every vehicle to its starting pose.
    fn reset(&mut self) -> Result<()>;

    fn car_state(&mut self, vehicle: &str) -> Result<CarState>;

    fn set_car_controls(&mut self, controls: &CarControls, vehicle: &str) -> Result<()>;

    /// One response per request, in request order.
    fn sim_get_images(
        &mut self,
        requests: &[ImageRequest],
        vehicle: &str,
    ) -> Result<Vec<ImageResponse>>;

    fn lidar_data(&mut self, sensor: &str, vehicle: &str) -> Result<LidarData>;
}

/// [`SimulatorApi`] over msgpack-rpc.
pub struct RpcClient {
    rpc: RpcTransport,
}

impl RpcClient {
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        rpc_timeout: Duration,
    ) -> Result<Self> {
        let rpc = RpcTransport::connect(host, port, connect_timeout, rpc_timeout)?;
        Ok(Self { rpc })
    }
}

impl SimulatorApi for RpcClient {
    fn ping(&mut self) -> Result<bool> {
        self.rpc.call("ping", &NO_PARAMS)
    }

    fn server_version(&mut self) -> Result<i32> {
        self.rpc.call("getServerVersion", &NO_PARAMS)
    }

    fn enable_api_control(&mut self, enabled: bool, vehicle: &str) -> Result<()> {
        self.rpc.call("enableApiControl", &(enabled, vehicle))
    }

    fn is_api_control_enabled(&mut self, vehicle: &str) -> Result<bool> {
        self.rpc.call("isApiControlEnabled", &(vehicle,))
    }

    fn reset(&mut self) -> Result<()> {
        self.rpc.call("reset", &NO_PARAMS)
    }

    fn car_state(&mut self, vehicle: &str) -> Result<CarState> {
        self.rpc.call("getCarState", &(vehicle,))
    }

    fn set_car_controls(&mut self, controls: &CarControls, vehicle: &str) -> Result<()> {
        self.rpc.call("setCarControls", &(controls, vehicle))
    }

    fn sim_get_images(
        &mut self,
        requests: &[ImageRequest],
        vehicle: &str,
    ) -> Result<Vec<ImageResponse>> {
        // Third argument selects external cameras; ours live on the vehicle.
        self.rpc.call("simGetImages", &(requests, vehicle, false))
    }

    fn lidar_data(&mut self, sensor: &str, vehicle: &str) -> Result<LidarData> {
        self.rpc.call("getLidarData", &(sensor, vehicle))
    }
}
