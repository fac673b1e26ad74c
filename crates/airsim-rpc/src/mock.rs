//! In-memory simulator for tests and offline runs.
//!
//! Clones share state, so a test can hand one clone to a [`Connection`]
//! and inspect recorded calls through another.
//!
//! [`Connection`]: crate::connection::Connection

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use airsim_core::error::{Result, SimError};

use crate::client::SimulatorApi;
use crate::types::{CarControls, CarState, ImageRequest, ImageResponse, LidarData};

#[derive(Debug)]
struct MockState {
    calls: Vec<String>,
    api_control: HashMap<String, bool>,
    failing_methods: HashSet<String>,
    stalled_methods: HashSet<String>,
    image_failures_left: u32,
    frame_size: (u32, u32),
    lidars: HashMap<String, LidarData>,
    car_state: CarState,
    controls: Vec<CarControls>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            api_control: HashMap::new(),
            failing_methods: HashSet::new(),
            stalled_methods: HashSet::new(),
            image_failures_left: 0,
            frame_size: (4, 3),
            lidars: HashMap::new(),
            car_state: CarState::default(),
            controls: Vec::new(),
        }
    }
}

/// A scriptable stand-in for the simulator.
#[derive(Debug, Clone, Default)]
pub struct MockSimulator {
    state: Arc<Mutex<MockState>>,
}

impl MockSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Scripting ─────────────────────────────────────────────────────────

    /// Make every call to `method` (wire name, e.g. `"getCarState"`) fail.
    pub fn fail_method(&self, method: &str) {
        self.state().failing_methods.insert(method.to_string());
    }

    /// Make every call to `method` fail the way the TCP transport reports a
    /// reply that never arrived: [`SimError::Connection`].
    pub fn time_out_method(&self, method: &str) {
        self.state().stalled_methods.insert(method.to_string());
    }

    /// Fail the next `n` `simGetImages` calls, then succeed.
    pub fn fail_next_images(&self, n: u32) {
        self.state().image_failures_left = n;
    }

    /// Size of the frames returned by `simGetImages`. `(0, 0)` yields
    /// empty frames.
    pub fn set_frame_size(&self, width: u32, height: u32) {
        self.state().frame_size = (width, height);
    }

    /// Register a lidar sensor returning `data`.
    pub fn add_lidar(&self, sensor: &str, data: LidarData) {
        self.state().lidars.insert(sensor.to_string(), data);
    }

    pub fn set_car_state(&self, car_state: CarState) {
        self.state().car_state = car_state;
    }

    pub fn set_api_control(&self, vehicle: &str, enabled: bool) {
        self.state().api_control.insert(vehicle.to_string(), enabled);
    }

    // ── Inspection ────────────────────────────────────────────────────────

    /// Wire names of every call received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of calls received for `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.state().calls.iter().filter(|m| *m == method).count()
    }

    pub fn api_control_enabled(&self, vehicle: &str) -> bool {
        self.state().api_control.get(vehicle).copied().unwrap_or(false)
    }

    /// Every control input sent through `setCarControls`.
    pub fn controls(&self) -> Vec<CarControls> {
        self.state().controls.clone()
    }

    /// Record `method` and fail it if scripted to.
    fn enter(&self, method: &str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        state.calls.push(method.to_string());
        if state.stalled_methods.contains(method) {
            return Err(SimError::Connection(format!(
                "'{}' failed: no reply within 0s",
                method
            )));
        }
        if state.failing_methods.contains(method) {
            return Err(SimError::rpc(method, "scripted failure"));
        }
        Ok(state)
    }
}

impl SimulatorApi for MockSimulator {
    fn ping(&mut self) -> Result<bool> {
        self.enter("ping").map(|_| true)
    }

    fn server_version(&mut self) -> Result<i32> {
        self.enter("getServerVersion").map(|_| 1)
    }

    fn enable_api_control(&mut self, enabled: bool, vehicle: &str) -> Result<()> {
        let mut state = self.enter("enableApiControl")?;
        state.api_control.insert(vehicle.to_string(), enabled);
        Ok(())
    }

    fn is_api_control_enabled(&mut self, vehicle: &str) -> Result<bool> {
        let state = self.enter("isApiControlEnabled")?;
        Ok(state.api_control.get(vehicle).copied().unwrap_or(false))
    }

    fn reset(&mut self) -> Result<()> {
        self.enter("reset").map(|_| ())
    }

    fn car_state(&mut self, _vehicle: &str) -> Result<CarState> {
        let state = self.enter("getCarState")?;
        Ok(state.car_state.clone())
    }

    fn set_car_controls(&mut self, controls: &CarControls, _vehicle: &str) -> Result<()> {
        let mut state = self.enter("setCarControls")?;
        state.controls.push(*controls);
        Ok(())
    }

    fn sim_get_images(
        &mut self,
        requests: &[ImageRequest],
        _vehicle: &str,
    ) -> Result<Vec<ImageResponse>> {
        let mut state = self.enter("simGetImages")?;
        if state.image_failures_left > 0 {
            state.image_failures_left -= 1;
            return Err(SimError::rpc("simGetImages", "scripted transient failure"));
        }

        let (width, height) = state.frame_size;
        let pixels = (width * height) as usize;
        Ok(requests
            .iter()
            .map(|req| {
                let mut resp = ImageResponse {
                    camera_name: req.camera_name.clone(),
                    image_type: req.image_type,
                    pixels_as_float: req.pixels_as_float,
                    compress: req.compress,
                    width,
                    height,
                    ..Default::default()
                };
                if req.pixels_as_float {
                    resp.image_data_float = (0..pixels).map(|i| i as f32 * 0.5).collect();
                } else {
                    // BGR gradient, one byte triple per pixel.
                    resp.image_data_uint8 = (0..pixels * 3).map(|i| (i % 256) as u8).collect();
                }
                resp
            })
            .collect())
    }

    fn lidar_data(&mut self, sensor: &str, vehicle: &str) -> Result<LidarData> {
        let state = self.enter("getLidarData")?;
        state.lidars.get(sensor).cloned().ok_or_else(|| {
            SimError::remote(
                "getLidarData",
                format!("No lidar with name {} exist on vehicle {}", sensor, vehicle),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageType;

    #[test]
    fn test_clones_share_state() {
        let mock = MockSimulator::new();
        let mut api = mock.clone();
        api.enable_api_control(true, "Car1").unwrap();
        assert!(mock.api_control_enabled("Car1"));
        assert_eq!(mock.calls(), vec!["enableApiControl"]);
    }

    #[test]
    fn test_scripted_image_failures_then_success() {
        let mock = MockSimulator::new();
        mock.fail_next_images(1);
        let mut api = mock.clone();
        let req = [ImageRequest::raw("0", ImageType::Scene)];

        assert!(api.sim_get_images(&req, "Car1").is_err());
        let frames = api.sim_get_images(&req, "Car1").unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].image_data_uint8.len(), 4 * 3 * 3);
        assert_eq!(mock.call_count("simGetImages"), 2);
    }

    #[test]
    fn test_unknown_lidar_is_remote_error() {
        let mut api = MockSimulator::new();
        let err = api.lidar_data("Nope", "Car1").unwrap_err();
        assert!(matches!(err, SimError::Remote { .. }));
        assert!(err.to_string().contains("No lidar with name Nope"));
    }

    #[test]
    fn test_timed_out_method_is_connection_error() {
        let mock = MockSimulator::new();
        mock.add_lidar("Lidar1", LidarData::default());
        mock.time_out_method("getLidarData");
        let mut api = mock.clone();

        let err = api.lidar_data("Lidar1", "Car1").unwrap_err();
        assert!(matches!(err, SimError::Connection(_)));
        assert!(err.to_string().contains("no reply"));
    }
}
