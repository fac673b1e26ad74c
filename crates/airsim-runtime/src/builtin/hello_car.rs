//! Hello Car: drive a few forward, right, reverse and brake cycles.
//!
//! After each cycle the example grabs four frames in one request (depth
//! visualisation from camera 0, float depth and scene PNG from camera 1, and
//! an uncompressed scene frame from camera 1) and saves them under
//! `<examples-out>/airsim_car`. The car is reset at the end, also when a cycle
//! fails, and control is handed back.

use std::fs;
use std::path::Path;
use std::thread;

use airsim_core::config::AppConfig;
use airsim_core::error::{Result, SimError};
use airsim_rpc::types::{CarControls, ImageRequest, ImageType};
use airsim_rpc::Connection;
use tracing::info;

use crate::frames::save_response;

const CYCLES: u32 = 3;

pub fn run(conn: &mut Connection, config: &AppConfig) -> Result<()> {
    let vehicle = config.vehicle.as_str();
    let out_dir = config.examples_out.join("airsim_car");
    fs::create_dir_all(&out_dir).map_err(|source| SimError::FileWrite {
        path: out_dir.clone(),
        source,
    })?;

    let mut car = conn.acquire_control(vehicle)?;
    let outcome = drive(&mut car, config, &out_dir);
    let reset = car.reset();
    outcome.and(reset)
}

fn drive(car: &mut Connection, config: &AppConfig, out_dir: &Path) -> Result<()> {
    let vehicle = config.vehicle.as_str();
    info!("API control enabled: {}", car.is_api_control_enabled(vehicle)?);

    let mut controls = CarControls::default();
    for cycle in 0..CYCLES {
        let state = car.car_state(vehicle)?;
        info!(speed = state.speed, gear = state.gear, "Car state");

        controls.throttle = 0.5;
        controls.steering = 0.0;
        car.set_car_controls(&controls, vehicle)?;
        info!("Go forward");
        thread::sleep(config.drive_step);

        controls.throttle = 0.5;
        controls.steering = 1.0;
        car.set_car_controls(&controls, vehicle)?;
        info!("Go forward, steer right");
        thread::sleep(config.drive_step);

        controls.throttle = -0.5;
        controls.steering = 0.0;
        controls.is_manual_gear = true;
        controls.manual_gear = -1;
        car.set_car_controls(&controls, vehicle)?;
        info!("Go reverse");
        thread::sleep(config.drive_step);
        controls.is_manual_gear = false;
        controls.manual_gear = 0;

        controls.throttle = 0.0;
        controls.brake = 1.0;
        car.set_car_controls(&controls, vehicle)?;
        info!("Apply brakes");
        thread::sleep(config.drive_step);
        controls.brake = 0.0;

        let requests = [
            ImageRequest::png("0", ImageType::DepthVis),
            ImageRequest::float("1", ImageType::DepthPerspective),
            ImageRequest::png("1", ImageType::Scene),
            ImageRequest::raw("1", ImageType::Scene),
        ];
        let responses = car.images(&requests, vehicle)?;
        info!("Retrieved {} images", responses.len());

        for (i, resp) in responses.iter().enumerate() {
            let stem = out_dir.join(format!("{}_{}_{}", cycle, resp.image_type.code(), i));
            let path = save_response(resp, &stem)?;
            info!("Saved {}", path.display());
        }
    }
    Ok(())
}
