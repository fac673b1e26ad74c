//! Drive the car and log lidar readings along the way.
//!
//! Each cycle drives forward, then forward while steering right, and takes
//! two lidar readings. Every reading logs the sensor pose and point count and
//! is saved to `<examples-out>/lidar_data/lidar_<timestamp>_<cycle>_<reading>.csv`.
//! The car is reset and control released at the end, also when a cycle fails.

use std::thread;

use airsim_core::config::AppConfig;
use airsim_core::error::Result;
use airsim_rpc::types::{CarControls, LidarData};
use airsim_rpc::Connection;
use tracing::info;

use super::EXAMPLE_LIDAR;
use crate::points::write_point_csv;

const CYCLES: u32 = 3;
const READINGS_PER_CYCLE: u32 = 2;

pub fn run(conn: &mut Connection, config: &AppConfig) -> Result<()> {
    let mut car = conn.acquire_control(&config.vehicle)?;
    let outcome = drive(&mut car, config);
    let reset = car.reset();
    outcome.and(reset)
}

fn drive(car: &mut Connection, config: &AppConfig) -> Result<()> {
    let vehicle = config.vehicle.as_str();
    let out_dir = config.examples_out.join("lidar_data");
    let mut controls = CarControls::default();

    for cycle in 0..CYCLES {
        let state = car.car_state(vehicle)?;
        info!(speed = state.speed, gear = state.gear, "Car state");

        controls.throttle = 0.5;
        controls.steering = 0.0;
        car.set_car_controls(&controls, vehicle)?;
        info!("Go forward");
        thread::sleep(config.drive_step);

        controls.steering = 1.0;
        car.set_car_controls(&controls, vehicle)?;
        info!("Go forward, steer right");
        thread::sleep(config.drive_step);

        for reading in 1..=READINGS_PER_CYCLE {
            let scan = car.lidar_data(EXAMPLE_LIDAR, vehicle)?;
            if scan.point_count() == 0 {
                info!("No points received from lidar");
            } else {
                log_reading(reading, &scan);
                let path = out_dir.join(format!(
                    "lidar_{}_{}_{}.csv",
                    scan.time_stamp, cycle, reading
                ));
                write_point_csv(&path, &scan)?;
                info!("Saved {}", path.display());
            }
            thread::sleep(config.drive_step);
        }
    }
    Ok(())
}

fn log_reading(reading: u32, scan: &LidarData) {
    let p = &scan.pose.position;
    let q = &scan.pose.orientation;
    info!(
        reading,
        time_stamp = scan.time_stamp,
        points = scan.point_count(),
        "Lidar reading"
    );
    info!(
        "  position: ({:.3}, {:.3}, {:.3})  orientation: ({:.3}, {:.3}, {:.3}, {:.3})",
        p.x_val, p.y_val, p.z_val, q.w_val, q.x_val, q.y_val, q.z_val
    );
}
