//! Take a few lidar scans and save each one as CSV.
//!
//! Scans come from the `Lidar360` sensor and land in
//! `<examples-out>/lidar/lidar_points_<timestamp>_<scan>.csv`, named by the
//! sensor time stamp and the scan number. Scans without points are logged and
//! skipped.

use std::thread;

use airsim_core::config::AppConfig;
use airsim_core::error::Result;
use airsim_rpc::Connection;
use tracing::info;

use super::EXAMPLE_LIDAR;
use crate::points::write_point_csv;

const SCANS: u32 = 5;

pub fn run(conn: &mut Connection, config: &AppConfig) -> Result<()> {
    let vehicle = config.vehicle.as_str();
    let out_dir = config.examples_out.join("lidar");
    let mut car = conn.acquire_control(vehicle)?;

    for scan_no in 0..SCANS {
        if scan_no > 0 {
            thread::sleep(config.drive_step);
        }

        let scan = car.lidar_data(EXAMPLE_LIDAR, vehicle)?;
        if scan.point_count() == 0 {
            info!("No lidar points received");
            continue;
        }

        let path = out_dir.join(format!(
            "lidar_points_{}_{:02}.csv",
            scan.time_stamp, scan_no
        ));
        let rows = write_point_csv(&path, &scan)?;
        info!("Saved {} points to {}", rows, path.display());
    }
    Ok(())
}
