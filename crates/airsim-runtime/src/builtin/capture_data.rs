//! Take one lidar reading under API control and report the point cloud extent.
//!
//! Control is held only for the reading itself. The bounds of the returned
//! cloud are logged along with the point count.

use airsim_core::config::AppConfig;
use airsim_core::error::{Result, SimError};
use airsim_rpc::Connection;
use tracing::info;

use super::EXAMPLE_LIDAR;
use crate::points::bounds;

pub fn run(conn: &mut Connection, config: &AppConfig) -> Result<()> {
    let scan = {
        let mut car = conn.acquire_control(&config.vehicle)?;
        car.lidar_data(EXAMPLE_LIDAR, &config.vehicle)?
    };

    let (lo, hi) = bounds(&scan)
        .ok_or_else(|| SimError::Capture("no lidar data available".to_string()))?;
    info!(points = scan.point_count(), "Lidar point cloud");
    info!(
        "  x: [{:.2}, {:.2}]  y: [{:.2}, {:.2}]  z: [{:.2}, {:.2}]",
        lo[0], hi[0], lo[1], hi[1], lo[2], hi[2]
    );
    Ok(())
}
