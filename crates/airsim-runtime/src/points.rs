//! Lidar point cloud export.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use airsim_core::error::{Result, SimError};
use airsim_rpc::types::LidarData;
use tracing::warn;

/// Write every complete point of `scan` to `path` as CSV, one `x,y,z` row per
/// point. A `segmentation` column is added when the scan carries one id per
/// point. Parent directories are created as needed.
///
/// Returns the number of rows written.
pub fn write_point_csv(path: &Path, scan: &LidarData) -> Result<usize> {
    let file_err = |source| SimError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(file_err)?;
    }

    let points = scan.point_count();
    if scan.point_cloud.len() % 3 != 0 {
        warn!(
            values = scan.point_cloud.len(),
            "point cloud length is not a multiple of 3; trailing values dropped"
        );
    }
    let segmented = points > 0 && scan.segmentation.len() == points;

    let mut out = BufWriter::new(File::create(path).map_err(file_err)?);
    if segmented {
        writeln!(out, "x,y,z,segmentation").map_err(file_err)?;
    } else {
        writeln!(out, "x,y,z").map_err(file_err)?;
    }

    for (i, p) in scan.point_cloud.chunks_exact(3).enumerate() {
        let row = if segmented {
            writeln!(out, "{},{},{},{}", p[0], p[1], p[2], scan.segmentation[i])
        } else {
            writeln!(out, "{},{},{}", p[0], p[1], p[2])
        };
        row.map_err(file_err)?;
    }
    out.flush().map_err(file_err)?;

    Ok(points)
}

/// Axis-aligned bounds of a point cloud, `None` when it has no points.
pub fn bounds(scan: &LidarData) -> Option<([f32; 3], [f32; 3])> {
    let mut iter = scan.point_cloud.chunks_exact(3);
    let first = iter.next()?;
    let init = ([first[0], first[1], first[2]], [first[0], first[1], first[2]]);
    Some(iter.fold(init, |(mut lo, mut hi), p| {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(p[axis]);
            hi[axis] = hi[axis].max(p[axis]);
        }
        (lo, hi)
    }))
}
