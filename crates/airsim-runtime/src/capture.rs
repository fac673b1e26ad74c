//! Timed camera and lidar acquisition.
//!
//! [`CaptureService`] drives a confirmed [`Connection`] through a
//! [`CaptureJob`]. Frame requests are retried up to [`MAX_FRAME_ATTEMPTS`]
//! times with linear back-off before the job aborts; lidar scans are issued
//! once and never retried.

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use airsim_core::error::{Result, SimError};
use airsim_rpc::types::{ImageRequest, ImageType, LidarData};
use airsim_rpc::Connection;
use chrono::DateTime;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::frames::{decode_frame, frame_file_name, write_png};
use crate::points::write_point_csv;

/// Attempts per frame before the capture job gives up.
pub const MAX_FRAME_ATTEMPTS: u32 = 3;

/// Back-off unit between frame attempts; attempt `n` waits `n` units.
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

// ── CaptureJob ────────────────────────────────────────────────────────────────

/// One acquisition request. Lives only for the duration of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureJob {
    /// Camera name/index or lidar sensor name.
    pub target_sensor: String,
    /// Output directory for frames, output file for lidar dumps.
    pub output: PathBuf,
    pub count: u32,
    pub interval: Duration,
}

impl CaptureJob {
    /// A frame capture job. `count` must be at least 1 and `interval_secs`
    /// finite and non-negative.
    pub fn images(
        camera: impl Into<String>,
        out_dir: impl Into<PathBuf>,
        count: u32,
        interval_secs: f64,
    ) -> Result<Self> {
        if count == 0 {
            return Err(SimError::Capture("frame count must be at least 1".to_string()));
        }
        if !interval_secs.is_finite() || interval_secs < 0.0 {
            return Err(SimError::Capture(format!(
                "interval must be >= 0 seconds, got {}",
                interval_secs
            )));
        }
        let interval = Duration::try_from_secs_f64(interval_secs).map_err(|e| {
            SimError::Capture(format!("interval {} seconds is out of range: {}", interval_secs, e))
        })?;
        Ok(Self {
            target_sensor: camera.into(),
            output: out_dir.into(),
            count,
            interval,
        })
    }

    /// A single-scan lidar dump job.
    pub fn lidar(sensor: impl Into<String>, out_file: impl Into<PathBuf>) -> Self {
        Self {
            target_sensor: sensor.into(),
            output: out_file.into(),
            count: 1,
            interval: Duration::ZERO,
        }
    }
}

/// Result of a completed frame capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSummary {
    pub files: Vec<PathBuf>,
}

/// Result of a completed lidar dump.
#[derive(Debug, Clone, PartialEq)]
pub struct LidarSummary {
    pub path: PathBuf,
    pub points: usize,
    pub time_stamp: u64,
}

// ── CaptureService ────────────────────────────────────────────────────────────

/// Runs capture jobs against one vehicle on a confirmed connection.
pub struct CaptureService<'a> {
    conn: &'a mut Connection,
    vehicle: String,
    backoff: Duration,
}

impl<'a> CaptureService<'a> {
    pub fn new(conn: &'a mut Connection, vehicle: impl Into<String>) -> Self {
        Self {
            conn,
            vehicle: vehicle.into(),
            backoff: RETRY_BACKOFF,
        }
    }

    /// Override the retry back-off unit.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Capture `job.count` scene frames from `job.target_sensor` into
    /// `job.output`, sleeping `job.interval` between requests.
    pub fn capture_images(&mut self, job: &CaptureJob) -> Result<CaptureSummary> {
        fs::create_dir_all(&job.output).map_err(|source| SimError::FileWrite {
            path: job.output.clone(),
            source,
        })?;

        let request = ImageRequest::raw(job.target_sensor.clone(), ImageType::Scene);
        let mut files = Vec::with_capacity(job.count as usize);

        for index in 0..job.count {
            if index > 0 && !job.interval.is_zero() {
                thread::sleep(job.interval);
            }

            let frame = self.fetch_frame(&request).map_err(|e| match e {
                SimError::Capture(msg) => SimError::Capture(format!(
                    "aborted at frame {} of {} ({} written to {}): {}",
                    index + 1,
                    job.count,
                    files.len(),
                    job.output.display(),
                    msg
                )),
                other => other,
            })?;

            let path = job.output.join(frame_file_name(&job.target_sensor, index));
            write_png(&frame, &path)?;
            info!("Saved {}", path.display());
            files.push(path);
        }

        Ok(CaptureSummary { files })
    }

    /// Fetch one scan from `job.target_sensor` and write it to `job.output`.
    pub fn lidar_dump(&mut self, job: &CaptureJob) -> Result<LidarSummary> {
        let scan = self.scan(&job.target_sensor)?;
        let points = write_point_csv(&job.output, &scan)?;

        if scan.time_stamp > 0 {
            let taken = DateTime::from_timestamp_nanos(scan.time_stamp as i64);
            debug!(time = %taken.to_rfc3339(), "lidar scan time");
        }
        info!("Wrote {} points to {}", points, job.output.display());

        Ok(LidarSummary {
            path: job.output.clone(),
            points,
            time_stamp: scan.time_stamp,
        })
    }

    /// One lidar request with sensor and emptiness checks.
    ///
    /// Only a rejection from the simulator is reported as an unresolved
    /// sensor; transport failures pass through unchanged.
    pub fn scan(&mut self, sensor: &str) -> Result<LidarData> {
        let scan = self
            .conn
            .lidar_data(sensor, &self.vehicle)
            .map_err(|e| match e {
                SimError::Remote { message, .. } => SimError::Capture(format!(
                    "lidar sensor '{}' could not be resolved on vehicle '{}': {}",
                    sensor, self.vehicle, message
                )),
                other => other,
            })?;

        if scan.point_count() == 0 {
            return Err(SimError::Capture(format!(
                "lidar sensor '{}' on vehicle '{}' returned no points",
                sensor, self.vehicle
            )));
        }
        Ok(scan)
    }

    fn fetch_frame(&mut self, request: &ImageRequest) -> Result<RgbImage> {
        let mut last_error = String::new();

        for attempt in 0..MAX_FRAME_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(self.backoff * attempt);
            }

            match self.try_frame(request) {
                Ok(frame) => return Ok(frame),
                // Lost session: retrying cannot help.
                Err(e @ SimError::Connection(_)) => return Err(e),
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        camera = %request.camera_name,
                        error = %e,
                        "Frame request failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        Err(SimError::Capture(format!(
            "camera '{}' failed after {} attempts: {}",
            request.camera_name, MAX_FRAME_ATTEMPTS, last_error
        )))
    }

    fn try_frame(&mut self, request: &ImageRequest) -> Result<RgbImage> {
        let responses = self
            .conn
            .images(std::slice::from_ref(request), &self.vehicle)?;
        let resp = responses.first().ok_or_else(|| {
            SimError::Capture(format!(
                "camera '{}' returned no image response",
                request.camera_name
            ))
        })?;
        decode_frame(resp)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use airsim_rpc::MockSimulator;
    use tempfile::TempDir;

    fn confirmed(mock: &MockSimulator) -> Connection {
        let mut conn = Connection::with_api("127.0.0.1", 41451, Box::new(mock.clone()));
        conn.confirm().unwrap();
        conn
    }

    fn service(conn: &mut Connection) -> CaptureService<'_> {
        CaptureService::new(conn, "Car1").with_backoff(Duration::ZERO)
    }

    fn sorted_names(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    // ── CaptureJob ────────────────────────────────────────────────────────

    #[test]
    fn test_job_validation() {
        assert!(CaptureJob::images("0", "out", 0, 0.5).is_err());
        assert!(CaptureJob::images("0", "out", 1, -0.1).is_err());
        assert!(CaptureJob::images("0", "out", 1, f64::INFINITY).is_err());

        let err = CaptureJob::images("0", "out", 1, 1e20).unwrap_err();
        assert!(matches!(err, SimError::Capture(_)));
        assert!(err.to_string().contains("out of range"), "{err}");

        let job = CaptureJob::images("0", "out", 3, 0.25).unwrap();
        assert_eq!(job.interval, Duration::from_millis(250));
    }

    // ── capture_images ────────────────────────────────────────────────────

    #[test]
    fn test_capture_count_produces_numbered_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("images");
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        let job = CaptureJob::images("0", &out, 5, 0.0).unwrap();
        let summary = service(&mut conn).capture_images(&job).unwrap();

        assert_eq!(summary.files.len(), 5);
        assert_eq!(
            sorted_names(&out),
            vec![
                "0_00000.png",
                "0_00001.png",
                "0_00002.png",
                "0_00003.png",
                "0_00004.png"
            ]
        );
        assert_eq!(mock.call_count("simGetImages"), 5);
    }

    #[test]
    fn test_capture_retries_transient_failures() {
        let dir = TempDir::new().unwrap();
        let mock = MockSimulator::new();
        mock.fail_next_images(2);
        let mut conn = confirmed(&mock);

        let job = CaptureJob::images("front", dir.path(), 1, 0.0).unwrap();
        let summary = service(&mut conn).capture_images(&job).unwrap();

        assert_eq!(summary.files.len(), 1);
        assert_eq!(mock.call_count("simGetImages"), 3);
    }

    #[test]
    fn test_capture_abort_reports_frames_written() {
        let dir = TempDir::new().unwrap();
        let mock = MockSimulator::new();
        mock.set_frame_size(0, 0);
        let mut conn = confirmed(&mock);

        let job = CaptureJob::images("0", dir.path(), 4, 0.0).unwrap();
        let err = service(&mut conn).capture_images(&job).unwrap_err();

        assert!(matches!(err, SimError::Capture(_)));
        let msg = err.to_string();
        assert!(msg.contains("frame 1 of 4"), "{msg}");
        assert!(msg.contains("0 written"), "{msg}");
        assert_eq!(mock.call_count("simGetImages"), MAX_FRAME_ATTEMPTS as usize);
    }

    #[test]
    fn test_capture_stops_on_timed_out_session() {
        let dir = TempDir::new().unwrap();
        let mock = MockSimulator::new();
        mock.time_out_method("simGetImages");
        let mut conn = confirmed(&mock);

        let job = CaptureJob::images("0", dir.path(), 2, 0.0).unwrap();
        let err = service(&mut conn).capture_images(&job).unwrap_err();

        assert!(matches!(err, SimError::Connection(_)), "{err:?}");
        assert_eq!(mock.call_count("simGetImages"), 1);
    }

    #[test]
    fn test_capture_requires_confirmed_connection() {
        let dir = TempDir::new().unwrap();
        let mock = MockSimulator::new();
        let mut conn = Connection::with_api("127.0.0.1", 41451, Box::new(mock.clone()));

        let job = CaptureJob::images("0", dir.path(), 2, 0.0).unwrap();
        let err = service(&mut conn).capture_images(&job).unwrap_err();

        assert!(matches!(err, SimError::Connection(_)));
        assert_eq!(mock.call_count("simGetImages"), 0);
    }

    // ── lidar_dump ────────────────────────────────────────────────────────

    #[test]
    fn test_lidar_dump_writes_csv() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("lidar/points.csv");
        let mock = MockSimulator::new();
        mock.add_lidar(
            "Lidar360",
            LidarData {
                point_cloud: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                time_stamp: 1_700_000_000_000_000_000,
                ..Default::default()
            },
        );
        let mut conn = confirmed(&mock);

        let summary = service(&mut conn)
            .lidar_dump(&CaptureJob::lidar("Lidar360", &out))
            .unwrap();

        assert_eq!(summary.points, 2);
        assert_eq!(fs::read_to_string(&out).unwrap(), "x,y,z\n1,2,3\n4,5,6\n");
        assert_eq!(mock.call_count("getLidarData"), 1);
    }

    #[test]
    fn test_lidar_errors_are_distinguishable() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("points.csv");
        let mock = MockSimulator::new();
        mock.add_lidar("Empty", LidarData::default());
        let mut conn = confirmed(&mock);

        let unknown = service(&mut conn)
            .lidar_dump(&CaptureJob::lidar("Missing", &out))
            .unwrap_err();
        let empty = service(&mut conn)
            .lidar_dump(&CaptureJob::lidar("Empty", &out))
            .unwrap_err();

        assert!(matches!(unknown, SimError::Capture(_)));
        assert!(matches!(empty, SimError::Capture(_)));
        assert!(unknown.to_string().contains("could not be resolved"));
        assert!(empty.to_string().contains("returned no points"));
        assert!(!out.exists());
        // Never retried.
        assert_eq!(mock.call_count("getLidarData"), 2);
    }

    #[test]
    fn test_lidar_timeout_is_not_reported_as_unknown_sensor() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("points.csv");
        let mock = MockSimulator::new();
        mock.add_lidar(
            "Lidar360",
            LidarData {
                point_cloud: vec![1.0, 2.0, 3.0],
                ..Default::default()
            },
        );
        mock.time_out_method("getLidarData");
        let mut conn = confirmed(&mock);

        let err = service(&mut conn)
            .lidar_dump(&CaptureJob::lidar("Lidar360", &out))
            .unwrap_err();

        assert!(matches!(err, SimError::Connection(_)), "{err:?}");
        assert!(!err.to_string().contains("could not be resolved"));
        assert!(err.to_string().contains("no reply"));
        assert!(!out.exists());
    }

    #[test]
    fn test_lidar_local_failure_is_not_reported_as_unknown_sensor() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("points.csv");
        let mock = MockSimulator::new();
        mock.fail_method("getLidarData");
        let mut conn = confirmed(&mock);

        let err = service(&mut conn)
            .lidar_dump(&CaptureJob::lidar("Lidar360", &out))
            .unwrap_err();

        assert!(matches!(err, SimError::Rpc { .. }), "{err:?}");
        assert!(!err.to_string().contains("could not be resolved"));
    }
}
