//! Wire types exchanged with the simulator.
//!
//! Field names match the simulator's msgpack maps exactly; every struct
//! tolerates missing fields so older and newer server builds both decode.

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ── Geometry ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vector3r {
    pub x_val: f32,
    pub y_val: f32,
    pub z_val: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quaternionr {
    pub w_val: f32,
    pub x_val: f32,
    pub y_val: f32,
    pub z_val: f32,
}

impl Default for Quaternionr {
    fn default() -> Self {
        Self {
            w_val: 1.0,
            x_val: 0.0,
            y_val: 0.0,
            z_val: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pose {
    pub position: Vector3r,
    pub orientation: Quaternionr,
}

// ── Images ────────────────────────────────────────────────────────────────────

/// Image channels a camera can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageType {
    #[default]
    Scene,
    DepthPlanar,
    DepthPerspective,
    DepthVis,
    DisparityNormalized,
    Segmentation,
    SurfaceNormals,
    Infrared,
    OpticalFlow,
    OpticalFlowVis,
}

impl ImageType {
    const ALL: [ImageType; 10] = [
        ImageType::Scene,
        ImageType::DepthPlanar,
        ImageType::DepthPerspective,
        ImageType::DepthVis,
        ImageType::DisparityNormalized,
        ImageType::Segmentation,
        ImageType::SurfaceNormals,
        ImageType::Infrared,
        ImageType::OpticalFlow,
        ImageType::OpticalFlowVis,
    ];

    /// Numeric code used on the wire.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

impl Serialize for ImageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ImageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        ImageType::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown image type code {}", code)))
    }
}

/// One camera request inside a `simGetImages` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub camera_name: String,
    pub image_type: ImageType,
    pub pixels_as_float: bool,
    pub compress: bool,
}

impl ImageRequest {
    /// Uncompressed 8-bit request, the form the capture loop decodes itself.
    pub fn raw(camera_name: impl Into<String>, image_type: ImageType) -> Self {
        Self {
            camera_name: camera_name.into(),
            image_type,
            pixels_as_float: false,
            compress: false,
        }
    }

    /// PNG-compressed 8-bit request.
    pub fn png(camera_name: impl Into<String>, image_type: ImageType) -> Self {
        Self {
            compress: true,
            ..Self::raw(camera_name, image_type)
        }
    }

    /// Floating-point request (depth channels).
    pub fn float(camera_name: impl Into<String>, image_type: ImageType) -> Self {
        Self {
            pixels_as_float: true,
            ..Self::raw(camera_name, image_type)
        }
    }
}

/// One camera frame returned by `simGetImages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageResponse {
    #[serde(deserialize_with = "byte_buffer")]
    pub image_data_uint8: Vec<u8>,
    pub image_data_float: Vec<f32>,
    pub camera_name: String,
    pub camera_position: Vector3r,
    pub camera_orientation: Quaternionr,
    pub time_stamp: u64,
    pub message: String,
    pub pixels_as_float: bool,
    pub compress: bool,
    pub width: u32,
    pub height: u32,
    pub image_type: ImageType,
}

impl ImageResponse {
    /// `true` when the simulator returned no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0
            || self.height == 0
            || (self.image_data_uint8.is_empty() && self.image_data_float.is_empty())
    }
}

// ── Lidar ─────────────────────────────────────────────────────────────────────

/// One lidar sweep as returned by `getLidarData`.
///
/// `point_cloud` is a flat `[x0, y0, z0, x1, y1, z1, ...]` buffer in the
/// sensor frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarData {
    pub point_cloud: Vec<f32>,
    pub time_stamp: u64,
    pub pose: Pose,
    pub segmentation: Vec<i32>,
}

impl LidarData {
    /// Number of complete (x, y, z) triples.
    pub fn point_count(&self) -> usize {
        self.point_cloud.len() / 3
    }
}

// ── Car ───────────────────────────────────────────────────────────────────────

/// Actuator inputs for a car.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarControls {
    pub throttle: f32,
    pub steering: f32,
    pub brake: f32,
    pub handbrake: bool,
    pub is_manual_gear: bool,
    pub manual_gear: i32,
    pub gear_immediate: bool,
}

impl Default for CarControls {
    fn default() -> Self {
        Self {
            throttle: 0.0,
            steering: 0.0,
            brake: 0.0,
            handbrake: false,
            is_manual_gear: false,
            manual_gear: 0,
            gear_immediate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsState {
    pub position: Vector3r,
    pub orientation: Quaternionr,
    pub linear_velocity: Vector3r,
    pub angular_velocity: Vector3r,
}

/// Car telemetry as returned by `getCarState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarState {
    pub speed: f32,
    pub gear: i32,
    pub rpm: f32,
    pub maxrpm: f32,
    pub handbrake: bool,
    pub kinematics_estimated: KinematicsState,
    pub timestamp: u64,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Accept a msgpack `bin` payload as well as a plain array of integers.
fn byte_buffer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    struct ByteBufferVisitor;

    impl<'de> Visitor<'de> for ByteBufferVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a byte buffer or an array of bytes")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Vec<u8>, E> {
            Ok(v.as_bytes().to_vec())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Vec<u8>, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<u8>, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(b) = seq.next_element::<u8>()? {
                out.push(b);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(ByteBufferVisitor)
}
