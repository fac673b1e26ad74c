//! Decoding camera responses and writing them to disk.
//!
//! Uncompressed frames arrive as BGR (or BGRA) bytes in row-major order;
//! they are converted to RGB before being encoded as PNG. Float frames
//! (depth, disparity) are written as PFM.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use airsim_core::error::{Result, SimError};
use airsim_rpc::types::ImageResponse;
use image::{ImageFormat, RgbImage};

/// File name for frame `index` of `camera`: `<camera>_<index:05>.png`.
///
/// Path separators in the camera name are replaced so the file always lands
/// inside the output directory.
pub fn frame_file_name(camera: &str, index: u32) -> String {
    let safe: String = camera
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{}_{:05}.png", safe, index)
}

/// Convert an uncompressed response into an RGB image.
pub fn decode_frame(resp: &ImageResponse) -> Result<RgbImage> {
    if resp.is_empty() {
        return Err(SimError::Capture(format!(
            "camera '{}' returned an empty frame",
            resp.camera_name
        )));
    }

    if resp.compress {
        let decoded = image::load_from_memory(&resp.image_data_uint8).map_err(|e| {
            SimError::Capture(format!(
                "camera '{}' returned an undecodable frame: {}",
                resp.camera_name, e
            ))
        })?;
        return Ok(decoded.to_rgb8());
    }

    let pixels = resp.width as usize * resp.height as usize;
    let data = &resp.image_data_uint8;
    let channels = if pixels == 0 { 0 } else { data.len() / pixels };
    if !matches!(channels, 3 | 4) || channels * pixels != data.len() {
        return Err(SimError::Capture(format!(
            "camera '{}' frame has {} bytes for {}x{} pixels",
            resp.camera_name,
            data.len(),
            resp.width,
            resp.height
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for px in data.chunks_exact(channels) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }

    RgbImage::from_raw(resp.width, resp.height, rgb).ok_or_else(|| {
        SimError::Capture(format!(
            "camera '{}' frame does not fit {}x{}",
            resp.camera_name, resp.width, resp.height
        ))
    })
}

/// Encode `img` as PNG at `path`.
pub fn write_png(img: &RgbImage, path: &Path) -> Result<()> {
    img.save_with_format(path, ImageFormat::Png).map_err(|e| {
        SimError::Capture(format!("failed to write {}: {}", path.display(), e))
    })
}

/// Write a single-channel float image as little-endian PFM.
///
/// PFM stores rows bottom to top.
pub fn write_pfm(path: &Path, width: u32, height: u32, data: &[f32]) -> Result<()> {
    let (w, h) = (width as usize, height as usize);
    if w * h != data.len() {
        return Err(SimError::Capture(format!(
            "float frame has {} values for {}x{} pixels",
            data.len(),
            width,
            height
        )));
    }

    let file_err = |source| SimError::FileWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut out = BufWriter::new(File::create(path).map_err(file_err)?);
    write!(out, "Pf\n{} {}\n-1\n", width, height).map_err(file_err)?;
    for row in data.chunks_exact(w.max(1)).rev() {
        for value in row {
            out.write_all(&value.to_le_bytes()).map_err(file_err)?;
        }
    }
    out.flush().map_err(file_err)
}

/// Save any response next to `stem`, choosing the format from the response:
/// float data becomes `.pfm`, compressed data is written verbatim as `.png`,
/// raw data is decoded and re-encoded as `.png`.
pub fn save_response(resp: &ImageResponse, stem: &Path) -> Result<PathBuf> {
    if resp.pixels_as_float {
        let path = stem.with_extension("pfm");
        write_pfm(&path, resp.width, resp.height, &resp.image_data_float)?;
        return Ok(path);
    }

    let path = stem.with_extension("png");
    if resp.compress {
        if resp.image_data_uint8.is_empty() {
            return Err(SimError::Capture(format!(
                "camera '{}' returned an empty frame",
                resp.camera_name
            )));
        }
        fs::write(&path, &resp.image_data_uint8).map_err(|source| SimError::FileWrite {
            path: path.clone(),
            source,
        })?;
    } else {
        write_png(&decode_frame(resp)?, &path)?;
    }
    Ok(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
