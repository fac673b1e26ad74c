//! Capture one scene frame from each of the Front, Right, Back and Left cameras.
//!
//! All four cameras are requested in a single call and written as PNG to
//! `<examples-out>/cameras/<camera>.png`. Cameras that return an empty
//! frame are reported and skipped.

use std::fs;

use airsim_core::config::AppConfig;
use airsim_core::error::{Result, SimError};
use airsim_rpc::types::{ImageRequest, ImageType};
use airsim_rpc::Connection;
use tracing::{info, warn};

use crate::frames::{decode_frame, write_png};

pub const CAMERAS: [&str; 4] = ["Front", "Right", "Back", "Left"];

pub fn run(conn: &mut Connection, config: &AppConfig) -> Result<()> {
    let out_dir = config.examples_out.join("cameras");
    fs::create_dir_all(&out_dir).map_err(|source| SimError::FileWrite {
        path: out_dir.clone(),
        source,
    })?;

    let requests: Vec<ImageRequest> = CAMERAS
        .iter()
        .map(|cam| ImageRequest::raw(*cam, ImageType::Scene))
        .collect();
    let responses = conn.images(&requests, &config.vehicle)?;

    for (camera, resp) in CAMERAS.iter().zip(&responses) {
        if resp.is_empty() {
            warn!("{} returned an empty image", camera);
            continue;
        }
        let path = out_dir.join(format!("{}.png", camera));
        write_png(&decode_frame(resp)?, &path)?;
        info!("Saved {} image to {}", camera, path.display());
    }
    if responses.len() < CAMERAS.len() {
        warn!(
            "Expected {} images, simulator returned {}",
            CAMERAS.len(),
            responses.len()
        );
    }
    Ok(())
}
