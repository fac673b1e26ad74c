//! Bundled example programs.
//!
//! Each module is one example: its file stem is the example name, its
//! leading `//!` block is the description, and its `run` function is the
//! entry point.

use crate::registry::ExampleEntry;

pub mod capture_data;
pub mod car_capture_images;
pub mod car_lidar;
pub mod car_lidar_simple;
pub mod hello_car;

/// Lidar sensor the bundled examples read from.
pub(crate) const EXAMPLE_LIDAR: &str = airsim_core::settings::DEFAULT_LIDAR_SENSOR;

macro_rules! example {
    ($module:ident) => {
        ExampleEntry {
            file_path: concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/src/builtin/",
                stringify!($module),
                ".rs"
            ),
            source: include_str!(concat!(stringify!($module), ".rs")),
            run: $module::run,
        }
    };
}

/// Every bundled example, in registration order.
pub fn entries() -> Vec<ExampleEntry> {
    vec![
        example!(capture_data),
        example!(car_capture_images),
        example!(car_lidar),
        example!(car_lidar_simple),
        example!(hello_car),
    ]
}
