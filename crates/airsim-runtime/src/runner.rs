//! Example execution with failure wrapping and optional control yield.

use std::panic::{self, AssertUnwindSafe};

use airsim_core::config::AppConfig;
use airsim_core::error::{Result, SimError};
use airsim_rpc::Connection;
use tracing::{info, warn};

use crate::registry::ExampleRegistry;

/// Runs registered examples against a connection.
pub struct ExampleRunner<'a> {
    registry: &'a ExampleRegistry,
    config: &'a AppConfig,
}

impl<'a> ExampleRunner<'a> {
    pub fn new(registry: &'a ExampleRegistry, config: &'a AppConfig) -> Self {
        Self { registry, config }
    }

    /// Run example `name` on `conn`.
    ///
    /// Any failure, including a panic, is reported as
    /// [`SimError::ExampleExecution`]. With `yield_control` set, control of
    /// the configured vehicle is released afterwards whether or not the
    /// example succeeded.
    pub fn run(&self, name: &str, conn: &mut Connection, yield_control: bool) -> Result<()> {
        let entry = self.registry.find(name)?;
        info!("Running example {}", name);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.run)(conn, self.config)))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(SimError::Other(anyhow::anyhow!("panicked: {}", message)))
            })
            .map_err(|e| SimError::ExampleExecution {
                name: name.to_string(),
                message: e.to_string(),
            });

        if yield_control {
            match conn.release_control(&self.config.vehicle) {
                Ok(()) => info!("Yielded control of {}", self.config.vehicle),
                Err(e) if outcome.is_ok() => return Err(e),
                Err(e) => warn!(error = %e, "failed to yield control after example failure"),
            }
        }

        outcome
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ExampleEntry;
    use airsim_rpc::MockSimulator;
    use std::sync::Mutex;

    static SEEN_VEHICLES: Mutex<Vec<String>> = Mutex::new(Vec::new());

    fn drive_then_fail(conn: &mut Connection, config: &AppConfig) -> Result<()> {
        conn.request_control(&config.vehicle)?;
        conn.car_state(&config.vehicle)?;
        Err(SimError::Other(anyhow::anyhow!("wheel fell off")))
    }

    fn take_control(conn: &mut Connection, config: &AppConfig) -> Result<()> {
        conn.acquire_control(&config.vehicle)?.retain();
        Ok(())
    }

    fn record_vehicle(_: &mut Connection, config: &AppConfig) -> Result<()> {
        SEEN_VEHICLES.lock().unwrap().push(config.vehicle.clone());
        Ok(())
    }

    fn explode(_: &mut Connection, _: &AppConfig) -> Result<()> {
        panic!("boom");
    }

    fn registry() -> ExampleRegistry {
        ExampleRegistry::new(vec![
            ExampleEntry {
                file_path: "tests/drive_then_fail.rs",
                source: "//! Fails after taking control.\n",
                run: drive_then_fail,
            },
            ExampleEntry {
                file_path: "tests/take_control.rs",
                source: "//! Keeps control.\n",
                run: take_control,
            },
            ExampleEntry {
                file_path: "tests/record_vehicle.rs",
                source: "//! Records its vehicle.\n",
                run: record_vehicle,
            },
            ExampleEntry {
                file_path: "tests/explode.rs",
                source: "//! Panics.\n",
                run: explode,
            },
        ])
    }

    fn confirmed(mock: &MockSimulator) -> Connection {
        let mut conn = Connection::with_api("127.0.0.1", 41451, Box::new(mock.clone()));
        conn.confirm().unwrap();
        conn
    }

    #[test]
    fn test_failure_is_wrapped_with_name_and_message() {
        let registry = registry();
        let config = AppConfig::default();
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        let err = ExampleRunner::new(&registry, &config)
            .run("drive_then_fail", &mut conn, false)
            .unwrap_err();

        match err {
            SimError::ExampleExecution { name, message } => {
                assert_eq!(name, "drive_then_fail");
                assert!(message.contains("wheel fell off"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Without --yield-control the connection still owns control.
        assert!(conn.control_owned());
    }

    #[test]
    fn test_yield_control_releases_after_failure() {
        let registry = registry();
        let config = AppConfig::default();
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        let result = ExampleRunner::new(&registry, &config).run("drive_then_fail", &mut conn, true);

        assert!(result.is_err());
        assert!(!mock.api_control_enabled("Car1"));
        assert_eq!(mock.calls().last().map(String::as_str), Some("enableApiControl"));
    }

    #[test]
    fn test_yield_control_releases_retained_control() {
        let registry = registry();
        let config = AppConfig::default();
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        ExampleRunner::new(&registry, &config)
            .run("take_control", &mut conn, true)
            .unwrap();

        assert!(!mock.api_control_enabled("Car1"));
        assert!(!conn.control_owned());
    }

    #[test]
    fn test_panic_is_reported_as_execution_error() {
        let registry = registry();
        let config = AppConfig::default();
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        let err = ExampleRunner::new(&registry, &config)
            .run("explode", &mut conn, true)
            .unwrap_err();

        assert!(matches!(err, SimError::ExampleExecution { .. }));
        assert!(err.to_string().contains("boom"));
        assert!(!mock.api_control_enabled("Car1"));
    }

    #[test]
    fn test_unknown_example_makes_no_calls() {
        let registry = registry();
        let config = AppConfig::default();
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);
        let before = mock.calls().len();

        let err = ExampleRunner::new(&registry, &config)
            .run("missing-name", &mut conn, true)
            .unwrap_err();

        assert!(matches!(err, SimError::NotFound(_)));
        assert_eq!(mock.calls().len(), before);
    }

    #[test]
    fn test_examples_see_only_their_own_config() {
        let registry = registry();
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        let first = AppConfig {
            vehicle: "Alpha".to_string(),
            ..AppConfig::default()
        };
        let second = AppConfig {
            vehicle: "Beta".to_string(),
            ..AppConfig::default()
        };

        ExampleRunner::new(&registry, &first)
            .run("record_vehicle", &mut conn, false)
            .unwrap();
        ExampleRunner::new(&registry, &second)
            .run("record_vehicle", &mut conn, false)
            .unwrap();

        let seen = SEEN_VEHICLES.lock().unwrap().clone();
        assert_eq!(seen, vec!["Alpha", "Beta"]);
    }
}
