//! RPC session lifecycle: connect, confirm, and vehicle control ownership.
//!
//! A [`Connection`] refuses control and sensor calls until [`Connection::confirm`]
//! has succeeded. Control taken through [`Connection::acquire_control`] is held
//! by a [`ControlGuard`] and given back when the guard drops, whichever way
//! the caller leaves its scope. Control still owned when the connection itself
//! drops is released then.

use std::ops::{Deref, DerefMut};

use airsim_core::config::AppConfig;
use airsim_core::error::{Result, SimError};
use tracing::{debug, info, warn};

use crate::client::{RpcClient, SimulatorApi};
use crate::types::{CarControls, CarState, ImageRequest, ImageResponse, LidarData};

// ── Connection ────────────────────────────────────────────────────────────────

/// One RPC session with the simulator, used by a single process.
pub struct Connection {
    host: String,
    port: u16,
    api: Box<dyn SimulatorApi>,
    confirmed: bool,
    /// Vehicle whose API control this connection took, if any.
    owned_vehicle: Option<String>,
}

impl Connection {
    /// Open a TCP session using the host, port and timeouts in `config`.
    pub fn connect(config: &AppConfig) -> Result<Self> {
        info!("Connecting to simulator at {}", config.address());
        let client = RpcClient::connect(
            &config.host,
            config.port,
            config.connect_timeout,
            config.rpc_timeout,
        )?;
        Ok(Self::with_api(&config.host, config.port, Box::new(client)))
    }

    /// Build a connection around any [`SimulatorApi`] implementation.
    pub fn with_api(host: &str, port: u16, api: Box<dyn SimulatorApi>) -> Self {
        Self {
            host: host.to_string(),
            port,
            api,
            confirmed: false,
            owned_vehicle: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// `true` while this connection holds API control of a vehicle.
    pub fn control_owned(&self) -> bool {
        self.owned_vehicle.is_some()
    }

    /// Check that the simulator answers before any other call is made.
    pub fn confirm(&mut self) -> Result<()> {
        let alive = self.api.ping().map_err(|e| {
            SimError::Connection(format!(
                "simulator at {}:{} did not answer ping: {}",
                self.host, self.port, e
            ))
        })?;
        if !alive {
            return Err(SimError::Connection(format!(
                "simulator at {}:{} refused ping",
                self.host, self.port
            )));
        }

        match self.api.server_version() {
            Ok(version) => info!(server_version = version, "Connected to simulator"),
            Err(e) => debug!(error = %e, "server version unavailable"),
        }

        self.confirmed = true;
        Ok(())
    }

    // ── Control ───────────────────────────────────────────────────────────

    /// Take API control of `vehicle`.
    pub fn request_control(&mut self, vehicle: &str) -> Result<()> {
        self.ensure_confirmed()?;
        self.api.enable_api_control(true, vehicle)?;
        debug!(vehicle, "API control acquired");
        self.owned_vehicle = Some(vehicle.to_string());
        Ok(())
    }

    /// Give API control of `vehicle` back to the simulator.
    ///
    /// Issued even when this connection never took control, so it also
    /// clears ownership left behind by an earlier process.
    pub fn release_control(&mut self, vehicle: &str) -> Result<()> {
        self.ensure_confirmed()?;
        self.api.enable_api_control(false, vehicle)?;
        debug!(vehicle, "API control released");
        if self.owned_vehicle.as_deref() == Some(vehicle) {
            self.owned_vehicle = None;
        }
        Ok(())
    }

    /// Take control of `vehicle` for the lifetime of the returned guard.
    pub fn acquire_control(&mut self, vehicle: &str) -> Result<ControlGuard<'_>> {
        self.request_control(vehicle)?;
        Ok(ControlGuard {
            conn: self,
            vehicle: vehicle.to_string(),
            retained: false,
        })
    }

    pub fn is_api_control_enabled(&mut self, vehicle: &str) -> Result<bool> {
        self.ensure_confirmed()?;
        self.api.is_api_control_enabled(vehicle)
    }

    // ── Vehicle and sensor calls ──────────────────────────────────────────

    pub fn reset(&mut self) -> Result<()> {
        self.ensure_confirmed()?;
        self.api.reset()
    }

    pub fn car_state(&mut self, vehicle: &str) -> Result<CarState> {
        self.ensure_confirmed()?;
        self.api.car_state(vehicle)
    }

    pub fn set_car_controls(&mut self, controls: &CarControls, vehicle: &str) -> Result<()> {
        self.ensure_confirmed()?;
        self.api.set_car_controls(controls, vehicle)
    }

    pub fn images(
        &mut self,
        requests: &[ImageRequest],
        vehicle: &str,
    ) -> Result<Vec<ImageResponse>> {
        self.ensure_confirmed()?;
        self.api.sim_get_images(requests, vehicle)
    }

    pub fn lidar_data(&mut self, sensor: &str, vehicle: &str) -> Result<LidarData> {
        self.ensure_confirmed()?;
        self.api.lidar_data(sensor, vehicle)
    }

    fn ensure_confirmed(&self) -> Result<()> {
        if self.confirmed {
            Ok(())
        } else {
            Err(SimError::Connection(
                "connection has not been confirmed; call confirm() first".to_string(),
            ))
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(vehicle) = self.owned_vehicle.take() {
            debug!(%vehicle, "releasing API control on disconnect");
            if let Err(e) = self.api.enable_api_control(false, &vehicle) {
                warn!(%vehicle, error = %e, "failed to release API control on disconnect");
            }
        }
    }
}

// ── ControlGuard ──────────────────────────────────────────────────────────────

/// Scoped API control of one vehicle.
///
/// Dereferences to the underlying [`Connection`] so calls can be issued
/// while control is held. Control is released on drop unless
/// [`ControlGuard::retain`] was called.
pub struct ControlGuard<'a> {
    conn: &'a mut Connection,
    vehicle: String,
    retained: bool,
}

impl ControlGuard<'_> {
    /// Vehicle this guard controls.
    pub fn vehicle(&self) -> &str {
        &self.vehicle
    }

    /// Keep control after the guard goes away. Ownership passes back to the
    /// connection, which releases it when it drops.
    pub fn retain(mut self) {
        self.retained = true;
    }
}

impl Deref for ControlGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
    }
}

impl DerefMut for ControlGuard<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn
    }
}

impl Drop for ControlGuard<'_> {
    fn drop(&mut self) {
        if self.retained {
            return;
        }
        if let Err(e) = self.conn.release_control(&self.vehicle) {
            warn!(vehicle = %self.vehicle, error = %e, "failed to release API control");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSimulator;

    fn confirmed(mock: &MockSimulator) -> Connection {
        let mut conn = Connection::with_api("127.0.0.1", 41451, Box::new(mock.clone()));
        conn.confirm().expect("mock confirms");
        conn
    }

    #[test]
    fn test_calls_before_confirm_are_rejected() {
        let mock = MockSimulator::new();
        let mut conn = Connection::with_api("127.0.0.1", 41451, Box::new(mock.clone()));

        let err = conn.car_state("Car1").unwrap_err();
        assert!(matches!(err, SimError::Connection(_)));
        assert!(conn.request_control("Car1").is_err());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_confirm_fails_when_ping_fails() {
        let mock = MockSimulator::new();
        mock.fail_method("ping");
        let mut conn = Connection::with_api("127.0.0.1", 41451, Box::new(mock.clone()));

        let err = conn.confirm().unwrap_err();
        assert!(matches!(err, SimError::Connection(_)));
        assert!(!conn.is_confirmed());
    }

    #[test]
    fn test_request_and_release_toggle_ownership() {
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        conn.request_control("Car1").unwrap();
        assert!(conn.control_owned());
        assert!(mock.api_control_enabled("Car1"));

        conn.release_control("Car1").unwrap();
        assert!(!conn.control_owned());
        assert!(!mock.api_control_enabled("Car1"));
    }

    #[test]
    fn test_guard_releases_on_scope_exit() {
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);
        {
            let mut guard = conn.acquire_control("Car1").unwrap();
            assert!(mock.api_control_enabled("Car1"));
            guard.car_state("Car1").unwrap();
        }
        assert!(!mock.api_control_enabled("Car1"));
        assert!(!conn.control_owned());
    }

    #[test]
    fn test_guard_releases_on_error_path() {
        fn failing_step(conn: &mut Connection) -> Result<()> {
            let mut guard = conn.acquire_control("Car1")?;
            guard.car_state("Car1")?;
            Ok(())
        }

        let mock = MockSimulator::new();
        mock.fail_method("getCarState");
        let mut conn = confirmed(&mock);

        assert!(failing_step(&mut conn).is_err());
        assert!(!mock.api_control_enabled("Car1"));
    }

    #[test]
    fn test_guard_retain_keeps_control_until_disconnect() {
        let mock = MockSimulator::new();
        let mut conn = confirmed(&mock);

        conn.acquire_control("Car1").unwrap().retain();
        assert!(mock.api_control_enabled("Car1"));
        assert!(conn.control_owned());

        drop(conn);
        assert!(!mock.api_control_enabled("Car1"));
    }

    #[test]
    fn test_release_clears_foreign_ownership() {
        let mock = MockSimulator::new();
        mock.set_api_control("Car1", true);
        let mut conn = confirmed(&mock);

        assert!(!conn.control_owned());
        conn.release_control("Car1").unwrap();
        assert!(!mock.api_control_enabled("Car1"));
    }
}
