//! Simulator configuration (`config/sim` file plus `SIM__*` environment)

use groundstation_shared::sim::OrbitConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub bind_addr: String,
    pub fleet_size: usize,
    /// Telemetry frames per second per vehicle
    pub update_hz: f64,
    pub model: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,
    pub angular_speed: f64,
    pub altitude_m: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        let orbit = OrbitConfig::default();
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            fleet_size: 2,
            update_hz: 5.0,
            model: orbit.model,
            center_lat: orbit.center_lat,
            center_lon: orbit.center_lon,
            radius_m: orbit.radius_m,
            angular_speed: orbit.angular_speed,
            altitude_m: orbit.altitude_m,
        }
    }
}

impl SimConfig {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/sim").required(false))
            .add_source(
                config::Environment::with_prefix("SIM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        if config.fleet_size == 0 {
            anyhow::bail!("fleet_size must be at least 1");
        }
        if config.update_hz.is_nan() || config.update_hz <= 0.0 {
            anyhow::bail!("update_hz must be positive");
        }
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.update_hz)
    }

    /// Orbit template shared by every simulated vehicle
    pub fn orbit_template(&self) -> OrbitConfig {
        OrbitConfig {
            model: self.model.clone(),
            center_lat: self.center_lat,
            center_lon: self.center_lon,
            radius_m: self.radius_m,
            angular_speed: self.angular_speed,
            altitude_m: self.altitude_m,
            ..OrbitConfig::default()
        }
    }
}
