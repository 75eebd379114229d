//! Orbit simulator for demo and development traffic
//!
//! Each simulated vehicle flies a circle around a centre point at constant
//! altitude, facing along the tangent of its orbit.

use crate::telemetry::{Position, StatusFlags, TelemetrySample, Velocity};

/// Approximate degrees of latitude per metre
const DEG_PER_METER_LAT: f64 = 1.0 / 111_111.0;

/// Approximate degrees of longitude per metre (at ~40 degrees latitude)
const DEG_PER_METER_LON: f64 = 1.0 / (111_111.0 * 0.766);

/// Orbit parameters for one simulated vehicle
#[derive(Debug, Clone)]
pub struct OrbitConfig {
    pub vehicle_id: String,
    pub model: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,
    /// Angular speed in rad/s
    pub angular_speed: f64,
    pub altitude_m: f64,
    /// Starting angle in radians
    pub phase: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            vehicle_id: "SIM-001".into(),
            model: "Sim-Test-Unit".into(),
            center_lat: 39.74362,
            center_lon: -8.80705,
            radius_m: 300.0,
            angular_speed: 0.2,
            altitude_m: 50.0,
            phase: 0.0,
        }
    }
}

/// Produces telemetry samples for a vehicle on a circular orbit
#[derive(Debug, Clone)]
pub struct OrbitSimulator {
    config: OrbitConfig,
    battery_drain_per_s: f64,
}

impl OrbitSimulator {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            config,
            battery_drain_per_s: 0.05,
        }
    }

    pub fn vehicle_id(&self) -> &str {
        &self.config.vehicle_id
    }

    /// Sample the orbit `elapsed_s` seconds after the simulation started
    pub fn sample_at(&self, elapsed_s: f64) -> TelemetrySample {
        let c = &self.config;
        let angle = c.phase + elapsed_s * c.angular_speed;

        let offset_x = angle.cos() * c.radius_m;
        let offset_z = angle.sin() * c.radius_m;

        let tangential = c.radius_m * c.angular_speed;
        let tangent = angle + std::f64::consts::FRAC_PI_2;

        TelemetrySample::new(c.vehicle_id.clone())
            .with_model(c.model.clone())
            .with_position(Position {
                latitude: c.center_lat + offset_z * DEG_PER_METER_LAT,
                longitude: c.center_lon + offset_x * DEG_PER_METER_LON,
                altitude: c.altitude_m,
            })
            .with_velocity(Velocity {
                x: tangent.cos() * tangential,
                y: 0.0,
                z: tangent.sin() * tangential,
            })
            .with_heading(angle.to_degrees() + 90.0)
            .with_battery(
                100.0 - elapsed_s * self.battery_drain_per_s,
                crate::defaults::BATTERY_TEMPERATURE_C,
            )
            .with_flags(StatusFlags {
                online: true,
                flying: true,
                motors_on: true,
                ..StatusFlags::default()
            })
    }
}

/// Build a fleet of `count` vehicles spread evenly around the same orbit
pub fn fleet(count: usize, template: &OrbitConfig) -> Vec<OrbitSimulator> {
    (0..count)
        .map(|i| {
            let phase = std::f64::consts::TAU * i as f64 / count.max(1) as f64;
            OrbitSimulator::new(OrbitConfig {
                vehicle_id: format!("SIM-{:03}", i + 1),
                phase,
                ..template.clone()
            })
        })
        .collect()
}
