//! Canonical telemetry sample
//!
//! Every inbound wire shape is normalized into [`TelemetrySample`] before it
//! reaches the state repository. Construction goes through the `with_*`
//! methods so that heading and battery invariants always hold.

use crate::defaults;

/// Geographic position (degrees, metres above home)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Velocity vector in m/s
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Velocity {
    /// Horizontal ground speed
    pub fn ground_speed(&self) -> f64 {
        (self.x * self.x + self.z * self.z).sqrt()
    }
}

/// Boolean vehicle status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags {
    pub online: bool,
    pub flying: bool,
    pub motors_on: bool,
    pub lights_on: bool,
    pub going_home: bool,
    pub mission_active: bool,
}

/// One vehicle's instantaneous state
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    vehicle_id: String,
    model: String,
    position: Position,
    velocity: Velocity,
    heading: f64,
    battery_level: f64,
    battery_temperature: f64,
    satellite_count: u32,
    flags: StatusFlags,
}

impl TelemetrySample {
    /// Create an empty sample for a vehicle with default readings
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            model: String::new(),
            position: Position::default(),
            velocity: Velocity::default(),
            heading: 0.0,
            battery_level: 0.0,
            battery_temperature: defaults::BATTERY_TEMPERATURE_C,
            satellite_count: defaults::SATELLITE_COUNT,
            flags: StatusFlags::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = velocity;
        self
    }

    /// Heading is normalized into [0, 360)
    pub fn with_heading(mut self, heading: f64) -> Self {
        self.heading = normalize_heading(heading);
        self
    }

    /// Battery level is clamped into [0, 100]
    pub fn with_battery(mut self, level: f64, temperature: f64) -> Self {
        self.battery_level = clamp_battery(level);
        self.battery_temperature = temperature;
        self
    }

    pub fn with_satellites(mut self, count: u32) -> Self {
        self.satellite_count = count;
        self
    }

    pub fn with_flags(mut self, flags: StatusFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn battery_level(&self) -> f64 {
        self.battery_level
    }

    pub fn battery_temperature(&self) -> f64 {
        self.battery_temperature
    }

    pub fn satellite_count(&self) -> u32 {
        self.satellite_count
    }

    pub fn flags(&self) -> StatusFlags {
        self.flags
    }
}

/// Normalize a heading in degrees into [0, 360)
pub fn normalize_heading(heading: f64) -> f64 {
    if !heading.is_finite() {
        return 0.0;
    }
    let h = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if h >= 360.0 { 0.0 } else { h }
}

/// Clamp a battery percentage into [0, 100]
pub fn clamp_battery(level: f64) -> f64 {
    if level.is_nan() {
        return 0.0;
    }
    level.clamp(0.0, 100.0)
}
