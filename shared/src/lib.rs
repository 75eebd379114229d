//! Ground Station Shared Protocol Types
//!
//! This crate provides the wire envelopes, the telemetry decoder and the
//! command encoder shared between the ground station and the simulated
//! telemetry backend.

pub mod codec;
pub mod link_state;
pub mod sim;
pub mod telemetry;
pub mod wire;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use codec::{CodecError, InboundEvent};
pub use link_state::{LinkState, LinkStatus};
pub use telemetry::{Position, StatusFlags, TelemetrySample, Velocity};
pub use wire::{FlightCommand, OutboundCommand, SnapshotPage, SnapshotRecord, UtilityCommand};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Default tuning parameters for the station
pub mod defaults {
    /// A vehicle is stale once no heartbeat arrived for longer than this
    pub const STALE_THRESHOLD_MS: u64 = 5000;

    /// Samples kept per vehicle before the oldest is evicted
    pub const HISTORY_CAPACITY: usize = 2000;

    /// Maximum number of concurrent viewing slots
    pub const MAX_SLOTS: usize = 4;

    /// First reconnect delay after a failure
    pub const BACKOFF_INITIAL_MS: u64 = 1000;

    /// Upper bound for the reconnect delay
    pub const BACKOFF_MAX_MS: u64 = 10_000;

    /// Connect attempts taking longer than this count as failures
    pub const CONNECT_TIMEOUT_MS: u64 = 5000;

    /// Satellite count reported when the source does not provide one
    pub const SATELLITE_COUNT: u32 = 12;

    /// Battery temperature (Celsius) reported when the source does not provide one
    pub const BATTERY_TEMPERATURE_C: f64 = 25.0;

    /// Model name used when the source does not provide one
    pub const UNKNOWN_MODEL: &str = "Unknown";
}
