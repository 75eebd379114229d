//! Multi-vehicle ground station core
//!
//! - `connection`: reconnecting transport client for the telemetry stream
//! - `state`: per-vehicle state with live/snapshot precedence and history
//! - `slots`: viewing slots with unique assignment and focus tracking
//! - `station`: the single-consumer context tying them together

pub mod commands;
pub mod config;
pub mod connection;
pub mod notify;
pub mod replay;
pub mod slots;
pub mod state;
pub mod station;
pub mod transport;

pub use config::{ConfigError, StationConfig};
pub use connection::{ConnectionConfig, ConnectionEvent, TransportClient};
pub use slots::{SlotError, SlotEvent, SlotId, SlotMultiplexer};
pub use state::{StateRepository, VehicleChanged, VehicleState};
pub use station::{Station, StationRequest};
