//! Connection management for the telemetry stream
//!
//! This module handles:
//! - Persistent stream connection with automatic reconnection
//! - Exponential backoff between attempts
//! - Link status publication
//! - Fire-and-forget outbound commands

mod backoff;
mod manager;

pub use backoff::Backoff;
pub use manager::{ConnectionConfig, ConnectionEvent, TransportClient};
