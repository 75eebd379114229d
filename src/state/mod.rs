//! Per-vehicle state reconciled from live telemetry and snapshots

mod repository;
mod vehicle;

pub use repository::{StateRepository, VehicleChanged};
pub use vehicle::{VehicleState, VehicleSummary};
