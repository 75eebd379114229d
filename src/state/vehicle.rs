//! Per-vehicle state record

use groundstation_shared::{defaults, StatusFlags, TelemetrySample};
use std::collections::VecDeque;

/// Everything the station currently believes about one vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    vehicle_id: String,
    latest: TelemetrySample,
    is_connected: bool,
    last_heartbeat_ms: Option<u64>,
    history: VecDeque<TelemetrySample>,
    history_capacity: usize,
    stale_threshold_ms: u64,
}

/// History-free view of a vehicle, carried by change notifications
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSummary {
    pub vehicle_id: String,
    pub latest: TelemetrySample,
    pub is_connected: bool,
    pub last_heartbeat_ms: Option<u64>,
}

impl VehicleState {
    /// Fresh entry: disconnected, never heard from, empty history
    pub fn new(vehicle_id: &str, history_capacity: usize, stale_threshold_ms: u64) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            latest: TelemetrySample::new(vehicle_id).with_model(defaults::UNKNOWN_MODEL),
            is_connected: false,
            last_heartbeat_ms: None,
            history: VecDeque::new(),
            history_capacity: history_capacity.max(1),
            stale_threshold_ms,
        }
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn latest(&self) -> &TelemetrySample {
        &self.latest
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn last_heartbeat_ms(&self) -> Option<u64> {
        self.last_heartbeat_ms
    }

    /// Samples oldest-first
    pub fn history(&self) -> &VecDeque<TelemetrySample> {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// No heartbeat within the threshold as of `now_ms`
    ///
    /// A vehicle that was never heard from is stale.
    pub fn is_stale_at(&self, now_ms: u64) -> bool {
        match self.last_heartbeat_ms {
            Some(heartbeat) => now_ms.saturating_sub(heartbeat) > self.stale_threshold_ms,
            None => true,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(groundstation_shared::now_ms())
    }

    /// Connected and not stale as of `now_ms`
    pub fn is_live_at(&self, now_ms: u64) -> bool {
        self.is_connected && !self.is_stale_at(now_ms)
    }

    pub fn summary(&self) -> VehicleSummary {
        VehicleSummary {
            vehicle_id: self.vehicle_id.clone(),
            latest: self.latest.clone(),
            is_connected: self.is_connected,
            last_heartbeat_ms: self.last_heartbeat_ms,
        }
    }

    /// Live telemetry replaces the latest sample and is recorded in history
    pub(crate) fn apply_live(&mut self, sample: TelemetrySample, now_ms: u64) {
        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample.clone());
        self.latest = sample;
        self.is_connected = true;
        self.last_heartbeat_ms = Some(now_ms);
    }

    pub(crate) fn set_model(&mut self, model: &str) {
        self.latest = self.latest.clone().with_model(model);
    }

    /// Snapshot readings replace the dynamic fields, keeping the known model
    pub(crate) fn apply_snapshot_readings(
        &mut self,
        readings: TelemetrySample,
        connected: bool,
        now_ms: u64,
    ) {
        let model = self.latest.model().to_string();
        self.latest = readings.with_model(model);
        self.is_connected = connected;
        self.last_heartbeat_ms = Some(now_ms);
    }

    /// Snapshot without readings: only the connectivity opinion is taken
    pub(crate) fn apply_snapshot_connectivity(&mut self, connected: bool) {
        let flags = StatusFlags {
            online: connected,
            ..self.latest.flags()
        };
        self.latest = self.latest.clone().with_flags(flags);
        self.is_connected = connected;
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.is_connected = false;
    }
}
