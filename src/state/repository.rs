//! Single writer of per-vehicle state
//!
//! Live telemetry always wins over pulled snapshots: a snapshot only
//! touches the dynamic fields of a vehicle that is not live (connected
//! and heard from within the stale threshold). Static fields such as the
//! model are always taken from the snapshot.

use super::vehicle::{VehicleState, VehicleSummary};
use crate::notify::EventBus;
use groundstation_shared::{codec, defaults, now_ms, SnapshotRecord, TelemetrySample};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Emitted after every accepted update
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleChanged {
    pub vehicle_id: String,
    pub summary: VehicleSummary,
    pub history_len: usize,
}

/// Owns the vehicle table; all writes go through these operations
#[derive(Debug)]
pub struct StateRepository {
    states: BTreeMap<String, VehicleState>,
    history_capacity: usize,
    stale_threshold_ms: u64,
    changes: EventBus<VehicleChanged>,
}

impl StateRepository {
    pub fn new(history_capacity: usize, stale_threshold_ms: u64) -> Self {
        Self {
            states: BTreeMap::new(),
            history_capacity,
            stale_threshold_ms,
            changes: EventBus::new(),
        }
    }

    pub fn stale_threshold_ms(&self) -> u64 {
        self.stale_threshold_ms
    }

    /// Register for vehicle-state-changed notifications
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<VehicleChanged> {
        self.changes.subscribe()
    }

    /// State for `vehicle_id`, created on first reference
    ///
    /// Only the empty id yields `None`.
    pub fn get(&mut self, vehicle_id: &str) -> Option<&VehicleState> {
        if vehicle_id.is_empty() {
            return None;
        }
        Some(self.entry(vehicle_id))
    }

    /// State for `vehicle_id` without creating an entry
    pub fn peek(&self, vehicle_id: &str) -> Option<&VehicleState> {
        self.states.get(vehicle_id)
    }

    /// Every known vehicle, ordered by id
    pub fn all_states(&self) -> Vec<&VehicleState> {
        self.states.values().collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn update_from_telemetry(&mut self, sample: TelemetrySample) {
        self.update_from_telemetry_at(sample, now_ms());
    }

    /// Apply a live sample received at `now_ms`
    pub fn update_from_telemetry_at(&mut self, sample: TelemetrySample, now_ms: u64) {
        if sample.vehicle_id().is_empty() {
            return;
        }
        let vehicle_id = sample.vehicle_id().to_string();
        self.entry(&vehicle_id).apply_live(sample, now_ms);
        self.notify(&vehicle_id);
    }

    pub fn update_from_snapshot(&mut self, snapshot: &SnapshotRecord) {
        self.update_from_snapshot_at(snapshot, now_ms());
    }

    /// Apply a pulled snapshot as of `now_ms`
    pub fn update_from_snapshot_at(&mut self, snapshot: &SnapshotRecord, now_ms: u64) {
        let vehicle_id = snapshot.vehicle_id.as_str();
        if vehicle_id.is_empty() {
            return;
        }

        let state = self.entry(vehicle_id);
        if let Some(model) = snapshot.model.as_deref().filter(|m| !m.is_empty()) {
            state.set_model(model);
        }

        if state.is_live_at(now_ms) {
            debug!("Vehicle {} is live, ignoring snapshot readings", vehicle_id);
        } else {
            match &snapshot.telemetry {
                Some(details) => {
                    let readings = codec::sample_from_details(
                        vehicle_id,
                        snapshot.model.as_deref(),
                        details,
                    );
                    let connected = details.online.unwrap_or(snapshot.is_connected);
                    state.apply_snapshot_readings(readings, connected, now_ms);
                }
                None => state.apply_snapshot_connectivity(snapshot.is_connected),
            }
        }

        self.notify(vehicle_id);
    }

    /// Keep the last known values but flag the vehicle as offline
    pub fn mark_disconnected(&mut self, vehicle_id: &str) {
        if vehicle_id.is_empty() {
            return;
        }
        self.entry(vehicle_id).mark_disconnected();
        self.notify(vehicle_id);
    }

    fn entry(&mut self, vehicle_id: &str) -> &mut VehicleState {
        let capacity = self.history_capacity;
        let threshold = self.stale_threshold_ms;
        self.states
            .entry(vehicle_id.to_string())
            .or_insert_with(|| VehicleState::new(vehicle_id, capacity, threshold))
    }

    fn notify(&mut self, vehicle_id: &str) {
        let Some(state) = self.states.get(vehicle_id) else {
            return;
        };
        let change = VehicleChanged {
            vehicle_id: vehicle_id.to_string(),
            summary: state.summary(),
            history_len: state.history_len(),
        };
        self.changes.emit(change);
    }
}

impl Default for StateRepository {
    fn default() -> Self {
        Self::new(defaults::HISTORY_CAPACITY, defaults::STALE_THRESHOLD_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundstation_shared::{wire::TelemetryDetails, Position, StatusFlags};

    fn sample(id: &str, latitude: f64) -> TelemetrySample {
        TelemetrySample::new(id)
            .with_model("Mavic 3")
            .with_position(Position {
                latitude,
                longitude: -8.8,
                altitude: 50.0,
            })
            .with_flags(StatusFlags {
                online: true,
                flying: true,
                ..Default::default()
            })
    }

    fn snapshot(id: &str, latitude: f64, online: bool) -> SnapshotRecord {
        SnapshotRecord {
            vehicle_id: id.to_string(),
            model: Some("Matrice 30".into()),
            is_connected: online,
            telemetry: Some(TelemetryDetails {
                latitude: Some(latitude),
                longitude: Some(1.0),
                altitude: Some(10.0),
                online: Some(online),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_get_creates_default_entry() {
        let mut repo = StateRepository::default();
        let state = repo.get("RD001").expect("state");
        assert!(!state.is_connected());
        assert_eq!(state.history_len(), 0);
        assert_eq!(repo.len(), 1);

        assert!(repo.get("").is_none());
        assert!(repo.peek("RD002").is_none());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_telemetry_update_marks_connected_and_notifies() {
        let mut repo = StateRepository::default();
        let mut changes = repo.subscribe();

        repo.update_from_telemetry_at(sample("RD001", 39.7), 1_000);

        let state = repo.peek("RD001").expect("state");
        assert!(state.is_connected());
        assert_eq!(state.last_heartbeat_ms(), Some(1_000));
        assert_eq!(state.latest().position().latitude, 39.7);

        let change = changes.try_recv().expect("notification");
        assert_eq!(change.vehicle_id, "RD001");
        assert_eq!(change.history_len, 1);
        assert!(change.summary.is_connected);
    }

    #[test]
    fn test_empty_ids_are_ignored() {
        let mut repo = StateRepository::default();
        let mut changes = repo.subscribe();

        repo.update_from_telemetry_at(TelemetrySample::new(""), 1_000);
        repo.update_from_snapshot_at(&SnapshotRecord::default(), 1_000);
        repo.mark_disconnected("");

        assert!(repo.is_empty());
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let mut repo = StateRepository::default();
        for i in 0..2001 {
            repo.update_from_telemetry_at(sample("A", i as f64), i);
        }

        let state = repo.peek("A").expect("state");
        assert_eq!(state.history_len(), 2000);
        assert_eq!(state.history().front().map(|s| s.position().latitude), Some(1.0));
        assert!(state
            .history()
            .iter()
            .all(|s| s.position().latitude != 0.0));
    }

    #[test]
    fn test_snapshot_ignored_while_live_except_model() {
        let mut repo = StateRepository::default();
        repo.update_from_telemetry_at(sample("RD001", 39.7), 10_000);
        let mut changes = repo.subscribe();

        repo.update_from_snapshot_at(&snapshot("RD001", 1.0, false), 12_000);

        let state = repo.peek("RD001").expect("state");
        assert_eq!(state.latest().model(), "Matrice 30");
        assert_eq!(state.latest().position().latitude, 39.7);
        assert!(state.latest().flags().flying);
        assert!(state.is_connected());
        assert_eq!(state.last_heartbeat_ms(), Some(10_000));
        assert!(changes.try_recv().is_ok());
    }

    #[test]
    fn test_snapshot_with_empty_model_keeps_known_model() {
        let mut repo = StateRepository::default();
        repo.update_from_telemetry_at(sample("RD001", 39.7), 10_000);
        let blank = SnapshotRecord {
            model: Some(String::new()),
            ..snapshot("RD001", 1.0, true)
        };

        repo.update_from_snapshot_at(&blank, 12_000);
        assert_eq!(repo.peek("RD001").expect("state").latest().model(), "Mavic 3");

        repo.update_from_snapshot_at(&blank, 20_000);
        let state = repo.peek("RD001").expect("state");
        assert_eq!(state.latest().position().latitude, 1.0);
        assert_eq!(state.latest().model(), "Mavic 3");
    }

    #[test]
    fn test_snapshot_applies_when_stale() {
        let mut repo = StateRepository::default();
        repo.update_from_telemetry_at(sample("RD001", 39.7), 10_000);

        repo.update_from_snapshot_at(&snapshot("RD001", 1.0, false), 15_001);

        let state = repo.peek("RD001").expect("state");
        assert_eq!(state.latest().position().latitude, 1.0);
        assert_eq!(state.latest().model(), "Matrice 30");
        assert!(!state.is_connected());
        assert_eq!(state.last_heartbeat_ms(), Some(15_001));
        assert_eq!(state.history_len(), 1);
    }

    #[test]
    fn test_snapshot_applies_after_disconnect() {
        let mut repo = StateRepository::default();
        repo.update_from_telemetry_at(sample("RD001", 39.7), 10_000);
        repo.mark_disconnected("RD001");

        repo.update_from_snapshot_at(&snapshot("RD001", 2.0, true), 10_500);

        let state = repo.peek("RD001").expect("state");
        assert_eq!(state.latest().position().latitude, 2.0);
        assert!(state.is_connected());
    }

    #[test]
    fn test_snapshot_without_telemetry_trusts_wrapper() {
        let mut repo = StateRepository::default();
        let record = SnapshotRecord {
            vehicle_id: "RD009".into(),
            model: None,
            is_connected: true,
            telemetry: None,
        };

        repo.update_from_snapshot_at(&record, 1_000);

        let state = repo.peek("RD009").expect("state");
        assert!(state.is_connected());
        assert!(state.latest().flags().online);
        assert_eq!(state.latest().model(), defaults::UNKNOWN_MODEL);
        assert_eq!(state.last_heartbeat_ms(), None);
    }

    #[test]
    fn test_mark_disconnected_keeps_last_values() {
        let mut repo = StateRepository::default();
        repo.update_from_telemetry_at(sample("RD001", 39.7), 1_000);
        let mut changes = repo.subscribe();

        repo.mark_disconnected("RD001");

        let state = repo.peek("RD001").expect("state");
        assert!(!state.is_connected());
        assert_eq!(state.latest().position().latitude, 39.7);
        assert_eq!(state.history_len(), 1);
        assert!(!changes.try_recv().expect("notification").summary.is_connected);
    }

    #[test]
    fn test_all_states_ordered_by_id() {
        let mut repo = StateRepository::default();
        repo.update_from_telemetry_at(sample("RD003", 0.0), 1);
        repo.update_from_telemetry_at(sample("RD001", 0.0), 1);
        repo.mark_disconnected("RD002");

        let ids: Vec<&str> = repo.all_states().iter().map(|s| s.vehicle_id()).collect();
        assert_eq!(ids, vec!["RD001", "RD002", "RD003"]);
    }
}
