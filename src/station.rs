//! Consumer-side context owning the vehicle state and the viewing slots
//!
//! Network events and UI requests are applied one at a time from a single
//! task, so neither the repository nor the multiplexer needs locking.

use crate::commands::{self, CommandSink};
use crate::config::StationConfig;
use crate::connection::ConnectionEvent;
use crate::replay::TrailReplay;
use crate::slots::{SlotError, SlotEvent, SlotId, SlotMultiplexer};
use crate::state::{StateRepository, VehicleChanged};
use groundstation_shared::{
    codec, now_ms, FlightCommand, InboundEvent, OutboundCommand, SnapshotPage, SnapshotRecord,
    TelemetrySample, UtilityCommand,
};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// UI intents marshaled onto the consumer task
#[derive(Debug, Clone, PartialEq)]
pub enum StationRequest {
    CreateSlot,
    RemoveSlot(SlotId),
    SetActiveSlot(SlotId),
    AssignToActive(String),
    SetDroneAtSlot { slot: SlotId, vehicle_id: String },
    ClearSlot(SlotId),
    ApplySnapshot(SnapshotRecord),
    ApplySnapshotPage(SnapshotPage),
    Flight(FlightCommand),
    ToggleMotors,
    Scrub(f64),
    ExitReplay,
}

impl FromStr for StationRequest {
    type Err = String;

    /// Parse a console line such as `assign RD001` or `focus 1`
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| "empty request".to_string())?;
        let arg = parts.next();

        let slot_arg = || -> Result<SlotId, String> {
            arg.ok_or_else(|| format!("{} needs a slot id", verb))?
                .parse()
                .map_err(|e| format!("bad slot id: {}", e))
        };

        match verb {
            "new" => Ok(StationRequest::CreateSlot),
            "remove" => Ok(StationRequest::RemoveSlot(slot_arg()?)),
            "focus" => Ok(StationRequest::SetActiveSlot(slot_arg()?)),
            "clear" => Ok(StationRequest::ClearSlot(slot_arg()?)),
            "assign" => arg
                .map(|id| StationRequest::AssignToActive(id.to_string()))
                .ok_or_else(|| "assign needs a vehicle id".to_string()),
            "motors" => Ok(StationRequest::ToggleMotors),
            "scrub" => arg
                .ok_or_else(|| "scrub needs a fraction".to_string())?
                .parse()
                .map(StationRequest::Scrub)
                .map_err(|e| format!("bad fraction: {}", e)),
            "live" => Ok(StationRequest::ExitReplay),
            other => FlightCommand::parse(other)
                .map(StationRequest::Flight)
                .ok_or_else(|| format!("unknown request: {}", other)),
        }
    }
}

pub struct Station {
    config: StationConfig,
    repository: StateRepository,
    slots: SlotMultiplexer,
    replay: TrailReplay,
    /// Own subscription used to keep the replay cursor on the focused slot
    slot_feed: mpsc::UnboundedReceiver<SlotEvent>,
    commands: Box<dyn CommandSink>,
    malformed: u64,
}

impl Station {
    pub fn new(config: StationConfig, commands: Box<dyn CommandSink>) -> Self {
        let repository = StateRepository::new(config.history_capacity, config.stale_threshold_ms);
        let mut slots = SlotMultiplexer::new(config.max_slots, config.focus_new_slots);
        let slot_feed = slots.subscribe();

        Self {
            config,
            repository,
            slots,
            replay: TrailReplay::new(),
            slot_feed,
            commands,
            malformed: 0,
        }
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn repository(&self) -> &StateRepository {
        &self.repository
    }

    pub fn slots(&self) -> &SlotMultiplexer {
        &self.slots
    }

    pub fn replay(&self) -> &TrailReplay {
        &self.replay
    }

    /// Messages dropped because they could not be decoded
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    pub fn subscribe_vehicles(&mut self) -> mpsc::UnboundedReceiver<VehicleChanged> {
        self.repository.subscribe()
    }

    pub fn subscribe_slots(&mut self) -> mpsc::UnboundedReceiver<SlotEvent> {
        self.slots.subscribe()
    }

    /// Apply network events and UI requests until cancelled or the transport stops
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<ConnectionEvent>,
        mut requests: mpsc::Receiver<StationRequest>,
        cancel: CancellationToken,
    ) {
        info!("Station {} running", self.config.client_id);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                event = events.recv() => match event {
                    Some(event) => self.handle_connection_event(event),
                    None => {
                        info!("Transport event stream closed");
                        break;
                    }
                },

                Some(request) = requests.recv() => self.handle_request(request),
            }
        }
        info!(
            "Station {} stopped ({} malformed messages dropped)",
            self.config.client_id, self.malformed
        );
    }

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected { epoch } => {
                info!("Telemetry link open (epoch {})", epoch);
            }
            ConnectionEvent::Disconnected { reason } => {
                warn!("Telemetry link lost: {}", reason);
            }
            ConnectionEvent::Received(text) => self.apply_frame_at(&text, now_ms()),
        }
    }

    /// Decode one text frame and apply it; malformed frames are counted and dropped
    pub fn apply_frame_at(&mut self, text: &str, now_ms: u64) {
        let event = match codec::decode(text) {
            Ok(event) => event,
            Err(e) => {
                self.malformed += 1;
                warn!("Dropping malformed message (#{}): {}", self.malformed, e);
                return;
            }
        };

        if !self.config.accepts_vehicle(event.vehicle_id()) {
            debug!("Ignoring filtered vehicle {}", event.vehicle_id());
            return;
        }

        match event {
            InboundEvent::Telemetry(sample) => {
                self.repository.update_from_telemetry_at(sample, now_ms)
            }
            InboundEvent::Disconnected { vehicle_id } => {
                info!("Vehicle {} disconnected", vehicle_id);
                self.repository.mark_disconnected(&vehicle_id);
            }
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &SnapshotRecord) {
        self.apply_snapshot_at(snapshot, now_ms());
    }

    pub fn apply_snapshot_at(&mut self, snapshot: &SnapshotRecord, now_ms: u64) {
        if !self.config.accepts_vehicle(&snapshot.vehicle_id) {
            debug!("Ignoring snapshot for filtered vehicle {}", snapshot.vehicle_id);
            return;
        }
        self.repository.update_from_snapshot_at(snapshot, now_ms);
    }

    pub fn apply_snapshot_page(&mut self, page: &SnapshotPage) {
        let now = now_ms();
        debug!(
            "Applying snapshot page ({} of {} vehicles)",
            page.items.len(),
            page.total_count
        );
        for snapshot in &page.items {
            self.apply_snapshot_at(snapshot, now);
        }
    }

    pub fn create_slot(&mut self) -> Result<SlotId, SlotError> {
        let result = self.slots.create_slot();
        self.sync_replay();
        result
    }

    pub fn remove_slot(&mut self, slot: SlotId) -> Result<(), SlotError> {
        let result = self.slots.remove_slot(slot);
        self.sync_replay();
        result
    }

    pub fn set_active_slot(&mut self, slot: SlotId) -> bool {
        let changed = self.slots.set_active_slot(slot);
        self.sync_replay();
        changed
    }

    pub fn set_drone_at_slot(&mut self, slot: SlotId, vehicle_id: &str) -> Result<bool, SlotError> {
        let result = self.slots.set_drone_at_slot(slot, vehicle_id);
        self.sync_replay();
        result
    }

    pub fn assign_drone_to_active_slot(&mut self, vehicle_id: &str) -> Result<bool, SlotError> {
        let result = self.slots.assign_drone_to_active_slot(vehicle_id);
        self.sync_replay();
        result
    }

    pub fn clear_slot(&mut self, slot: SlotId) -> Result<bool, SlotError> {
        let result = self.slots.clear_slot(slot);
        self.sync_replay();
        result
    }

    /// Send a flight command to the vehicle in the focused slot
    pub fn send_flight_command_to_active(&mut self, command: FlightCommand) -> bool {
        let Some(vehicle_id) = self.slots.active_drone().map(str::to_string) else {
            warn!("No vehicle in the active slot, not sending {}", command);
            return false;
        };

        let allowed = commands::evaluate(self.repository.peek(&vehicle_id));
        if !allowed.allows_flight(command) {
            warn!("{} is not allowed for {} right now", command, vehicle_id);
            return false;
        }

        self.commands
            .send_command(&OutboundCommand::flight(vehicle_id, command))
    }

    /// Flip the motors of the vehicle in the focused slot
    pub fn toggle_motors_on_active(&mut self) -> bool {
        let Some(vehicle_id) = self.slots.active_drone().map(str::to_string) else {
            warn!("No vehicle in the active slot, not toggling motors");
            return false;
        };

        let state = self.repository.peek(&vehicle_id);
        if !commands::evaluate(state).motors {
            warn!("Motors cannot be toggled for {} right now", vehicle_id);
            return false;
        }

        let motors_on = state.is_some_and(|s| s.latest().flags().motors_on);
        self.commands.send_command(&OutboundCommand::utility(
            vehicle_id,
            UtilityCommand::Motors,
            !motors_on,
        ))
    }

    pub fn scrub(&mut self, fraction: f64) -> Option<TelemetrySample> {
        self.replay.scrub(fraction, &self.repository)
    }

    pub fn exit_replay(&mut self) {
        self.replay.exit();
    }

    pub fn handle_request(&mut self, request: StationRequest) {
        let outcome = match request {
            StationRequest::CreateSlot => self.create_slot().map(|_| ()),
            StationRequest::RemoveSlot(slot) => self.remove_slot(slot),
            StationRequest::SetActiveSlot(slot) => {
                self.set_active_slot(slot);
                Ok(())
            }
            StationRequest::AssignToActive(vehicle_id) => {
                self.assign_drone_to_active_slot(&vehicle_id).map(|_| ())
            }
            StationRequest::SetDroneAtSlot { slot, vehicle_id } => {
                self.set_drone_at_slot(slot, &vehicle_id).map(|_| ())
            }
            StationRequest::ClearSlot(slot) => self.clear_slot(slot).map(|_| ()),
            StationRequest::ApplySnapshot(snapshot) => {
                self.apply_snapshot(&snapshot);
                Ok(())
            }
            StationRequest::ApplySnapshotPage(page) => {
                self.apply_snapshot_page(&page);
                Ok(())
            }
            StationRequest::Flight(command) => {
                self.send_flight_command_to_active(command);
                Ok(())
            }
            StationRequest::ToggleMotors => {
                self.toggle_motors_on_active();
                Ok(())
            }
            StationRequest::Scrub(fraction) => {
                if self.scrub(fraction).is_none() {
                    debug!("Nothing to replay");
                }
                Ok(())
            }
            StationRequest::ExitReplay => {
                self.exit_replay();
                Ok(())
            }
        };

        if let Err(e) = outcome {
            warn!("Slot request rejected: {}", e);
        }
    }

    fn sync_replay(&mut self) {
        while let Ok(event) = self.slot_feed.try_recv() {
            self.replay.on_slot_event(&event, &self.slots);
        }
    }
}
