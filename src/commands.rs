//! Which commands may currently be issued to a vehicle

use crate::state::VehicleState;
use groundstation_shared::{now_ms, FlightCommand, OutboundCommand, UtilityCommand};

/// Destination for outbound commands
pub trait CommandSink: Send {
    /// Hand a command to the link; false when it was discarded
    fn send_command(&self, command: &OutboundCommand) -> bool;
}

/// Commands permitted for one vehicle at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandAvailability {
    /// Motor arm/disarm toggle
    pub motors: bool,
    pub takeoff: bool,
    pub land: bool,
    pub go_home: bool,
    pub stop: bool,
}

impl CommandAvailability {
    /// Nothing allowed (no vehicle selected)
    pub fn none() -> Self {
        Self::default()
    }

    pub fn allows_flight(&self, command: FlightCommand) -> bool {
        match command {
            FlightCommand::Takeoff => self.takeoff,
            FlightCommand::Land => self.land,
            FlightCommand::StartGoHome => self.go_home,
            FlightCommand::StopMission => self.stop,
        }
    }

    pub fn allows(&self, command: &OutboundCommand) -> bool {
        match command {
            OutboundCommand::Flight { command, .. } => self.allows_flight(*command),
            OutboundCommand::Utility {
                command: UtilityCommand::Motors,
                ..
            } => self.motors,
        }
    }
}

/// A vehicle is safe to command when it is connected and not stale.
/// Motors and takeoff need a safe vehicle on the ground, land and go-home
/// a safe vehicle in the air; stop only needs a connection.
pub fn evaluate_at(state: Option<&VehicleState>, now_ms: u64) -> CommandAvailability {
    let Some(state) = state else {
        return CommandAvailability::none();
    };

    let connected = state.is_connected();
    let safe = connected && !state.is_stale_at(now_ms);
    let flying = state.latest().flags().flying;

    CommandAvailability {
        motors: safe && !flying,
        takeoff: safe && !flying,
        land: safe && flying,
        go_home: safe && flying,
        stop: connected,
    }
}

pub fn evaluate(state: Option<&VehicleState>) -> CommandAvailability {
    evaluate_at(state, now_ms())
}
