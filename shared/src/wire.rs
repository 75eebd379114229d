//! JSON wire shapes exchanged with the telemetry backend
//!
//! Inbound traffic arrives in one of two envelope shapes:
//!
//! ```text
//! A (sender-tagged): { "userId": "...", "role": "...", "message": { ...vehicle fields... } }
//! B (event-tagged):  { "eventType": "DroneTelemetryReceived", "timeStamp": "...", "payload": {...} | "id" }
//! ```
//!
//! Outbound commands always use the sender-tagged shape with role
//! `FlightCommand` or `UtilityCommand`.

use serde::{Deserialize, Serialize};

/// Role value for flight commands
pub const ROLE_FLIGHT_COMMAND: &str = "FlightCommand";

/// Role value for utility commands
pub const ROLE_UTILITY_COMMAND: &str = "UtilityCommand";

/// Role value marking a shape A message as a disconnect notice
pub const ROLE_DISCONNECTED: &str = "Disconnected";

/// Envelope A: sender id, role and an inline vehicle message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SenderEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<VehicleMessage>,
}

/// Home location as reported inside envelope A
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Raw vehicle fields carried by envelope A
///
/// Units follow the backend: `alt` in metres, `battery` in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VehicleMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_location: Option<HomeLocation>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub alt: Option<f64>,
    pub heading: Option<f64>,
    pub velocity_x: Option<f64>,
    pub velocity_y: Option<f64>,
    pub velocity_z: Option<f64>,
    pub battery: Option<f64>,
    pub is_flying: Option<bool>,
    pub online: Option<bool>,
    pub are_motors_on: Option<bool>,
    pub are_lights_on: Option<bool>,
    pub is_going_home: Option<bool>,
    pub is_mission_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission_step: Option<i64>,
}

/// Envelope B: event tag, timestamp and a nested payload
///
/// The payload is an object for telemetry events and a bare vehicle id
/// string for disconnect events, so it is kept untyped until the tag is known.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(alias = "EventType")]
    pub event_type: Option<String>,
    #[serde(alias = "TimeStamp")]
    pub time_stamp: Option<String>,
    #[serde(alias = "Payload")]
    pub payload: Option<serde_json::Value>,
}

/// Telemetry payload of envelope B
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryPayload {
    #[serde(alias = "DroneId", alias = "vehicleId")]
    pub drone_id: Option<String>,
    #[serde(alias = "Model")]
    pub model: Option<String>,
    #[serde(alias = "Telemetry")]
    pub telemetry: Option<TelemetryDetails>,
}

/// Detailed telemetry fields shared by envelope B and snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryDetails {
    #[serde(alias = "Timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(alias = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(alias = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(alias = "Altitude")]
    pub altitude: Option<f64>,
    #[serde(alias = "VelocityX")]
    pub velocity_x: Option<f64>,
    #[serde(alias = "VelocityY")]
    pub velocity_y: Option<f64>,
    #[serde(alias = "VelocityZ")]
    pub velocity_z: Option<f64>,
    #[serde(alias = "BatteryLevel")]
    pub battery_level: Option<f64>,
    #[serde(alias = "BatteryTemperature")]
    pub battery_temperature: Option<f64>,
    #[serde(alias = "Heading")]
    pub heading: Option<f64>,
    #[serde(alias = "SatelliteCount")]
    pub satellite_count: Option<u32>,
    #[serde(alias = "IsFlying")]
    pub is_flying: Option<bool>,
    #[serde(alias = "Online")]
    pub online: Option<bool>,
    #[serde(alias = "IsGoingHome")]
    pub is_going_home: Option<bool>,
    #[serde(alias = "IsMissionActive")]
    pub is_mission_active: Option<bool>,
    #[serde(alias = "AreMotorsOn")]
    pub are_motors_on: Option<bool>,
    #[serde(alias = "AreLightsOn")]
    pub are_lights_on: Option<bool>,
}

/// A decoded snapshot record supplied by the REST polling collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotRecord {
    #[serde(rename = "droneId", alias = "vehicleId")]
    pub vehicle_id: String,
    pub model: Option<String>,
    pub is_connected: bool,
    pub telemetry: Option<TelemetryDetails>,
}

/// One page of snapshot records
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotPage {
    pub items: Vec<SnapshotRecord>,
    pub total_count: u32,
}

/// Flight commands understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightCommand {
    Takeoff,
    Land,
    StartGoHome,
    StopMission,
}

impl FlightCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightCommand::Takeoff => "takeoff",
            FlightCommand::Land => "land",
            FlightCommand::StartGoHome => "startGoHome",
            FlightCommand::StopMission => "stopMission",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "takeoff" => Some(FlightCommand::Takeoff),
            "land" => Some(FlightCommand::Land),
            "startGoHome" => Some(FlightCommand::StartGoHome),
            "stopMission" => Some(FlightCommand::StopMission),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlightCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Utility commands carrying a boolean state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityCommand {
    Motors,
}

impl UtilityCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtilityCommand::Motors => "motors",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "motors" => Some(UtilityCommand::Motors),
            _ => None,
        }
    }
}

/// A command addressed to one vehicle (fire-and-forget)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    Flight {
        vehicle_id: String,
        command: FlightCommand,
    },
    Utility {
        vehicle_id: String,
        command: UtilityCommand,
        state: bool,
    },
}

impl OutboundCommand {
    pub fn flight(vehicle_id: impl Into<String>, command: FlightCommand) -> Self {
        OutboundCommand::Flight {
            vehicle_id: vehicle_id.into(),
            command,
        }
    }

    pub fn utility(vehicle_id: impl Into<String>, command: UtilityCommand, state: bool) -> Self {
        OutboundCommand::Utility {
            vehicle_id: vehicle_id.into(),
            command,
            state,
        }
    }

    /// Target vehicle
    pub fn vehicle_id(&self) -> &str {
        match self {
            OutboundCommand::Flight { vehicle_id, .. } | OutboundCommand::Utility { vehicle_id, .. } => {
                vehicle_id
            }
        }
    }

    /// Build the wire envelope for this command
    pub fn to_envelope(&self) -> CommandEnvelope {
        match self {
            OutboundCommand::Flight { vehicle_id, command } => CommandEnvelope {
                user_id: vehicle_id.clone(),
                role: ROLE_FLIGHT_COMMAND.into(),
                message: CommandMessage {
                    command: command.as_str().into(),
                    state: None,
                },
            },
            OutboundCommand::Utility {
                vehicle_id,
                command,
                state,
            } => CommandEnvelope {
                user_id: vehicle_id.clone(),
                role: ROLE_UTILITY_COMMAND.into(),
                message: CommandMessage {
                    command: command.as_str().into(),
                    state: Some(*state),
                },
            },
        }
    }

    /// Interpret a received command envelope, if it names a known command
    pub fn from_envelope(envelope: &CommandEnvelope) -> Option<Self> {
        match envelope.role.as_str() {
            ROLE_FLIGHT_COMMAND => FlightCommand::parse(&envelope.message.command)
                .map(|command| OutboundCommand::flight(envelope.user_id.clone(), command)),
            ROLE_UTILITY_COMMAND => {
                let command = UtilityCommand::parse(&envelope.message.command)?;
                let state = envelope.message.state?;
                Some(OutboundCommand::utility(envelope.user_id.clone(), command, state))
            }
            _ => None,
        }
    }
}

/// Outbound command envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub user_id: String,
    pub role: String,
    pub message: CommandMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_command_names() {
        assert_eq!(FlightCommand::StartGoHome.as_str(), "startGoHome");
        assert_eq!(FlightCommand::parse("stopMission"), Some(FlightCommand::StopMission));
        assert_eq!(FlightCommand::parse("ARM"), None);
    }

    #[test]
    fn test_flight_envelope_shape() {
        let cmd = OutboundCommand::flight("RD001", FlightCommand::Takeoff);
        let json = serde_json::to_value(cmd.to_envelope()).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "userId": "RD001",
                "role": "FlightCommand",
                "message": { "command": "takeoff" }
            })
        );
    }

    #[test]
    fn test_utility_envelope_shape() {
        let cmd = OutboundCommand::utility("RD002", UtilityCommand::Motors, true);
        let json = serde_json::to_value(cmd.to_envelope()).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "userId": "RD002",
                "role": "UtilityCommand",
                "message": { "command": "motors", "state": true }
            })
        );
    }

    #[test]
    fn test_from_envelope_requires_state_for_utility() {
        let envelope = CommandEnvelope {
            user_id: "RD001".into(),
            role: ROLE_UTILITY_COMMAND.into(),
            message: CommandMessage {
                command: "motors".into(),
                state: None,
            },
        };
        assert!(OutboundCommand::from_envelope(&envelope).is_none());
    }

    #[test]
    fn test_snapshot_record_accepts_both_id_keys() {
        let a: SnapshotRecord =
            serde_json::from_str(r#"{"droneId":"RD001","model":"M30","isConnected":true}"#).expect("parse");
        let b: SnapshotRecord = serde_json::from_str(r#"{"vehicleId":"RD001"}"#).expect("parse");
        assert_eq!(a.vehicle_id, "RD001");
        assert!(a.is_connected);
        assert_eq!(b.vehicle_id, "RD001");
        assert!(b.telemetry.is_none());
    }
}
