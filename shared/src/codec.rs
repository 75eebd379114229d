//! JSON codec for the telemetry stream
//!
//! Inbound text frames are decoded by sniffing the envelope shape:
//!
//! 1. Try envelope A (sender-tagged). It is accepted only when a vehicle id
//!    can be resolved from `message.id` or `userId`.
//! 2. Otherwise try envelope B (event-tagged) and route on `eventType`.
//! 3. Anything else is rejected with a [`CodecError`]; partially populated
//!    samples are never produced.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::defaults;
use crate::telemetry::{Position, StatusFlags, TelemetrySample, Velocity};
use crate::wire::{
    EventEnvelope, OutboundCommand, SenderEnvelope, SnapshotPage, TelemetryDetails,
    TelemetryPayload, VehicleMessage, ROLE_DISCONNECTED, ROLE_FLIGHT_COMMAND, ROLE_UTILITY_COMMAND,
};

/// Event tags routed to telemetry
const TELEMETRY_TAGS: [&str; 2] = ["DroneTelemetryReceived", "TelemetryReceived"];

/// Event tags routed to disconnect handling
const DISCONNECT_TAGS: [&str; 2] = ["DroneDisconnected", "Disconnected"];

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message carries no vehicle id")]
    MissingVehicleId,

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Message matches no known envelope shape")]
    UnrecognizedShape,

    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },
}

/// A successfully decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A fresh telemetry sample
    Telemetry(TelemetrySample),
    /// The backend lost the link to a vehicle
    Disconnected { vehicle_id: String },
}

impl InboundEvent {
    /// Vehicle this event refers to
    pub fn vehicle_id(&self) -> &str {
        match self {
            InboundEvent::Telemetry(sample) => sample.vehicle_id(),
            InboundEvent::Disconnected { vehicle_id } => vehicle_id,
        }
    }
}

/// Decode one inbound text frame
pub fn decode(text: &str) -> Result<InboundEvent, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(CodecError::UnrecognizedShape);
    }

    if let Some(event) = try_sender_envelope(&value) {
        return event;
    }

    decode_event_envelope(&value)
}

/// Shape A. Returns `None` when the shape does not apply so the caller can fall back.
///
/// Command envelopes share this shape but never carry telemetry, so they are rejected.
fn try_sender_envelope(value: &Value) -> Option<Result<InboundEvent, CodecError>> {
    let envelope = SenderEnvelope::deserialize(value).ok()?;

    let vehicle_id = envelope
        .message
        .as_ref()
        .and_then(|m| non_empty(m.id.as_deref()))
        .or_else(|| non_empty(envelope.user_id.as_deref()))?
        .to_string();

    let role = envelope.role.as_deref().unwrap_or_default();
    if role.eq_ignore_ascii_case(ROLE_DISCONNECTED) {
        return Some(Ok(InboundEvent::Disconnected { vehicle_id }));
    }
    if [ROLE_FLIGHT_COMMAND, ROLE_UTILITY_COMMAND]
        .iter()
        .any(|command| role.eq_ignore_ascii_case(command))
    {
        return Some(Err(CodecError::UnrecognizedShape));
    }

    let message = envelope.message?;
    Some(Ok(InboundEvent::Telemetry(sample_from_vehicle_message(
        &message,
        &vehicle_id,
    ))))
}

/// Shape B
fn decode_event_envelope(value: &Value) -> Result<InboundEvent, CodecError> {
    let envelope = EventEnvelope::deserialize(value).map_err(|_| CodecError::UnrecognizedShape)?;
    let event_type = envelope.event_type.ok_or(CodecError::UnrecognizedShape)?;
    let payload = envelope.payload.unwrap_or(Value::Null);

    if TELEMETRY_TAGS.contains(&event_type.as_str()) {
        let payload =
            TelemetryPayload::deserialize(&payload).map_err(|e| CodecError::InvalidPayload {
                event: event_type.clone(),
                reason: e.to_string(),
            })?;
        let vehicle_id = non_empty(payload.drone_id.as_deref())
            .ok_or(CodecError::MissingVehicleId)?
            .to_string();
        let details = payload.telemetry.ok_or_else(|| CodecError::InvalidPayload {
            event: event_type.clone(),
            reason: "missing telemetry object".into(),
        })?;
        return Ok(InboundEvent::Telemetry(sample_from_details(
            &vehicle_id,
            payload.model.as_deref(),
            &details,
        )));
    }

    if DISCONNECT_TAGS.contains(&event_type.as_str()) {
        let vehicle_id = match &payload {
            Value::String(id) => non_empty(Some(id.as_str())),
            Value::Object(_) => payload
                .get("droneId")
                .or_else(|| payload.get("DroneId"))
                .and_then(Value::as_str)
                .and_then(|id| non_empty(Some(id))),
            _ => None,
        }
        .ok_or(CodecError::MissingVehicleId)?;
        return Ok(InboundEvent::Disconnected {
            vehicle_id: vehicle_id.to_string(),
        });
    }

    Err(CodecError::UnknownEventType(event_type))
}

/// Map a shape A vehicle message into the canonical layout
pub fn sample_from_vehicle_message(message: &VehicleMessage, vehicle_id: &str) -> TelemetrySample {
    TelemetrySample::new(vehicle_id)
        .with_model(
            non_empty(message.model.as_deref()).unwrap_or(defaults::UNKNOWN_MODEL),
        )
        .with_position(Position {
            latitude: message.lat.unwrap_or_default(),
            longitude: message.lng.unwrap_or_default(),
            altitude: floor_altitude(message.alt.unwrap_or_default()),
        })
        .with_velocity(Velocity {
            x: message.velocity_x.unwrap_or_default(),
            y: message.velocity_y.unwrap_or_default(),
            z: message.velocity_z.unwrap_or_default(),
        })
        .with_heading(message.heading.unwrap_or_default())
        .with_battery(
            message.battery.unwrap_or_default(),
            defaults::BATTERY_TEMPERATURE_C,
        )
        .with_satellites(defaults::SATELLITE_COUNT)
        .with_flags(StatusFlags {
            online: message.online.unwrap_or_default(),
            flying: message.is_flying.unwrap_or_default(),
            motors_on: message.are_motors_on.unwrap_or_default(),
            lights_on: message.are_lights_on.unwrap_or_default(),
            going_home: message.is_going_home.unwrap_or_default(),
            mission_active: message.is_mission_active.unwrap_or_default(),
        })
}

/// Map detailed telemetry (envelope B or snapshot) into the canonical layout
pub fn sample_from_details(
    vehicle_id: &str,
    model: Option<&str>,
    details: &TelemetryDetails,
) -> TelemetrySample {
    TelemetrySample::new(vehicle_id)
        .with_model(non_empty(model).unwrap_or(defaults::UNKNOWN_MODEL))
        .with_position(Position {
            latitude: details.latitude.unwrap_or_default(),
            longitude: details.longitude.unwrap_or_default(),
            altitude: floor_altitude(details.altitude.unwrap_or_default()),
        })
        .with_velocity(Velocity {
            x: details.velocity_x.unwrap_or_default(),
            y: details.velocity_y.unwrap_or_default(),
            z: details.velocity_z.unwrap_or_default(),
        })
        .with_heading(details.heading.unwrap_or_default())
        .with_battery(
            details.battery_level.unwrap_or_default(),
            details
                .battery_temperature
                .unwrap_or(defaults::BATTERY_TEMPERATURE_C),
        )
        .with_satellites(details.satellite_count.unwrap_or(defaults::SATELLITE_COUNT))
        .with_flags(StatusFlags {
            online: details.online.unwrap_or_default(),
            flying: details.is_flying.unwrap_or_default(),
            motors_on: details.are_motors_on.unwrap_or_default(),
            lights_on: details.are_lights_on.unwrap_or_default(),
            going_home: details.is_going_home.unwrap_or_default(),
            mission_active: details.is_mission_active.unwrap_or_default(),
        })
}

/// Build a shape A envelope carrying a sample, as the backend would send it
pub fn sender_envelope_for(sample: &TelemetrySample) -> SenderEnvelope {
    let position = sample.position();
    let velocity = sample.velocity();
    let flags = sample.flags();

    SenderEnvelope {
        user_id: Some(sample.vehicle_id().to_string()),
        role: Some("drone".into()),
        message: Some(VehicleMessage {
            id: Some(sample.vehicle_id().to_string()),
            model: Some(sample.model().to_string()),
            home_location: None,
            lat: Some(position.latitude),
            lng: Some(position.longitude),
            alt: Some(position.altitude),
            heading: Some(sample.heading()),
            velocity_x: Some(velocity.x),
            velocity_y: Some(velocity.y),
            velocity_z: Some(velocity.z),
            battery: Some(sample.battery_level()),
            is_flying: Some(flags.flying),
            online: Some(flags.online),
            are_motors_on: Some(flags.motors_on),
            are_lights_on: Some(flags.lights_on),
            is_going_home: Some(flags.going_home),
            is_mission_active: Some(flags.mission_active),
            mission_step: None,
        }),
    }
}

/// Serialize a sample as a shape A text frame
pub fn encode_telemetry(sample: &TelemetrySample) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&sender_envelope_for(sample))?)
}

/// Serialize an outbound command into a text frame
pub fn encode_command(command: &OutboundCommand) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&command.to_envelope())?)
}

/// Decode a page of snapshot records
pub fn decode_snapshot_page(text: &str) -> Result<SnapshotPage, CodecError> {
    Ok(serde_json::from_str(text)?)
}

fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|s| !s.is_empty())
}

fn floor_altitude(altitude: f64) -> f64 {
    if altitude.is_nan() { 0.0 } else { altitude.max(0.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::FlightCommand;

    fn expect_telemetry(text: &str) -> TelemetrySample {
        match decode(text).expect("decode failed") {
            InboundEvent::Telemetry(sample) => sample,
            other => panic!("expected telemetry, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_a_maps_raw_fields() {
        let sample = expect_telemetry(
            r#"{"userId":"RD001","role":"drone","message":{
                "id":"RD001","model":"Mavic","lat":39.7,"lng":-8.8,"alt":42.5,
                "heading":-90,"velocityX":1.5,"velocityY":0.5,"velocityZ":-2,
                "battery":130,"isFlying":true,"online":true,"areMotorsOn":true,
                "isGoingHome":false,"isMissionActive":true}}"#,
        );

        assert_eq!(sample.vehicle_id(), "RD001");
        assert_eq!(sample.model(), "Mavic");
        assert_eq!(sample.position().altitude, 42.5);
        assert_eq!(sample.position().latitude, 39.7);
        assert_eq!(sample.heading(), 270.0);
        assert_eq!(sample.battery_level(), 100.0);
        assert_eq!(sample.velocity().z, -2.0);
        assert_eq!(sample.satellite_count(), defaults::SATELLITE_COUNT);
        assert_eq!(sample.battery_temperature(), defaults::BATTERY_TEMPERATURE_C);
        assert!(sample.flags().flying);
        assert!(sample.flags().mission_active);
        assert!(!sample.flags().lights_on);
    }

    #[test]
    fn test_shape_a_falls_back_to_user_id() {
        let sample = expect_telemetry(r#"{"userId":"RD007","role":"drone","message":{"alt":-3}}"#);
        assert_eq!(sample.vehicle_id(), "RD007");
        assert_eq!(sample.model(), defaults::UNKNOWN_MODEL);
        assert_eq!(sample.position().altitude, 0.0);
    }

    #[test]
    fn test_shape_a_tolerates_null_fields() {
        let sample = expect_telemetry(r#"{"userId":"RD001","message":{"lat":null,"battery":null}}"#);
        assert_eq!(sample.position().latitude, 0.0);
        assert_eq!(sample.battery_level(), 0.0);
    }

    #[test]
    fn test_shape_a_disconnect_role() {
        let event = decode(r#"{"userId":"RD003","role":"disconnected"}"#).expect("decode");
        assert_eq!(
            event,
            InboundEvent::Disconnected {
                vehicle_id: "RD003".into()
            }
        );
    }

    #[test]
    fn test_shape_a_command_envelopes_are_rejected() {
        let flight = decode(r#"{"userId":"RD001","role":"FlightCommand","message":{"command":"takeoff"}}"#);
        assert!(matches!(flight, Err(CodecError::UnrecognizedShape)));

        let utility = decode(
            r#"{"userId":"RD001","role":"UtilityCommand","message":{"command":"motors","state":true}}"#,
        );
        assert!(matches!(utility, Err(CodecError::UnrecognizedShape)));

        let echoed = encode_command(&OutboundCommand::flight("RD002", FlightCommand::Land))
            .expect("encode");
        assert!(decode(&echoed).is_err());
    }

    #[test]
    fn test_shape_a_without_id_is_rejected() {
        let result = decode(r#"{"role":"drone","message":{"lat":1.0}}"#);
        assert!(matches!(result, Err(CodecError::UnrecognizedShape)));
    }

    #[test]
    fn test_shape_b_telemetry_camel_case() {
        let sample = expect_telemetry(
            r#"{"eventType":"DroneTelemetryReceived","timeStamp":"2024-01-01T00:00:00Z",
                "payload":{"droneId":"RD002","model":"M30","telemetry":{
                    "latitude":10.0,"longitude":20.0,"altitude":30.0,"heading":725,
                    "batteryLevel":55,"batteryTemperature":31.5,"satelliteCount":9,
                    "isFlying":true,"online":true,"areLightsOn":true}}}"#,
        );
        assert_eq!(sample.vehicle_id(), "RD002");
        assert_eq!(sample.model(), "M30");
        assert_eq!(sample.heading(), 5.0);
        assert_eq!(sample.satellite_count(), 9);
        assert_eq!(sample.battery_temperature(), 31.5);
        assert!(sample.flags().lights_on);
    }

    #[test]
    fn test_shape_b_telemetry_pascal_case() {
        let sample = expect_telemetry(
            r#"{"EventType":"TelemetryReceived","TimeStamp":"t",
                "Payload":{"DroneId":"RD004","Model":"X","Telemetry":{
                    "Latitude":1.0,"Longitude":2.0,"Altitude":3.0,"BatteryLevel":-4}}}"#,
        );
        assert_eq!(sample.vehicle_id(), "RD004");
        assert_eq!(sample.position().longitude, 2.0);
        assert_eq!(sample.battery_level(), 0.0);
        assert_eq!(sample.satellite_count(), defaults::SATELLITE_COUNT);
    }

    #[test]
    fn test_shape_b_disconnect() {
        let event = decode(r#"{"eventType":"DroneDisconnected","timeStamp":"t","payload":"RD005"}"#)
            .expect("decode");
        assert_eq!(event.vehicle_id(), "RD005");
        assert!(matches!(event, InboundEvent::Disconnected { .. }));
    }

    #[test]
    fn test_shape_b_disconnect_without_id() {
        let result = decode(r#"{"eventType":"DroneDisconnected","payload":""}"#);
        assert!(matches!(result, Err(CodecError::MissingVehicleId)));
    }

    #[test]
    fn test_shape_b_telemetry_without_details() {
        let result = decode(r#"{"eventType":"DroneTelemetryReceived","payload":{"droneId":"RD001"}}"#);
        assert!(matches!(result, Err(CodecError::InvalidPayload { .. })));
    }

    #[test]
    fn test_unknown_event_type() {
        let result = decode(r#"{"eventType":"BatteryReplaced","payload":{}}"#);
        assert!(matches!(result, Err(CodecError::UnknownEventType(t)) if t == "BatteryReplaced"));
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(decode("not json"), Err(CodecError::Json(_))));
        assert!(matches!(decode("[1,2,3]"), Err(CodecError::UnrecognizedShape)));
        assert!(matches!(decode("{}"), Err(CodecError::UnrecognizedShape)));
    }

    #[test]
    fn test_encoded_telemetry_decodes_to_same_sample() {
        let sample = TelemetrySample::new("SIM-001")
            .with_model("Sim-Test-Unit")
            .with_heading(90.0)
            .with_battery(80.0, defaults::BATTERY_TEMPERATURE_C)
            .with_flags(StatusFlags {
                online: true,
                flying: true,
                ..StatusFlags::default()
            });
        let text = encode_telemetry(&sample).expect("encode");
        assert_eq!(expect_telemetry(&text), sample);
    }

    #[test]
    fn test_encode_command() {
        let text = encode_command(&OutboundCommand::flight("RD001", FlightCommand::Land))
            .expect("encode");
        assert!(text.contains(r#""role":"FlightCommand""#));
        assert!(text.contains(r#""command":"land""#));
    }

    #[test]
    fn test_decode_snapshot_page() {
        let page = decode_snapshot_page(
            r#"{"items":[{"droneId":"RD001","model":"M30","isConnected":false,
                "telemetry":{"latitude":1.0}}],"totalCount":1}"#,
        )
        .expect("decode");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].vehicle_id, "RD001");
        assert_eq!(
            page.items[0].telemetry.as_ref().and_then(|t| t.latitude),
            Some(1.0)
        );
    }
}
