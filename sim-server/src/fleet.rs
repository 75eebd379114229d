//! Simulated fleet reacting to received commands

use groundstation_shared::{
    codec,
    sim::{self, OrbitConfig, OrbitSimulator},
    FlightCommand, OutboundCommand, Position, StatusFlags, TelemetrySample, UtilityCommand,
    Velocity,
};
use tracing::{info, warn};

struct SimVehicle {
    orbit: OrbitSimulator,
    flags: StatusFlags,
}

/// Orbiting vehicles whose flight status follows the commands they receive
pub struct Fleet {
    vehicles: Vec<SimVehicle>,
}

impl Fleet {
    /// Every vehicle starts airborne with motors running
    pub fn new(size: usize, template: &OrbitConfig) -> Self {
        let vehicles = sim::fleet(size, template)
            .into_iter()
            .map(|orbit| SimVehicle {
                orbit,
                flags: StatusFlags {
                    online: true,
                    flying: true,
                    motors_on: true,
                    ..StatusFlags::default()
                },
            })
            .collect();
        Self { vehicles }
    }

    pub fn vehicle_ids(&self) -> Vec<String> {
        self.vehicles
            .iter()
            .map(|v| v.orbit.vehicle_id().to_string())
            .collect()
    }

    /// Current sample of every vehicle; grounded vehicles sit still at zero altitude
    pub fn samples_at(&self, elapsed_s: f64) -> Vec<TelemetrySample> {
        self.vehicles
            .iter()
            .map(|vehicle| {
                let sample = vehicle.orbit.sample_at(elapsed_s).with_flags(vehicle.flags);
                if vehicle.flags.flying {
                    return sample;
                }
                let position = sample.position();
                sample
                    .with_position(Position {
                        altitude: 0.0,
                        ..position
                    })
                    .with_velocity(Velocity::default())
            })
            .collect()
    }

    /// Encoded telemetry frames for every vehicle
    pub fn frames_at(&self, elapsed_s: f64) -> Vec<String> {
        self.samples_at(elapsed_s)
            .iter()
            .filter_map(|sample| match codec::encode_telemetry(sample) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!("Failed to encode {}: {}", sample.vehicle_id(), e);
                    None
                }
            })
            .collect()
    }

    /// Apply a command; false when it names no simulated vehicle
    pub fn apply(&mut self, command: &OutboundCommand) -> bool {
        let Some(vehicle) = self
            .vehicles
            .iter_mut()
            .find(|v| v.orbit.vehicle_id() == command.vehicle_id())
        else {
            return false;
        };

        let flags = &mut vehicle.flags;
        match command {
            OutboundCommand::Flight { command, .. } => match command {
                FlightCommand::Takeoff => {
                    flags.motors_on = true;
                    flags.flying = true;
                }
                FlightCommand::Land => {
                    flags.flying = false;
                    flags.going_home = false;
                }
                FlightCommand::StartGoHome => flags.going_home = true,
                FlightCommand::StopMission => {
                    flags.mission_active = false;
                    flags.going_home = false;
                }
            },
            OutboundCommand::Utility {
                command: UtilityCommand::Motors,
                state,
                ..
            } => {
                if flags.flying {
                    warn!("Ignoring motors={} for {} while flying", state, command.vehicle_id());
                } else {
                    flags.motors_on = *state;
                }
            }
        }
        info!("{} now {:?}", command.vehicle_id(), vehicle.flags);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fleet_ids() {
        let fleet = Fleet::new(3, &OrbitConfig::default());
        assert_eq!(fleet.vehicle_ids(), vec!["SIM-001", "SIM-002", "SIM-003"]);
    }

    #[test]
    fn test_land_grounds_vehicle() {
        let mut fleet = Fleet::new(1, &OrbitConfig::default());
        assert!(fleet.apply(&OutboundCommand::flight("SIM-001", FlightCommand::Land)));

        let sample = &fleet.samples_at(3.0)[0];
        assert!(!sample.flags().flying);
        assert_eq!(sample.position().altitude, 0.0);
        assert_eq!(sample.velocity(), Velocity::default());
    }

    #[test]
    fn test_motors_only_toggle_on_ground() {
        let mut fleet = Fleet::new(1, &OrbitConfig::default());
        fleet.apply(&OutboundCommand::utility("SIM-001", UtilityCommand::Motors, false));
        assert!(fleet.samples_at(0.0)[0].flags().motors_on);

        fleet.apply(&OutboundCommand::flight("SIM-001", FlightCommand::Land));
        fleet.apply(&OutboundCommand::utility("SIM-001", UtilityCommand::Motors, false));
        assert!(!fleet.samples_at(0.0)[0].flags().motors_on);
    }

    #[test]
    fn test_unknown_vehicle_is_ignored() {
        let mut fleet = Fleet::new(1, &OrbitConfig::default());
        assert!(!fleet.apply(&OutboundCommand::flight("RD999", FlightCommand::Land)));
    }

    #[test]
    fn test_frames_decode_as_telemetry() {
        let fleet = Fleet::new(2, &OrbitConfig::default());
        let frames = fleet.frames_at(1.0);
        assert_eq!(frames.len(), 2);

        let event = codec::decode(&frames[1]).expect("decode");
        assert_eq!(event.vehicle_id(), "SIM-002");
    }
}
