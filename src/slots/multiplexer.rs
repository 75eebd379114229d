//! Viewing slots bound to vehicles
//!
//! Slots are iterated in creation order. A vehicle is bound to at most one
//! slot, and the focus always points at an existing slot once any exists.

use crate::notify::EventBus;
use groundstation_shared::defaults;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type SlotId = u32;

/// A viewing context and the vehicle it shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: SlotId,
    pub vehicle_id: Option<String>,
}

/// Lifecycle, assignment and focus notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    Created(SlotId),
    Removed(SlotId),
    AssignmentChanged {
        slot: SlotId,
        vehicle_id: Option<String>,
    },
    ActiveChanged(SlotId),
}

/// Rejected slot operations; the multiplexer is unchanged when one is returned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Slot capacity of {0} reached")]
    CapacityReached(usize),

    #[error("Unknown slot {0}")]
    UnknownSlot(SlotId),

    #[error("Cannot remove the last remaining slot")]
    LastSlot,

    #[error("Vehicle {vehicle_id} is already assigned to slot {slot}")]
    AlreadyAssigned { vehicle_id: String, slot: SlotId },

    #[error("No active slot")]
    NoActiveSlot,
}

#[derive(Debug)]
pub struct SlotMultiplexer {
    /// Live slots in creation order
    slots: Vec<Slot>,
    /// Slot id -> position in `slots`
    index: HashMap<SlotId, usize>,
    active: Option<SlotId>,
    max_slots: usize,
    focus_new_slots: bool,
    events: EventBus<SlotEvent>,
}

impl SlotMultiplexer {
    pub fn new(max_slots: usize, focus_new_slots: bool) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            active: None,
            max_slots,
            focus_new_slots,
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SlotEvent> {
        self.events.subscribe()
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn active_slot(&self) -> Option<SlotId> {
        self.active
    }

    /// Allocate the smallest unused id
    pub fn create_slot(&mut self) -> Result<SlotId, SlotError> {
        if self.slots.len() >= self.max_slots {
            warn!("Slot limit of {} reached", self.max_slots);
            return Err(SlotError::CapacityReached(self.max_slots));
        }

        let id = (0..)
            .find(|id| !self.index.contains_key(id))
            .ok_or(SlotError::CapacityReached(self.max_slots))?;

        self.index.insert(id, self.slots.len());
        self.slots.push(Slot {
            id,
            vehicle_id: None,
        });
        debug!("Created slot {}", id);
        self.events.emit(SlotEvent::Created(id));

        if self.active.is_none() || self.focus_new_slots {
            self.focus(id);
        }
        Ok(id)
    }

    /// Remove a slot, releasing its vehicle first
    ///
    /// Focus falls back to the first remaining slot in creation order.
    pub fn remove_slot(&mut self, id: SlotId) -> Result<(), SlotError> {
        let position = *self.index.get(&id).ok_or(SlotError::UnknownSlot(id))?;
        if self.slots.len() == 1 {
            return Err(SlotError::LastSlot);
        }

        if self.slots[position].vehicle_id.is_some() {
            self.slots[position].vehicle_id = None;
            self.events.emit(SlotEvent::AssignmentChanged {
                slot: id,
                vehicle_id: None,
            });
        }

        self.slots.remove(position);
        self.reindex();
        debug!("Removed slot {}", id);
        self.events.emit(SlotEvent::Removed(id));

        if self.active == Some(id) {
            self.active = None;
            if let Some(first) = self.slots.first().map(|slot| slot.id) {
                self.focus(first);
            }
        }
        Ok(())
    }

    /// Move focus; false when the slot is unknown or already focused
    pub fn set_active_slot(&mut self, id: SlotId) -> bool {
        if !self.index.contains_key(&id) || self.active == Some(id) {
            return false;
        }
        self.focus(id);
        true
    }

    /// Bind `vehicle_id` to a slot; the empty id clears it
    ///
    /// Returns `Ok(false)` when the slot already shows that vehicle. A vehicle
    /// shown in another slot is never moved implicitly.
    pub fn set_drone_at_slot(&mut self, slot: SlotId, vehicle_id: &str) -> Result<bool, SlotError> {
        let position = *self.index.get(&slot).ok_or(SlotError::UnknownSlot(slot))?;
        let wanted = if vehicle_id.is_empty() {
            None
        } else {
            Some(vehicle_id.to_string())
        };

        if self.slots[position].vehicle_id == wanted {
            return Ok(false);
        }

        if let Some(existing) = wanted.as_deref().and_then(|v| self.slot_for_drone(v)) {
            warn!(
                "Vehicle {} already shown in slot {}, not assigning to slot {}",
                vehicle_id, existing, slot
            );
            return Err(SlotError::AlreadyAssigned {
                vehicle_id: vehicle_id.to_string(),
                slot: existing,
            });
        }

        self.slots[position].vehicle_id = wanted.clone();
        self.events.emit(SlotEvent::AssignmentChanged {
            slot,
            vehicle_id: wanted,
        });
        Ok(true)
    }

    pub fn clear_slot(&mut self, slot: SlotId) -> Result<bool, SlotError> {
        self.set_drone_at_slot(slot, "")
    }

    pub fn assign_drone_to_active_slot(&mut self, vehicle_id: &str) -> Result<bool, SlotError> {
        let active = self.active.ok_or(SlotError::NoActiveSlot)?;
        self.set_drone_at_slot(active, vehicle_id)
    }

    pub fn drone_at_slot(&self, slot: SlotId) -> Option<&str> {
        self.index
            .get(&slot)
            .and_then(|&position| self.slots[position].vehicle_id.as_deref())
    }

    /// Vehicle shown in the focused slot
    pub fn active_drone(&self) -> Option<&str> {
        self.active.and_then(|slot| self.drone_at_slot(slot))
    }

    pub fn slot_for_drone(&self, vehicle_id: &str) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|slot| slot.vehicle_id.as_deref() == Some(vehicle_id))
            .map(|slot| slot.id)
    }

    /// Slot ids in creation order (a copy)
    pub fn all_slots(&self) -> Vec<SlotId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    /// Slots with their assignments, in creation order (a copy)
    pub fn slots(&self) -> Vec<Slot> {
        self.slots.clone()
    }

    fn focus(&mut self, id: SlotId) {
        self.active = Some(id);
        self.events.emit(SlotEvent::ActiveChanged(id));
    }

    fn reindex(&mut self) {
        self.index = self
            .slots
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.id, position))
            .collect();
    }
}

impl Default for SlotMultiplexer {
    fn default() -> Self {
        Self::new(defaults::MAX_SLOTS, true)
    }
}
