//! Viewing slots multiplexed over the vehicle fleet

mod multiplexer;

pub use multiplexer::{Slot, SlotError, SlotEvent, SlotId, SlotMultiplexer};
