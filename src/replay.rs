//! Scrubbing through the focused vehicle's recorded trail

use crate::slots::{SlotEvent, SlotMultiplexer};
use crate::state::StateRepository;
use groundstation_shared::TelemetrySample;
use tracing::debug;

/// Replay cursor over the history of the vehicle in the focused slot
///
/// Any focus change, or an assignment change on the focused slot, drops
/// back to live view and retargets the cursor.
#[derive(Debug, Default)]
pub struct TrailReplay {
    target: Option<String>,
    index: Option<usize>,
}

impl TrailReplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Whether the view currently shows a past sample
    pub fn is_active(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Replay needs at least two recorded samples
    pub fn is_available(&self, repo: &StateRepository) -> bool {
        self.target
            .as_deref()
            .and_then(|id| repo.peek(id))
            .is_some_and(|state| state.history_len() > 1)
    }

    /// Back to live view and point at `vehicle_id`
    pub fn retarget(&mut self, vehicle_id: Option<&str>) {
        self.exit();
        self.target = vehicle_id.map(str::to_string);
    }

    pub fn exit(&mut self) {
        if self.index.take().is_some() {
            debug!("Leaving trail replay");
        }
    }

    /// Follow slot notifications
    pub fn on_slot_event(&mut self, event: &SlotEvent, slots: &SlotMultiplexer) {
        match event {
            SlotEvent::ActiveChanged(slot) => self.retarget(slots.drone_at_slot(*slot)),
            SlotEvent::AssignmentChanged { slot, vehicle_id }
                if slots.active_slot() == Some(*slot) =>
            {
                self.retarget(vehicle_id.as_deref())
            }
            _ => {}
        }
    }

    /// Select the sample at `fraction` (0 = oldest, 1 = newest) of the trail
    pub fn scrub(&mut self, fraction: f64, repo: &StateRepository) -> Option<TelemetrySample> {
        let state = self.target.as_deref().and_then(|id| repo.peek(id))?;
        let len = state.history_len();
        if len == 0 {
            return None;
        }

        let index = scrub_index(fraction, len);
        self.index = Some(index);
        state.history().get(index).cloned()
    }
}

/// Map a fraction in [0, 1] onto a history index, rounding half to even
pub fn scrub_index(fraction: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let last = len - 1;
    let index = (fraction * last as f64).round_ties_even() as usize;
    index.min(last)
}
