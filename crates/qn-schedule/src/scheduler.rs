use qn_core::Tick;

use crate::{Event, EventId};

/// The event-scheduling facility stations see.
///
/// Object safe so stations can take `&mut dyn Scheduler`.
pub trait Scheduler {
    /// Current simulation time.
    fn now(&self) -> Tick;

    /// Schedule `event` at `at`.  Times in the past are clamped to `now`.
    fn schedule_at(&mut self, at: Tick, event: Event) -> EventId;

    /// Cancel a pending event.  Returns `false` if it already fired or was
    /// cancelled before.
    fn cancel(&mut self, id: EventId) -> bool;

    /// Schedule `event` `delay` ticks from now.
    fn schedule_in(&mut self, delay: u64, event: Event) -> EventId {
        let at = self.now() + delay;
        self.schedule_at(at, event)
    }
}
