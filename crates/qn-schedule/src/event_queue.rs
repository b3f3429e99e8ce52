//! `EventQueue` — the replication's future-event list.
//!
//! `BTreeMap` keyed by `(Tick, EventId)` gives O(log E) insert, pop and
//! cancel where E = number of pending events.  A side map from id to tick
//! makes cancellation by id possible without scanning.

use std::collections::BTreeMap;

use qn_core::Tick;
use rustc_hash::FxHashMap;

use crate::{Event, EventId, Scheduler};

#[derive(Default)]
pub struct EventQueue {
    now:      Tick,
    next_id:  u64,
    events:   BTreeMap<(Tick, EventId), Event>,
    pending:  FxHashMap<EventId, Tick>,
    /// Events popped so far.
    executed: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the earliest event and advance `now` to its tick.
    pub fn pop(&mut self) -> Option<(Tick, Event)> {
        let ((at, id), event) = self.events.pop_first()?;
        self.pending.remove(&id);
        self.now = at;
        self.executed += 1;
        Some((at, event))
    }

    /// Tick of the earliest pending event.
    pub fn next_tick(&self) -> Option<Tick> {
        self.events.keys().next().map(|(t, _)| *t)
    }

    /// Whether `id` is still waiting to fire.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Drop every pending event without firing it.
    pub fn clear(&mut self) {
        self.events.clear();
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl Scheduler for EventQueue {
    #[inline]
    fn now(&self) -> Tick {
        self.now
    }

    fn schedule_at(&mut self, at: Tick, event: Event) -> EventId {
        let at = at.max(self.now);
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.events.insert((at, id), event);
        self.pending.insert(id, at);
        id
    }

    fn cancel(&mut self, id: EventId) -> bool {
        match self.pending.remove(&id) {
            Some(at) => self.events.remove(&(at, id)).is_some(),
            None => false,
        }
    }
}
