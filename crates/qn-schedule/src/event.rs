use std::fmt;

use qn_core::{ClientId, SignalId, StationId};

/// Handle of a scheduled event, used to cancel it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

/// Something that happens at a station at a future tick.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A client arrives at `station`.  With `client: None` the station is
    /// asked to re-check its state (a source generates its next client).
    Arrival {
        station: StationId,
        client:  Option<ClientId>,
    },

    /// `client` finishes at `station` and is routed onwards.
    Leave {
        station: StationId,
        client:  ClientId,
    },

    /// A per-client deadline at `station` expired (waiting tolerance or
    /// maximum holding time).
    Timer {
        station: StationId,
        client:  ClientId,
    },

    /// `station` returns the resources of the given alternative.
    ReleaseResources {
        station:     StationId,
        alternative: usize,
    },

    /// A named signal fires and every barrier listening to it is credited.
    Signal {
        signal: SignalId,
    },
}

impl Event {
    /// The station this event is addressed to, if any.
    pub fn station(&self) -> Option<StationId> {
        match *self {
            Event::Arrival { station, .. }
            | Event::Leave { station, .. }
            | Event::Timer { station, .. }
            | Event::ReleaseResources { station, .. } => Some(station),
            Event::Signal { .. } => None,
        }
    }
}
