//! `qn-schedule` — simulation events and the future-event queue.
//!
//! # Crate layout
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`event`]       | `Event`, `EventId`                                    |
//! | [`scheduler`]   | `Scheduler` trait                                     |
//! | [`event_queue`] | `EventQueue` (`BTreeMap<(Tick, EventId), Event>`)     |
//!
//! # Ordering
//!
//! Events fire in ascending tick order.  Events scheduled for the same tick
//! fire in the order they were scheduled: `EventId`s are issued from a
//! monotonically increasing counter and form the second half of the key.
//!
//! Events are plain values.  The replication loop pops them and dispatches
//! to the station named in the event, so nothing in the queue borrows from
//! the network or the client store.

pub mod event;
pub mod event_queue;
pub mod scheduler;


pub use event::{Event, EventId};
pub use event_queue::EventQueue;
pub use scheduler::Scheduler;
