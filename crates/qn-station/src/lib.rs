//! `qn-station` — station kinds and the network model.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                        |
//! |---------------|-----------------------------------------------------------------|
//! | [`station`]   | `Station` trait, `StationInfo`                                  |
//! | [`kind`]      | `StationKind`, `StationData`, `StationArena`                    |
//! | [`context`]   | `RunContext` — the replication state a callback may touch       |
//! | [`network`]   | `Network`, `NetworkBuilder`, `BuildCheck`                       |
//! | [`queue`]     | `WaitingQueue`, `QueueEntry`                                    |
//! | [`merge`]     | `MergeRule`, `MergeMode`, `DataTransferMode`, `merge_group`     |
//! | [`stats`]     | `StatisticsSink`, `NoopSink`, `Costs`                           |
//! | [`process`]   | `Process` — queue, setup, service, reneging, resources          |
//! | [`batch`]     | `Batch`, `BatchMulti`                                           |
//! | [`matching`]  | `Match`                                                         |
//! | [`pickup`]    | `Pickup`                                                        |
//! | [`barrier`]   | `Barrier`, `Credit`                                             |
//! | [`hold`]      | `Hold`                                                          |
//! | [`source`]    | `Source`                                                        |
//! | [`dispose`]   | `Dispose`, `Separate`, `SignalStation`                          |
//!
//! # Event protocol
//!
//! Every callback runs inside [`RunContext::dispatch`], strictly one at a
//! time.  A station never waits: a client that cannot proceed sits in one of
//! the station's waiting structures until a later callback (a timer, a
//! signal, a resource release, or the after-event state check) moves it.
//!
//! A station ends a client's stay by scheduling `Event::Leave`; the matching
//! `on_leave` picks the outgoing edge and hands the client on as an arrival
//! in the same instant.

pub mod barrier;
pub mod batch;
pub mod context;
pub mod dispose;
pub mod hold;
pub mod kind;
pub mod matching;
pub mod merge;
pub mod network;
pub mod pickup;
pub mod process;
pub mod queue;
pub mod source;
pub mod station;
pub mod stats;

#[cfg(test)]
mod tests;

pub use barrier::{Barrier, BarrierData, BarrierRule, Credit, Stored};
pub use batch::{Batch, BatchData, BatchMulti, BatchMultiData, BatchQueue, BatchRule, BatchSize};
pub use context::RunContext;
pub use dispose::{Dispose, Separate, SignalStation};
pub use hold::{Hold, HoldData};
pub use kind::{StationArena, StationData, StationKind};
pub use matching::{Match, MatchData, MatchProperty};
pub use merge::{merge_group, release_group, DataTransferMode, MergeMode, MergeRule};
pub use network::{BuildCheck, Network, NetworkBuilder};
pub use pickup::{Pickup, PickupData};
pub use process::{PerType, Process, ProcessCosts, ProcessData, ProcessTimeType};
pub use queue::{QueueEntry, WaitingQueue};
pub use source::{Source, SourceData};
pub use station::{Station, StationInfo};
pub use stats::{Costs, NoopSink, StatisticsSink};
