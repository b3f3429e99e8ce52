//! `qn-sim` — replication driver for the rust_qn framework.
//!
//! # Event loop
//!
//! ```text
//! build station data (dynamic batch sizes resolved here)
//! every station: on_start
//! loop:
//!   ① Peek   — stop if no event is left or the next one is past max_ticks.
//!   ② Pop    — advance the clock to the event's tick.
//!   ③ Dispatch — deliver it to its station (or to every listener of a
//!                signal, or to every resource user after a release), then
//!                re-test the stations that listen to state changes.
//!   ④ Stop   — if a dispose station removed the last client.
//! ```
//!
//! A fatal error anywhere in ③ ends the replication with an emergency
//! shutdown: queues are flushed with their partial waiting times and every
//! live client is disposed through the statistics sink before
//! [`SimError::EmergencyShutdown`] is returned.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs replications on Rayon's thread pool.              |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use qn_core::SimConfig;
//! use qn_sim::{NoopObserver, SimBuilder};
//! use qn_station::NoopSink;
//!
//! let sim = SimBuilder::new(SimConfig::default(), network).build()?;
//! let summary = sim.replication(0).run(&mut NoopSink, &mut NoopObserver)?;
//! ```

pub mod builder;
pub mod error;
pub mod observer;
pub mod replication;
pub mod sim;


pub use builder::SimBuilder;
pub use error::{SimError, SimResult};
pub use observer::{NoopObserver, SimObserver};
pub use replication::{EndReason, Replication, ReplicationSummary};
pub use sim::Sim;
