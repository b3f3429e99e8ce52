//! `qn-core` — foundational types for the `rust_qn` queueing-network core.
//!
//! Every other `qn-*` crate depends on this one.  It has no `qn-*`
//! dependencies and only `rand` and `thiserror` externally (plus optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                                    |
//! |-----------|-------------------------------------------------------------|
//! | [`ids`]   | `StationId`, `ClientId`, `ClientTypeId`, `ResourceGroupId`, `SignalId` |
//! | [`time`]  | `Tick` (1 ms), `TimeBase`, `SimConfig`                      |
//! | [`rng`]   | `SimRng` (per replication)                                  |
//! | [`error`] | `QnError`, `QnResult`                                       |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids, time and config.    |

pub mod error;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{QnError, QnResult};
pub use ids::{ClientId, ClientTypeId, ResourceGroupId, SignalId, StationId};
pub use rng::SimRng;
pub use time::{SimConfig, Tick, TimeBase, TICKS_PER_SECOND};
