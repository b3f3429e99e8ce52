//! `qn-client` — entity records and their per-replication storage.
//!
//! # Crate layout
//!
//! | Module        | Contents                                               |
//! |---------------|--------------------------------------------------------|
//! | [`client`]    | `Client` record, `StationTimes`                        |
//! | [`user_data`] | `UserData` (numeric and text properties)               |
//! | [`store`]     | `ClientStore` (slot arena with recycling)              |
//!
//! A `ClientStore` is owned by exactly one replication.  Stations refer to
//! clients by `ClientId` and borrow the record through the store only for the
//! duration of a callback.

pub mod client;
pub mod store;
pub mod user_data;


pub use client::{Client, StationTimes};
pub use store::ClientStore;
pub use user_data::UserData;
