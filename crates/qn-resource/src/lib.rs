//! `qn-resource` — the shared resource pool stations compete for.
//!
//! # Crate layout
//!
//! | Module    | Contents                                                  |
//! |-----------|-----------------------------------------------------------|
//! | [`pool`]  | `ResourceGroup`, `Alternative`, `Acquired`, `ResourcePool` |
//! | [`error`] | `ResourceError`, `ResourceResult<T>`                      |
//!
//! # Protocol
//!
//! A station declares zero or more [`Alternative`]s.  On
//! [`ResourcePool::try_acquire`] the pool walks them in declared order and
//! locks the first one whose groups all have enough free units.  A failed
//! attempt changes nothing.  The station later hands the same alternative
//! index back to [`ResourcePool::release`].
//!
//! Deciding *which* waiting station gets the next try after a release is the
//! network's job; the pool only records who uses it
//! ([`ResourcePool::users`]).

pub mod error;
pub mod pool;


pub use error::{ResourceError, ResourceResult};
pub use pool::{Acquired, Alternative, ResourceGroup, ResourcePool};
