//! `qn-eval` — the expression and sampling collaborators of the station core.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                   |
//! |------------------|------------------------------------------------------------|
//! | [`expression`]   | `Expression`, `Priority`, `TimeSource`                     |
//! | [`evaluator`]    | `Evaluator` trait, `Variables`                             |
//! | [`simple`]       | `SimpleEvaluator` — small arithmetic/comparison language   |
//! | [`distribution`] | `Distribution`, `Sampler` trait, `RngSampler`              |
//! | [`calculator`]   | `Calculator` — evaluation with the calculation-error channel |
//! | [`error`]        | `EvalError`, `EvalResult<T>`                               |
//!
//! # Design notes
//!
//! Stations never call an `Evaluator` or `Sampler` directly.  They go through
//! a [`Calculator`], which turns a failed expression into the documented
//! fallback value, reports it (tracing `warn!` plus a queued
//! [`CalculationError`] the replication forwards to its statistics sink) and
//! escalates to `QnError::CalculationHalted` when the run is configured to
//! stop on calculation errors.

pub mod calculator;
pub mod distribution;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod simple;


pub use calculator::{CalculationError, Calculator};
pub use distribution::{Distribution, RngSampler, Sampler};
pub use error::{EvalError, EvalResult};
pub use evaluator::{Evaluator, Variables};
pub use expression::{Expression, Priority, TimeSource};
pub use simple::SimpleEvaluator;
