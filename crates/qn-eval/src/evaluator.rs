//! The `Evaluator` trait and the variable scope passed to it.

use qn_client::Client;
use qn_core::Tick;

use crate::{EvalResult, Expression};

/// Built-in variables visible to every expression.
///
/// All values are in seconds.  `waiting_secs` has a context-dependent
/// meaning: when scoring a queued client it is the time waited *in the
/// current queue*; everywhere else it is the client's total waiting time
/// including the current wait.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Variables {
    pub now_secs:      f64,
    pub waiting_secs:  f64,
    pub transfer_secs: f64,
    pub process_secs:  f64,
}

impl Variables {
    /// Scope without a client.
    pub fn at(now: Tick) -> Self {
        Self { now_secs: now.as_secs(), ..Self::default() }
    }

    /// Scope for a client's totals, adding `current_wait` ticks of waiting
    /// not yet booked to the client.
    pub fn for_client(client: &Client, now: Tick, current_wait: u64) -> Self {
        Self {
            now_secs:      now.as_secs(),
            waiting_secs:  Tick::secs_for_ticks(client.waiting_time + current_wait),
            transfer_secs: Tick::secs_for_ticks(client.transfer_time),
            process_secs:  Tick::secs_for_ticks(client.process_time),
        }
    }

    /// Scope used to score a queued client: `w` is the current wait only.
    pub fn for_score(client: &Client, now: Tick) -> Self {
        Self {
            now_secs:      now.as_secs(),
            waiting_secs:  Tick::secs_for_ticks(client.current_wait(now)),
            transfer_secs: Tick::secs_for_ticks(client.transfer_time),
            process_secs:  Tick::secs_for_ticks(client.process_time),
        }
    }
}

/// Evaluates [`Expression`]s.
///
/// # Thread safety
///
/// Replications may run on several threads and share one evaluator, so
/// implementations must be `Send + Sync` and keep no per-call mutable state.
pub trait Evaluator: Send + Sync {
    /// Compute the value of `expr`.  `client` is `None` for system-level
    /// expressions such as resource priorities and hold conditions.
    fn evaluate(
        &self,
        expr:   &Expression,
        vars:   &Variables,
        client: Option<&Client>,
    ) -> EvalResult<f64>;

    /// Build-time validation.  The default accepts everything.
    fn check(&self, _expr: &Expression) -> EvalResult<()> {
        Ok(())
    }
}
