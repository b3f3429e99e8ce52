//! Replication observer trait for progress reporting.

use qn_core::Tick;

use crate::ReplicationSummary;

/// Callbacks invoked by [`Replication::run`][crate::Replication::run] around
/// the event loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.  Statistics go to a
/// [`StatisticsSink`][qn_station::StatisticsSink]; the observer only sees the
/// shape of the run.
///
/// # Example — progress printer
///
/// ```rust,ignore
/// struct ProgressPrinter { every: u64 }
///
/// impl SimObserver for ProgressPrinter {
///     fn on_event(&mut self, now: Tick, executed: u64) {
///         if executed % self.every == 0 {
///             println!("{now}: {executed} events");
///         }
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called before the stations' start callbacks run.
    fn on_replication_start(&mut self, _replication: usize, _seed: u64) {}

    /// Called after each dispatched event.  `executed` counts events
    /// dispatched so far in this replication.
    fn on_event(&mut self, _now: Tick, _executed: u64) {}

    /// Called once the loop ended normally.
    fn on_replication_end(&mut self, _summary: &ReplicationSummary) {}

    /// Called after an emergency shutdown finished flushing.
    fn on_emergency_shutdown(&mut self, _replication: usize, _now: Tick) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
