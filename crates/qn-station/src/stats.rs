//! The statistics sink stations report to.

use qn_client::{Client, StationTimes};
use qn_core::{StationId, Tick};
use qn_eval::CalculationError;

/// Costs booked for one client's service.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Costs {
    pub fixed:        f64,
    pub service:      f64,
    pub post_service: f64,
}

impl Costs {
    pub fn total(&self) -> f64 {
        self.fixed + self.service + self.post_service
    }
}

/// Fire-and-forget statistics callbacks.
///
/// All methods have no-op defaults so a sink only implements what it
/// aggregates.  Clients flagged `is_warm_up` are reported like any other;
/// filtering them is the sink's job.
pub trait StatisticsSink {
    /// `client` reached `station`.
    fn station_arrival(&mut self, _station: StationId, _client: &Client, _now: Tick) {}

    /// `client` was forwarded from `station` to its successor.
    fn station_leave(&mut self, _station: StationId, _client: &Client, _now: Tick) {}

    /// `client` entered a waiting structure; `queue_len` is the new length.
    fn queue_enter(&mut self, _station: StationId, _client: &Client, _now: Tick, _queue_len: usize) {}

    /// `client` left a waiting structure; `queue_len` is the new length.
    fn queue_leave(&mut self, _station: StationId, _client: &Client, _now: Tick, _queue_len: usize) {}

    /// Durations attributed to `client` at `station`.  May be called more
    /// than once per visit; the parts add up.
    fn station_times(&mut self, _station: StationId, _client: &Client, _times: StationTimes) {}

    fn setup_time(&mut self, _station: StationId, _client: &Client, _ticks: u64) {}

    fn costs(&mut self, _station: StationId, _client: &Client, _costs: Costs) {}

    /// `client` gave up waiting at `station`.
    fn reneged(&mut self, _station: StationId, _client: &Client, _now: Tick) {}

    /// `client` left the system for good.  Called once for a batch container
    /// and once for every original it carries.
    fn client_disposed(&mut self, _client: &Client, _now: Tick) {}

    fn calculation_error(&mut self, _error: &CalculationError) {}
}

/// A [`StatisticsSink`] that records nothing.
pub struct NoopSink;

impl StatisticsSink for NoopSink {}
