//! Simulation time model.
//!
//! # Design
//!
//! Time is an integer millisecond counter (`Tick`).  Sampled and evaluated
//! durations arrive as `f64` seconds and are converted with
//! [`Tick::ticks_for_secs`], which rounds to the nearest millisecond.
//!
//! Using an integer tick as the canonical unit keeps event ordering exact and
//! lets stations schedule "one tick later" re-checks and release delays
//! without floating-point drift.

use std::fmt;

/// Number of ticks in one simulated second.
pub const TICKS_PER_SECOND: u64 = 1_000;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// An absolute simulation time in milliseconds.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Return the tick `n` milliseconds after `self`, saturating at the end
    /// of time.
    #[inline]
    pub fn offset(self, n: u64) -> Tick {
        Tick(self.0.saturating_add(n))
    }

    /// Ticks elapsed from `earlier` to `self`, saturating at zero.
    #[inline]
    pub fn since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Convert a duration in seconds to ticks, rounding to the nearest tick.
    /// Negative and NaN durations become zero.
    #[inline]
    pub fn ticks_for_secs(secs: f64) -> u64 {
        if secs.is_nan() || secs <= 0.0 {
            return 0;
        }
        (secs * TICKS_PER_SECOND as f64).round() as u64
    }

    /// Convert a tick count to seconds.
    #[inline]
    pub fn secs_for_ticks(ticks: u64) -> f64 {
        ticks as f64 / TICKS_PER_SECOND as f64
    }

    /// This time in seconds since tick 0.
    #[inline]
    pub fn as_secs(self) -> f64 {
        Self::secs_for_ticks(self.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;
    #[inline]
    fn add(self, rhs: u64) -> Tick {
        self.offset(rhs)
    }
}

impl std::ops::Sub for Tick {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Tick) -> u64 {
        self.since(rhs)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0 / TICKS_PER_SECOND;
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            secs / 3_600,
            (secs % 3_600) / 60,
            secs % 60,
            self.0 % TICKS_PER_SECOND
        )
    }
}

// ── TimeBase ──────────────────────────────────────────────────────────────────

/// Unit in which a station's distributions and expressions are expressed.
///
/// Values are multiplied by [`TimeBase::secs`] before conversion to ticks.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeBase {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl TimeBase {
    /// Length of one unit in seconds.
    #[inline]
    pub fn secs(self) -> f64 {
        match self {
            TimeBase::Milliseconds => 0.001,
            TimeBase::Seconds      => 1.0,
            TimeBase::Minutes      => 60.0,
            TimeBase::Hours        => 3_600.0,
        }
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Run-level configuration shared by every replication.
///
/// Typically deserialized from JSON by the application crate (feature
/// `serde`) and passed to `SimBuilder`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Master RNG seed.  The same seed always produces identical results.
    pub seed: u64,

    /// Number of independent replications to run.
    pub replications: usize,

    /// Worker thread count passed to Rayon.  `None` uses all logical cores.
    pub num_threads: Option<usize>,

    /// Hard stop for a replication.  `None` runs until the event queue
    /// drains or the last client is disposed.
    pub max_ticks: Option<Tick>,

    /// Clients created before this count (per replication) are flagged as
    /// warm-up and excluded from statistics.
    pub warm_up_clients: u64,

    /// Abort the replication on the first failed expression instead of
    /// substituting 0.
    pub stop_on_calculation_error: bool,

    /// Delay between the nominal end of processing and the release of the
    /// resources it held.
    pub release_delay_ticks: u64,

    /// Delay of the re-check scheduled when a batch reached its minimum but
    /// not its maximum size.
    pub recheck_delay_ticks: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:                      1,
            replications:              1,
            num_threads:               None,
            max_ticks:                 None,
            warm_up_clients:           0,
            stop_on_calculation_error: false,
            release_delay_ticks:       1,
            recheck_delay_ticks:       1,
        }
    }
}

impl SimConfig {
    /// True once `now` has passed the configured time limit.
    #[inline]
    pub fn time_limit_reached(&self, now: Tick) -> bool {
        self.max_ticks.is_some_and(|limit| now > limit)
    }
}
