//! Framework error type.
//!
//! `QnError` covers both build-time configuration problems and the fatal
//! run-time conditions that trigger an emergency shutdown.  Calculation
//! failures that are recovered locally never become a `QnError`; only the
//! halting variant does.

use thiserror::Error;

use crate::{ClientId, StationId};

/// The top-level error type shared by the `qn-*` crates.
#[derive(Debug, Error)]
pub enum QnError {
    /// Detected while building the network; never reached at run time.
    #[error("configuration error: {0}")]
    Config(String),

    /// An expression failed and the run is configured to stop on such errors.
    #[error("calculation error at station \"{station}\" in \"{expression}\": {reason}")]
    CalculationHalted {
        station:    String,
        expression: String,
        reason:     String,
    },

    /// A dynamic batch size evaluated to zero or less.
    #[error("invalid batch size {value} at station \"{station}\"")]
    InvalidBatchSize {
        station: String,
        value:   f64,
    },

    #[error("station {0} not found")]
    StationNotFound(StationId),

    /// A client had to be forwarded but the station has no outgoing edge.
    #[error("station {0} has no successor")]
    NoSuccessor(StationId),

    #[error("client {0} is not alive")]
    ClientNotFound(ClientId),

    /// The arena slot for a station holds data of another station kind.
    #[error("run-time data of station {0} does not match its kind")]
    StationDataMismatch(StationId),
}

impl QnError {
    /// True for errors that end a replication with an emergency shutdown.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, QnError::Config(_))
    }
}

/// Shorthand result type for all `qn-*` crates.
pub type QnResult<T> = Result<T, QnError>;
