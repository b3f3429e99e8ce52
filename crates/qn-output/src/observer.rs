//! `SummaryObserver<W>` — bridges `SimObserver` to an `OutputWriter`.

use qn_core::Tick;
use qn_sim::{EndReason, ReplicationSummary, SimObserver};
use tracing::warn;

use crate::row::ReplicationRow;
use crate::writer::OutputWriter;
use crate::{OutputError, OutputResult};

/// A [`SimObserver`] that writes one [`ReplicationRow`] per replication to
/// any [`OutputWriter`] backend.
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  After the runs return, check for errors with
/// [`take_error`][Self::take_error].  The writer is not finished by the
/// observer; recover it with [`into_writer`][Self::into_writer] or
/// [`writer_mut`][Self::writer_mut] to add the summary tables first.
pub struct SummaryObserver<W: OutputWriter> {
    writer:     W,
    events:     u64,
    last_error: Option<OutputError>,
}

impl<W: OutputWriter> SummaryObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, events: 0, last_error: None }
    }

    /// Take the stored write error (if any).
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            warn!(error = %e, "summary write failed");
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> SimObserver for SummaryObserver<W> {
    fn on_replication_start(&mut self, _replication: usize, _seed: u64) {
        self.events = 0;
    }

    fn on_event(&mut self, _now: Tick, executed: u64) {
        self.events = executed;
    }

    fn on_replication_end(&mut self, summary: &ReplicationSummary) {
        let result = self.writer.write_replication(&ReplicationRow::from(summary));
        self.store_err(result);
    }

    /// Client counts are not known to the observer at shutdown and are
    /// written as zero.
    fn on_emergency_shutdown(&mut self, replication: usize, now: Tick) {
        let row = ReplicationRow {
            replication,
            end:             "emergency_shutdown",
            final_time_secs: now.as_secs(),
            events:          self.events,
            created:         0,
            disposed:        0,
            in_system:       0,
        };
        let result = self.writer.write_replication(&row);
        self.store_err(result);
    }
}

impl From<&ReplicationSummary> for ReplicationRow {
    fn from(s: &ReplicationSummary) -> Self {
        Self {
            replication:     s.replication,
            end:             end_label(s.end),
            final_time_secs: s.final_tick.as_secs(),
            events:          s.events,
            created:         s.created,
            disposed:        s.disposed,
            in_system:       s.in_system,
        }
    }
}

fn end_label(end: EndReason) -> &'static str {
    match end {
        EndReason::LastClient => "last_client",
        EndReason::TimeLimit => "time_limit",
        EndReason::Drained => "drained",
    }
}
