//! The `OutputWriter` trait implemented by backend writers.

use crate::{ClientTypeSummaryRow, OutputResult, ReplicationRow, StationSummaryRow};

/// A sink for summary rows.
///
/// Rows of several replications may be interleaved; every row carries its
/// replication index.
pub trait OutputWriter {
    fn write_replication(&mut self, row: &ReplicationRow) -> OutputResult<()>;

    fn write_station_summaries(&mut self, rows: &[StationSummaryRow]) -> OutputResult<()>;

    fn write_client_type_summaries(&mut self, rows: &[ClientTypeSummaryRow]) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent: safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
