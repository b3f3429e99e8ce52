//! CSV output backend.
//!
//! Creates three files in the configured output directory:
//! - `replications.csv`
//! - `station_summary.csv`
//! - `client_types.csv`

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{ClientTypeSummaryRow, OutputResult, ReplicationRow, StationSummaryRow};

/// Writes summary output to three CSV files.
pub struct CsvWriter {
    replications: Writer<File>,
    stations:     Writer<File>,
    client_types: Writer<File>,
    finished:     bool,
}

impl CsvWriter {
    /// Create `dir` if needed, open the three CSV files and write the header
    /// rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        std::fs::create_dir_all(dir)?;

        let mut replications = Writer::from_path(dir.join("replications.csv"))?;
        replications.write_record([
            "replication", "end", "final_time_secs", "events", "created", "disposed", "in_system",
        ])?;

        let mut stations = Writer::from_path(dir.join("station_summary.csv"))?;
        stations.write_record([
            "replication",
            "station",
            "arrivals",
            "leaves",
            "reneged",
            "max_queue_length",
            "mean_waiting_secs",
            "mean_process_secs",
            "mean_residence_secs",
            "setup_secs",
            "costs",
        ])?;

        let mut client_types = Writer::from_path(dir.join("client_types.csv"))?;
        client_types.write_record([
            "replication",
            "client_type",
            "disposed",
            "mean_waiting_secs",
            "mean_transfer_secs",
            "mean_process_secs",
            "mean_residence_secs",
            "max_residence_secs",
        ])?;

        Ok(Self { replications, stations, client_types, finished: false })
    }
}

impl OutputWriter for CsvWriter {
    fn write_replication(&mut self, row: &ReplicationRow) -> OutputResult<()> {
        self.replications.write_record(&[
            row.replication.to_string(),
            row.end.to_string(),
            row.final_time_secs.to_string(),
            row.events.to_string(),
            row.created.to_string(),
            row.disposed.to_string(),
            row.in_system.to_string(),
        ])?;
        Ok(())
    }

    fn write_station_summaries(&mut self, rows: &[StationSummaryRow]) -> OutputResult<()> {
        for row in rows {
            self.stations.write_record(&[
                row.replication.to_string(),
                row.station.clone(),
                row.arrivals.to_string(),
                row.leaves.to_string(),
                row.reneged.to_string(),
                row.max_queue_length.to_string(),
                row.mean_waiting_secs.to_string(),
                row.mean_process_secs.to_string(),
                row.mean_residence_secs.to_string(),
                row.setup_secs.to_string(),
                row.costs.to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_client_type_summaries(&mut self, rows: &[ClientTypeSummaryRow]) -> OutputResult<()> {
        for row in rows {
            self.client_types.write_record(&[
                row.replication.to_string(),
                row.client_type.clone(),
                row.disposed.to_string(),
                row.mean_waiting_secs.to_string(),
                row.mean_transfer_secs.to_string(),
                row.mean_process_secs.to_string(),
                row.mean_residence_secs.to_string(),
                row.max_residence_secs.to_string(),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.replications.flush()?;
        self.stations.flush()?;
        self.client_types.flush()?;
        Ok(())
    }
}
