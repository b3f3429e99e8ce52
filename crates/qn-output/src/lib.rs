//! `qn-output` — statistics aggregation and summary output for the rust_qn
//! framework.
//!
//! [`StatisticsRecorder`] is a `qn_station::StatisticsSink` that totals one
//! replication per station and per client type, skipping warm-up clients.
//! [`SummaryObserver`] implements `qn_sim::SimObserver` and records how each
//! replication ended.  Both hand rows to an [`OutputWriter`]:
//!
//! | Backend | Files created                                                  |
//! |---------|----------------------------------------------------------------|
//! | CSV     | `replications.csv`, `station_summary.csv`, `client_types.csv`  |
//!
//! # Usage
//!
//! ```rust,ignore
//! use qn_output::{CsvWriter, StatisticsRecorder, SummaryObserver};
//!
//! let mut obs = SummaryObserver::new(CsvWriter::new(Path::new("./output"))?);
//! let mut recorder = StatisticsRecorder::new();
//! sim.replication(0).run(&mut recorder, &mut obs)?;
//! recorder.write_to(obs.writer_mut(), 0, &sim.network)?;
//! obs.writer_mut().finish()?;
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod recorder;
pub mod row;
pub mod writer;


pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::SummaryObserver;
pub use recorder::StatisticsRecorder;
pub use row::{ClientTypeSummaryRow, ReplicationRow, StationSummaryRow};
pub use writer::OutputWriter;
