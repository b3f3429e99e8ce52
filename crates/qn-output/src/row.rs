//! Plain data row types written by output backends.
//!
//! Durations are in seconds; means are taken over the clients that reached
//! the station (or left the system, for client types).

/// Aggregated statistics of one station in one replication.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSummaryRow {
    pub replication:         usize,
    pub station:             String,
    pub arrivals:            u64,
    pub leaves:              u64,
    pub reneged:             u64,
    pub max_queue_length:    usize,
    pub mean_waiting_secs:   f64,
    pub mean_process_secs:   f64,
    pub mean_residence_secs: f64,
    pub setup_secs:          f64,
    pub costs:               f64,
}

/// Aggregated statistics of one client type over the clients that left the
/// system.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientTypeSummaryRow {
    pub replication:         usize,
    pub client_type:         String,
    pub disposed:            u64,
    pub mean_waiting_secs:   f64,
    pub mean_transfer_secs:  f64,
    pub mean_process_secs:   f64,
    pub mean_residence_secs: f64,
    pub max_residence_secs:  f64,
}

/// How one replication ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationRow {
    pub replication:     usize,
    /// `last_client`, `time_limit`, `drained` or `emergency_shutdown`.
    pub end:             &'static str,
    pub final_time_secs: f64,
    pub events:          u64,
    pub created:         u64,
    pub disposed:        u64,
    pub in_system:       usize,
}
