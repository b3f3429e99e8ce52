//! `StatisticsRecorder` — a [`StatisticsSink`] that aggregates one
//! replication into per-station and per-client-type totals.

use qn_client::{Client, StationTimes};
use qn_core::{ClientTypeId, StationId, Tick};
use qn_eval::CalculationError;
use qn_station::{Costs, Network, StatisticsSink};
use tracing::debug;

use crate::row::{ClientTypeSummaryRow, StationSummaryRow};
use crate::writer::OutputWriter;
use crate::OutputResult;

#[derive(Clone, Debug, Default, PartialEq)]
struct StationStats {
    arrivals:         u64,
    leaves:           u64,
    reneged:          u64,
    max_queue_length: usize,
    waiting:          u64,
    process:          u64,
    residence:        u64,
    setup:            u64,
    costs:            f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct TypeStats {
    disposed:      u64,
    waiting:       u64,
    transfer:      u64,
    process:       u64,
    residence:     u64,
    max_residence: u64,
}

/// Aggregates the callbacks of one replication.
///
/// Clients flagged `is_warm_up` are left out of every total.  Queue lengths
/// are system state and are tracked for all clients.  Tables grow on demand,
/// so one recorder fits any network; rows are produced against the
/// [`Network`] that supplies the names.
#[derive(Clone, Debug, Default)]
pub struct StatisticsRecorder {
    stations:           Vec<StationStats>,
    types:              Vec<TypeStats>,
    calculation_errors: u64,
    warm_up_disposed:   u64,
}

impl StatisticsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculation errors reported during the replication.
    pub fn calculation_errors(&self) -> u64 {
        self.calculation_errors
    }

    /// Warm-up clients that left the system (and were not counted).
    pub fn warm_up_disposed(&self) -> u64 {
        self.warm_up_disposed
    }

    /// One row per station of `network`, in station order.
    pub fn station_rows(&self, replication: usize, network: &Network) -> Vec<StationSummaryRow> {
        let empty = StationStats::default();
        network
            .stations()
            .iter()
            .map(|kind| {
                let s = self.stations.get(kind.id().index()).unwrap_or(&empty);
                StationSummaryRow {
                    replication,
                    station:             kind.name().to_owned(),
                    arrivals:            s.arrivals,
                    leaves:              s.leaves,
                    reneged:             s.reneged,
                    max_queue_length:    s.max_queue_length,
                    mean_waiting_secs:   mean_secs(s.waiting, s.arrivals),
                    mean_process_secs:   mean_secs(s.process, s.arrivals),
                    mean_residence_secs: mean_secs(s.residence, s.arrivals),
                    setup_secs:          Tick::secs_for_ticks(s.setup),
                    costs:               s.costs,
                }
            })
            .collect()
    }

    /// One row per client type that left the system at least once.
    pub fn client_type_rows(&self, replication: usize, network: &Network) -> Vec<ClientTypeSummaryRow> {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.disposed > 0)
            .map(|(i, t)| ClientTypeSummaryRow {
                replication,
                client_type:         network.client_type_name(type_id(i)),
                disposed:            t.disposed,
                mean_waiting_secs:   mean_secs(t.waiting, t.disposed),
                mean_transfer_secs:  mean_secs(t.transfer, t.disposed),
                mean_process_secs:   mean_secs(t.process, t.disposed),
                mean_residence_secs: mean_secs(t.residence, t.disposed),
                max_residence_secs:  Tick::secs_for_ticks(t.max_residence),
            })
            .collect()
    }

    /// Write both summary tables of this replication to `writer`.
    pub fn write_to<W: OutputWriter>(&self, writer: &mut W, replication: usize, network: &Network) -> OutputResult<()> {
        let stations = self.station_rows(replication, network);
        let types = self.client_type_rows(replication, network);
        debug!(replication, stations = stations.len(), client_types = types.len(), "writing summaries");
        writer.write_station_summaries(&stations)?;
        writer.write_client_type_summaries(&types)
    }

    fn station(&mut self, id: StationId) -> &mut StationStats {
        let i = id.index();
        if i >= self.stations.len() {
            self.stations.resize_with(i + 1, StationStats::default);
        }
        &mut self.stations[i]
    }

    fn client_type(&mut self, ty: ClientTypeId) -> &mut TypeStats {
        let i = ty.index();
        if i >= self.types.len() {
            self.types.resize_with(i + 1, TypeStats::default);
        }
        &mut self.types[i]
    }
}

impl StatisticsSink for StatisticsRecorder {
    fn station_arrival(&mut self, station: StationId, client: &Client, _now: Tick) {
        if !client.is_warm_up {
            self.station(station).arrivals += 1;
        }
    }

    fn station_leave(&mut self, station: StationId, client: &Client, _now: Tick) {
        if !client.is_warm_up {
            self.station(station).leaves += 1;
        }
    }

    fn queue_enter(&mut self, station: StationId, _client: &Client, _now: Tick, queue_len: usize) {
        let s = self.station(station);
        s.max_queue_length = s.max_queue_length.max(queue_len);
    }

    fn station_times(&mut self, station: StationId, client: &Client, times: StationTimes) {
        if client.is_warm_up {
            return;
        }
        let s = self.station(station);
        s.waiting += times.waiting;
        s.process += times.process;
        s.residence += times.residence;
    }

    fn setup_time(&mut self, station: StationId, client: &Client, ticks: u64) {
        if !client.is_warm_up {
            self.station(station).setup += ticks;
        }
    }

    fn costs(&mut self, station: StationId, client: &Client, costs: Costs) {
        if !client.is_warm_up {
            self.station(station).costs += costs.total();
        }
    }

    fn reneged(&mut self, station: StationId, client: &Client, _now: Tick) {
        if !client.is_warm_up {
            self.station(station).reneged += 1;
        }
    }

    fn client_disposed(&mut self, client: &Client, _now: Tick) {
        if client.is_warm_up {
            self.warm_up_disposed += 1;
            return;
        }
        let t = self.client_type(client.client_type);
        t.disposed += 1;
        t.waiting += client.waiting_time;
        t.transfer += client.transfer_time;
        t.process += client.process_time;
        t.residence += client.residence_time;
        t.max_residence = t.max_residence.max(client.residence_time);
    }

    fn calculation_error(&mut self, _error: &CalculationError) {
        self.calculation_errors += 1;
    }
}

fn mean_secs(total_ticks: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        Tick::secs_for_ticks(total_ticks) / count as f64
    }
}

fn type_id(index: usize) -> ClientTypeId {
    ClientTypeId::try_from(index).unwrap_or(ClientTypeId::INVALID)
}
