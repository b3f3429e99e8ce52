//! One independent run of the network: its own clients, events, station
//! data, resource pool and RNG.

use qn_client::ClientStore;
use qn_core::{QnResult, SimConfig, SimRng, StationId, Tick};
use qn_eval::{Calculator, Evaluator, RngSampler};
use qn_resource::ResourcePool;
use qn_schedule::{EventQueue, Scheduler};
use qn_station::{Network, RunContext, StationArena, StatisticsSink};
use tracing::{error, info, trace};

use crate::{SimError, SimObserver, SimResult};

/// Why the event loop of a replication stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// A dispose station removed the client flagged `is_last_client`.
    LastClient,
    /// The next event lies beyond `SimConfig::max_ticks`.
    TimeLimit,
    /// No events were left.
    Drained,
}

/// What a finished replication reports besides its statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicationSummary {
    pub replication: usize,
    pub end:         EndReason,
    /// Time of the last dispatched event.
    pub final_tick:  Tick,
    pub events:      u64,
    pub created:     u64,
    pub disposed:    u64,
    /// Clients still in the network when the loop stopped.
    pub in_system:   usize,
}

/// Per-replication state.  Create via [`Sim::replication`][crate::Sim::replication].
///
/// A replication runs once; build a new one to run again.
pub struct Replication<'s, E: Evaluator> {
    index:     usize,
    config:    &'s SimConfig,
    network:   &'s Network,
    evaluator: &'s E,
    sampler:   RngSampler,
    stations:  StationArena,
    clients:   ClientStore,
    resources: ResourcePool,
    events:    EventQueue,
    started:   bool,
}

impl<'s, E: Evaluator> Replication<'s, E> {
    pub(crate) fn new(index: usize, config: &'s SimConfig, network: &'s Network, evaluator: &'s E) -> Self {
        Self {
            index,
            config,
            network,
            evaluator,
            sampler:   RngSampler::new(SimRng::for_replication(config.seed, index)),
            stations:  StationArena::new(Vec::new()),
            clients:   ClientStore::new(),
            resources: network.resources().clone(),
            events:    EventQueue::new(),
            started:   false,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn now(&self) -> Tick {
        self.events.now()
    }

    pub fn clients(&self) -> &ClientStore {
        &self.clients
    }

    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    /// Clients currently waiting at `station`.
    pub fn waiting(&self, station: StationId) -> QnResult<usize> {
        let kind = self.network.station(station)?;
        Ok(self.stations.get(station).map_or(0, |data| kind.waiting(data)))
    }

    /// Run the event loop to its end.
    ///
    /// A fatal error (see [`QnError::is_fatal`][qn_core::QnError::is_fatal])
    /// triggers an emergency shutdown: every waiting structure is flushed and
    /// every live client disposed through `sink`, then
    /// [`SimError::EmergencyShutdown`] is returned.
    pub fn run<S, O>(&mut self, sink: &mut S, observer: &mut O) -> SimResult<ReplicationSummary>
    where
        S: StatisticsSink,
        O: SimObserver,
    {
        if self.started {
            return Err(SimError::Config(format!("replication {} already ran", self.index)));
        }
        self.started = true;

        info!(replication = self.index, seed = self.config.seed, "replication started");
        observer.on_replication_start(self.index, self.config.seed);

        // Dynamic batch sizes are resolved here; nothing is queued yet, so a
        // failure needs no flush.
        if let Err(cause) = self.init_stations(sink) {
            error!(replication = self.index, %cause, "station initialisation failed");
            observer.on_emergency_shutdown(self.index, self.now());
            return Err(SimError::EmergencyShutdown { replication: self.index, cause });
        }

        match self.drive(sink, observer) {
            Ok(end) => {
                let summary = self.summary(end);
                info!(
                    replication = self.index,
                    end = ?summary.end,
                    now = %summary.final_tick,
                    events = summary.events,
                    disposed = summary.disposed,
                    "replication finished"
                );
                observer.on_replication_end(&summary);
                Ok(summary)
            }
            Err(cause) if cause.is_fatal() => {
                let now = self.now();
                error!(replication = self.index, %now, %cause, "emergency shutdown");
                if let Err(flush) = self.with_ctx(sink, |ctx| ctx.shutdown()) {
                    error!(replication = self.index, error = %flush, "flush during shutdown failed");
                }
                observer.on_emergency_shutdown(self.index, now);
                Err(SimError::EmergencyShutdown { replication: self.index, cause })
            }
            Err(cause) => Err(cause.into()),
        }
    }

    fn init_stations(&mut self, sink: &mut dyn StatisticsSink) -> QnResult<()> {
        let mut calc = Calculator::new(self.evaluator, &mut self.sampler, self.config.stop_on_calculation_error);
        let arena = self.network.new_arena(&mut calc);
        for error in calc.take_errors() {
            sink.calculation_error(&error);
        }
        self.stations = arena?;
        Ok(())
    }

    fn drive<S, O>(&mut self, sink: &mut S, observer: &mut O) -> QnResult<EndReason>
    where
        S: StatisticsSink,
        O: SimObserver,
    {
        self.with_ctx(sink, |ctx| ctx.start())?;
        loop {
            let Some(next) = self.events.next_tick() else {
                return Ok(EndReason::Drained);
            };
            if self.config.time_limit_reached(next) {
                return Ok(EndReason::TimeLimit);
            }
            let Some((now, event)) = self.events.pop() else {
                return Ok(EndReason::Drained);
            };
            trace!(replication = self.index, %now, "event");
            let stop = self.with_ctx(sink, |ctx| {
                ctx.dispatch(event)?;
                Ok(ctx.stop_requested())
            })?;
            observer.on_event(now, self.events.executed());
            if stop {
                return Ok(EndReason::LastClient);
            }
        }
    }

    fn with_ctx<R>(
        &mut self,
        sink: &mut dyn StatisticsSink,
        f:    impl FnOnce(&mut RunContext<'_, '_>) -> QnResult<R>,
    ) -> QnResult<R> {
        let mut calc = Calculator::new(self.evaluator, &mut self.sampler, self.config.stop_on_calculation_error);
        let mut ctx = RunContext::new(
            self.config,
            self.network,
            &mut self.stations,
            &mut self.clients,
            &mut self.resources,
            &mut self.events,
            &mut calc,
            sink,
        );
        f(&mut ctx)
    }

    fn summary(&self, end: EndReason) -> ReplicationSummary {
        ReplicationSummary {
            replication: self.index,
            end,
            final_tick:  self.now(),
            events:      self.events.executed(),
            created:     self.clients.created(),
            disposed:    self.clients.disposed(),
            in_system:   self.clients.alive(),
        }
    }
}
