//! `RunContext` — everything a station callback may touch.

use qn_client::{Client, ClientStore, StationTimes};
use qn_core::{ClientId, QnError, QnResult, SimConfig, StationId, Tick};
use qn_eval::Calculator;
use qn_resource::ResourcePool;
use qn_schedule::{Event, Scheduler};
use tracing::{debug, trace};

use crate::{Network, StationArena, StationData, StationKind, StatisticsSink};

/// Mutable view of one replication, built for each dispatched event.
///
/// # Borrowing
///
/// Fields are public so callbacks can borrow them disjointly, e.g. read a
/// client from `clients` while evaluating through `calc`.  The station being
/// called has its own data taken out of `stations` for the duration of the
/// call (see [`with_station`][Self::with_station]).
pub struct RunContext<'a, 'c> {
    pub config:    &'a SimConfig,
    pub network:   &'a Network,
    pub stations:  &'a mut StationArena,
    pub clients:   &'a mut ClientStore,
    pub resources: &'a mut ResourcePool,
    pub scheduler: &'a mut dyn Scheduler,
    pub calc:      &'a mut Calculator<'c>,
    pub stats:     &'a mut dyn StatisticsSink,
    stop_requested: bool,
}

impl<'a, 'c> RunContext<'a, 'c> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config:    &'a SimConfig,
        network:   &'a Network,
        stations:  &'a mut StationArena,
        clients:   &'a mut ClientStore,
        resources: &'a mut ResourcePool,
        scheduler: &'a mut dyn Scheduler,
        calc:      &'a mut Calculator<'c>,
        stats:     &'a mut dyn StatisticsSink,
    ) -> Self {
        Self { config, network, stations, clients, resources, scheduler, calc, stats, stop_requested: false }
    }

    #[inline]
    pub fn now(&self) -> Tick {
        self.scheduler.now()
    }

    #[inline]
    pub fn client(&self, id: ClientId) -> QnResult<&Client> {
        self.clients.require(id)
    }

    #[inline]
    pub fn client_mut(&mut self, id: ClientId) -> QnResult<&mut Client> {
        self.clients.require_mut(id)
    }

    /// Ask the replication to end after the current event.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Pass client `id` and the current time to a statistics callback.
    pub fn report(
        &mut self,
        id: ClientId,
        f:  impl FnOnce(&mut dyn StatisticsSink, &Client, Tick),
    ) -> QnResult<()> {
        let now = self.scheduler.now();
        let client = self.clients.require(id)?;
        f(&mut *self.stats, client, now);
        Ok(())
    }

    /// Add `times` to the client and report them.
    pub fn book(&mut self, station: StationId, id: ClientId, times: StationTimes) -> QnResult<()> {
        self.clients.require_mut(id)?.add_station_time(times);
        self.report(id, |s, c, _| s.station_times(station, c, times))
    }

    /// End the client's stay at `station` now; `on_leave` runs next.
    pub fn leave_now(&mut self, station: StationId, client: ClientId) {
        let now = self.now();
        self.leave_at(station, client, now);
    }

    pub fn leave_at(&mut self, station: StationId, client: ClientId, at: Tick) {
        self.scheduler.schedule_at(at, Event::Leave { station, client });
    }

    /// Hand `client` from `from` to `to` as an arrival at the current time.
    pub fn forward(&mut self, from: StationId, to: StationId, client: ClientId) -> QnResult<()> {
        self.clients.require_mut(client)?.last_station = Some(from);
        self.report(client, |s, c, now| s.station_leave(from, c, now))?;
        let now = self.now();
        self.scheduler.schedule_at(now, Event::Arrival { station: to, client: Some(client) });
        Ok(())
    }

    /// Remove `id` from the system, reporting it and every original it
    /// carries exactly once.  Returns whether any of them was the last
    /// client.
    pub fn dispose_client(&mut self, id: ClientId) -> QnResult<bool> {
        let now = self.now();
        let mut record = self.clients.dispose(id).ok_or(QnError::ClientNotFound(id))?;
        self.stats.client_disposed(&record, now);
        let mut is_last = record.is_last_client;
        let mut pending = record.take_batch_members();
        while let Some(mut member) = pending.pop() {
            self.stats.client_disposed(&member, now);
            self.clients.mark_disposed();
            is_last |= member.is_last_client;
            pending.extend(member.take_batch_members());
            self.clients.recycle(member);
        }
        self.clients.recycle(record);
        Ok(is_last)
    }

    /// Run `f` with station `id` and its run-time data.
    ///
    /// The data is taken out of the arena for the duration of the call, so
    /// `f` may freely use the rest of the context, including other stations'
    /// data.
    pub fn with_station<R>(
        &mut self,
        id: StationId,
        f:  impl FnOnce(&'a StationKind, &mut StationData, &mut Self) -> QnResult<R>,
    ) -> QnResult<R> {
        let network = self.network;
        let station = network.station(id)?;
        let mut data = self.stations.take(id)?;
        let result = f(station, &mut data, self);
        self.stations.restore(id, data);
        result
    }

    /// Pull the next waiting client out of `remote` on behalf of a pickup
    /// station.  `None` if the remote is empty or currently busy.
    pub fn take_for_pickup(&mut self, remote: StationId) -> QnResult<Option<ClientId>> {
        if self.stations.get(remote).is_none_or(StationData::locked_for_pickup) {
            return Ok(None);
        }
        let taken = self.with_station(remote, |s, d, ctx| s.take_for_pickup(d, ctx))?;
        if let Some(id) = taken {
            self.report(id, |s, c, now| s.station_leave(remote, c, now))?;
        }
        Ok(taken)
    }

    // ── Replication driving ───────────────────────────────────────────────

    /// Give every station its `on_start` call.
    pub fn start(&mut self) -> QnResult<()> {
        let network = self.network;
        for station in network.stations() {
            self.with_station(station.id(), |s, d, ctx| s.on_start(d, ctx))?;
        }
        self.flush_calculation_errors();
        Ok(())
    }

    /// Deliver one event, then run the state listeners.
    pub fn dispatch(&mut self, event: Event) -> QnResult<()> {
        trace!(now = %self.now(), ?event, "dispatch");
        match event {
            Event::Arrival { station, client } => {
                if let Some(id) = client {
                    self.report(id, |s, c, now| s.station_arrival(station, c, now))?;
                }
                self.with_station(station, |s, d, ctx| s.on_arrival(d, client, ctx))?;
            }
            Event::Leave { station, client } => {
                self.with_station(station, |s, d, ctx| s.on_leave(d, client, ctx))?;
            }
            Event::Timer { station, client } => {
                self.with_station(station, |s, d, ctx| s.on_timer(d, client, ctx))?;
            }
            Event::ReleaseResources { station, alternative } => {
                let network = self.network;
                let alternatives = network.station(station)?.alternatives();
                self.resources.release(alternatives, alternative, station)?;
                self.notify_resource_users()?;
            }
            Event::Signal { signal } => {
                let network = self.network;
                for &id in network.signal_listeners(signal) {
                    self.with_station(id, |s, d, ctx| s.on_signal(d, signal, ctx))?;
                }
            }
        }
        self.notify_state_change()?;
        self.flush_calculation_errors();
        Ok(())
    }

    /// Offer freed resources to every user, best resource priority first,
    /// then best waiting score, then lowest station id.
    pub fn notify_resource_users(&mut self) -> QnResult<()> {
        let users = self.resources.users().to_vec();
        let mut order = Vec::with_capacity(users.len());
        for id in users {
            let (primary, secondary) = self.with_station(id, |s, d, ctx| {
                Ok((s.resource_priority(d, ctx)?, s.secondary_resource_priority(d, ctx)?))
            })?;
            order.push((primary, secondary, id));
        }
        order.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.total_cmp(&a.1)).then(a.2.cmp(&b.2)));
        for (_, _, id) in order {
            self.with_station(id, |s, d, ctx| s.on_resources_released(d, ctx))?;
        }
        Ok(())
    }

    fn notify_state_change(&mut self) -> QnResult<()> {
        let network = self.network;
        for &id in network.state_listeners() {
            self.with_station(id, |s, d, ctx| s.on_state_change(d, ctx))?;
        }
        Ok(())
    }

    fn flush_calculation_errors(&mut self) {
        for error in self.calc.take_errors() {
            self.stats.calculation_error(&error);
        }
    }

    /// Emergency shutdown: empty every waiting structure (booking partial
    /// waiting times), then dispose every live client through the sink.
    pub fn shutdown(&mut self) -> QnResult<()> {
        let network = self.network;
        for station in network.stations() {
            self.with_station(station.id(), |s, d, ctx| s.flush(d, ctx))?;
        }
        let live = self.clients.ids();
        debug!(clients = live.len(), "disposing clients after shutdown");
        for id in live {
            self.dispose_client(id)?;
        }
        self.flush_calculation_errors();
        Ok(())
    }
}
