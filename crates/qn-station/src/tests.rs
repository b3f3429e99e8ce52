//! Unit tests for qn-station.
//!
//! Every test drives a small network through [`harness::Harness`], which
//! plays the replication loop: pop an event, build a `RunContext`, dispatch.

#[cfg(test)]
mod harness {
    use qn_client::{Client, ClientStore, StationTimes};
    use qn_core::{ClientId, ClientTypeId, QnResult, SignalId, SimConfig, SimRng, StationId, Tick};
    use qn_eval::{CalculationError, Calculator, RngSampler, SimpleEvaluator};
    use qn_resource::ResourcePool;
    use qn_schedule::{Event, EventQueue, Scheduler};

    use crate::{Costs, Network, RunContext, StationArena, StatisticsSink};

    /// Clients are told apart by numeric user data slot 0.
    pub fn tag(client: &Client) -> f64 {
        client.user_data.number(0)
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct Disposal {
        pub tag:         f64,
        pub client_type: ClientTypeId,
        pub at:          Tick,
        pub members:     Vec<f64>,
        pub waiting:     u64,
        pub last:        bool,
        pub warm_up:     bool,
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Record {
        Arrival { station: StationId, tag: f64, at: Tick },
        Leave { station: StationId, tag: f64, at: Tick },
        QueueEnter { station: StationId, tag: f64, at: Tick, len: usize },
        QueueLeave { station: StationId, tag: f64, at: Tick, len: usize },
        Times { station: StationId, tag: f64, times: StationTimes },
        Setup { station: StationId, tag: f64, ticks: u64 },
        Costs { station: StationId, tag: f64, costs: Costs },
        Reneged { station: StationId, tag: f64, at: Tick },
        Disposed(Disposal),
        CalcError(String),
    }

    #[derive(Default)]
    pub struct Recorder {
        pub records: Vec<Record>,
    }

    impl StatisticsSink for Recorder {
        fn station_arrival(&mut self, station: StationId, client: &Client, now: Tick) {
            self.records.push(Record::Arrival { station, tag: tag(client), at: now });
        }
        fn station_leave(&mut self, station: StationId, client: &Client, now: Tick) {
            self.records.push(Record::Leave { station, tag: tag(client), at: now });
        }
        fn queue_enter(&mut self, station: StationId, client: &Client, now: Tick, len: usize) {
            self.records.push(Record::QueueEnter { station, tag: tag(client), at: now, len });
        }
        fn queue_leave(&mut self, station: StationId, client: &Client, now: Tick, len: usize) {
            self.records.push(Record::QueueLeave { station, tag: tag(client), at: now, len });
        }
        fn station_times(&mut self, station: StationId, client: &Client, times: StationTimes) {
            self.records.push(Record::Times { station, tag: tag(client), times });
        }
        fn setup_time(&mut self, station: StationId, client: &Client, ticks: u64) {
            self.records.push(Record::Setup { station, tag: tag(client), ticks });
        }
        fn costs(&mut self, station: StationId, client: &Client, costs: Costs) {
            self.records.push(Record::Costs { station, tag: tag(client), costs });
        }
        fn reneged(&mut self, station: StationId, client: &Client, now: Tick) {
            self.records.push(Record::Reneged { station, tag: tag(client), at: now });
        }
        fn client_disposed(&mut self, client: &Client, now: Tick) {
            self.records.push(Record::Disposed(Disposal {
                tag:         tag(client),
                client_type: client.client_type,
                at:          now,
                members:     client.batch_members().iter().map(tag).collect(),
                waiting:     client.waiting_time,
                last:        client.is_last_client,
                warm_up:     client.is_warm_up,
            }));
        }
        fn calculation_error(&mut self, error: &CalculationError) {
            self.records.push(Record::CalcError(error.expression.clone()));
        }
    }

    impl Recorder {
        pub fn arrivals(&self, at_station: StationId) -> Vec<(f64, Tick)> {
            self.records
                .iter()
                .filter_map(|r| match r {
                    Record::Arrival { station, tag, at } if *station == at_station => Some((*tag, *at)),
                    _ => None,
                })
                .collect()
        }

        pub fn queue_leaves(&self, at_station: StationId) -> Vec<(f64, Tick)> {
            self.records
                .iter()
                .filter_map(|r| match r {
                    Record::QueueLeave { station, tag, at, .. } if *station == at_station => Some((*tag, *at)),
                    _ => None,
                })
                .collect()
        }

        pub fn reneged(&self) -> Vec<(f64, Tick)> {
            self.records
                .iter()
                .filter_map(|r| match r {
                    Record::Reneged { tag, at, .. } => Some((*tag, *at)),
                    _ => None,
                })
                .collect()
        }

        pub fn disposals(&self) -> Vec<Disposal> {
            self.records
                .iter()
                .filter_map(|r| match r {
                    Record::Disposed(d) => Some(d.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn count(&self, f: impl Fn(&Record) -> bool) -> usize {
            self.records.iter().filter(|r| f(r)).count()
        }
    }

    pub struct Harness {
        pub config:    SimConfig,
        pub network:   Network,
        pub arena:     StationArena,
        pub clients:   ClientStore,
        pub resources: ResourcePool,
        pub events:    EventQueue,
        pub sink:      Recorder,
        pub stopped:   bool,
        evaluator:     SimpleEvaluator,
        sampler:       RngSampler,
    }

    impl Harness {
        pub fn new(network: Network) -> Self {
            Self::with_config(network, SimConfig::default())
        }

        pub fn with_config(network: Network, config: SimConfig) -> Self {
            let evaluator = SimpleEvaluator;
            let mut sampler = RngSampler::new(SimRng::new(config.seed));
            let arena = {
                let mut calc = Calculator::new(&evaluator, &mut sampler, false);
                network.new_arena(&mut calc).unwrap()
            };
            let resources = network.resources().clone();
            Self {
                config,
                network,
                arena,
                clients: ClientStore::new(),
                resources,
                events: EventQueue::new(),
                sink: Recorder::default(),
                stopped: false,
                evaluator,
                sampler,
            }
        }

        pub fn with_ctx<R>(&mut self, f: impl FnOnce(&mut RunContext<'_, '_>) -> QnResult<R>) -> QnResult<R> {
            let mut calc = Calculator::new(&self.evaluator, &mut self.sampler, self.config.stop_on_calculation_error);
            let mut ctx = RunContext::new(
                &self.config,
                &self.network,
                &mut self.arena,
                &mut self.clients,
                &mut self.resources,
                &mut self.events,
                &mut calc,
                &mut self.sink,
            );
            let result = f(&mut ctx);
            let stop = ctx.stop_requested();
            self.stopped |= stop;
            result
        }

        pub fn start(&mut self) {
            self.with_ctx(|ctx| ctx.start()).unwrap();
        }

        /// Create a client tagged `tag` that arrives at `station` at tick `at`.
        pub fn arrive(&mut self, station: StationId, ty: u16, tag: f64, at: u64) -> ClientId {
            let now = self.events.now();
            let id = self.clients.create(ClientTypeId(ty), now);
            self.clients.get_mut(id).unwrap().user_data.set_number(0, tag);
            self.events.schedule_at(Tick(at), Event::Arrival { station, client: Some(id) });
            id
        }

        /// Like [`arrive`][Self::arrive], as if forwarded from `from`.
        pub fn arrive_from(&mut self, station: StationId, from: StationId, tag: f64, at: u64) -> ClientId {
            let id = self.arrive(station, 0, tag, at);
            self.clients.get_mut(id).unwrap().last_station = Some(from);
            id
        }

        pub fn signal_at(&mut self, signal: SignalId, at: u64) {
            self.events.schedule_at(Tick(at), Event::Signal { signal });
        }

        pub fn run_until(&mut self, limit: u64) -> QnResult<()> {
            while !self.stopped {
                match self.events.next_tick() {
                    Some(t) if t <= Tick(limit) => {}
                    _ => break,
                }
                let Some((_, event)) = self.events.pop() else { break };
                self.with_ctx(|ctx| ctx.dispatch(event))?;
            }
            Ok(())
        }

        pub fn run(&mut self) -> QnResult<()> {
            self.run_until(u64::MAX)
        }

        pub fn waiting(&self, station: StationId) -> usize {
            let kind = self.network.station(station).unwrap();
            kind.waiting(self.arena.get(station).unwrap())
        }

        pub fn now(&self) -> Tick {
            self.events.now()
        }
    }
}

// ── Waiting queue ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod queue_tests {
    use qn_core::{StationId, Tick};
    use qn_eval::SimpleEvaluator;
    use qn_schedule::{Event, Scheduler};

    use super::harness::*;
    use crate::{Dispose, NetworkBuilder, WaitingQueue};

    fn harness() -> (Harness, StationId) {
        let mut b = NetworkBuilder::new();
        let exit = b.add(Dispose::new("exit"));
        (Harness::new(b.build(&SimpleEvaluator).unwrap()), exit)
    }

    #[test]
    fn removal_books_waiting_and_cancels_timer() {
        let (mut h, exit) = harness();
        let client = h.clients.create(Default::default(), Tick(0));
        let mut queue = WaitingQueue::new(exit);

        let timer = h.events.schedule_at(Tick(1_000), Event::Timer { station: exit, client });
        h.with_ctx(|ctx| queue.push(client, Some((timer, Tick(1_000))), ctx)).unwrap();

        // Advance the clock to 400 with an unrelated event.
        h.events.schedule_at(Tick(400), Event::Arrival { station: exit, client: None });
        h.events.pop();
        assert_eq!(h.now(), Tick(400));

        let entry = h.with_ctx(|ctx| queue.remove(0, ctx)).unwrap().unwrap();
        assert_eq!(entry.client, client);
        assert_eq!(h.clients.get(client).unwrap().waiting_time, 400);
        assert!(!h.events.is_pending(timer));
        assert!(queue.is_empty());

        let enters = h.sink.count(|r| matches!(r, Record::QueueEnter { len: 1, .. }));
        let leaves = h.sink.count(|r| matches!(r, Record::QueueLeave { len: 0, .. }));
        assert_eq!((enters, leaves), (1, 1));
    }

    #[test]
    fn out_of_range_removal_is_none() {
        let (mut h, exit) = harness();
        let mut queue = WaitingQueue::new(exit);
        assert!(h.with_ctx(|ctx| queue.remove(3, ctx)).unwrap().is_none());
    }

    #[test]
    fn take_front_keeps_order() {
        let (mut h, exit) = harness();
        let ids: Vec<_> = (0..4).map(|_| h.clients.create(Default::default(), Tick(0))).collect();
        let mut queue = WaitingQueue::new(exit);
        for &id in &ids {
            h.with_ctx(|ctx| queue.push(id, None, ctx)).unwrap();
        }
        let front = h.with_ctx(|ctx| queue.take_front(3, ctx)).unwrap();
        assert_eq!(front, ids[..3].to_vec());
        assert_eq!(queue.clients(), vec![ids[3]]);
    }
}

// ── Service station ───────────────────────────────────────────────────────────

#[cfg(test)]
mod process_tests {
    use qn_client::StationTimes;
    use qn_core::{ClientTypeId, SimConfig, Tick};
    use qn_eval::{Priority, SimpleEvaluator, TimeSource};
    use qn_resource::{Alternative, ResourceGroup};

    use super::harness::*;
    use crate::{Costs, Dispose, NetworkBuilder, Process, ProcessCosts, ProcessTimeType};

    fn disposed_tags(h: &Harness) -> Vec<f64> {
        h.sink.disposals().iter().map(|d| d.tag).collect()
    }

    #[test]
    fn fifo_regardless_of_type() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(Process::new("desk").service(TimeSource::fixed(10.0)).alternative(Alternative::new().need(clerk, 1)));
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        for (i, ty) in [2u16, 0, 1, 0].into_iter().enumerate() {
            h.arrive(desk, ty, i as f64, i as u64 * 100);
        }
        h.run().unwrap();
        assert_eq!(disposed_tags(&h), vec![0.0, 1.0, 2.0, 3.0]);
        // Back-to-back services: each starts one release delay after the last ended.
        let starts: Vec<Tick> = h.sink.queue_leaves(desk).into_iter().map(|(_, at)| at).collect();
        assert_eq!(starts, vec![Tick(0), Tick(10_001), Tick(20_002), Tick(30_003)]);
    }

    #[test]
    fn priority_expression_picks_highest_score() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(10.0))
                .priority(Priority::parse("type"))
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        h.arrive(desk, 0, 0.0, 0);
        h.arrive(desk, 0, 1.0, 100);
        h.arrive(desk, 2, 2.0, 200);
        h.arrive(desk, 1, 3.0, 300);
        h.run().unwrap();
        assert_eq!(disposed_tags(&h), vec![0.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn equal_scores_go_to_earlier_arrival() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(1.0))
                .priority(Priority::parse("5"))
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        for i in 0..4 {
            h.arrive(desk, (3 - i) as u16, i as f64, 0);
        }
        h.run().unwrap();
        assert_eq!(disposed_tags(&h), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn campaign_prefers_type_served_last() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(10.0))
                .campaign(true)
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        h.arrive(desk, 0, 1.0, 0);
        h.arrive(desk, 1, 2.0, 1);
        h.arrive(desk, 0, 3.0, 2);
        h.arrive(desk, 1, 4.0, 3);
        h.arrive(desk, 0, 5.0, 4);
        h.run().unwrap();

        // Type 0 runs until none is left, then the oldest waiting client sets the next campaign.
        assert_eq!(disposed_tags(&h), vec![1.0, 3.0, 5.0, 2.0, 4.0]);
        let starts: Vec<Tick> = h.sink.queue_leaves(desk).into_iter().map(|(_, at)| at).collect();
        assert_eq!(starts, vec![Tick(0), Tick(10_001), Tick(20_002), Tick(30_003), Tick(40_004)]);
    }

    #[test]
    fn time_type_decides_which_duration_is_booked() {
        let booked = |time_type: ProcessTimeType| {
            let mut b = NetworkBuilder::new();
            let desk = b.add(Process::new("desk").service(TimeSource::fixed(2.0)).time_type(time_type));
            let exit = b.add(Dispose::new("exit"));
            b.connect(desk, exit);
            let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
            h.start();
            h.arrive(desk, 0, 1.0, 0);
            h.run().unwrap();

            // The queue visit is booked first, the service last.
            let service = h
                .sink
                .records
                .iter()
                .rev()
                .find_map(|r| match r {
                    Record::Times { station, times, .. } if *station == desk => Some(*times),
                    _ => None,
                })
                .unwrap();
            (service, h.sink.disposals()[0].waiting)
        };

        let (times, waiting) = booked(ProcessTimeType::Waiting);
        assert_eq!(times, StationTimes { waiting: 2_000, residence: 2_000, ..StationTimes::default() });
        assert_eq!(waiting, 2_000);

        let (times, waiting) = booked(ProcessTimeType::Transfer);
        assert_eq!(times, StationTimes { transfer: 2_000, residence: 2_000, ..StationTimes::default() });
        assert_eq!(waiting, 0);

        let (times, waiting) = booked(ProcessTimeType::Nothing);
        assert_eq!(times, StationTimes::default());
        assert_eq!(waiting, 0);
    }

    #[test]
    fn huge_service_time_saturates() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(1e17))
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(desk, 0, 1.0, 5);
        h.run_until(10).unwrap();

        // In service until the end of time.
        assert_eq!(h.sink.queue_leaves(desk), vec![(1.0, Tick(5))]);
        assert_eq!(h.waiting(desk), 0);
        assert!(h.sink.arrivals(exit).is_empty());
        assert_eq!(h.events.next_tick(), Some(Tick(u64::MAX)));
    }

    #[test]
    fn reneging_uses_cancel_edge_once() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(100.0))
                .tolerance(TimeSource::fixed(5.0))
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let served = b.add(Dispose::new("served"));
        let gave_up = b.add(Dispose::new("gave_up"));
        b.connect(desk, served).connect_cancel(desk, gave_up);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        h.arrive(desk, 0, 1.0, 0);
        h.arrive(desk, 0, 2.0, 1);
        h.run().unwrap();

        assert_eq!(h.sink.reneged(), vec![(2.0, Tick(5_001))]);
        assert_eq!(h.sink.arrivals(gave_up), vec![(2.0, Tick(5_001))]);
        assert_eq!(h.sink.arrivals(served), vec![(1.0, Tick(100_000))]);

        let gone = h.sink.disposals().into_iter().find(|d| d.tag == 2.0).unwrap();
        assert_eq!(gone.waiting, 5_000);
        // Served once: only the first client got process time.
        let served_times = h.sink.count(|r| matches!(r, Record::Times { times, .. } if times.process > 0));
        assert_eq!(served_times, 1);
    }

    #[test]
    fn reneged_client_without_cancel_edge_takes_success_edge() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(100.0))
                .tolerance(TimeSource::fixed(1.0))
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(desk, 0, 1.0, 0);
        h.arrive(desk, 0, 2.0, 0);
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit), vec![(2.0, Tick(1_000)), (1.0, Tick(100_000))]);
    }

    #[test]
    fn setup_depends_on_previous_type() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(1.0))
                .setup(ClientTypeId(0), ClientTypeId(1), TimeSource::fixed(3.0))
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(desk, 0, 1.0, 0);
        h.arrive(desk, 1, 2.0, 0);
        h.run().unwrap();

        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(1_000)), (2.0, Tick(5_001))]);
        let setups: Vec<_> = h
            .sink
            .records
            .iter()
            .filter_map(|r| match r {
                Record::Setup { tag, ticks, .. } => Some((*tag, *ticks)),
                _ => None,
            })
            .collect();
        assert_eq!(setups, vec![(2.0, 3_000)]);
    }

    #[test]
    fn reneging_during_setup_releases_at_deadline() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(1.0))
                .setup(ClientTypeId(0), ClientTypeId(1), TimeSource::fixed(3.0))
                .tolerance_for(ClientTypeId(1), TimeSource::fixed(2.0))
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let served = b.add(Dispose::new("served"));
        let gave_up = b.add(Dispose::new("gave_up"));
        b.connect(desk, served).connect_cancel(desk, gave_up);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(desk, 0, 1.0, 0);
        h.arrive(desk, 1, 2.0, 0);
        h.arrive(desk, 0, 3.0, 0);
        h.run().unwrap();

        assert_eq!(h.sink.reneged(), vec![(2.0, Tick(2_000))]);
        assert_eq!(h.sink.arrivals(gave_up), vec![(2.0, Tick(2_000))]);
        // Resources come back at deadline + release delay.
        assert_eq!(h.sink.arrivals(served), vec![(1.0, Tick(1_000)), (3.0, Tick(3_001))]);
    }

    #[test]
    fn batch_service_waits_for_recheck() {
        let mut b = NetworkBuilder::new();
        let oven = b.resource_group(ResourceGroup::new("oven", 1));
        let bake = b.add(
            Process::new("bake")
                .batch(2, 3)
                .service(TimeSource::fixed(10.0))
                .alternative(Alternative::new().need(oven, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(bake, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(bake, 0, 1.0, 0);
        h.arrive(bake, 0, 2.0, 0);
        h.arrive(bake, 0, 3.0, 1);
        h.arrive(bake, 0, 4.0, 5);
        h.run().unwrap();

        let arrivals = h.sink.arrivals(exit);
        // Recheck at tick 1 sees three clients: a full batch.
        assert_eq!(&arrivals[..3], &[(1.0, Tick(10_001)), (2.0, Tick(10_001)), (3.0, Tick(10_001))]);
        assert_eq!(h.waiting(bake), 1);
        assert_eq!(h.sink.queue_leaves(bake).len(), 3);
    }

    #[test]
    fn batch_selection_breaks_ties_by_arrival() {
        let mut b = NetworkBuilder::new();
        let oven = b.resource_group(ResourceGroup::new("oven", 1));
        let bake = b.add(
            Process::new("bake")
                .batch(2, 2)
                .priority(Priority::parse("type"))
                .service(TimeSource::fixed(10.0))
                .alternative(Alternative::new().need(oven, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(bake, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(bake, 0, 1.0, 0);
        h.arrive(bake, 0, 2.0, 0);
        h.arrive(bake, 0, 3.0, 1);
        h.arrive(bake, 1, 4.0, 2);
        h.arrive(bake, 1, 5.0, 3);
        h.arrive(bake, 0, 6.0, 4);
        h.run().unwrap();

        // Type 1 scores higher; equal scores keep arrival order.
        assert_eq!(
            h.sink.arrivals(exit),
            vec![
                (1.0, Tick(10_000)),
                (2.0, Tick(10_000)),
                (4.0, Tick(20_001)),
                (5.0, Tick(20_001)),
                (3.0, Tick(30_002)),
                (6.0, Tick(30_002)),
            ]
        );
    }

    #[test]
    fn costs_are_posted_per_client() {
        let mut b = NetworkBuilder::new();
        let desk = b.add(
            Process::new("desk")
                .service(TimeSource::fixed(3.0))
                .post_service(TimeSource::fixed(2.0))
                .costs(ProcessCosts { per_service: 5.0, per_service_sec: 2.0, per_post_service_sec: 1.0 }),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(desk, 0, 1.0, 0);
        h.run().unwrap();

        let costs: Vec<Costs> = h
            .sink
            .records
            .iter()
            .filter_map(|r| match r {
                Record::Costs { costs, .. } => Some(*costs),
                _ => None,
            })
            .collect();
        assert_eq!(costs, vec![Costs { fixed: 5.0, service: 6.0, post_service: 2.0 }]);
        // The client leaves after service; post-service only holds resources.
        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(3_000))]);
    }

    #[test]
    fn resource_priority_decides_contention() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let a = b.add(Process::new("a").service(TimeSource::fixed(10.0)).alternative(Alternative::new().need(clerk, 1)));
        let urgent = b.add(
            Process::new("urgent")
                .service(TimeSource::fixed(10.0))
                .with_resource_priority("2")
                .alternative(Alternative::new().need(clerk, 1)),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(a, exit).connect(urgent, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(a, 0, 1.0, 0);
        h.arrive(a, 0, 2.0, 1);
        h.arrive(urgent, 0, 3.0, 1);
        h.run().unwrap();

        assert_eq!(h.sink.queue_leaves(urgent), vec![(3.0, Tick(10_001))]);
        assert_eq!(h.sink.queue_leaves(a), vec![(1.0, Tick(0)), (2.0, Tick(20_002))]);
    }

    #[test]
    fn failed_service_expression_counts_as_zero() {
        let mut b = NetworkBuilder::new();
        let desk = b.add(Process::new("desk").service(TimeSource::expression("1 / 0")));
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(desk, 0, 1.0, 50);
        h.run().unwrap();

        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(50))]);
        assert_eq!(h.sink.count(|r| matches!(r, Record::CalcError(e) if e == "1 / 0")), 1);
    }

    #[test]
    fn failed_expression_halts_when_configured() {
        let mut b = NetworkBuilder::new();
        let desk = b.add(Process::new("desk").service(TimeSource::expression("1 / 0")));
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let config = SimConfig { stop_on_calculation_error: true, ..SimConfig::default() };
        let mut h = Harness::with_config(b.build(&SimpleEvaluator).unwrap(), config);
        h.start();
        h.arrive(desk, 0, 1.0, 0);
        let err = h.run().unwrap_err();
        assert!(matches!(err, qn_core::QnError::CalculationHalted { .. }));
        assert!(err.is_fatal());
    }
}

// ── Batching ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod batch_tests {
    use qn_core::{ClientTypeId, QnError, SimRng, Tick};
    use qn_eval::{Calculator, Expression, RngSampler, SimpleEvaluator};

    use super::harness::*;
    use crate::{
        Batch, BatchMulti, BatchRule, BatchSize, DataTransferMode, Dispose, MergeRule, NetworkBuilder, Separate,
    };

    #[test]
    fn five_arrivals_min_two_max_four() {
        let mut b = NetworkBuilder::new();
        let batch = b.add(Batch::new("batch", BatchRule::new(2, 4, MergeRule::collect())));
        let exit = b.add(Dispose::new("exit"));
        b.connect(batch, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        for i in 0..5 {
            h.arrive(batch, 0, i as f64, 0);
        }
        h.run_until(50).unwrap();
        let tags: Vec<f64> = h.sink.arrivals(exit).into_iter().map(|(t, _)| t).collect();
        assert_eq!(tags, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(h.waiting(batch), 1);

        h.arrive(batch, 0, 5.0, 100);
        h.run().unwrap();
        assert_eq!(&h.sink.arrivals(exit)[4..], &[(4.0, Tick(101)), (5.0, Tick(101))]);
        assert_eq!(h.waiting(batch), 0);
    }

    #[test]
    fn recheck_below_minimum_does_nothing() {
        let mut b = NetworkBuilder::new();
        let batch = b.add(Batch::new("batch", BatchRule::new(3, 5, MergeRule::collect())));
        let exit = b.add(Dispose::new("exit"));
        b.connect(batch, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(batch, 0, 0.0, 0);
        h.arrive(batch, 0, 1.0, 0);
        h.run().unwrap();
        assert!(h.sink.arrivals(exit).is_empty());
        assert_eq!(h.waiting(batch), 2);
    }

    #[test]
    fn temporary_merge_keeps_originals() {
        let mut b = NetworkBuilder::new();
        let rule = MergeRule::temporary(ClientTypeId(5)).with_numbers(DataTransferMode::Sum);
        let pack = b.add(Batch::new("pack", BatchRule::new(3, 3, rule)));
        let exit = b.add(Dispose::new("exit"));
        b.connect(pack, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        for tag in [1.0, 2.0, 3.0] {
            h.arrive(pack, 0, tag, 0);
        }
        h.run().unwrap();

        let disposals = h.sink.disposals();
        assert_eq!(disposals.len(), 4);
        let container = &disposals[0];
        assert_eq!(container.client_type, ClientTypeId(5));
        assert_eq!(container.tag, 6.0);
        assert_eq!(container.members, vec![1.0, 2.0, 3.0]);

        let mut originals: Vec<f64> = disposals[1..].iter().map(|d| d.tag).collect();
        originals.sort_by(f64::total_cmp);
        assert_eq!(originals, vec![1.0, 2.0, 3.0]);
        assert_eq!(h.clients.disposed(), 4);
        assert_eq!(h.clients.alive(), 0);
    }

    #[test]
    fn permanent_merge_logs_queue_before_disposal() {
        let mut b = NetworkBuilder::new();
        let rule = MergeRule::permanent(ClientTypeId(1)).with_numbers(DataTransferMode::Max);
        let pack = b.add(Batch::new("pack", BatchRule::new(2, 2, rule)));
        let exit = b.add(Dispose::new("exit"));
        b.connect(pack, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(pack, 0, 1.0, 0);
        let last = h.arrive(pack, 0, 2.0, 10);
        h.clients.get_mut(last).unwrap().is_last_client = true;
        h.run().unwrap();

        let leaves = h.sink.queue_leaves(pack);
        assert_eq!(leaves, vec![(1.0, Tick(10)), (2.0, Tick(10))]);
        let disposals = h.sink.disposals();
        let tags: Vec<f64> = disposals.iter().map(|d| d.tag).collect();
        assert_eq!(tags, vec![1.0, 2.0, 2.0]);
        assert!(disposals[2].last);
        assert_eq!(disposals[2].client_type, ClientTypeId(1));
        // Only the dispose station stops the run.
        assert!(h.stopped);
        assert_eq!(h.sink.arrivals(exit), vec![(2.0, Tick(10))]);
    }

    #[test]
    fn separate_restores_originals() {
        let mut b = NetworkBuilder::new();
        let pack = b.add(Batch::new("pack", BatchRule::new(3, 3, MergeRule::temporary(ClientTypeId(9)))));
        let split = b.add(Separate::new("split"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(pack, split).connect(split, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        for tag in [1.0, 2.0, 3.0] {
            h.arrive(pack, 0, tag, 0);
        }
        h.run().unwrap();

        let tags: Vec<f64> = h.sink.arrivals(exit).into_iter().map(|(t, _)| t).collect();
        assert_eq!(tags, vec![1.0, 2.0, 3.0]);
        assert_eq!(h.clients.disposed(), 3);
        assert!(h.sink.disposals().iter().all(|d| d.members.is_empty()));
    }

    #[test]
    fn multi_type_batches_per_type() {
        let mut b = NetworkBuilder::new();
        let sorter = b.add(
            BatchMulti::new("sorter").rule(ClientTypeId(0), BatchRule::new(2, 2, MergeRule::collect())),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(sorter, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(sorter, 0, 1.0, 0);
        h.arrive(sorter, 1, 2.0, 5);
        h.arrive(sorter, 0, 3.0, 10);
        h.run().unwrap();

        assert_eq!(
            h.sink.arrivals(exit),
            vec![(2.0, Tick(5)), (1.0, Tick(10)), (3.0, Tick(10))]
        );
    }

    #[test]
    fn dynamic_size_below_one_is_fatal() {
        let mut b = NetworkBuilder::new();
        let rule = BatchRule::new(BatchSize::Expression(Expression::new("0.2")), 4, MergeRule::collect());
        let batch = b.add(Batch::new("batch", rule));
        let exit = b.add(Dispose::new("exit"));
        b.connect(batch, exit);
        let network = b.build(&SimpleEvaluator).unwrap();

        let mut sampler = RngSampler::new(SimRng::new(1));
        let mut calc = Calculator::new(&SimpleEvaluator, &mut sampler, false);
        let err = network.new_arena(&mut calc).err().unwrap();
        assert!(matches!(err, QnError::InvalidBatchSize { value, .. } if value == 0.2));
    }

    #[test]
    fn dynamic_max_below_min_is_raised() {
        let mut b = NetworkBuilder::new();
        let rule = BatchRule::new(3, BatchSize::Expression(Expression::new("1")), MergeRule::collect());
        let batch = b.add(Batch::new("batch", rule));
        let exit = b.add(Dispose::new("exit"));
        b.connect(batch, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        for i in 0..3 {
            h.arrive(batch, 0, i as f64, 0);
        }
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit).len(), 3);
    }
}

// ── Matching and pickup ───────────────────────────────────────────────────────

#[cfg(test)]
mod match_tests {
    use qn_core::{ClientTypeId, StationId, Tick};
    use qn_eval::SimpleEvaluator;

    use super::harness::*;
    use crate::{Dispose, Hold, Match, MatchProperty, MergeRule, NetworkBuilder, Pickup, StationData};

    #[test]
    fn first_pair_leaves_third_waits() {
        let mut b = NetworkBuilder::new();
        let lane_a = b.add(Dispose::new("lane_a"));
        let lane_b = b.add(Dispose::new("lane_b"));
        let join = b.add(Match::new("join", vec![vec![lane_a], vec![lane_b]]));
        let exit = b.add(Dispose::new("exit"));
        b.connect(join, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        h.arrive_from(join, lane_a, 1.0, 0);
        h.arrive_from(join, lane_b, 2.0, 10);
        h.arrive_from(join, lane_a, 3.0, 20);
        h.run().unwrap();

        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(10)), (2.0, Tick(10))]);
        assert_eq!(h.waiting(join), 1);
        // The arrival that matched at once still shows a queue visit.
        assert!(h.sink.queue_leaves(join).contains(&(2.0, Tick(10))));
    }

    #[test]
    fn numeric_property_must_agree() {
        let mut b = NetworkBuilder::new();
        let lane_a = b.add(Dispose::new("lane_a"));
        let lane_b = b.add(Dispose::new("lane_b"));
        let join = b.add(Match::new("join", vec![vec![lane_a], vec![lane_b]]).property(MatchProperty::Number(1)));
        let exit = b.add(Dispose::new("exit"));
        b.connect(join, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        let a = h.arrive_from(join, lane_a, 1.0, 0);
        let b1 = h.arrive_from(join, lane_b, 2.0, 10);
        let b2 = h.arrive_from(join, lane_b, 3.0, 20);
        h.clients.get_mut(a).unwrap().user_data.set_number(1, 7.0);
        h.clients.get_mut(b1).unwrap().user_data.set_number(1, 8.0);
        h.clients.get_mut(b2).unwrap().user_data.set_number(1, 7.0);
        h.run().unwrap();

        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(20)), (3.0, Tick(20))]);
        assert_eq!(h.waiting(join), 1);
    }

    #[test]
    fn text_property_must_agree() {
        let mut b = NetworkBuilder::new();
        let lane_a = b.add(Dispose::new("lane_a"));
        let lane_b = b.add(Dispose::new("lane_b"));
        let join = b.add(
            Match::new("join", vec![vec![lane_a], vec![lane_b]]).property(MatchProperty::Text("order".into())),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(join, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();

        let a = h.arrive_from(join, lane_a, 1.0, 0);
        let b1 = h.arrive_from(join, lane_b, 2.0, 10);
        let b2 = h.arrive_from(join, lane_b, 3.0, 20);
        h.clients.get_mut(a).unwrap().user_data.set_text("order", "A-17");
        h.clients.get_mut(b1).unwrap().user_data.set_text("order", "A-18");
        h.clients.get_mut(b2).unwrap().user_data.set_text("order", "A-17");
        h.run().unwrap();

        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(20)), (3.0, Tick(20))]);
        assert_eq!(h.waiting(join), 1);
    }

    #[test]
    fn permanent_match_forwards_one_client() {
        let mut b = NetworkBuilder::new();
        let lane_a = b.add(Dispose::new("lane_a"));
        let lane_b = b.add(Dispose::new("lane_b"));
        let join = b.add(
            Match::new("join", vec![vec![lane_a], vec![lane_b]]).merge(MergeRule::permanent(ClientTypeId(4))),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(join, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive_from(join, lane_a, 1.0, 0);
        h.arrive_from(join, lane_b, 2.0, 0);
        h.run().unwrap();

        let types: Vec<ClientTypeId> = h.sink.disposals().iter().map(|d| d.client_type).collect();
        assert_eq!(types, vec![ClientTypeId(0), ClientTypeId(0), ClientTypeId(4)]);
        assert_eq!(h.sink.arrivals(exit).len(), 1);
    }

    #[test]
    fn conditional_match_waits_for_condition() {
        let mut b = NetworkBuilder::new();
        let lane_a = b.add(Dispose::new("lane_a"));
        let lane_b = b.add(Dispose::new("lane_b"));
        let join = b.add(Match::new("join", vec![vec![lane_a], vec![lane_b]]).condition("now >= 5"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(join, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive_from(join, lane_a, 1.0, 0);
        h.arrive_from(join, lane_b, 2.0, 1_000);
        // Any later event triggers the re-test.
        h.arrive(exit, 0, 9.0, 6_000);
        h.run().unwrap();

        // The triggering arrival is dispatched before the state check.
        assert_eq!(h.sink.arrivals(exit), vec![(9.0, Tick(6_000)), (1.0, Tick(6_000)), (2.0, Tick(6_000))]);
    }

    fn pickup_network(send_alone: bool) -> (Harness, [StationId; 3]) {
        let mut b = NetworkBuilder::new();
        let shelf = b.add(Hold::new("shelf", "0"));
        let picker = b.add(
            Pickup::new("picker", shelf)
                .send_alone(send_alone)
                .merge(MergeRule::temporary(ClientTypeId(2))),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(shelf, exit).connect(picker, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        (h, [shelf, picker, exit])
    }

    #[test]
    fn pickup_pulls_waiting_remote_client() {
        let (mut h, [shelf, picker, exit]) = pickup_network(false);
        h.arrive(shelf, 0, 1.0, 0);
        h.arrive(picker, 1, 2.0, 10);
        h.run().unwrap();

        assert_eq!(h.waiting(shelf), 0);
        assert_eq!(h.sink.arrivals(picker), vec![(2.0, Tick(10)), (1.0, Tick(10))]);
        let container = &h.sink.disposals()[0];
        assert_eq!(container.client_type, ClientTypeId(2));
        assert_eq!(container.members, vec![2.0, 1.0]);
        assert_eq!(h.sink.arrivals(exit).len(), 1);
    }

    #[test]
    fn pickup_resolves_after_remote_arrival() {
        let (mut h, [shelf, picker, exit]) = pickup_network(false);
        h.arrive(picker, 1, 2.0, 0);
        h.run_until(5).unwrap();
        assert_eq!(h.waiting(picker), 1);

        h.arrive(shelf, 0, 1.0, 10);
        h.run().unwrap();
        assert_eq!(h.waiting(picker), 0);
        assert_eq!(h.waiting(shelf), 0);
        assert_eq!(h.sink.arrivals(exit).len(), 1);
    }

    fn set_pickup_lock(h: &mut Harness, station: StationId, locked: bool) {
        let mut data = h.arena.take(station).unwrap();
        let StationData::Hold(hold) = &mut data else { panic!("not a hold station") };
        hold.locked_for_pickup = locked;
        h.arena.restore(station, data);
    }

    #[test]
    fn pickup_waits_while_remote_is_locked() {
        let (mut h, [shelf, picker, exit]) = pickup_network(false);
        h.arrive(shelf, 0, 1.0, 0);
        h.run_until(5).unwrap();
        set_pickup_lock(&mut h, shelf, true);

        h.arrive(picker, 1, 2.0, 10);
        h.run_until(10).unwrap();
        assert_eq!(h.waiting(picker), 1);
        assert_eq!(h.waiting(shelf), 1);

        set_pickup_lock(&mut h, shelf, false);
        // Any later event lets the pickup retry.
        h.arrive(exit, 0, 9.0, 20);
        h.run().unwrap();
        assert_eq!(h.waiting(picker), 0);
        assert_eq!(h.waiting(shelf), 0);
        assert_eq!(h.sink.arrivals(picker), vec![(2.0, Tick(10)), (1.0, Tick(20))]);
    }

    #[test]
    fn remote_inside_its_own_callback_is_locked() {
        let (mut h, [shelf, ..]) = pickup_network(false);
        h.arrive(shelf, 0, 1.0, 0);
        h.run().unwrap();

        let lent = h.arena.take(shelf).unwrap();
        let taken = h.with_ctx(|ctx| ctx.take_for_pickup(shelf)).unwrap();
        h.arena.restore(shelf, lent);
        assert_eq!(taken, None);

        let taken = h.with_ctx(|ctx| ctx.take_for_pickup(shelf)).unwrap();
        assert!(taken.is_some());
        assert_eq!(h.waiting(shelf), 0);
    }

    #[test]
    fn pickup_can_send_alone() {
        let (mut h, [_, picker, exit]) = pickup_network(true);
        h.arrive(picker, 1, 2.0, 0);
        h.run().unwrap();
        assert_eq!(h.waiting(picker), 0);
        let alone = &h.sink.disposals()[0];
        assert_eq!((alone.tag, alone.client_type), (2.0, ClientTypeId(1)));
        assert!(alone.members.is_empty());
        assert_eq!(h.sink.arrivals(exit).len(), 1);
    }
}

// ── Barrier, hold, signal ─────────────────────────────────────────────────────

#[cfg(test)]
mod gate_tests {
    use qn_core::Tick;
    use qn_eval::{SimpleEvaluator, TimeSource};

    use super::harness::*;
    use crate::{Barrier, BarrierRule, Credit, Dispose, Hold, NetworkBuilder, SignalStation};

    #[test]
    fn all_signals_needs_every_credit() {
        let mut b = NetworkBuilder::new();
        let go_a = b.signal("a");
        let go_b = b.signal("b");
        let gate = b.add(
            Barrier::new("gate")
                .rule(BarrierRule::new(go_a, Credit::Finite(1)).store_credit(true))
                .rule(BarrierRule::new(go_b, Credit::Finite(1)).store_credit(true))
                .all_signals(true),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(gate, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(gate, 0, 1.0, 0);
        h.arrive(gate, 0, 2.0, 0);

        h.signal_at(go_a, 10);
        h.run_until(15).unwrap();
        assert!(h.sink.arrivals(exit).is_empty());

        h.signal_at(go_b, 20);
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(20))]);
        assert_eq!(h.waiting(gate), 1);
    }

    #[test]
    fn unused_credit_is_discarded_unless_stored() {
        let mut b = NetworkBuilder::new();
        let go = b.signal("go");
        let gate = b.add(Barrier::new("gate").rule(BarrierRule::new(go, Credit::Finite(2))));
        let exit = b.add(Dispose::new("exit"));
        b.connect(gate, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(gate, 0, 1.0, 0);
        h.signal_at(go, 10);
        h.arrive(gate, 0, 2.0, 20);
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(10))]);
        assert_eq!(h.waiting(gate), 1);
    }

    #[test]
    fn stored_unlimited_credit_opens_gate() {
        let mut b = NetworkBuilder::new();
        let go = b.signal("go");
        let gate = b.add(Barrier::new("gate").rule(BarrierRule::new(go, Credit::Unlimited).store_credit(true)));
        let exit = b.add(Dispose::new("exit"));
        b.connect(gate, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(gate, 0, 1.0, 0);
        h.arrive(gate, 0, 2.0, 0);
        h.signal_at(go, 10);
        h.arrive(gate, 0, 3.0, 20);
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(10)), (2.0, Tick(10)), (3.0, Tick(20))]);
    }

    #[test]
    fn typed_credit_skips_other_types() {
        let mut b = NetworkBuilder::new();
        let go = b.signal("go");
        let gate = b.add(
            Barrier::new("gate").rule(BarrierRule::new(go, Credit::Finite(1)).for_type(qn_core::ClientTypeId(1))),
        );
        let exit = b.add(Dispose::new("exit"));
        b.connect(gate, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(gate, 0, 1.0, 0);
        h.arrive(gate, 1, 2.0, 0);
        h.signal_at(go, 10);
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit), vec![(2.0, Tick(10))]);
    }

    #[test]
    fn signal_station_fires_signal() {
        let mut b = NetworkBuilder::new();
        let go = b.signal("go");
        let bell = b.add(SignalStation::new("bell", go));
        let gate = b.add(Barrier::new("gate").rule(BarrierRule::new(go, Credit::Finite(1))));
        let exit = b.add(Dispose::new("exit"));
        b.connect(bell, exit).connect(gate, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(gate, 0, 1.0, 0);
        h.arrive(bell, 0, 2.0, 10);
        h.run().unwrap();
        let mut tags: Vec<f64> = h.sink.arrivals(exit).into_iter().map(|(t, _)| t).collect();
        tags.sort_by(f64::total_cmp);
        assert_eq!(tags, vec![1.0, 2.0]);
    }

    #[test]
    fn hold_releases_when_condition_turns_true() {
        let mut b = NetworkBuilder::new();
        let hold = b.add(Hold::new("hold", "now >= 10"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(hold, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(hold, 0, 1.0, 0);
        h.arrive(hold, 0, 2.0, 10_000);
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(10_000)), (2.0, Tick(10_000))]);
    }

    #[test]
    fn hold_max_wait_releases_anyway() {
        let mut b = NetworkBuilder::new();
        let hold = b.add(Hold::new("hold", "0").max_wait(TimeSource::fixed(2.0)));
        let exit = b.add(Dispose::new("exit"));
        b.connect(hold, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(hold, 0, 1.0, 0);
        h.run().unwrap();
        assert_eq!(h.sink.arrivals(exit), vec![(1.0, Tick(2_000))]);
        assert_eq!(h.sink.disposals()[0].waiting, 2_000);
    }
}

// ── Source, dispose, shutdown ─────────────────────────────────────────────────

#[cfg(test)]
mod lifecycle_tests {
    use qn_core::{ClientTypeId, SimConfig, Tick};
    use qn_eval::{SimpleEvaluator, TimeSource};
    use qn_resource::{Alternative, ResourceGroup};
    use tracing_test::traced_test;

    use super::harness::*;
    use crate::{Batch, BatchRule, Dispose, Hold, MergeRule, NetworkBuilder, Process, Source};

    #[test]
    #[traced_test]
    fn source_flags_last_and_warm_up_clients() {
        let mut b = NetworkBuilder::new();
        let src = b.add(Source::new("src", ClientTypeId(0), TimeSource::fixed(1.0)).count(3));
        let exit = b.add(Dispose::new("exit"));
        b.connect(src, exit);
        let config = SimConfig { warm_up_clients: 2, ..SimConfig::default() };
        let mut h = Harness::with_config(b.build(&SimpleEvaluator).unwrap(), config);
        h.start();
        h.run().unwrap();

        let disposals = h.sink.disposals();
        let flags: Vec<(bool, bool)> = disposals.iter().map(|d| (d.warm_up, d.last)).collect();
        assert_eq!(flags, vec![(true, false), (true, false), (false, true)]);
        let times: Vec<Tick> = disposals.iter().map(|d| d.at).collect();
        assert_eq!(times, vec![Tick(1_000), Tick(2_000), Tick(3_000)]);
        assert!(h.stopped);
        assert!(logs_contain("last client disposed"));
    }

    #[test]
    fn warm_up_ignores_merge_containers() {
        let mut b = NetworkBuilder::new();
        let src = b.add(Source::new("src", ClientTypeId(0), TimeSource::fixed(1.0)).count(3));
        let pack = b.add(Batch::new("pack", BatchRule::new(2, 2, MergeRule::permanent(ClientTypeId(1)))));
        let exit = b.add(Dispose::new("exit"));
        b.connect(src, pack).connect(pack, exit);
        let config = SimConfig { warm_up_clients: 3, ..SimConfig::default() };
        let mut h = Harness::with_config(b.build(&SimpleEvaluator).unwrap(), config);
        h.start();
        h.run().unwrap();

        // The container made at 2 s is the third client created, the third
        // source client the fourth.
        assert_eq!((h.clients.created(), h.clients.admitted()), (4, 3));
        let left = h.clients.ids();
        assert_eq!(left.len(), 1);
        assert!(h.clients.get(left[0]).unwrap().is_warm_up);
        assert_eq!(h.waiting(pack), 1);
    }

    #[test]
    fn last_client_stops_before_queue_drains() {
        let mut b = NetworkBuilder::new();
        let src = b.add(Source::new("src", ClientTypeId(0), TimeSource::fixed(1.0)).count(2));
        let exit = b.add(Dispose::new("exit"));
        b.connect(src, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        // A pending event after the stop must not run.
        h.arrive(exit, 0, 7.0, 50_000);
        h.run().unwrap();
        assert!(h.stopped);
        assert_eq!(h.sink.disposals().len(), 2);
        assert_eq!(h.events.len(), 1);
    }

    #[test]
    fn shutdown_flushes_queues_and_disposes_everyone() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(Process::new("desk").service(TimeSource::fixed(100.0)).alternative(Alternative::new().need(clerk, 1)));
        let hold = b.add(Hold::new("hold", "0"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit).connect(hold, exit);
        let mut h = Harness::new(b.build(&SimpleEvaluator).unwrap());
        h.start();
        h.arrive(desk, 0, 1.0, 0);
        h.arrive(desk, 0, 2.0, 0);
        h.arrive(hold, 0, 3.0, 0);
        h.run_until(500).unwrap();
        // Nothing is due before 500, so the clock still reads the last arrival.
        assert_eq!(h.now(), Tick(0));

        h.with_ctx(|ctx| ctx.shutdown()).unwrap();
        assert_eq!(h.clients.alive(), 0);
        assert_eq!(h.waiting(desk), 0);
        assert_eq!(h.waiting(hold), 0);
        let mut tags: Vec<f64> = h.sink.disposals().iter().map(|d| d.tag).collect();
        tags.sort_by(f64::total_cmp);
        assert_eq!(tags, vec![1.0, 2.0, 3.0]);
        assert_eq!(h.sink.queue_leaves(hold), vec![(3.0, Tick(0))]);
    }
}

// ── Network building ──────────────────────────────────────────────────────────

#[cfg(test)]
mod network_tests {
    use qn_core::{QnError, StationId};
    use qn_eval::{SimpleEvaluator, TimeSource};
    use qn_resource::{Alternative, ResourceGroup};

    use crate::{
        Barrier, BarrierRule, Credit, Dispose, Hold, Match, NetworkBuilder, Pickup, Process, StationKind,
    };

    fn config_error(b: NetworkBuilder) -> String {
        match b.build(&SimpleEvaluator) {
            Err(QnError::Config(msg)) => msg,
            Err(other) => panic!("expected a configuration error, got {other}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn ids_follow_insertion_order() {
        let mut b = NetworkBuilder::new();
        let desk = b.add(Process::new("desk"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        let network = b.build(&SimpleEvaluator).unwrap();
        assert_eq!((desk, exit), (StationId(0), StationId(1)));
        assert_eq!(network.station_by_name("exit"), Some(exit));
        assert!(matches!(network.station(desk).unwrap(), StationKind::Process(_)));
        assert_eq!(network.station(desk).unwrap().kind_name(), "Process");
        assert!(network.station(StationId(9)).is_err());
    }

    #[test]
    fn missing_successor_is_rejected() {
        let mut b = NetworkBuilder::new();
        b.add(Process::new("desk"));
        assert!(config_error(b).contains("\"desk\": has no outgoing edge"));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut b = NetworkBuilder::new();
        let desk = b.add(Process::new("desk"));
        b.connect(desk, StationId(7));
        assert!(config_error(b).contains("edge to unknown"));
    }

    #[test]
    fn alternative_beyond_capacity_is_rejected() {
        let mut b = NetworkBuilder::new();
        let clerk = b.resource_group(ResourceGroup::new("clerk", 1));
        let desk = b.add(Process::new("desk").alternative(Alternative::new().need(clerk, 2)));
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        assert!(config_error(b).contains("\"desk\""));
    }

    #[test]
    fn bad_expression_is_rejected() {
        let mut b = NetworkBuilder::new();
        let hold = b.add(Hold::new("hold", "speed > 3"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(hold, exit);
        assert!(config_error(b).contains("\"hold\""));

        let mut b = NetworkBuilder::new();
        let desk = b.add(Process::new("desk").service(TimeSource::expression("2 *")));
        let exit = b.add(Dispose::new("exit"));
        b.connect(desk, exit);
        assert!(config_error(b).contains("\"desk\""));
    }

    #[test]
    fn match_needs_two_queues() {
        let mut b = NetworkBuilder::new();
        let join = b.add(Match::new("join", vec![vec![]]));
        let exit = b.add(Dispose::new("exit"));
        b.connect(join, exit);
        assert!(config_error(b).contains("two inbound queues"));
    }

    #[test]
    fn pickup_remote_must_own_a_queue() {
        let mut b = NetworkBuilder::new();
        let exit = b.add(Dispose::new("exit"));
        let picker = b.add(Pickup::new("picker", exit));
        b.connect(picker, exit);
        assert!(config_error(b).contains("no queue to pick up from"));
    }

    #[test]
    fn all_signals_needs_stored_finite_credit() {
        let mut b = NetworkBuilder::new();
        let go = b.signal("go");
        let gate = b.add(Barrier::new("gate").rule(BarrierRule::new(go, Credit::Finite(1))).all_signals(true));
        let exit = b.add(Dispose::new("exit"));
        b.connect(gate, exit);
        assert!(config_error(b).contains("all-signals"));
    }

    #[test]
    fn signals_are_deduplicated_and_listened_to() {
        let mut b = NetworkBuilder::new();
        let go = b.signal("go");
        assert_eq!(b.signal("go"), go);
        let gate = b.add(Barrier::new("gate").rule(BarrierRule::new(go, Credit::Unlimited)));
        let hold = b.add(Hold::new("hold", "1"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(gate, exit).connect(hold, exit);
        let network = b.build(&SimpleEvaluator).unwrap();
        assert_eq!(network.signal_listeners(go), &[gate]);
        assert_eq!(network.state_listeners(), &[hold]);
    }

    #[test]
    fn cancel_edge_only_on_service_stations() {
        let mut b = NetworkBuilder::new();
        let hold = b.add(Hold::new("hold", "1"));
        let exit = b.add(Dispose::new("exit"));
        b.connect(hold, exit).connect_cancel(hold, exit);
        assert!(config_error(b).contains("has no cancel edge"));
    }
}
