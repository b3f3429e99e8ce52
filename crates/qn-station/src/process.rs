//! The service station: queue, optional setup, service, post-service and
//! reneging, with resource acquisition and batch service.
//!
//! # Life of a client
//!
//! ```text
//! queued ──(resources + selection)──► setup ► service ──► leave (success edge)
//!    │                                           └── post-service ─► release
//!    └──(tolerance elapsed)──────────────────────────► leave (cancel edge)
//! ```
//!
//! The client leaves once setup and service are over.  The resources stay
//! locked through post-service and are returned `release_delay_ticks` later.

use qn_client::StationTimes;
use qn_core::{ClientId, ClientTypeId, QnResult, StationId, Tick, TimeBase};
use qn_eval::{Calculator, Expression, Priority, TimeSource, Variables};
use qn_resource::{Acquired, Alternative};
use qn_schedule::Event;
use tracing::{debug, trace};

use crate::{BuildCheck, Costs, QueueEntry, RunContext, Station, StationInfo, WaitingQueue};

// ── Settings ──────────────────────────────────────────────────────────────────

/// Which client duration the service time is booked to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ProcessTimeType {
    Waiting,
    Transfer,
    #[default]
    Process,
    /// Not booked at all.
    Nothing,
}

impl ProcessTimeType {
    /// Times to book for `ticks` spent in setup and service.
    pub fn times(self, ticks: u64) -> StationTimes {
        let base = StationTimes { residence: ticks, ..StationTimes::default() };
        match self {
            ProcessTimeType::Waiting  => StationTimes { waiting: ticks, ..base },
            ProcessTimeType::Transfer => StationTimes { transfer: ticks, ..base },
            ProcessTimeType::Process  => StationTimes { process: ticks, ..base },
            ProcessTimeType::Nothing  => StationTimes::default(),
        }
    }
}

/// Cost rates of a service station.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ProcessCosts {
    /// Charged once per served client.
    pub per_service:          f64,
    pub per_service_sec:      f64,
    pub per_post_service_sec: f64,
}

impl ProcessCosts {
    pub fn is_configured(&self) -> bool {
        self.per_service != 0.0 || self.per_service_sec != 0.0 || self.per_post_service_sec != 0.0
    }

    /// Costs of one service, `None` if no rate is configured.
    pub fn for_service(&self, service_ticks: u64, post_ticks: u64) -> Option<Costs> {
        self.is_configured().then(|| Costs {
            fixed:        self.per_service,
            service:      self.per_service_sec * Tick::secs_for_ticks(service_ticks),
            post_service: self.per_post_service_sec * Tick::secs_for_ticks(post_ticks),
        })
    }
}

/// A setting with a default and per-client-type overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct PerType<T> {
    all:   T,
    types: Vec<(ClientTypeId, T)>,
}

impl<T> PerType<T> {
    pub fn new(all: T) -> Self {
        Self { all, types: Vec::new() }
    }

    pub fn set_all(&mut self, value: T) {
        self.all = value;
    }

    pub fn set(&mut self, ty: ClientTypeId, value: T) {
        match self.types.iter_mut().find(|(t, _)| *t == ty) {
            Some(slot) => slot.1 = value,
            None => self.types.push((ty, value)),
        }
    }

    pub fn get(&self, ty: ClientTypeId) -> &T {
        self.types
            .iter()
            .find(|(t, _)| *t == ty)
            .map_or(&self.all, |(_, v)| v)
    }

    /// The default followed by every override.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        std::iter::once(&self.all).chain(self.types.iter().map(|(_, v)| v))
    }

    pub fn overridden_types(&self) -> impl Iterator<Item = ClientTypeId> + '_ {
        self.types.iter().map(|(t, _)| *t)
    }
}

// ── Process ───────────────────────────────────────────────────────────────────

pub struct Process {
    pub(crate) info:        StationInfo,
    /// Edge for clients that reneged.  Falls back to `info.next`.
    pub(crate) cancel_next: Option<StationId>,

    time_base:         TimeBase,
    batch_min:         usize,
    batch_max:         usize,
    service:           PerType<TimeSource>,
    post_service:      PerType<Option<TimeSource>>,
    /// `(previous type, new type, setup time)`.
    setup:             Vec<(ClientTypeId, ClientTypeId, TimeSource)>,
    tolerance:         PerType<Option<TimeSource>>,
    priority:          PerType<Priority>,
    resource_priority: Option<Expression>,
    alternatives:      Vec<Alternative>,
    costs:             ProcessCosts,
    campaign:          bool,
    time_type:         ProcessTimeType,
}

impl Process {
    /// A single-server FIFO station with zero service time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info:              StationInfo::new(name),
            cancel_next:       None,
            time_base:         TimeBase::Seconds,
            batch_min:         1,
            batch_max:         1,
            service:           PerType::new(TimeSource::fixed(0.0)),
            post_service:      PerType::new(None),
            setup:             Vec::new(),
            tolerance:         PerType::new(None),
            priority:          PerType::new(Priority::Age),
            resource_priority: None,
            alternatives:      Vec::new(),
            costs:             ProcessCosts::default(),
            campaign:          false,
            time_type:         ProcessTimeType::Process,
        }
    }

    pub fn time_base(mut self, base: TimeBase) -> Self {
        self.time_base = base;
        self
    }

    pub fn service(mut self, source: TimeSource) -> Self {
        self.service.set_all(source);
        self
    }

    pub fn service_for(mut self, ty: ClientTypeId, source: TimeSource) -> Self {
        self.service.set(ty, source);
        self
    }

    pub fn post_service(mut self, source: TimeSource) -> Self {
        self.post_service.set_all(Some(source));
        self
    }

    pub fn post_service_for(mut self, ty: ClientTypeId, source: TimeSource) -> Self {
        self.post_service.set(ty, Some(source));
        self
    }

    /// Setup time when a client of type `to` follows one of type `from`.
    pub fn setup(mut self, from: ClientTypeId, to: ClientTypeId, source: TimeSource) -> Self {
        self.setup.retain(|(f, t, _)| (*f, *t) != (from, to));
        self.setup.push((from, to, source));
        self
    }

    pub fn tolerance(mut self, source: TimeSource) -> Self {
        self.tolerance.set_all(Some(source));
        self
    }

    pub fn tolerance_for(mut self, ty: ClientTypeId, source: TimeSource) -> Self {
        self.tolerance.set(ty, Some(source));
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority.set_all(priority);
        self
    }

    pub fn priority_for(mut self, ty: ClientTypeId, priority: Priority) -> Self {
        self.priority.set(ty, priority);
        self
    }

    /// Priority of this station when competing for released resources.
    pub fn with_resource_priority(mut self, expr: impl Into<Expression>) -> Self {
        self.resource_priority = Some(expr.into());
        self
    }

    pub fn alternative(mut self, alternative: Alternative) -> Self {
        self.alternatives.push(alternative);
        self
    }

    /// Serve between `min` and `max` clients at once.
    pub fn batch(mut self, min: usize, max: usize) -> Self {
        self.batch_min = min;
        self.batch_max = max;
        self
    }

    pub fn costs(mut self, costs: ProcessCosts) -> Self {
        self.costs = costs;
        self
    }

    /// Prefer clients of the type served last.
    pub fn campaign(mut self, on: bool) -> Self {
        self.campaign = on;
        self
    }

    pub fn time_type(mut self, time_type: ProcessTimeType) -> Self {
        self.time_type = time_type;
        self
    }

    fn is_batch(&self) -> bool {
        self.batch_max > 1
    }

    fn is_fifo(&self) -> bool {
        self.priority.values().all(Priority::is_age)
    }

    fn setup_for(&self, from: ClientTypeId, to: ClientTypeId) -> Option<&TimeSource> {
        self.setup
            .iter()
            .find(|(f, t, _)| *f == from && *t == to)
            .map(|(_, _, s)| s)
    }
}

// ── Run-time data ─────────────────────────────────────────────────────────────

pub struct ProcessData {
    pub queue:             WaitingQueue,
    /// Type of the client whose service started last.
    pub last_type:         Option<ClientTypeId>,
    pub recheck_pending:   bool,
    /// Set while an arrival or reneging callback runs; pickup is refused.
    pub locked_for_pickup: bool,
    pub served:            u64,
}

// ── Selection and service ─────────────────────────────────────────────────────

impl Process {
    /// Score of a queued client; higher is served first.
    fn score(&self, entry: &QueueEntry, ctx: &mut RunContext<'_, '_>) -> QnResult<f64> {
        let now = ctx.now();
        let client = ctx.clients.require(entry.client)?;
        match self.priority.get(client.client_type) {
            Priority::Age => Ok(Tick::secs_for_ticks(client.current_wait(now))),
            Priority::Expression(expr) => {
                let vars = Variables::for_score(client, now);
                ctx.calc.evaluate(expr, &vars, Some(client), &self.info.name, 0.0)
            }
        }
    }

    /// Pick `count` clients: the queue head in FIFO mode, otherwise repeated
    /// left-to-right scans for the best key, so ties go to the earlier arrival.
    fn select(&self, data: &ProcessData, count: usize, ctx: &mut RunContext<'_, '_>) -> QnResult<Vec<ClientId>> {
        let campaign = if self.campaign { data.last_type } else { None };
        if self.is_fifo() && campaign.is_none() {
            return Ok(data.queue.iter().take(count).map(|e| e.client).collect());
        }

        let mut keys = Vec::with_capacity(data.queue.len());
        for entry in data.queue.iter() {
            let preferred = match campaign {
                Some(ty) => ctx.client(entry.client)?.client_type == ty,
                None => false,
            };
            keys.push((entry.client, preferred, self.score(entry, ctx)?));
        }
        let better = |a: &(ClientId, bool, f64), b: &(ClientId, bool, f64)| {
            (a.1 && !b.1) || (a.1 == b.1 && a.2 > b.2)
        };

        let mut taken = vec![false; keys.len()];
        let mut picked = Vec::with_capacity(count);
        for _ in 0..count {
            let mut best: Option<usize> = None;
            for (i, key) in keys.iter().enumerate() {
                if !taken[i] && best.is_none_or(|b| better(key, &keys[b])) {
                    best = Some(i);
                }
            }
            let Some(b) = best else { break };
            taken[b] = true;
            picked.push(keys[b].0);
        }
        Ok(picked)
    }

    /// Start as many services as resources and the queue allow.
    fn try_start(&self, data: &mut ProcessData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        loop {
            let waiting = data.queue.len();
            if waiting == 0 || waiting < self.batch_min {
                return Ok(());
            }
            if self.is_batch() && data.recheck_pending && waiting < self.batch_max {
                return Ok(());
            }
            let Some(acquired) = ctx.resources.try_acquire(&self.alternatives, self.info.id) else {
                trace!(station = %self.info.name, waiting, "resources unavailable");
                return Ok(());
            };
            let count = if self.is_batch() { waiting.min(self.batch_max) } else { 1 };
            let selected = self.select(data, count, ctx)?;
            self.start_service(data, selected, acquired, ctx)?;
        }
    }

    fn start_service(
        &self,
        data:     &mut ProcessData,
        selected: Vec<ClientId>,
        acquired: Acquired,
        ctx:      &mut RunContext<'_, '_>,
    ) -> QnResult<()> {
        let id = self.info.id;
        let name = self.info.name.as_str();
        let mut entries = Vec::with_capacity(selected.len());
        for client in selected {
            if let Some(entry) = data.queue.remove_client(client, ctx)? {
                entries.push(entry);
            }
        }
        let Some(first) = entries.first().copied() else {
            return Ok(());
        };
        let now = ctx.now();

        let setup = match data.last_type {
            Some(last) if !self.is_batch() => {
                let client = ctx.clients.require(first.client)?;
                match self.setup_for(last, client.client_type) {
                    Some(source) => {
                        let vars = Variables::for_client(client, now, 0);
                        ctx.calc.duration_ticks(source, &vars, Some(client), name, self.time_base)?
                    }
                    None => 0,
                }
            }
            _ => 0,
        };
        data.last_type = Some(ctx.client(first.client)?.client_type);

        if let Some(deadline) = renege_deadline(&entries, now, setup) {
            return self.renege_during_setup(first.client, acquired, deadline, ctx);
        }

        // Service and post-service are fixed by the first selected client of each type.
        let mut timing: Vec<(ClientTypeId, u64, u64)> = Vec::new();
        for entry in &entries {
            let client = ctx.clients.require(entry.client)?;
            let ty = client.client_type;
            if timing.iter().any(|(t, _, _)| *t == ty) {
                continue;
            }
            let vars = Variables::for_client(client, now, 0);
            let service = ctx.calc.duration_ticks(self.service.get(ty), &vars, Some(client), name, self.time_base)?;
            let post = match self.post_service.get(ty) {
                Some(source) => ctx.calc.duration_ticks(source, &vars, Some(client), name, self.time_base)?,
                None => 0,
            };
            timing.push((ty, service, post));
        }
        let max_service = timing.iter().map(|t| t.1).max().unwrap_or(0);
        let max_post = timing.iter().map(|t| t.2).max().unwrap_or(0);
        let busy = setup.saturating_add(acquired.additional_ticks);

        for entry in &entries {
            let client = ctx.client_mut(entry.client)?;
            client.last_alternative = Some(acquired.alternative);
            client.last_queue_success = true;
            let ty = client.client_type;
            let (service, post) = timing
                .iter()
                .find(|(t, _, _)| *t == ty)
                .map_or((0, 0), |&(_, s, p)| (s, p));
            let in_service = busy.saturating_add(service);

            ctx.book(id, entry.client, self.time_type.times(in_service))?;
            if setup > 0 {
                ctx.report(entry.client, |s, c, _| s.setup_time(id, c, setup))?;
            }
            if let Some(costs) = self.costs.for_service(in_service, post) {
                ctx.report(entry.client, |s, c, _| s.costs(id, c, costs))?;
            }
            ctx.leave_at(id, entry.client, now + in_service);
        }

        let held = busy
            .saturating_add(max_service)
            .saturating_add(max_post)
            .saturating_add(ctx.config.release_delay_ticks);
        let release_at = now + held;
        ctx.scheduler.schedule_at(release_at, Event::ReleaseResources { station: id, alternative: acquired.alternative });
        data.served += entries.len() as u64;
        debug!(
            station = %name,
            clients = entries.len(),
            alternative = acquired.alternative,
            setup,
            service = max_service,
            "service started"
        );
        Ok(())
    }

    /// The client's tolerance runs out before its setup ends: it leaves at
    /// the deadline without service and the resources follow.
    fn renege_during_setup(
        &self,
        client:   ClientId,
        acquired: Acquired,
        deadline: Tick,
        ctx:      &mut RunContext<'_, '_>,
    ) -> QnResult<()> {
        let id = self.info.id;
        let now = ctx.now();
        {
            let record = ctx.client_mut(client)?;
            record.last_alternative = Some(acquired.alternative);
            record.last_queue_success = false;
        }
        ctx.book(id, client, StationTimes::waiting(deadline.since(now)))?;
        ctx.stats.reneged(id, ctx.clients.require(client)?, deadline);
        ctx.leave_at(id, client, deadline);
        let release_at = deadline + ctx.config.release_delay_ticks;
        ctx.scheduler.schedule_at(release_at, Event::ReleaseResources { station: id, alternative: acquired.alternative });
        debug!(station = %self.info.name, %client, %deadline, "reneged during setup");
        Ok(())
    }

    fn renege(&self, data: &mut ProcessData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        if data.queue.remove_client(client, ctx)?.is_none() {
            return Ok(());
        }
        let id = self.info.id;
        ctx.client_mut(client)?.last_queue_success = false;
        ctx.report(client, |s, c, now| s.reneged(id, c, now))?;
        ctx.leave_now(id, client);
        trace!(station = %self.info.name, %client, "reneged");
        Ok(())
    }
}

/// Deadline of a single client whose reneging timer would fire during setup.
fn renege_deadline(entries: &[QueueEntry], now: Tick, setup: u64) -> Option<Tick> {
    match entries {
        [entry] if setup > 0 => entry.timer.map(|(_, at)| at).filter(|&at| at < now + setup),
        _ => None,
    }
}

// ── Station ───────────────────────────────────────────────────────────────────

impl Station for Process {
    type Data = ProcessData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<ProcessData> {
        Ok(ProcessData {
            queue:             WaitingQueue::new(self.info.id),
            last_type:         None,
            recheck_pending:   false,
            locked_for_pickup: false,
            served:            0,
        })
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        if self.batch_min == 0 || self.batch_max < self.batch_min {
            return Err(check.error(
                &self.info,
                format_args!("invalid batch range {}..={}", self.batch_min, self.batch_max),
            ));
        }
        for source in self.service.values() {
            check.time_source(&self.info, source)?;
        }
        for source in self.post_service.values().chain(self.tolerance.values()).flatten() {
            check.time_source(&self.info, source)?;
        }
        for (from, to, source) in &self.setup {
            check.client_type(&self.info, *from)?;
            check.client_type(&self.info, *to)?;
            check.time_source(&self.info, source)?;
        }
        for priority in self.priority.values() {
            if let Priority::Expression(expr) = priority {
                check.expression(&self.info, expr)?;
            }
        }
        if let Some(expr) = &self.resource_priority {
            check.expression(&self.info, expr)?;
        }
        let overridden = self
            .service
            .overridden_types()
            .chain(self.post_service.overridden_types())
            .chain(self.tolerance.overridden_types())
            .chain(self.priority.overridden_types());
        for ty in overridden {
            check.client_type(&self.info, ty)?;
        }
        Ok(())
    }

    fn on_arrival(&self, data: &mut ProcessData, client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            data.recheck_pending = false;
            return self.try_start(data, ctx);
        };

        data.locked_for_pickup = true;
        let now = ctx.now();
        let timer = {
            let record = ctx.clients.require(id)?;
            match self.tolerance.get(record.client_type) {
                Some(source) => {
                    let vars = Variables::for_client(record, now, 0);
                    ctx.calc
                        .tolerance(source, &vars, Some(record), &self.info.name, self.time_base)?
                        .map(|secs| now + Tick::ticks_for_secs(secs))
                }
                None => None,
            }
        };
        let timer = timer.map(|at| (ctx.scheduler.schedule_at(at, Event::Timer { station: self.info.id, client: id }), at));
        data.queue.push(id, timer, ctx)?;

        let waiting = data.queue.len();
        if self.is_batch() && waiting >= self.batch_min && waiting < self.batch_max {
            if !data.recheck_pending {
                data.recheck_pending = true;
                let delay = ctx.config.recheck_delay_ticks;
                ctx.scheduler.schedule_in(delay, Event::Arrival { station: self.info.id, client: None });
            }
        } else {
            self.try_start(data, ctx)?;
        }
        data.locked_for_pickup = false;
        Ok(())
    }

    /// Success edge after service, cancel edge (if any) after reneging.
    fn on_leave(&self, _data: &mut ProcessData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let next = match (ctx.client(client)?.last_queue_success, self.cancel_next) {
            (false, Some(cancel)) => cancel,
            _ => self.info.successor()?,
        };
        ctx.forward(self.info.id, next, client)
    }

    fn on_timer(&self, data: &mut ProcessData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        data.locked_for_pickup = true;
        let result = self.renege(data, client, ctx);
        data.locked_for_pickup = false;
        result
    }

    fn on_resources_released(&self, data: &mut ProcessData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        self.try_start(data, ctx)
    }

    fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    fn resource_priority(&self, _data: &mut ProcessData, ctx: &mut RunContext<'_, '_>) -> QnResult<f64> {
        match &self.resource_priority {
            Some(expr) => {
                let vars = Variables::at(ctx.now());
                ctx.calc.evaluate(expr, &vars, None, &self.info.name, 0.0)
            }
            None => Ok(1.0),
        }
    }

    fn secondary_resource_priority(&self, data: &mut ProcessData, ctx: &mut RunContext<'_, '_>) -> QnResult<f64> {
        let mut best: Option<f64> = None;
        for entry in data.queue.iter() {
            let score = self.score(entry, ctx)?;
            best = Some(best.map_or(score, |b| b.max(score)));
        }
        Ok(best.unwrap_or(0.0))
    }

    fn take_for_pickup(&self, data: &mut ProcessData, ctx: &mut RunContext<'_, '_>) -> QnResult<Option<ClientId>> {
        if data.locked_for_pickup {
            return Ok(None);
        }
        Ok(data.queue.remove(0, ctx)?.map(|e| e.client))
    }

    fn supports_pickup(&self) -> bool {
        true
    }

    fn flush(&self, data: &mut ProcessData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        data.queue.drain(ctx).map(drop)
    }

    fn waiting(&self, data: &ProcessData) -> usize {
        data.queue.len()
    }
}
