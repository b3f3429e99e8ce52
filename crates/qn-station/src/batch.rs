//! Single-type and multi-type batching stations.

use qn_core::{ClientId, ClientTypeId, QnError, QnResult, Tick};
use qn_eval::{Calculator, Expression, Variables};
use qn_schedule::Event;
use tracing::debug;

use crate::{release_group, BuildCheck, MergeRule, RunContext, Station, StationInfo, WaitingQueue};

// ── BatchSize ─────────────────────────────────────────────────────────────────

/// A batch bound, fixed or evaluated once per replication.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchSize {
    Fixed(usize),
    Expression(Expression),
}

impl BatchSize {
    /// Resolve the bound.  Values below 1 (after rounding) are fatal.
    pub fn resolve(&self, calc: &mut Calculator<'_>, station: &str) -> QnResult<usize> {
        let value = match self {
            BatchSize::Fixed(n) => *n as f64,
            BatchSize::Expression(expr) => calc.evaluate(expr, &Variables::at(Tick::ZERO), None, station, 0.0)?,
        };
        let rounded = value.round();
        if !(rounded >= 1.0) {
            return Err(QnError::InvalidBatchSize { station: station.to_string(), value });
        }
        Ok(rounded as usize)
    }

    fn check(&self, check: &BuildCheck<'_>, info: &StationInfo) -> QnResult<()> {
        match self {
            BatchSize::Fixed(0) => Err(check.error(info, "batch size must be at least 1")),
            BatchSize::Fixed(_) => Ok(()),
            BatchSize::Expression(expr) => check.expression(info, expr),
        }
    }
}

impl From<usize> for BatchSize {
    fn from(n: usize) -> Self {
        BatchSize::Fixed(n)
    }
}

/// Bounds and forwarding of one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchRule {
    pub min:   BatchSize,
    pub max:   BatchSize,
    pub merge: MergeRule,
}

impl BatchRule {
    pub fn new(min: impl Into<BatchSize>, max: impl Into<BatchSize>, merge: MergeRule) -> Self {
        Self { min: min.into(), max: max.into(), merge }
    }

    fn validate(&self, check: &BuildCheck<'_>, info: &StationInfo) -> QnResult<()> {
        self.min.check(check, info)?;
        self.max.check(check, info)?;
        if let (BatchSize::Fixed(min), BatchSize::Fixed(max)) = (&self.min, &self.max) {
            if max < min {
                return Err(check.error(info, format_args!("invalid batch range {min}..={max}")));
            }
        }
        Ok(())
    }

    /// `(min, max)` for a replication; a dynamic maximum below the minimum is
    /// raised to the minimum.
    fn resolve(&self, calc: &mut Calculator<'_>, station: &str) -> QnResult<(usize, usize)> {
        let min = self.min.resolve(calc, station)?;
        let max = self.max.resolve(calc, station)?;
        Ok((min, max.max(min)))
    }
}

/// Accumulated clients of one rule.
pub struct BatchQueue {
    pub queue: WaitingQueue,
    pub min:   usize,
    pub max:   usize,
}

impl BatchQueue {
    /// Forward full batches; with `recheck`, also a partial batch that
    /// reached the minimum.  Returns the number of batches sent.
    fn release(
        &mut self,
        info:    &StationInfo,
        merge:   &MergeRule,
        recheck: bool,
        ctx:     &mut RunContext<'_, '_>,
    ) -> QnResult<usize> {
        let mut batches = 0;
        loop {
            let len = self.queue.len();
            if len == 0 || (len < self.max && !(recheck && len >= self.min)) {
                return Ok(batches);
            }
            let members = self.queue.take_front(self.max, ctx)?;
            debug!(station = %info.name, size = members.len(), "batch released");
            release_group(info.id, merge, members, ctx)?;
            batches += 1;
        }
    }
}

// ── Batch ─────────────────────────────────────────────────────────────────────

/// Collects clients of any type into batches.
pub struct Batch {
    pub(crate) info: StationInfo,
    rule:            BatchRule,
}

pub struct BatchData {
    pub batch:           BatchQueue,
    pub recheck_pending: bool,
}

impl Batch {
    pub fn new(name: impl Into<String>, rule: BatchRule) -> Self {
        Self { info: StationInfo::new(name), rule }
    }
}

impl Station for Batch {
    type Data = BatchData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, calc: &mut Calculator<'_>) -> QnResult<BatchData> {
        let (min, max) = self.rule.resolve(calc, &self.info.name)?;
        Ok(BatchData {
            batch:           BatchQueue { queue: WaitingQueue::new(self.info.id), min, max },
            recheck_pending: false,
        })
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        self.rule.validate(check, &self.info)?;
        if let Some(target) = self.rule.merge.target() {
            check.client_type(&self.info, target)?;
        }
        Ok(())
    }

    fn on_arrival(&self, data: &mut BatchData, client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            data.recheck_pending = false;
            return data.batch.release(&self.info, &self.rule.merge, true, ctx).map(drop);
        };
        data.batch.queue.push(id, None, ctx)?;
        if data.batch.release(&self.info, &self.rule.merge, false, ctx)? == 0
            && data.batch.queue.len() >= data.batch.min
            && !data.recheck_pending
        {
            data.recheck_pending = true;
            let delay = ctx.config.recheck_delay_ticks;
            ctx.scheduler.schedule_in(delay, Event::Arrival { station: self.info.id, client: None });
        }
        Ok(())
    }

    fn flush(&self, data: &mut BatchData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        data.batch.queue.drain(ctx).map(drop)
    }

    fn waiting(&self, data: &BatchData) -> usize {
        data.batch.queue.len()
    }
}

// ── BatchMulti ────────────────────────────────────────────────────────────────

/// Batches each client type on its own.  Types without a rule pass through.
pub struct BatchMulti {
    pub(crate) info: StationInfo,
    rules:           Vec<(ClientTypeId, BatchRule)>,
}

pub struct BatchMultiData {
    /// One entry per rule, in rule order.
    pub batches:         Vec<BatchQueue>,
    pub recheck_pending: bool,
}

impl BatchMulti {
    pub fn new(name: impl Into<String>) -> Self {
        Self { info: StationInfo::new(name), rules: Vec::new() }
    }

    pub fn rule(mut self, ty: ClientTypeId, rule: BatchRule) -> Self {
        self.rules.retain(|(t, _)| *t != ty);
        self.rules.push((ty, rule));
        self
    }

    fn rule_index(&self, ty: ClientTypeId) -> Option<usize> {
        self.rules.iter().position(|(t, _)| *t == ty)
    }
}

impl Station for BatchMulti {
    type Data = BatchMultiData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, calc: &mut Calculator<'_>) -> QnResult<BatchMultiData> {
        let batches = self
            .rules
            .iter()
            .map(|(_, rule)| {
                let (min, max) = rule.resolve(calc, &self.info.name)?;
                Ok(BatchQueue { queue: WaitingQueue::new(self.info.id), min, max })
            })
            .collect::<QnResult<Vec<_>>>()?;
        Ok(BatchMultiData { batches, recheck_pending: false })
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        for (ty, rule) in &self.rules {
            check.client_type(&self.info, *ty)?;
            rule.validate(check, &self.info)?;
            if let Some(target) = rule.merge.target() {
                check.client_type(&self.info, target)?;
            }
        }
        Ok(())
    }

    fn on_arrival(
        &self,
        data:   &mut BatchMultiData,
        client: Option<ClientId>,
        ctx:    &mut RunContext<'_, '_>,
    ) -> QnResult<()> {
        let Some(id) = client else {
            data.recheck_pending = false;
            for ((_, rule), batch) in self.rules.iter().zip(&mut data.batches) {
                batch.release(&self.info, &rule.merge, true, ctx)?;
            }
            return Ok(());
        };

        let ty = ctx.client(id)?.client_type;
        let Some(index) = self.rule_index(ty) else {
            ctx.leave_now(self.info.id, id);
            return Ok(());
        };
        let batch = data
            .batches
            .get_mut(index)
            .ok_or(QnError::StationDataMismatch(self.info.id))?;
        batch.queue.push(id, None, ctx)?;
        if batch.release(&self.info, &self.rules[index].1.merge, false, ctx)? == 0
            && batch.queue.len() >= batch.min
            && !data.recheck_pending
        {
            data.recheck_pending = true;
            let delay = ctx.config.recheck_delay_ticks;
            ctx.scheduler.schedule_in(delay, Event::Arrival { station: self.info.id, client: None });
        }
        Ok(())
    }

    fn flush(&self, data: &mut BatchMultiData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        for batch in &mut data.batches {
            batch.queue.drain(ctx)?;
        }
        Ok(())
    }

    fn waiting(&self, data: &BatchMultiData) -> usize {
        data.batches.iter().map(|b| b.queue.len()).sum()
    }
}
