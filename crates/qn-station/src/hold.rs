//! Hold station: clients wait until a condition holds for them.

use qn_core::{ClientId, QnResult, Tick, TimeBase};
use qn_eval::{Calculator, Expression, TimeSource, Variables};
use qn_schedule::Event;

use crate::{BuildCheck, RunContext, Station, StationInfo, WaitingQueue};

pub struct Hold {
    pub(crate) info: StationInfo,
    condition:       Expression,
    /// Released regardless of the condition after this long.
    max_wait:        Option<TimeSource>,
    time_base:       TimeBase,
}

pub struct HoldData {
    pub queue:             WaitingQueue,
    pub locked_for_pickup: bool,
}

impl Hold {
    pub fn new(name: impl Into<String>, condition: impl Into<Expression>) -> Self {
        Self {
            info:      StationInfo::new(name),
            condition: condition.into(),
            max_wait:  None,
            time_base: TimeBase::Seconds,
        }
    }

    pub fn max_wait(mut self, source: TimeSource) -> Self {
        self.max_wait = Some(source);
        self
    }

    pub fn time_base(mut self, base: TimeBase) -> Self {
        self.time_base = base;
        self
    }

    /// Release, in queue order, every client the condition now admits.
    fn release_ready(&self, data: &mut HoldData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let now = ctx.now();
        for client in data.queue.clients() {
            let ready = {
                let record = ctx.clients.require(client)?;
                let vars = Variables::for_client(record, now, record.current_wait(now));
                ctx.calc.condition(&self.condition, &vars, Some(record), &self.info.name)?
            };
            if ready && data.queue.remove_client(client, ctx)?.is_some() {
                ctx.leave_now(self.info.id, client);
            }
        }
        Ok(())
    }
}

impl Station for Hold {
    type Data = HoldData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<HoldData> {
        Ok(HoldData { queue: WaitingQueue::new(self.info.id), locked_for_pickup: false })
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        check.expression(&self.info, &self.condition)?;
        if let Some(source) = &self.max_wait {
            check.time_source(&self.info, source)?;
        }
        Ok(())
    }

    fn on_arrival(&self, data: &mut HoldData, client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            return Ok(());
        };
        data.locked_for_pickup = true;
        let now = ctx.now();
        let timer = match &self.max_wait {
            Some(source) => {
                let record = ctx.clients.require(id)?;
                let vars = Variables::for_client(record, now, 0);
                let ticks = ctx.calc.duration_ticks(source, &vars, Some(record), &self.info.name, self.time_base)?;
                let at: Tick = now + ticks;
                Some((ctx.scheduler.schedule_at(at, Event::Timer { station: self.info.id, client: id }), at))
            }
            None => None,
        };
        data.queue.push(id, timer, ctx)?;
        let result = self.release_ready(data, ctx);
        data.locked_for_pickup = false;
        result
    }

    /// Maximum waiting time reached.
    fn on_timer(&self, data: &mut HoldData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        if data.queue.remove_client(client, ctx)?.is_some() {
            ctx.leave_now(self.info.id, client);
        }
        Ok(())
    }

    fn on_state_change(&self, data: &mut HoldData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        self.release_ready(data, ctx)
    }

    fn listens_to_state(&self) -> bool {
        true
    }

    fn take_for_pickup(&self, data: &mut HoldData, ctx: &mut RunContext<'_, '_>) -> QnResult<Option<ClientId>> {
        if data.locked_for_pickup {
            return Ok(None);
        }
        Ok(data.queue.remove(0, ctx)?.map(|e| e.client))
    }

    fn supports_pickup(&self) -> bool {
        true
    }

    fn flush(&self, data: &mut HoldData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        data.queue.drain(ctx).map(drop)
    }

    fn waiting(&self, data: &HoldData) -> usize {
        data.queue.len()
    }
}
