//! Source station: creates clients at sampled interarrival times.

use qn_core::{ClientId, ClientTypeId, QnResult, TimeBase};
use qn_eval::{Calculator, TimeSource, Variables};
use qn_schedule::Event;
use tracing::{debug, trace};

use crate::{BuildCheck, RunContext, Station, StationInfo};

pub struct Source {
    pub(crate) info: StationInfo,
    client_type:     ClientTypeId,
    interarrival:    TimeSource,
    time_base:       TimeBase,
    /// Stop after this many clients.  The last one is flagged `is_last_client`.
    count:           Option<u64>,
}

#[derive(Debug, Default)]
pub struct SourceData {
    pub created: u64,
}

impl Source {
    pub fn new(name: impl Into<String>, client_type: ClientTypeId, interarrival: TimeSource) -> Self {
        Self {
            info: StationInfo::new(name),
            client_type,
            interarrival,
            time_base: TimeBase::Seconds,
            count: None,
        }
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn time_base(mut self, base: TimeBase) -> Self {
        self.time_base = base;
        self
    }

    fn schedule_next(&self, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let vars = Variables::at(ctx.now());
        let delay = ctx.calc.duration_ticks(&self.interarrival, &vars, None, &self.info.name, self.time_base)?;
        ctx.scheduler.schedule_in(delay, Event::Arrival { station: self.info.id, client: None });
        Ok(())
    }

    fn exhausted(&self, data: &SourceData) -> bool {
        self.count.is_some_and(|n| data.created >= n)
    }
}

impl Station for Source {
    type Data = SourceData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<SourceData> {
        Ok(SourceData::default())
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        check.client_type(&self.info, self.client_type)?;
        check.time_source(&self.info, &self.interarrival)
    }

    fn on_start(&self, data: &mut SourceData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        if self.exhausted(data) {
            return Ok(());
        }
        self.schedule_next(ctx)
    }

    fn on_arrival(&self, data: &mut SourceData, client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        if let Some(id) = client {
            ctx.leave_now(self.info.id, id);
            return Ok(());
        }
        if self.exhausted(data) {
            return Ok(());
        }

        let now = ctx.now();
        let id = ctx.clients.create(self.client_type, now);
        data.created += 1;
        let warm_up = ctx.clients.admit() <= ctx.config.warm_up_clients;
        let last = self.count == Some(data.created);
        {
            let record = ctx.client_mut(id)?;
            record.is_warm_up = warm_up;
            record.is_last_client = last;
        }
        trace!(station = %self.info.name, client = %id, warm_up, "client created");
        ctx.leave_now(self.info.id, id);

        if last {
            debug!(station = %self.info.name, created = data.created, "source exhausted");
        } else {
            self.schedule_next(ctx)?;
        }
        Ok(())
    }
}
