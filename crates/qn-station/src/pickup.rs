//! Pickup station: pairs each local client with one pulled from a remote
//! service or hold queue.

use qn_core::{ClientId, QnResult, StationId};
use qn_eval::Calculator;
use tracing::trace;

use crate::{release_group, BuildCheck, MergeRule, RunContext, Station, StationInfo, WaitingQueue};

pub struct Pickup {
    pub(crate) info: StationInfo,
    remote:          StationId,
    /// Forward a local client alone when the remote queue is empty.
    send_alone:      bool,
    merge:           MergeRule,
}

pub struct PickupData {
    pub queue: WaitingQueue,
}

impl Pickup {
    pub fn new(name: impl Into<String>, remote: StationId) -> Self {
        Self { info: StationInfo::new(name), remote, send_alone: false, merge: MergeRule::collect() }
    }

    pub fn send_alone(mut self, on: bool) -> Self {
        self.send_alone = on;
        self
    }

    pub fn merge(mut self, rule: MergeRule) -> Self {
        self.merge = rule;
        self
    }

    /// Pull one remote client; it is reported as arriving here.
    fn pull(&self, ctx: &mut RunContext<'_, '_>) -> QnResult<Option<ClientId>> {
        let pulled = ctx.take_for_pickup(self.remote)?;
        if let Some(id) = pulled {
            let here = self.info.id;
            ctx.report(id, |s, c, now| s.station_arrival(here, c, now))?;
            trace!(station = %self.info.name, client = %id, "picked up");
        }
        Ok(pulled)
    }
}

impl Station for Pickup {
    type Data = PickupData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<PickupData> {
        Ok(PickupData { queue: WaitingQueue::new(self.info.id) })
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        let remote = check.station(&self.info, self.remote)?;
        if remote.id() == self.info.id || !remote.supports_pickup() {
            return Err(check.error(
                &self.info,
                format_args!("remote \"{}\" has no queue to pick up from", remote.name()),
            ));
        }
        if let Some(target) = self.merge.target() {
            check.client_type(&self.info, target)?;
        }
        Ok(())
    }

    fn on_arrival(&self, data: &mut PickupData, client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            return Ok(());
        };
        data.queue.push(id, None, ctx)?;
        if !data.queue.get(0).is_some_and(|e| e.client == id) {
            return Ok(());
        }
        match self.pull(ctx)? {
            Some(remote) => {
                data.queue.remove_client(id, ctx)?;
                release_group(self.info.id, &self.merge, vec![id, remote], ctx)?;
            }
            None if self.send_alone => {
                data.queue.remove_client(id, ctx)?;
                ctx.leave_now(self.info.id, id);
            }
            None => {}
        }
        Ok(())
    }

    /// Pair the oldest local clients with whatever the remote now offers.
    fn on_state_change(&self, data: &mut PickupData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        while !data.queue.is_empty() {
            let Some(remote) = self.pull(ctx)? else {
                break;
            };
            if let Some(local) = data.queue.remove(0, ctx)? {
                release_group(self.info.id, &self.merge, vec![local.client, remote], ctx)?;
            }
        }
        Ok(())
    }

    fn listens_to_state(&self) -> bool {
        true
    }

    fn flush(&self, data: &mut PickupData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        data.queue.drain(ctx).map(drop)
    }

    fn waiting(&self, data: &PickupData) -> usize {
        data.queue.len()
    }
}
