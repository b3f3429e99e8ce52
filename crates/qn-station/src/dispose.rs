//! Sink stations: `Dispose` ends a client's life, `Separate` dissolves a
//! temporary batch, `SignalStation` fires a signal as clients pass.

use qn_core::{ClientId, QnError, QnResult, SignalId};
use qn_eval::Calculator;
use qn_schedule::Event;
use tracing::{debug, info};

use crate::{BuildCheck, RunContext, Station, StationInfo};

// ── Dispose ───────────────────────────────────────────────────────────────────

pub struct Dispose {
    pub(crate) info: StationInfo,
}

impl Dispose {
    pub fn new(name: impl Into<String>) -> Self {
        Self { info: StationInfo::new(name) }
    }
}

impl Station for Dispose {
    type Data = ();

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<()> {
        Ok(())
    }

    /// Disposing the last client stops the replication.
    fn on_arrival(&self, _data: &mut (), client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            return Ok(());
        };
        if ctx.dispose_client(id)? {
            info!(station = %self.info.name, now = %ctx.now(), "last client disposed");
            ctx.request_stop();
        }
        Ok(())
    }
}

// ── Separate ──────────────────────────────────────────────────────────────────

pub struct Separate {
    pub(crate) info: StationInfo,
}

impl Separate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { info: StationInfo::new(name) }
    }
}

impl Station for Separate {
    type Data = ();

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<()> {
        Ok(())
    }

    /// Originals re-enter under fresh ids and leave individually; the
    /// container is recycled without counting as disposed.
    fn on_arrival(&self, _data: &mut (), client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            return Ok(());
        };
        if !ctx.client(id)?.is_batch() {
            ctx.leave_now(self.info.id, id);
            return Ok(());
        }
        let mut container = ctx.clients.detach(id).ok_or(QnError::ClientNotFound(id))?;
        let mut members = container.take_batch_members();
        if let Some(last) = members.last_mut() {
            last.is_last_client |= container.is_last_client;
        }
        ctx.clients.recycle(container);

        debug!(station = %self.info.name, members = members.len(), "batch separated");
        for member in members {
            let original = ctx.clients.attach(member);
            ctx.leave_now(self.info.id, original);
        }
        Ok(())
    }
}

// ── SignalStation ─────────────────────────────────────────────────────────────

/// Pass-through that fires `signal` for every client.
pub struct SignalStation {
    pub(crate) info: StationInfo,
    signal:          SignalId,
}

impl SignalStation {
    pub fn new(name: impl Into<String>, signal: SignalId) -> Self {
        Self { info: StationInfo::new(name), signal }
    }
}

impl Station for SignalStation {
    type Data = ();

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<()> {
        Ok(())
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        check.signal(&self.info, self.signal)
    }

    fn on_arrival(&self, _data: &mut (), client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            return Ok(());
        };
        let now = ctx.now();
        ctx.scheduler.schedule_at(now, Event::Signal { signal: self.signal });
        ctx.leave_now(self.info.id, id);
        Ok(())
    }
}
