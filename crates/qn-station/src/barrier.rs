//! Barrier station: clients pass on signal credit.

use qn_core::{ClientId, ClientTypeId, QnResult, SignalId};
use qn_eval::Calculator;
use tracing::debug;

use crate::{BuildCheck, RunContext, Station, StationInfo, WaitingQueue};

/// Credit added each time a signal fires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Credit {
    Finite(u32),
    Unlimited,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BarrierRule {
    pub signal:       SignalId,
    pub credit:       Credit,
    /// Only clients of this type use the credit.
    pub client_type:  Option<ClientTypeId>,
    /// Keep credit nobody used for later arrivals.
    pub store_credit: bool,
}

impl BarrierRule {
    pub fn new(signal: SignalId, credit: Credit) -> Self {
        Self { signal, credit, client_type: None, store_credit: false }
    }

    pub fn for_type(mut self, ty: ClientTypeId) -> Self {
        self.client_type = Some(ty);
        self
    }

    pub fn store_credit(mut self, on: bool) -> Self {
        self.store_credit = on;
        self
    }

    fn applies_to(&self, ty: ClientTypeId) -> bool {
        self.client_type.is_none_or(|t| t == ty)
    }
}

/// Credit a rule currently holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stored {
    Count(u64),
    /// An unlimited credit was stored: the gate stays open.
    Open,
}

impl Stored {
    fn available(self) -> bool {
        !matches!(self, Stored::Count(0))
    }

    fn consume(&mut self) {
        if let Stored::Count(n) = self {
            *n = n.saturating_sub(1);
        }
    }
}

pub struct Barrier {
    pub(crate) info: StationInfo,
    rules:           Vec<BarrierRule>,
    /// A client needs credit from every rule at once.
    all_signals:     bool,
}

pub struct BarrierData {
    pub queue:  WaitingQueue,
    /// One entry per rule.
    pub stored: Vec<Stored>,
}

impl Barrier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { info: StationInfo::new(name), rules: Vec::new(), all_signals: false }
    }

    pub fn rule(mut self, rule: BarrierRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn all_signals(mut self, on: bool) -> Self {
        self.all_signals = on;
        self
    }

    /// Signals this barrier listens to.
    pub fn signals(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.rules.iter().map(|r| r.signal)
    }

    /// Consume credit for a client of type `ty`.  Returns whether it may pass.
    fn try_pass(&self, stored: &mut [Stored], ty: ClientTypeId) -> bool {
        if self.all_signals {
            let ok = self.rules.iter().zip(stored.iter()).all(|(r, s)| r.applies_to(ty) && s.available());
            if ok {
                stored.iter_mut().for_each(Stored::consume);
            }
            return ok;
        }
        for (rule, s) in self.rules.iter().zip(stored.iter_mut()) {
            if rule.applies_to(ty) && s.available() {
                s.consume();
                return true;
            }
        }
        false
    }

    fn release(&self, data: &mut BarrierData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        if data.queue.remove_client(client, ctx)?.is_some() {
            ctx.leave_now(self.info.id, client);
        }
        Ok(())
    }

    /// Release queued clients (FIFO) while the stored credit allows.
    fn release_all_signals(&self, data: &mut BarrierData, ctx: &mut RunContext<'_, '_>) -> QnResult<usize> {
        let mut released = 0;
        for client in data.queue.clients() {
            let ty = ctx.client(client)?.client_type;
            if self.try_pass(&mut data.stored, ty) {
                self.release(data, client, ctx)?;
                released += 1;
            }
        }
        Ok(released)
    }

    fn apply_credit(&self, data: &mut BarrierData, index: usize, ctx: &mut RunContext<'_, '_>) -> QnResult<usize> {
        let rule = &self.rules[index];
        let mut budget = match (rule.credit, data.stored[index]) {
            (Credit::Unlimited, _) | (_, Stored::Open) => None,
            (Credit::Finite(n), Stored::Count(held)) => Some(held + u64::from(n)),
        };
        let mut released = 0;
        for client in data.queue.clients() {
            if budget == Some(0) {
                break;
            }
            if !rule.applies_to(ctx.client(client)?.client_type) {
                continue;
            }
            self.release(data, client, ctx)?;
            released += 1;
            if let Some(b) = budget.as_mut() {
                *b -= 1;
            }
        }
        data.stored[index] = match (rule.store_credit, budget) {
            (false, _) => Stored::Count(0),
            (true, None) => Stored::Open,
            (true, Some(left)) => Stored::Count(left),
        };
        Ok(released)
    }
}

impl Station for Barrier {
    type Data = BarrierData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<BarrierData> {
        Ok(BarrierData {
            queue:  WaitingQueue::new(self.info.id),
            stored: vec![Stored::Count(0); self.rules.len()],
        })
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        if self.rules.is_empty() {
            return Err(check.error(&self.info, "a barrier needs at least one signal rule"));
        }
        for rule in &self.rules {
            check.signal(&self.info, rule.signal)?;
            if let Some(ty) = rule.client_type {
                check.client_type(&self.info, ty)?;
            }
            if self.all_signals && (rule.credit == Credit::Unlimited || !rule.store_credit) {
                return Err(check.error(
                    &self.info,
                    "all-signals mode needs finite, stored credit on every rule",
                ));
            }
        }
        Ok(())
    }

    fn on_arrival(&self, data: &mut BarrierData, client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            return Ok(());
        };
        let ty = ctx.client(id)?.client_type;
        if self.try_pass(&mut data.stored, ty) {
            ctx.leave_now(self.info.id, id);
            return Ok(());
        }
        data.queue.push(id, None, ctx)
    }

    fn on_signal(&self, data: &mut BarrierData, signal: SignalId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let mut released = 0;
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.signal != signal {
                continue;
            }
            if self.all_signals {
                if let (Credit::Finite(n), Stored::Count(held)) = (rule.credit, data.stored[index]) {
                    data.stored[index] = Stored::Count(held + u64::from(n));
                }
            } else {
                released += self.apply_credit(data, index, ctx)?;
            }
        }
        if self.all_signals {
            released += self.release_all_signals(data, ctx)?;
        }
        debug!(station = %self.info.name, signal = signal.0, released, "signal");
        Ok(())
    }

    fn flush(&self, data: &mut BarrierData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        data.queue.drain(ctx).map(drop)
    }

    fn waiting(&self, data: &BarrierData) -> usize {
        data.queue.len()
    }
}
