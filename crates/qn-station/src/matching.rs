//! Matching station: one client from every inbound queue leaves together.

use qn_core::{ClientId, QnError, QnResult, StationId};
use qn_eval::{Calculator, Expression, Variables};
use tracing::debug;

use crate::{merge_group, BuildCheck, MergeMode, MergeRule, RunContext, Station, StationInfo, WaitingQueue};

/// What partners must have in common.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum MatchProperty {
    /// Any client of the other queues will do.
    #[default]
    None,
    /// Equal numeric user data at this index.
    Number(usize),
    /// Equal text user data under this key.
    Text(String),
}

pub struct Match {
    pub(crate) info: StationInfo,
    /// Predecessor stations feeding each inbound queue.
    inbound:         Vec<Vec<StationId>>,
    property:        MatchProperty,
    condition:       Option<Expression>,
    merge:           MergeRule,
}

pub struct MatchData {
    pub queues:    Vec<WaitingQueue>,
    /// Collect-mode groups whose members have not all left yet, with the
    /// number of leaves still outstanding.
    pub in_flight: Vec<(Vec<ClientId>, usize)>,
}

impl Match {
    /// `inbound[i]` lists the predecessors whose clients join queue `i`.
    pub fn new(name: impl Into<String>, inbound: Vec<Vec<StationId>>) -> Self {
        Self {
            info: StationInfo::new(name),
            inbound,
            property: MatchProperty::None,
            condition: None,
            merge: MergeRule::collect(),
        }
    }

    pub fn property(mut self, property: MatchProperty) -> Self {
        self.property = property;
        self
    }

    /// Release only while `expr` is non-zero for the reference client.
    pub fn condition(mut self, expr: impl Into<Expression>) -> Self {
        self.condition = Some(expr.into());
        self
    }

    pub fn merge(mut self, rule: MergeRule) -> Self {
        self.merge = rule;
        self
    }

    fn queue_for(&self, from: Option<StationId>) -> usize {
        from.and_then(|s| self.inbound.iter().position(|preds| preds.contains(&s)))
            .unwrap_or(0)
    }

    fn condition_holds(&self, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<bool> {
        let Some(expr) = &self.condition else {
            return Ok(true);
        };
        let now = ctx.now();
        let record = ctx.clients.require(client)?;
        let vars = Variables::for_client(record, now, record.current_wait(now));
        ctx.calc.condition(expr, &vars, Some(record), &self.info.name)
    }

    /// Position of a partner for `client` in every queue but `own`, or
    /// `None` if some queue has none.
    fn partners(
        &self,
        data:   &MatchData,
        own:    usize,
        client: ClientId,
        ctx:    &RunContext<'_, '_>,
    ) -> QnResult<Option<Vec<(usize, usize)>>> {
        let reference = ctx.client(client)?;
        let mut found = Vec::with_capacity(data.queues.len().saturating_sub(1));
        for (q, queue) in data.queues.iter().enumerate() {
            if q == own {
                continue;
            }
            let mut hit = None;
            for (i, entry) in queue.iter().enumerate() {
                let other = ctx.client(entry.client)?;
                let equal = match &self.property {
                    MatchProperty::None => true,
                    MatchProperty::Number(index) => other.user_data.number(*index) == reference.user_data.number(*index),
                    MatchProperty::Text(key) => other.user_data.text(key) == reference.user_data.text(key),
                };
                if equal {
                    hit = Some(i);
                    break;
                }
            }
            match hit {
                Some(i) => found.push((q, i)),
                None => return Ok(None),
            }
        }
        Ok(Some(found))
    }

    /// Take the partners out of their queues and release the group, ordered
    /// by queue index.
    fn release(
        &self,
        data:     &mut MatchData,
        own:      (usize, ClientId),
        partners: Vec<(usize, usize)>,
        ctx:      &mut RunContext<'_, '_>,
    ) -> QnResult<()> {
        let mut group = vec![own];
        for (q, i) in partners {
            let queue = data.queues.get_mut(q).ok_or(QnError::StationDataMismatch(self.info.id))?;
            if let Some(entry) = queue.remove(i, ctx)? {
                group.push((q, entry.client));
            }
        }
        group.sort_by_key(|&(q, _)| q);
        let members: Vec<ClientId> = group.into_iter().map(|(_, c)| c).collect();
        debug!(station = %self.info.name, size = members.len(), "match released");

        let released = merge_group(&self.merge, members, ctx)?;
        if self.merge.mode == MergeMode::Collect && released.len() > 1 {
            data.in_flight.push((released.clone(), released.len()));
        }
        for id in released {
            ctx.leave_now(self.info.id, id);
        }
        Ok(())
    }

    /// Re-test queue 0 in order while a reference client can be released.
    fn release_ready(&self, data: &mut MatchData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        'scan: loop {
            let Some(first) = data.queues.first() else {
                return Ok(());
            };
            for entry in first.clients() {
                if !self.condition_holds(entry, ctx)? {
                    continue;
                }
                if let Some(partners) = self.partners(data, 0, entry, ctx)? {
                    if data.queues[0].remove_client(entry, ctx)?.is_some() {
                        self.release(data, (0, entry), partners, ctx)?;
                        continue 'scan;
                    }
                }
            }
            return Ok(());
        }
    }
}

impl Station for Match {
    type Data = MatchData;

    fn info(&self) -> &StationInfo {
        &self.info
    }

    fn init_data(&self, _calc: &mut Calculator<'_>) -> QnResult<MatchData> {
        Ok(MatchData {
            queues:    self.inbound.iter().map(|_| WaitingQueue::new(self.info.id)).collect(),
            in_flight: Vec::new(),
        })
    }

    fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
        if self.inbound.len() < 2 {
            return Err(check.error(&self.info, "a match station needs at least two inbound queues"));
        }
        for &pred in self.inbound.iter().flatten() {
            check.station(&self.info, pred)?;
        }
        if let Some(expr) = &self.condition {
            check.expression(&self.info, expr)?;
        }
        if let Some(target) = self.merge.target() {
            check.client_type(&self.info, target)?;
        }
        Ok(())
    }

    fn on_arrival(&self, data: &mut MatchData, client: Option<ClientId>, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let Some(id) = client else {
            return Ok(());
        };
        let own = self.queue_for(ctx.client(id)?.last_station);
        let queue = data.queues.get_mut(own).ok_or(QnError::StationDataMismatch(self.info.id))?;
        queue.push(id, None, ctx)?;

        if !self.condition_holds(id, ctx)? {
            return Ok(());
        }
        if let Some(partners) = self.partners(data, own, id, ctx)? {
            // Matched on arrival: entered and left the queue in the same instant.
            data.queues[own].remove_client(id, ctx)?;
            self.release(data, (own, id), partners, ctx)?;
        }
        Ok(())
    }

    /// Collect groups move on together once every member's leave ran.
    fn on_leave(&self, data: &mut MatchData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let next = self.info.successor()?;
        let Some(g) = data.in_flight.iter().position(|(members, _)| members.contains(&client)) else {
            return ctx.forward(self.info.id, next, client);
        };
        let remaining = &mut data.in_flight[g].1;
        *remaining -= 1;
        if *remaining == 0 {
            let (members, _) = data.in_flight.swap_remove(g);
            for id in members {
                ctx.forward(self.info.id, next, id)?;
            }
        }
        Ok(())
    }

    fn on_state_change(&self, data: &mut MatchData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        self.release_ready(data, ctx)
    }

    fn listens_to_state(&self) -> bool {
        self.condition.is_some()
    }

    fn flush(&self, data: &mut MatchData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        for queue in &mut data.queues {
            queue.drain(ctx)?;
        }
        Ok(())
    }

    fn waiting(&self, data: &MatchData) -> usize {
        data.queues.iter().map(WaitingQueue::len).sum()
    }
}
