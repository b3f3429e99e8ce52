//! Waiting structures.
//!
//! Every removal goes through [`WaitingQueue::remove`], which cancels the
//! entry's pending timer and books `now - last_waiting_start` as waiting
//! time, so a client's waiting time is updated exactly once per stay and no
//! timer can fire for a client that already left.

use qn_client::StationTimes;
use qn_core::{ClientId, QnResult, StationId, Tick};
use qn_schedule::EventId;

use crate::RunContext;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueEntry {
    pub client:  ClientId,
    pub arrived: Tick,
    /// Pending timer (reneging or maximum wait) and the tick it fires at.
    pub timer:   Option<(EventId, Tick)>,
}

#[derive(Clone, Debug)]
pub struct WaitingQueue {
    station: StationId,
    entries: Vec<QueueEntry>,
}

impl WaitingQueue {
    pub fn new(station: StationId) -> Self {
        Self { station, entries: Vec::new() }
    }

    /// Append `client`, stamping its waiting start.
    pub fn push(
        &mut self,
        client: ClientId,
        timer:  Option<(EventId, Tick)>,
        ctx:    &mut RunContext<'_, '_>,
    ) -> QnResult<()> {
        let now = ctx.now();
        ctx.client_mut(client)?.last_waiting_start = now;
        self.entries.push(QueueEntry { client, arrived: now, timer });
        let (station, len) = (self.station, self.entries.len());
        ctx.report(client, |s, c, now| s.queue_enter(station, c, now, len))
    }

    /// Remove the entry at `index`.  Returns `None` if out of range.
    pub fn remove(&mut self, index: usize, ctx: &mut RunContext<'_, '_>) -> QnResult<Option<QueueEntry>> {
        if index >= self.entries.len() {
            return Ok(None);
        }
        let entry = self.entries.remove(index);
        if let Some((timer, _)) = entry.timer {
            ctx.scheduler.cancel(timer);
        }
        let now = ctx.now();
        let client = ctx.client_mut(entry.client)?;
        let times = StationTimes::waiting(client.current_wait(now));
        client.add_station_time(times);
        let (station, len) = (self.station, self.entries.len());
        ctx.report(entry.client, |s, c, now| {
            s.queue_leave(station, c, now, len);
            s.station_times(station, c, times);
        })?;
        Ok(Some(entry))
    }

    /// Remove `client` if it is queued here.
    pub fn remove_client(&mut self, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<Option<QueueEntry>> {
        match self.position(client) {
            Some(i) => self.remove(i, ctx),
            None => Ok(None),
        }
    }

    /// Remove the `n` oldest entries.
    pub fn take_front(&mut self, n: usize, ctx: &mut RunContext<'_, '_>) -> QnResult<Vec<ClientId>> {
        let n = n.min(self.entries.len());
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(e) = self.remove(0, ctx)? {
                out.push(e.client);
            }
        }
        Ok(out)
    }

    /// Remove every entry, oldest first.
    pub fn drain(&mut self, ctx: &mut RunContext<'_, '_>) -> QnResult<Vec<ClientId>> {
        let n = self.entries.len();
        self.take_front(n, ctx)
    }

    pub fn position(&self, client: ClientId) -> Option<usize> {
        self.entries.iter().position(|e| e.client == client)
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Queued client ids, oldest first.
    pub fn clients(&self) -> Vec<ClientId> {
        self.entries.iter().map(|e| e.client).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
