//! The client (entity) record.

use qn_core::{ClientId, ClientTypeId, StationId, Tick};

use crate::UserData;

/// Durations a station attributes to one client visit, in ticks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StationTimes {
    pub waiting:   u64,
    pub transfer:  u64,
    pub process:   u64,
    pub residence: u64,
}

impl StationTimes {
    /// A visit consisting only of queueing.
    #[inline]
    pub fn waiting(ticks: u64) -> Self {
        Self { waiting: ticks, residence: ticks, ..Self::default() }
    }
}

/// A unit flowing through the network.
///
/// Owned by the replication's `ClientStore`; stations mutate it through
/// `ClientStore::get_mut` while it is in their care.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Client {
    pub id:                 ClientId,
    /// Index into the client-type table.  Aggregation may reassign it.
    pub client_type:        ClientTypeId,
    /// Time of creation at the source.
    pub created:            Tick,

    // ── Accumulated durations (ticks, non-decreasing) ─────────────────────
    pub waiting_time:       u64,
    pub transfer_time:      u64,
    pub process_time:       u64,
    pub residence_time:     u64,

    /// Set whenever the client enters a waiting structure.
    pub last_waiting_start: Tick,

    pub is_last_client:     bool,
    pub is_warm_up:         bool,

    /// Station the client was last forwarded from.
    pub last_station:       Option<StationId>,
    /// Resource alternative used for the client's last service.
    pub last_alternative:   Option<usize>,
    /// `false` if the client left its last queue by reneging.
    pub last_queue_success: bool,

    pub user_data:          UserData,

    /// Originals merged into this client by a temporary batch.
    batch:                  Vec<Client>,
}

impl Client {
    pub fn new(id: ClientId, client_type: ClientTypeId, now: Tick) -> Self {
        Self {
            id,
            client_type,
            created:            now,
            waiting_time:       0,
            transfer_time:      0,
            process_time:       0,
            residence_time:     0,
            last_waiting_start: now,
            is_last_client:     false,
            is_warm_up:         false,
            last_station:       None,
            last_alternative:   None,
            last_queue_success: true,
            user_data:          UserData::new(),
            batch:              Vec::new(),
        }
    }

    /// Add one station visit to the accumulated durations, saturating.
    pub fn add_station_time(&mut self, times: StationTimes) {
        self.waiting_time = self.waiting_time.saturating_add(times.waiting);
        self.transfer_time = self.transfer_time.saturating_add(times.transfer);
        self.process_time = self.process_time.saturating_add(times.process);
        self.residence_time = self.residence_time.saturating_add(times.residence);
    }

    /// Ticks spent in the current waiting structure so far.
    #[inline]
    pub fn current_wait(&self, now: Tick) -> u64 {
        now.since(self.last_waiting_start)
    }

    // ── Batch ownership ───────────────────────────────────────────────────

    /// Take ownership of `member` as part of a temporary batch.
    pub fn add_batch_member(&mut self, member: Client) {
        self.batch.push(member);
    }

    /// The originals merged into this client, in merge order.
    pub fn batch_members(&self) -> &[Client] {
        &self.batch
    }

    pub fn is_batch(&self) -> bool {
        !self.batch.is_empty()
    }

    /// Remove and return all originals, dissolving the batch.
    pub fn take_batch_members(&mut self) -> Vec<Client> {
        std::mem::take(&mut self.batch)
    }

    /// Reset every field for reuse of the slot by a new client.
    pub(crate) fn reset(&mut self, client_type: ClientTypeId, now: Tick) {
        let id = self.id;
        let mut user_data = std::mem::take(&mut self.user_data);
        user_data.clear();
        let mut batch = std::mem::take(&mut self.batch);
        batch.clear();
        *self = Client { user_data, batch, ..Client::new(id, client_type, now) };
    }
}
