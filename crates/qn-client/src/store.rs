//! Per-replication client arena.
//!
//! Live clients occupy slots addressed by `ClientId`.  Freed slots are reused
//! by later clients, and disposed records handed back through
//! [`ClientStore::recycle`] are reset and reused instead of reallocated.
//!
//! Temporary batching moves originals *out* of the arena and into the
//! container client ([`ClientStore::detach`]); separating moves them back in
//! under fresh ids ([`ClientStore::attach`]).

use qn_core::{ClientId, ClientTypeId, QnError, QnResult, Tick};

use crate::Client;

#[derive(Default)]
pub struct ClientStore {
    slots:    Vec<Option<Client>>,
    free:     Vec<ClientId>,
    spare:    Vec<Client>,
    alive:    usize,
    created:  u64,
    admitted: u64,
    disposed: u64,
}

impl ClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client of `client_type` at time `now` and return its id.
    pub fn create(&mut self, client_type: ClientTypeId, now: Tick) -> ClientId {
        self.created += 1;
        let mut client = match self.spare.pop() {
            Some(mut c) => {
                c.reset(client_type, now);
                c
            }
            None => Client::new(ClientId::INVALID, client_type, now),
        };
        let id = self.next_slot();
        client.id = id;
        self.slots[id.index()] = Some(client);
        self.alive += 1;
        id
    }

    #[inline]
    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Like [`get`][Self::get], failing with [`QnError::ClientNotFound`].
    #[inline]
    pub fn require(&self, id: ClientId) -> QnResult<&Client> {
        self.get(id).ok_or(QnError::ClientNotFound(id))
    }

    #[inline]
    pub fn require_mut(&mut self, id: ClientId) -> QnResult<&mut Client> {
        self.get_mut(id).ok_or(QnError::ClientNotFound(id))
    }

    /// Remove a live client from the arena without counting it as disposed.
    pub fn detach(&mut self, id: ClientId) -> Option<Client> {
        let client = self.slots.get_mut(id.index())?.take()?;
        self.free.push(id);
        self.alive -= 1;
        Some(client)
    }

    /// Re-insert a detached client under a fresh id.
    pub fn attach(&mut self, mut client: Client) -> ClientId {
        let id = self.next_slot();
        client.id = id;
        self.slots[id.index()] = Some(client);
        self.alive += 1;
        id
    }

    /// Remove a live client for good and hand its final record to the caller
    /// (for statistics).  Pass the record to [`recycle`][Self::recycle] when
    /// done with it.
    pub fn dispose(&mut self, id: ClientId) -> Option<Client> {
        let client = self.detach(id)?;
        self.disposed += 1;
        Some(client)
    }

    /// Count a detached client (e.g. a batch member) as disposed.
    pub fn mark_disposed(&mut self) {
        self.disposed += 1;
    }

    /// Return a finished record (and any batch members) for reuse.
    pub fn recycle(&mut self, mut client: Client) {
        for member in client.take_batch_members() {
            self.recycle(member);
        }
        self.spare.push(client);
    }

    /// Ids of all live clients in ascending slot order.
    pub fn ids(&self) -> Vec<ClientId> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|c| c.id))
            .collect()
    }

    /// Number of clients currently alive.
    #[inline]
    pub fn alive(&self) -> usize {
        self.alive
    }

    /// Total clients created by [`create`][Self::create].
    #[inline]
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Count one client entering the network through a source and return
    /// the new total.  Containers built by merging are not counted.
    pub fn admit(&mut self) -> u64 {
        self.admitted += 1;
        self.admitted
    }

    /// Total clients counted by [`admit`][Self::admit].
    #[inline]
    pub fn admitted(&self) -> u64 {
        self.admitted
    }

    /// Total clients disposed, including batch members.
    #[inline]
    pub fn disposed(&self) -> u64 {
        self.disposed
    }

    fn next_slot(&mut self) -> ClientId {
        match self.free.pop() {
            Some(id) => id,
            None => {
                self.slots.push(None);
                ClientId((self.slots.len() - 1) as u32)
            }
        }
    }
}
