use qn_core::{ResourceGroupId, StationId, Tick};
use tracing::trace;

use crate::{ResourceError, ResourceResult};

// ── ResourceGroup ─────────────────────────────────────────────────────────────

/// A named countable capacity, e.g. "operators: 3".
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceGroup {
    pub name:            String,
    pub capacity:        u32,
    /// Extra time charged when a unit of this group switches to a different
    /// requester.
    pub changeover_secs: f64,
}

impl ResourceGroup {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self { name: name.into(), capacity, changeover_secs: 0.0 }
    }

    /// A group that never runs out.
    pub fn unlimited(name: impl Into<String>) -> Self {
        Self::new(name, u32::MAX)
    }

    pub fn with_changeover(mut self, secs: f64) -> Self {
        self.changeover_secs = secs.max(0.0);
        self
    }
}

// ── Alternative ───────────────────────────────────────────────────────────────

/// One feasible combination of `(group, count)` requirements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Alternative {
    needs: Vec<(ResourceGroupId, u32)>,
}

impl Alternative {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a requirement.  Repeated groups are merged.
    pub fn need(mut self, group: ResourceGroupId, count: u32) -> Self {
        match self.needs.iter_mut().find(|(g, _)| *g == group) {
            Some((_, c)) => *c += count,
            None => self.needs.push((group, count)),
        }
        self
    }

    pub fn needs(&self) -> &[(ResourceGroupId, u32)] {
        &self.needs
    }
}

/// Result of a successful [`ResourcePool::try_acquire`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Acquired {
    /// Index of the alternative that was locked.
    pub alternative:      usize,
    /// Changeover delay to add to the service time.
    pub additional_ticks: u64,
}

// ── ResourcePool ──────────────────────────────────────────────────────────────

/// Per-replication resource state.
///
/// Invariant: `locked[g] <= groups[g].capacity` for every group at all times.
#[derive(Clone, Debug, Default)]
pub struct ResourcePool {
    groups:    Vec<ResourceGroup>,
    locked:    Vec<u32>,
    last_user: Vec<Option<StationId>>,
    users:     Vec<StationId>,
}

impl ResourcePool {
    pub fn new(groups: Vec<ResourceGroup>) -> ResourceResult<Self> {
        for (i, g) in groups.iter().enumerate() {
            if groups[..i].iter().any(|o| o.name == g.name) {
                return Err(ResourceError::DuplicateName(g.name.clone()));
            }
        }
        let n = groups.len();
        Ok(Self {
            groups,
            locked:    vec![0; n],
            last_user: vec![None; n],
            users:     Vec::new(),
        })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_by_name(&self, name: &str) -> Option<ResourceGroupId> {
        self.groups
            .iter()
            .position(|g| g.name == name)
            .and_then(|i| ResourceGroupId::try_from(i).ok())
    }

    pub fn group(&self, id: ResourceGroupId) -> Option<&ResourceGroup> {
        self.groups.get(id.index())
    }

    /// Units of `id` currently locked.
    pub fn locked(&self, id: ResourceGroupId) -> u32 {
        self.locked.get(id.index()).copied().unwrap_or(0)
    }

    pub fn free(&self, id: ResourceGroupId) -> u32 {
        match self.group(id) {
            Some(g) => g.capacity - self.locked(id),
            None => 0,
        }
    }

    /// Check that every alternative names existing groups within capacity.
    pub fn validate(&self, alternatives: &[Alternative]) -> ResourceResult<()> {
        for alt in alternatives {
            for &(id, needed) in alt.needs() {
                let g = self.group(id).ok_or(ResourceError::UnknownGroup(id))?;
                if needed > g.capacity {
                    return Err(ResourceError::ExceedsCapacity {
                        group: g.name.clone(),
                        needed,
                        capacity: g.capacity,
                    });
                }
            }
        }
        Ok(())
    }

    /// Record `station` as a resource user to be notified after releases.
    pub fn register_user(&mut self, station: StationId) {
        if let Err(pos) = self.users.binary_search(&station) {
            self.users.insert(pos, station);
        }
    }

    /// Registered users in ascending station id order.
    pub fn users(&self) -> &[StationId] {
        &self.users
    }

    /// Lock the first satisfiable alternative.  An empty list always
    /// succeeds with alternative 0 and no delay.  On `None` nothing changed.
    pub fn try_acquire(&mut self, alternatives: &[Alternative], requester: StationId) -> Option<Acquired> {
        if alternatives.is_empty() {
            return Some(Acquired { alternative: 0, additional_ticks: 0 });
        }
        let index = alternatives.iter().position(|alt| self.satisfiable(alt))?;
        let mut additional_ticks = 0;
        for &(id, count) in alternatives[index].needs() {
            let g = id.index();
            self.locked[g] += count;
            if self.last_user[g].is_some_and(|u| u != requester) {
                additional_ticks = additional_ticks.max(Tick::ticks_for_secs(self.groups[g].changeover_secs));
            }
            self.last_user[g] = Some(requester);
        }
        trace!(%requester, alternative = index, additional_ticks, "resources acquired");
        Some(Acquired { alternative: index, additional_ticks })
    }

    /// Return the units of `alternatives[index]`.
    pub fn release(&mut self, alternatives: &[Alternative], index: usize, requester: StationId) -> ResourceResult<()> {
        if alternatives.is_empty() {
            return Ok(());
        }
        let alt = alternatives.get(index).ok_or(ResourceError::NoSuchAlternative(index))?;
        for &(id, count) in alt.needs() {
            let slot = self.locked.get_mut(id.index()).ok_or(ResourceError::UnknownGroup(id))?;
            debug_assert!(*slot >= count, "releasing more units than were locked");
            *slot = slot.saturating_sub(count);
        }
        trace!(%requester, alternative = index, "resources released");
        Ok(())
    }

    fn satisfiable(&self, alt: &Alternative) -> bool {
        alt.needs().iter().all(|&(id, count)| {
            self.group(id).is_some_and(|g| g.capacity - self.locked[id.index()] >= count)
        })
    }
}
