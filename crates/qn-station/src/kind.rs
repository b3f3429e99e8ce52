//! `StationKind` and `StationData` — the closed set of station variants and
//! their per-replication state, plus the `StationArena` that holds the state.

use qn_core::{ClientId, QnError, QnResult, SignalId, StationId};
use qn_eval::Calculator;
use qn_resource::Alternative;

use crate::{
    Barrier, Batch, BatchMulti, BuildCheck, Dispose, Hold, Match, Pickup, Process, RunContext,
    Separate, SignalStation, Source, Station, StationInfo,
};

/// Generates `StationKind`, `StationData` and the forwarding methods from one
/// variant list so the two enums cannot drift apart.
macro_rules! station_kinds {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Every station kind of a network.
        pub enum StationKind {
            $($variant($ty)),*
        }

        /// Run-time data of one station, tagged like [`StationKind`].
        #[derive(Default)]
        pub enum StationData {
            /// Placeholder while the data is lent to a callback.
            #[default]
            Vacant,
            $($variant(<$ty as Station>::Data)),*
        }

        $(
            impl From<$ty> for StationKind {
                fn from(station: $ty) -> Self {
                    StationKind::$variant(station)
                }
            }
        )*

        impl StationKind {
            pub fn info(&self) -> &StationInfo {
                match self { $(StationKind::$variant(s) => s.info()),* }
            }

            pub(crate) fn info_mut(&mut self) -> &mut StationInfo {
                match self { $(StationKind::$variant(s) => &mut s.info),* }
            }

            /// Short name of the variant, for messages.
            pub fn kind_name(&self) -> &'static str {
                match self { $(StationKind::$variant(_) => stringify!($variant)),* }
            }

            pub fn init_data(&self, calc: &mut Calculator<'_>) -> QnResult<StationData> {
                match self { $(StationKind::$variant(s) => Ok(StationData::$variant(s.init_data(calc)?))),* }
            }

            pub fn validate(&self, check: &BuildCheck<'_>) -> QnResult<()> {
                match self { $(StationKind::$variant(s) => s.validate(check)),* }
            }

            pub fn alternatives(&self) -> &[Alternative] {
                match self { $(StationKind::$variant(s) => s.alternatives()),* }
            }

            pub fn listens_to_state(&self) -> bool {
                match self { $(StationKind::$variant(s) => s.listens_to_state()),* }
            }

            pub fn supports_pickup(&self) -> bool {
                match self { $(StationKind::$variant(s) => s.supports_pickup()),* }
            }

            pub fn waiting(&self, data: &StationData) -> usize {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.waiting(d),)*
                    _ => 0,
                }
            }

            pub fn on_start(&self, data: &mut StationData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.on_start(d, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn on_arrival(
                &self,
                data:   &mut StationData,
                client: Option<ClientId>,
                ctx:    &mut RunContext<'_, '_>,
            ) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.on_arrival(d, client, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn on_leave(&self, data: &mut StationData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.on_leave(d, client, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn on_timer(&self, data: &mut StationData, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.on_timer(d, client, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn on_signal(&self, data: &mut StationData, signal: SignalId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.on_signal(d, signal, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn on_resources_released(&self, data: &mut StationData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.on_resources_released(d, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn resource_priority(&self, data: &mut StationData, ctx: &mut RunContext<'_, '_>) -> QnResult<f64> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.resource_priority(d, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn secondary_resource_priority(&self, data: &mut StationData, ctx: &mut RunContext<'_, '_>) -> QnResult<f64> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.secondary_resource_priority(d, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn on_state_change(&self, data: &mut StationData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.on_state_change(d, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn take_for_pickup(&self, data: &mut StationData, ctx: &mut RunContext<'_, '_>) -> QnResult<Option<ClientId>> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.take_for_pickup(d, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }

            pub fn flush(&self, data: &mut StationData, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
                match (self, data) {
                    $((StationKind::$variant(s), StationData::$variant(d)) => s.flush(d, ctx),)*
                    _ => Err(self.mismatch()),
                }
            }
        }
    };
}

station_kinds! {
    Source(Source),
    Process(Process),
    Batch(Batch),
    BatchMulti(BatchMulti),
    Match(Match),
    Pickup(Pickup),
    Barrier(Barrier),
    Hold(Hold),
    Signal(SignalStation),
    Separate(Separate),
    Dispose(Dispose),
}

impl StationKind {
    #[inline]
    pub fn id(&self) -> StationId {
        self.info().id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.info().name
    }

    fn mismatch(&self) -> QnError {
        QnError::StationDataMismatch(self.id())
    }
}

impl StationData {
    /// Whether a pickup station may not take clients from this station right
    /// now.  A vacant slot means the station is inside one of its own
    /// callbacks, which counts as locked.
    pub fn locked_for_pickup(&self) -> bool {
        match self {
            StationData::Vacant => true,
            StationData::Process(d) => d.locked_for_pickup,
            StationData::Hold(d) => d.locked_for_pickup,
            _ => false,
        }
    }
}

// ── StationArena ──────────────────────────────────────────────────────────────

/// Run-time data of every station of one replication, indexed by `StationId`.
pub struct StationArena {
    slots: Vec<StationData>,
}

impl StationArena {
    pub fn new(slots: Vec<StationData>) -> Self {
        Self { slots }
    }

    /// Lend out the data of `id`, leaving [`StationData::Vacant`] behind.
    pub fn take(&mut self, id: StationId) -> QnResult<StationData> {
        let slot = self.slots.get_mut(id.index()).ok_or(QnError::StationNotFound(id))?;
        match std::mem::take(slot) {
            StationData::Vacant => Err(QnError::StationDataMismatch(id)),
            data => Ok(data),
        }
    }

    pub fn restore(&mut self, id: StationId, data: StationData) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = data;
        }
    }

    pub fn get(&self, id: StationId) -> Option<&StationData> {
        self.slots.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
