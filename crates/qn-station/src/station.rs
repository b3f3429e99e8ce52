//! The `Station` trait — the arrival/leave protocol every station kind implements.

use qn_core::{ClientId, QnError, QnResult, SignalId, StationId};
use qn_eval::Calculator;
use qn_resource::Alternative;

use crate::{BuildCheck, RunContext};

/// Identity and default outgoing edge of a station.
#[derive(Clone, Debug, PartialEq)]
pub struct StationInfo {
    pub id:   StationId,
    pub name: String,
    /// Successor; assigned by `NetworkBuilder::connect`.
    pub next: Option<StationId>,
}

impl StationInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: StationId::INVALID, name: name.into(), next: None }
    }

    /// The successor, or [`QnError::NoSuccessor`].
    pub fn successor(&self) -> QnResult<StationId> {
        self.next.ok_or(QnError::NoSuccessor(self.id))
    }
}

/// A station kind.
///
/// Configuration lives in `self` and is shared by every replication.  All
/// mutable run-time state lives in [`Self::Data`], which the replication
/// allocates up front (one value per station) and hands to each callback.
///
/// # Required methods
///
/// [`info`][Self::info], [`init_data`][Self::init_data] and
/// [`on_arrival`][Self::on_arrival].  Every other hook has a default: a
/// station that does not wait for anything forwards in `on_leave` and ignores
/// notifications.
pub trait Station {
    type Data;

    fn info(&self) -> &StationInfo;

    /// Build this station's run-time data for a new replication.
    fn init_data(&self, calc: &mut Calculator<'_>) -> QnResult<Self::Data>;

    /// Called when the network is built.  Reject inconsistent configuration
    /// with [`QnError::Config`].
    fn validate(&self, _check: &BuildCheck<'_>) -> QnResult<()> {
        Ok(())
    }

    /// Called once per replication before the first event.
    fn on_start(&self, _data: &mut Self::Data, _ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        Ok(())
    }

    /// A client arrived from an edge, or with `None`, a re-check the station
    /// scheduled for itself is due.
    fn on_arrival(
        &self,
        data:   &mut Self::Data,
        client: Option<ClientId>,
        ctx:    &mut RunContext<'_, '_>,
    ) -> QnResult<()>;

    /// The client's stay ended.  Called exactly once per scheduled leave.
    fn on_leave(&self, _data: &mut Self::Data, client: ClientId, ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        let info = self.info();
        ctx.forward(info.id, info.successor()?, client)
    }

    /// A per-client timer scheduled by this station fired.
    fn on_timer(&self, _data: &mut Self::Data, _client: ClientId, _ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        Ok(())
    }

    fn on_signal(&self, _data: &mut Self::Data, _signal: SignalId, _ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        Ok(())
    }

    /// Resources were returned to the pool; try to start waiting work.
    fn on_resources_released(&self, _data: &mut Self::Data, _ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        Ok(())
    }

    /// Resource alternatives this station acquires, in preference order.
    fn alternatives(&self) -> &[Alternative] {
        &[]
    }

    /// Primary key when several stations compete for released resources.
    fn resource_priority(&self, _data: &mut Self::Data, _ctx: &mut RunContext<'_, '_>) -> QnResult<f64> {
        Ok(1.0)
    }

    /// Tiebreak: the best score among this station's waiting clients.
    fn secondary_resource_priority(&self, _data: &mut Self::Data, _ctx: &mut RunContext<'_, '_>) -> QnResult<f64> {
        Ok(0.0)
    }

    /// Called after every processed event if the station registered as a
    /// state listener.
    fn on_state_change(&self, _data: &mut Self::Data, _ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        Ok(())
    }

    /// Whether [`on_state_change`][Self::on_state_change] must be called.
    fn listens_to_state(&self) -> bool {
        false
    }

    /// Hand the next waiting client to a pickup station, if allowed.
    fn take_for_pickup(&self, _data: &mut Self::Data, _ctx: &mut RunContext<'_, '_>) -> QnResult<Option<ClientId>> {
        Ok(None)
    }

    /// Whether this station can serve as a pickup remote.
    fn supports_pickup(&self) -> bool {
        false
    }

    /// Empty every waiting structure, booking the partial waiting times.
    /// Used by the emergency shutdown.
    fn flush(&self, _data: &mut Self::Data, _ctx: &mut RunContext<'_, '_>) -> QnResult<()> {
        Ok(())
    }

    /// Number of clients currently waiting here.
    fn waiting(&self, _data: &Self::Data) -> usize {
        0
    }
}
