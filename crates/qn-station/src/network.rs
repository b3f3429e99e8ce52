//! `Network` and `NetworkBuilder`.
//!
//! # Build-time validation
//!
//! [`NetworkBuilder::build`] rejects, with a `QnError::Config` naming the
//! station:
//!
//! - edges to stations that do not exist, and stations that forward clients
//!   but have no outgoing edge;
//! - resource alternatives naming unknown groups or exceeding a capacity;
//! - per-kind inconsistencies (batch ranges, match queue count, pickup
//!   remotes, barrier all-signals rules, unknown client types or signals);
//! - expressions the evaluator's `check` refuses.
//!
//! Run-time code relies on all of the above.

use qn_core::{ClientTypeId, QnError, QnResult, ResourceGroupId, SignalId, StationId};
use qn_eval::{Calculator, Evaluator, Expression, TimeSource};
use qn_resource::{ResourceGroup, ResourcePool};
use tracing::debug;

use crate::{StationArena, StationInfo, StationKind};

// ── Network ───────────────────────────────────────────────────────────────────

/// Immutable model shared by all replications.
pub struct Network {
    stations:         Vec<StationKind>,
    resources:        ResourcePool,
    client_types:     Vec<String>,
    signals:          Vec<String>,
    signal_listeners: Vec<Vec<StationId>>,
    state_listeners:  Vec<StationId>,
}

impl Network {
    pub fn station(&self, id: StationId) -> QnResult<&StationKind> {
        self.stations.get(id.index()).ok_or(QnError::StationNotFound(id))
    }

    pub fn stations(&self) -> &[StationKind] {
        &self.stations
    }

    pub fn station_by_name(&self, name: &str) -> Option<StationId> {
        self.stations.iter().find(|s| s.name() == name).map(StationKind::id)
    }

    /// The resource pool in its initial state.  Each replication clones it.
    pub fn resources(&self) -> &ResourcePool {
        &self.resources
    }

    pub fn client_types(&self) -> &[String] {
        &self.client_types
    }

    /// Display name of a client type; the numeric id if none was declared.
    pub fn client_type_name(&self, ty: ClientTypeId) -> String {
        self.client_types
            .get(ty.index())
            .cloned()
            .unwrap_or_else(|| format!("type {}", ty.0))
    }

    pub fn signals(&self) -> &[String] {
        &self.signals
    }

    /// Barrier stations credited by `signal`.
    pub fn signal_listeners(&self, signal: SignalId) -> &[StationId] {
        self.signal_listeners.get(signal.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stations re-examined after every event.
    pub fn state_listeners(&self) -> &[StationId] {
        &self.state_listeners
    }

    /// Allocate the run-time data of every station for a new replication.
    pub fn new_arena(&self, calc: &mut Calculator<'_>) -> QnResult<StationArena> {
        let slots = self
            .stations
            .iter()
            .map(|s| s.init_data(calc))
            .collect::<QnResult<Vec<_>>>()?;
        Ok(StationArena::new(slots))
    }
}

// ── BuildCheck ────────────────────────────────────────────────────────────────

/// What a station may consult while validating itself.
pub struct BuildCheck<'a> {
    pub evaluator:    &'a dyn Evaluator,
    pub stations:     &'a [StationKind],
    pub resources:    &'a ResourcePool,
    pub client_types: usize,
    pub signals:      usize,
}

impl BuildCheck<'_> {
    pub fn error(&self, station: &StationInfo, message: impl std::fmt::Display) -> QnError {
        QnError::Config(format!("station \"{}\": {message}", station.name))
    }

    pub fn expression(&self, station: &StationInfo, expr: &Expression) -> QnResult<()> {
        self.evaluator
            .check(expr)
            .map_err(|e| self.error(station, format_args!("expression \"{expr}\": {e}")))
    }

    pub fn time_source(&self, station: &StationInfo, source: &TimeSource) -> QnResult<()> {
        match source {
            TimeSource::Expression(e) => self.expression(station, e),
            TimeSource::Distribution(_) => Ok(()),
        }
    }

    pub fn station(&self, station: &StationInfo, id: StationId) -> QnResult<&StationKind> {
        self.stations
            .get(id.index())
            .ok_or_else(|| self.error(station, format_args!("refers to unknown {id}")))
    }

    /// Client types are only checked when the builder declared some.
    pub fn client_type(&self, station: &StationInfo, ty: ClientTypeId) -> QnResult<()> {
        if self.client_types > 0 && ty.index() >= self.client_types {
            return Err(self.error(station, format_args!("unknown client type {}", ty.0)));
        }
        Ok(())
    }

    pub fn signal(&self, station: &StationInfo, signal: SignalId) -> QnResult<()> {
        if signal.index() >= self.signals {
            return Err(self.error(station, format_args!("unknown signal {}", signal.0)));
        }
        Ok(())
    }
}

// ── NetworkBuilder ────────────────────────────────────────────────────────────

/// Fluent builder for a [`Network`].
///
/// ```rust,ignore
/// let mut b = NetworkBuilder::new();
/// let clerk = b.resource_group(ResourceGroup::new("clerks", 2));
/// let src   = b.add(Source::new("arrivals", ClientTypeId(0), TimeSource::fixed(60.0)));
/// let desk  = b.add(Process::new("desk").service(TimeSource::fixed(45.0))
///                   .alternative(Alternative::new().need(clerk, 1)));
/// let exit  = b.add(Dispose::new("exit"));
/// b.connect(src, desk).connect(desk, exit);
/// let network = b.build(&SimpleEvaluator)?;
/// ```
#[derive(Default)]
pub struct NetworkBuilder {
    stations:     Vec<StationKind>,
    groups:       Vec<ResourceGroup>,
    client_types: Vec<String>,
    signals:      Vec<String>,
    errors:       Vec<String>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a station and return its id.
    pub fn add(&mut self, station: impl Into<StationKind>) -> StationId {
        let mut station = station.into();
        let id = StationId(self.stations.len() as u32);
        station.info_mut().id = id;
        self.stations.push(station);
        id
    }

    /// Set the outgoing edge of `from`.
    pub fn connect(&mut self, from: StationId, to: StationId) -> &mut Self {
        match self.stations.get_mut(from.index()) {
            Some(s) => s.info_mut().next = Some(to),
            None => self.errors.push(format!("edge from unknown {from}")),
        }
        self
    }

    /// Set the edge a service station uses for clients that reneged.
    pub fn connect_cancel(&mut self, from: StationId, to: StationId) -> &mut Self {
        match self.stations.get_mut(from.index()) {
            Some(StationKind::Process(p)) => p.cancel_next = Some(to),
            Some(other) => self
                .errors
                .push(format!("station \"{}\" has no cancel edge", other.name())),
            None => self.errors.push(format!("edge from unknown {from}")),
        }
        self
    }

    /// Declare a client type name.  Ids are assigned in declaration order.
    pub fn client_type(&mut self, name: impl Into<String>) -> ClientTypeId {
        self.client_types.push(name.into());
        ClientTypeId((self.client_types.len() - 1) as u16)
    }

    pub fn resource_group(&mut self, group: ResourceGroup) -> ResourceGroupId {
        self.groups.push(group);
        ResourceGroupId((self.groups.len() - 1) as u16)
    }

    /// Declare a signal, or return the id of an existing one with this name.
    pub fn signal(&mut self, name: impl Into<String>) -> SignalId {
        let name = name.into();
        let index = match self.signals.iter().position(|s| *s == name) {
            Some(i) => i,
            None => {
                self.signals.push(name);
                self.signals.len() - 1
            }
        };
        SignalId(index as u16)
    }

    pub fn build(self, evaluator: &dyn Evaluator) -> QnResult<Network> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(QnError::Config(first));
        }
        let mut resources = ResourcePool::new(self.groups)?;
        let stations = self.stations;

        let check = BuildCheck {
            evaluator,
            stations:     &stations,
            resources:    &resources,
            client_types: self.client_types.len(),
            signals:      self.signals.len(),
        };
        for station in &stations {
            let info = station.info();
            match info.next {
                Some(next) if next.index() >= stations.len() => {
                    return Err(check.error(info, format_args!("edge to unknown {next}")));
                }
                None if !matches!(station, StationKind::Dispose(_)) => {
                    return Err(check.error(info, "has no outgoing edge"));
                }
                _ => {}
            }
            if let StationKind::Process(p) = station {
                if let Some(cancel) = p.cancel_next {
                    check.station(info, cancel)?;
                }
            }
            resources
                .validate(station.alternatives())
                .map_err(|e| check.error(info, e))?;
            station.validate(&check)?;
        }

        let mut signal_listeners = vec![Vec::new(); self.signals.len()];
        let mut state_listeners = Vec::new();
        let mut users = Vec::new();
        for station in &stations {
            if !station.alternatives().is_empty() {
                users.push(station.id());
            }
            if station.listens_to_state() {
                state_listeners.push(station.id());
            }
            if let StationKind::Barrier(b) = station {
                for signal in b.signals() {
                    let list: &mut Vec<StationId> = &mut signal_listeners[signal.index()];
                    if !list.contains(&station.id()) {
                        list.push(station.id());
                    }
                }
            }
        }
        for id in users {
            resources.register_user(id);
        }

        debug!(stations = stations.len(), resource_groups = resources.group_count(), "network built");
        Ok(Network {
            stations,
            resources,
            client_types: self.client_types,
            signals: self.signals,
            signal_listeners,
            state_listeners,
        })
    }
}
