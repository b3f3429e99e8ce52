//! Fluent builder for constructing a [`Sim`].

use qn_core::SimConfig;
use qn_eval::{Evaluator, SimpleEvaluator};
use qn_station::NetworkBuilder;
use tracing::debug;

use crate::{Sim, SimError, SimResult};

/// Fluent builder for [`Sim<E>`].
///
/// # Required inputs
///
/// - [`SimConfig`] — seed, replication count, time limit, …
/// - [`NetworkBuilder`] — stations, edges, resource groups and signals
///
/// # Optional inputs (have defaults)
///
/// | Method            | Default             |
/// |-------------------|---------------------|
/// | `.evaluator(e)`   | [`SimpleEvaluator`] |
///
/// # Example
///
/// ```rust,ignore
/// let mut net = NetworkBuilder::new();
/// let desk = net.add(Process::new("desk").service(TimeSource::fixed(30.0)));
/// let exit = net.add(Dispose::new("exit"));
/// net.connect(desk, exit);
///
/// let sim = SimBuilder::new(config, net).build()?;
/// let summary = sim.replication(0).run(&mut NoopSink, &mut NoopObserver)?;
/// ```
pub struct SimBuilder<E: Evaluator = SimpleEvaluator> {
    config:    SimConfig,
    network:   NetworkBuilder,
    evaluator: E,
}

impl SimBuilder<SimpleEvaluator> {
    pub fn new(config: SimConfig, network: NetworkBuilder) -> Self {
        Self { config, network, evaluator: SimpleEvaluator::new() }
    }
}

impl<E: Evaluator> SimBuilder<E> {
    /// Replace the expression evaluator.  It also checks every expression
    /// while the network is built.
    pub fn evaluator<F: Evaluator>(self, evaluator: F) -> SimBuilder<F> {
        SimBuilder { config: self.config, network: self.network, evaluator }
    }

    /// Validate the configuration, build and validate the network, and return
    /// a ready-to-run [`Sim`].
    pub fn build(self) -> SimResult<Sim<E>> {
        if self.config.replications == 0 {
            return Err(SimError::Config("at least one replication is required".into()));
        }
        if self.config.num_threads == Some(0) {
            return Err(SimError::Config("num_threads must be at least 1".into()));
        }

        let network = self.network.build(&self.evaluator)?;
        debug!(
            stations = network.stations().len(),
            resource_groups = network.resources().group_count(),
            signals = network.signals().len(),
            "network built"
        );
        Ok(Sim { config: self.config, network, evaluator: self.evaluator })
    }
}
