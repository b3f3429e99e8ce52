//! The `Sim` struct: a validated network plus everything needed to start
//! replications of it.

use qn_core::SimConfig;
use qn_eval::{Evaluator, SimpleEvaluator};
use qn_station::{Network, StatisticsSink};

use crate::{NoopObserver, Replication, ReplicationSummary, SimResult};

/// A built simulation.  Create via [`SimBuilder`][crate::SimBuilder].
///
/// `Sim` itself is immutable; all run-time state lives in the
/// [`Replication`]s it hands out, so any number of them can run at once.
pub struct Sim<E: Evaluator = SimpleEvaluator> {
    /// Global configuration (seed, replication count, time limit, …).
    pub config: SimConfig,

    /// The validated station network.
    pub network: Network,

    /// Shared by every replication.
    pub evaluator: E,
}

impl<E: Evaluator> Sim<E> {
    /// Fresh state for replication `index`, seeded from `config.seed`.
    pub fn replication(&self, index: usize) -> Replication<'_, E> {
        Replication::new(index, &self.config, &self.network, &self.evaluator)
    }

    /// Run `config.replications` independent replications, each reporting
    /// into its own sink from `make_sink`.
    ///
    /// Results come back in replication order together with their sinks, so
    /// statistics flushed by an emergency shutdown are not lost.  With the
    /// `parallel` feature the replications run on Rayon's thread pool, sized
    /// by `config.num_threads`.
    pub fn run_replications<S, F>(&self, make_sink: F) -> SimResult<Vec<(S, SimResult<ReplicationSummary>)>>
    where
        S: StatisticsSink + Send,
        F: Fn(usize) -> S + Sync,
    {
        let run_one = |index: usize| {
            let mut sink = make_sink(index);
            let result = self.replication(index).run(&mut sink, &mut NoopObserver);
            (sink, result)
        };

        #[cfg(not(feature = "parallel"))]
        {
            Ok((0..self.config.replications).map(run_one).collect())
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let run_all = || (0..self.config.replications).into_par_iter().map(run_one).collect::<Vec<_>>();
            match self.config.num_threads {
                Some(n) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(n)
                        .build()
                        .map_err(|e| crate::SimError::Config(e.to_string()))?;
                    Ok(pool.install(run_all))
                }
                None => Ok(run_all()),
            }
        }
    }
}
