use qn_core::QnError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation configuration error: {0}")]
    Config(String),

    /// A non-fatal framework error, e.g. a network that failed to build.
    #[error(transparent)]
    Model(#[from] QnError),

    /// A fatal run-time error; queues were flushed and every live client
    /// disposed before the replication returned.
    #[error("replication {replication} ended in an emergency shutdown: {cause}")]
    EmergencyShutdown {
        replication: usize,
        #[source]
        cause:       QnError,
    },
}

pub type SimResult<T> = Result<T, SimError>;
