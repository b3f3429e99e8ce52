use qn_core::{QnError, ResourceGroupId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResourceError {
    #[error("unknown resource group {0}")]
    UnknownGroup(ResourceGroupId),

    #[error("alternative needs {needed} units of \"{group}\" but its capacity is {capacity}")]
    ExceedsCapacity {
        group:    String,
        needed:   u32,
        capacity: u32,
    },

    #[error("alternative {0} does not exist")]
    NoSuchAlternative(usize),

    #[error("duplicate resource group name \"{0}\"")]
    DuplicateName(String),
}

pub type ResourceResult<T> = Result<T, ResourceError>;

impl From<ResourceError> for QnError {
    fn from(e: ResourceError) -> Self {
        QnError::Config(e.to_string())
    }
}
