//! Error taxonomy shared by all core operations.
//!
//! Every variant is recoverable by the caller: refetch and retry on
//! [`ServiceError::ConcurrentModification`], surface the rest to the
//! end user. Core operations never swallow these.

use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid transition: {entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Account activation required")]
    ActivationRequired { invite_token: Option<String> },

    #[error("Duplicate dispatch: sales order {0} already has an active shipment")]
    DuplicateDispatch(Uuid),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Store error: {0}")]
    StoreError(StoreError),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        ServiceError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether a caller can expect a refetch-and-retry to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrentModification(_))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { id } => ServiceError::ConcurrentModification(id),
            StoreError::NotFound { collection, id } => {
                ServiceError::NotFound(format!("{collection} {id} not found"))
            }
            other => ServiceError::StoreError(other),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}
