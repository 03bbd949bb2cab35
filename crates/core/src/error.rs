use crate::types::DbId;

/// Domain errors for the reservation engine.
///
/// Every variant is returned synchronously to the request-driven caller;
/// the API layer decides the HTTP mapping.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Cannot {operation} while device is {status}")]
    InvalidState {
        operation: &'static str,
        status: &'static str,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{identity} already holds this device")]
    AlreadyHolder { identity: String },

    #[error("{identity} is already queued for this device")]
    AlreadyQueued { identity: String },

    #[error("{identity} is not queued for this device")]
    NotQueued { identity: String },

    #[error("{identity} already has an active share request for this device")]
    AlreadyRequested { identity: String },

    #[error("Share request already decided")]
    AlreadyDecided,

    #[error("Validation failed: {0}")]
    Validation(String),
}
