use store::StoreError;
use thiserror::Error;

/// Errors that can occur during order engine operations.
///
/// The variants classify outcomes for the transport layer: validation
/// failures and conflicts are caller mistakes, `Store` is an internal
/// failure whose in-flight transaction has already been rolled back.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The order failed validation against the menu, stock, or customers.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not legal in the entity's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
