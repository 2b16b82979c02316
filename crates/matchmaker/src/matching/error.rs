use super::repository::StorageError;

/// Rejected intake payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntakeError {
    #[error("entity id must not be blank")]
    BlankId,
    #[error("embedding has {actual} dimensions, expected {expected}")]
    EmbeddingDimension { expected: usize, actual: usize },
    #[error("embedding contains non-finite values")]
    NonFiniteEmbedding,
}

/// Failure of a matching request. Notification failures never appear here.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error("storage read failed: {0}")]
    StorageRead(#[source] StorageError),
    #[error("storage write failed: {0}")]
    StorageWrite(#[source] StorageError),
    #[error("entity {0} not found")]
    UnknownEntity(String),
    #[error("batch threshold must be within [0, 1] (got {0})")]
    InvalidThreshold(f64),
}
