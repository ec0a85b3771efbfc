//! Error types shared across the core pipelines.

use thiserror::Error;

/// Failures raised by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Content type ids become table names, so they are validated first.
    #[error("invalid table name {0:?}")]
    InvalidTableName(String),

    #[error("payload encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Failures surfaced by a delta-sync or locales endpoint.
#[derive(Error, Debug)]
pub enum SyncApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Entry-level materialization failures. Field-level problems never end up
/// here, they are reported through [`crate::materializer::FieldOutcome`].
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("payload has no sys.id")]
    MissingId,

    #[error("entry {0} has no sys.contentType.sys.id")]
    MissingContentType(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Problems with a single field value of a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("unknown link type {0:?}")]
    UnknownLinkType(String),

    #[error("link has no sys.id")]
    MalformedLink,
}

/// Raised while rendering generated model accessors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("Unknown Array items type \"{0}\"")]
    UnknownLinkType(String),
}

/// Failures of the locale sync job.
#[derive(Error, Debug)]
pub enum LocaleSyncError {
    #[error(transparent)]
    Api(#[from] SyncApiError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
