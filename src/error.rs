use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed to {database}: {cause}")]
    ConnectionFailed { database: String, cause: String },

    #[error("Migration failed at revision {revision}: {cause}")]
    MigrationFailed { revision: String, cause: String },

    #[error("Unknown revision: {revision}")]
    RevisionNotFound { revision: String },

    #[error("Revision {revision} is not applied")]
    RevisionNotApplied { revision: String },

    #[error("Checksum mismatch for revision {revision}: stored={stored}, computed={computed}")]
    ChecksumMismatch {
        revision: String,
        stored: String,
        computed: String,
    },

    #[error("Invalid revision history: {cause}")]
    InvalidHistory { cause: String },

    #[error("Invalid schema: {cause}")]
    InvalidSchema { cause: String },

    #[error("Query failed on {table}: {cause}")]
    QueryFailed { table: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        StoreError::Internal(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StoreError::Internal(format!("Pool error: {}", err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
