use domain::VariantId;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional stock decrement found fewer units than requested.
    #[error("Stock conflict for variant {variant_id}: fewer than {requested} units left")]
    StockConflict {
        variant_id: VariantId,
        requested: u32,
    },

    /// A row that an update targeted does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The store could not complete the operation; retrying may succeed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be converted to or from its domain type.
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the failure is transient (contention, lost
    /// connection, injected outage) and the whole unit of work may be
    /// retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::StockConflict { .. } | StoreError::Unavailable(_) => true,
            StoreError::Database(err) => is_transient_database_error(err),
            StoreError::NotFound { .. }
            | StoreError::InvalidValue(_)
            | StoreError::Migration(_) => false,
        }
    }
}

/// SQLSTATE codes PostgreSQL uses for failures that a retry can resolve.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const QUERY_CANCELED: &str = "57014";

fn is_transient_database_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE | QUERY_CANCELED)
        ),
        _ => false,
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
