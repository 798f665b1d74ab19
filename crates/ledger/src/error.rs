//! Error taxonomy shared by every store-facing operation.

use thiserror::Error;

/// Errors that can occur during repository operations.
///
/// Store adapters classify their backend failures into these variants, so
/// callers can react the same way regardless of which store is in use.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A point lookup matched no row.
    #[error("not found")]
    NotFound,

    /// The store rejected a write because of a uniqueness, foreign-key or
    /// check constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The store could not be reached (connection, pool, TLS or I/O failure).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// An update or delete targeted an identity that affected zero rows.
    ///
    /// The in-memory view was stale; refresh to observe the persisted state.
    #[error("{entity} {id} no longer matches any persisted row")]
    Inconsistent {
        /// Kind of record that was targeted.
        entity: &'static str,
        /// Identity that matched nothing.
        id: i32,
    },

    /// Data in the store could not be decoded into its record type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Any other backend failure.
    #[error("database error: {0}")]
    Database(String),
}

impl RepositoryError {
    /// Build an [`RepositoryError::Inconsistent`] for a stale customer.
    #[must_use]
    pub const fn stale_customer(id: i32) -> Self {
        Self::Inconsistent {
            entity: "customer",
            id,
        }
    }

    /// Build an [`RepositoryError::Inconsistent`] for a stale order.
    #[must_use]
    pub const fn stale_order(id: i32) -> Self {
        Self::Inconsistent { entity: "order", id }
    }

    /// Whether this error means the requested row does not exist (anymore).
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound | Self::Inconsistent { .. })
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation() =>
            {
                let detail = db_err.constraint().map_or_else(
                    || db_err.message().to_owned(),
                    |constraint| format!("{constraint}: {}", db_err.message()),
                );
                Self::ConstraintViolation(detail)
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::StoreUnavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => Self::DataCorruption(err.to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}
