//! Error types for table handle operations.

use tablegate_model::StoreError;

/// Errors surfaced by a [`TableHandle`](crate::table::TableHandle).
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The existence probe failed for a reason other than a missing table.
    #[error("failed to probe table {table}: {source}")]
    Probe {
        /// The probed table.
        table: String,
        /// The store error returned by the probe.
        #[source]
        source: StoreError,
    },

    /// Creating or seeding the table failed after it was found absent.
    #[error("failed to provision table {table}: {source}")]
    Provisioning {
        /// The table being provisioned.
        table: String,
        /// The store error returned by creation or seeding.
        #[source]
        source: StoreError,
    },

    /// A key value required by the operation could not be determined.
    #[error("missing value for key attribute {attr}")]
    MissingKey {
        /// The key attribute name.
        attr: String,
    },

    /// A data operation failed in the store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TableError {
    /// Returns the underlying store error, if this error wraps one.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Probe { source, .. } | Self::Provisioning { source, .. } => Some(source),
            Self::Store(e) => Some(e),
            Self::MissingKey { .. } => None,
        }
    }
}

/// Convenience result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Convert an expression error into a store validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn expression_error_to_store(e: crate::memory::ExpressionError) -> StoreError {
    StoreError::validation(e.to_string())
}

/// Convert a storage error into a store validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn storage_error_to_store(e: crate::memory::StorageError) -> StoreError {
    StoreError::validation(e.to_string())
}
