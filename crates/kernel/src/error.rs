//! Listing error types.

use thiserror::Error;

/// Errors raised while compiling, executing or denormalizing a listing.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("invalid filter '{field}': {reason}")]
    InvalidFilterSpec { field: String, reason: String },

    #[error("invalid sort '{field}': {reason}")]
    InvalidSortSpec { field: String, reason: String },

    #[error("statement execution failed: {0}")]
    StatementExecution(#[from] sqlx::Error),

    #[error("inconsistent {entity} row: {reason}")]
    DenormalizationInconsistency { entity: &'static str, reason: String },
}

impl ListingError {
    pub(crate) fn filter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilterSpec {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn sort(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSortSpec {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn inconsistent(entity: &'static str, reason: impl Into<String>) -> Self {
        Self::DenormalizationInconsistency {
            entity,
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the request rather than the server.
    ///
    /// Response layers map `true` to a 4xx status and `false` to a 5xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ListingError::InvalidFilterSpec { .. } | ListingError::InvalidSortSpec { .. }
        )
    }

    /// Short machine-readable kind, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ListingError::InvalidFilterSpec { .. } => "invalid_filter",
            ListingError::InvalidSortSpec { .. } => "invalid_sort",
            ListingError::StatementExecution(_) => "statement",
            ListingError::DenormalizationInconsistency { .. } => "denormalization",
        }
    }
}

/// Result type alias using ListingError.
pub type ListingResult<T> = Result<T, ListingError>;
