//! Transport-level errors from the remote railway service

use rail_tikit_core::BookingError;
use thiserror::Error;

/// Errors that can occur when talking to the railway service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No response within the request timeout; the call may have been applied
    #[error("{operation} timed out")]
    Timeout {
        /// Call that timed out
        operation: &'static str,
    },

    /// Connection failed or was dropped
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// Credential missing, expired or rejected (401/403)
    #[error("unauthorized")]
    Unauthorized,

    /// Refused against current inventory or booking state (409)
    #[error("conflict: {reason}")]
    Conflict {
        /// Reason reported by the service
        reason: String,
    },

    /// Payment refused by the provider (402)
    #[error("payment declined: {reason}")]
    PaymentDeclined {
        /// Decline reason
        reason: String,
    },

    /// Resource does not exist (404)
    #[error("{resource} not found")]
    NotFound {
        /// What was looked up
        resource: String,
    },

    /// Any other non-success status
    #[error("service returned {status}: {reason}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Reason reported by the service
        reason: String,
    },

    /// Response body could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Whether the same call may succeed if simply repeated
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unreachable(_) => true,
            Self::Rejected { status, .. } => Self::transient_status(*status),
            _ => false,
        }
    }

    /// Statuses that say nothing about whether the call took effect:
    /// server errors, request timeout (408) and rate limiting (429)
    #[must_use]
    pub const fn transient_status(status: u16) -> bool {
        status >= 500 || status == 408 || status == 429
    }
}

impl From<ServiceError> for BookingError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Unauthorized => Self::Unauthorized,
            ServiceError::Conflict { reason } => Self::Conflict { reason },
            ServiceError::PaymentDeclined { reason } => Self::PaymentDeclined { reason },
            ServiceError::NotFound { resource } => Self::NotFound { resource },
            ServiceError::Rejected { status, reason } if !ServiceError::transient_status(status) => {
                Self::Conflict { reason }
            }
            other @ (ServiceError::Timeout { .. }
            | ServiceError::Unreachable(_)
            | ServiceError::Rejected { .. }
            | ServiceError::InvalidResponse(_)) => Self::unavailable(other.to_string()),
        }
    }
}
