//! Error types for port allocation.
//!
//! Every error is returned from [`Allocator::allocate`](crate::Allocator::allocate)
//! before any reservation is applied, so the caller only has to drop the
//! failed request.

use thiserror::Error;

/// Result type alias for port allocation.
pub type PortAllocResult<T> = Result<T, PortAllocError>;

/// Errors that can occur while computing a port allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortAllocError {
    /// The requested ports can never be satisfied as written: a port is out
    /// of range, or two descriptors claim the same published port.
    #[error("invalid spec: {message}")]
    InvalidSpec {
        /// Error message.
        message: String,
    },

    /// A fixed published port is held by another endpoint.
    #[error("resource {resource} {id} is in use")]
    ResourceInUse {
        /// Kind of resource (e.g., "port").
        resource: String,
        /// The conflicting resource identifier (e.g., "8080/tcp").
        id: String,
    },

    /// No free port is left in the dynamic range.
    #[error("resource {resource} is exhausted: {detail}")]
    ResourceExhausted {
        /// The exhausted resource pool.
        resource: String,
        /// Which part of the pool ran out.
        detail: String,
    },
}

impl PortAllocError {
    /// Creates an invalid spec error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Creates a resource in use error.
    pub fn resource_in_use(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::ResourceInUse {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Creates a resource exhausted error.
    pub fn resource_exhausted(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    /// Returns true if the same request may succeed later without the user
    /// changing the spec (another endpoint releases its ports).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PortAllocError::ResourceInUse { .. } | PortAllocError::ResourceExhausted { .. }
        )
    }
}
