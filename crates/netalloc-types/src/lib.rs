//! Cluster endpoint types consumed by the netalloc allocators.
//!
//! These records describe what a service wants published and what it was
//! actually given:
//!
//! - [`Protocol`]: Transport protocol of a published port
//! - [`PublishMode`]: Whether a port goes through the ingress mesh or the host
//! - [`PortConfig`]: A single port descriptor
//! - [`EndpointSpec`]: Desired ports of a service
//! - [`Endpoint`]: Realized ports of a service plus the spec that produced them

mod endpoint;
mod port;

pub use endpoint::{Endpoint, EndpointSpec};
pub use port::{PortConfig, Protocol, PublishMode};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),
}
