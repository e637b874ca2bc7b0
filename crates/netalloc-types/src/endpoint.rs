//! Endpoint records.

use crate::PortConfig;
use serde::{Deserialize, Serialize};

/// Desired published ports of a service, in user order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointSpec {
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

impl EndpointSpec {
    pub fn new(ports: Vec<PortConfig>) -> Self {
        Self { ports }
    }
}

/// Realized endpoint state of a service.
///
/// `spec` is the copy of the [`EndpointSpec`] that produced `ports`. The
/// realized descriptors alone cannot tell a user-fixed published port from a
/// dynamically chosen one; the retained spec can.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub spec: Option<EndpointSpec>,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

impl Endpoint {
    /// Creates an endpoint that has not been allocated yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an endpoint holding the result of an allocation.
    pub fn allocated(spec: Option<EndpointSpec>, ports: Vec<PortConfig>) -> Self {
        Self { spec, ports }
    }

    /// Returns true if the endpoint has no realized ports.
    pub fn is_unallocated(&self) -> bool {
        self.ports.is_empty()
    }
}
