//! Port reservation keys and port range constants.

use netalloc_types::{PortConfig, Protocol};
use std::fmt;

/// Start of the range searched when the user did not specify a published
/// port.
pub const DYNAMIC_PORT_START: u32 = 30000;

/// End (inclusive) of the range searched when the user did not specify a
/// published port.
pub const DYNAMIC_PORT_END: u32 = 32767;

/// Highest valid published or target port.
pub const MASTER_PORT_END: u32 = 65535;

/// The unit of reservation: one port number in one protocol's port space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortKey {
    pub protocol: Protocol,
    pub port: u32,
}

impl PortKey {
    pub const fn new(protocol: Protocol, port: u32) -> Self {
        Self { protocol, port }
    }
}

impl From<&PortConfig> for PortKey {
    fn from(config: &PortConfig) -> Self {
        Self::new(config.protocol, config.published_port)
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// Yields the reservation key of every ingress-mode port in `ports`.
pub(super) fn ingress_keys(ports: &[PortConfig]) -> impl Iterator<Item = PortKey> + '_ {
    ports
        .iter()
        .filter(|p| p.is_ingress())
        .map(PortKey::from)
}
