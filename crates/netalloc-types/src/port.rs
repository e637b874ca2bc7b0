//! Port descriptor definitions.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport protocol of a published port.
///
/// Each protocol has its own port space: `8080/tcp` and `8080/udp` are
/// distinct reservations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
    /// SCTP.
    Sctp,
}

impl Protocol {
    /// Every protocol, each with its own port space.
    pub const ALL: [Protocol; 3] = [Protocol::Tcp, Protocol::Udp, Protocol::Sctp];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            _ => Err(ParseError::InvalidProtocol(s.to_string())),
        }
    }
}

/// How a published port is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Routed through the cluster routing mesh. The published port is
    /// reserved cluster-wide (default).
    #[default]
    Ingress,
    /// Bound directly on the node running the task. Owned by the host, not
    /// by the cluster port pool.
    Host,
}

impl PublishMode {
    /// Returns true if this is ingress mode.
    pub const fn is_ingress(&self) -> bool {
        matches!(self, PublishMode::Ingress)
    }
}

impl fmt::Display for PublishMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishMode::Ingress => write!(f, "ingress"),
            PublishMode::Host => write!(f, "host"),
        }
    }
}

/// A single port descriptor of a service endpoint.
///
/// Port numbers are kept as `u32` so that out-of-range user input survives
/// deserialization and can be rejected by the allocator with a proper error.
///
/// # Examples
///
/// ```
/// use netalloc_types::{PortConfig, Protocol};
///
/// let port = PortConfig::new("http", Protocol::Tcp, 80).published(8080);
/// assert_eq!(port.published_port, 8080);
/// assert!(port.is_ingress());
/// assert!(!port.is_dynamic());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PortConfig {
    /// Optional user-facing name of the port.
    #[serde(default)]
    pub name: String,
    /// Transport protocol.
    #[serde(default)]
    pub protocol: Protocol,
    /// Port inside the container.
    #[serde(default)]
    pub target_port: u32,
    /// Externally visible port. Zero asks the allocator to pick one.
    #[serde(default)]
    pub published_port: u32,
    /// Ingress or host publishing.
    #[serde(default)]
    pub publish_mode: PublishMode,
}

impl PortConfig {
    /// Creates an ingress port descriptor with no published port.
    pub fn new(name: impl Into<String>, protocol: Protocol, target_port: u32) -> Self {
        Self {
            name: name.into(),
            protocol,
            target_port,
            published_port: 0,
            publish_mode: PublishMode::Ingress,
        }
    }

    /// Sets the published port.
    pub fn published(mut self, port: u32) -> Self {
        self.published_port = port;
        self
    }

    /// Switches the descriptor to host publish mode.
    pub fn host_mode(mut self) -> Self {
        self.publish_mode = PublishMode::Host;
        self
    }

    /// Returns true if the port is published through the ingress mesh.
    pub const fn is_ingress(&self) -> bool {
        self.publish_mode.is_ingress()
    }

    /// Returns true if the published port is left to the allocator.
    pub const fn is_dynamic(&self) -> bool {
        self.published_port == 0
    }
}

impl fmt::Display for PortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}/{} ({})",
            self.name, self.published_port, self.target_port, self.protocol, self.publish_mode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_protocol_parse() {
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("sctp".parse::<Protocol>().unwrap(), Protocol::Sctp);
        assert_eq!(
            "icmp".parse::<Protocol>(),
            Err(ParseError::InvalidProtocol("icmp".to_string()))
        );
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
        assert_eq!(Protocol::Sctp.to_string(), "sctp");
    }

    #[test]
    fn test_publish_mode() {
        assert_eq!(PublishMode::default(), PublishMode::Ingress);
        assert!(PublishMode::Ingress.is_ingress());
        assert!(!PublishMode::Host.is_ingress());
        assert_eq!(PublishMode::Host.to_string(), "host");
    }

    #[test]
    fn test_port_config_builder() {
        let port = PortConfig::new("dns", Protocol::Udp, 53).host_mode();
        assert_eq!(port.name, "dns");
        assert_eq!(port.target_port, 53);
        assert!(port.is_dynamic());
        assert!(!port.is_ingress());
    }

    #[test]
    fn test_port_config_serde_defaults() {
        let port: PortConfig = serde_json::from_str(r#"{"target_port": 80}"#).unwrap();
        assert_eq!(port, PortConfig::new("", Protocol::Tcp, 80));

        let port: PortConfig = serde_json::from_str(
            r#"{"name":"web","protocol":"udp","target_port":80,"published_port":65536,"publish_mode":"host"}"#,
        )
        .unwrap();
        assert_eq!(port.published_port, 65536);
        assert_eq!(port.publish_mode, PublishMode::Host);
    }
}
