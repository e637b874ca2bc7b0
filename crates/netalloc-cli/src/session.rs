//! A restored allocator plus the cluster state it was restored from.

use anyhow::{Context, Result};
use netalloc_port::{
    already_allocated, ports_mostly_equal, Allocator, PortAllocator, PortAllocatorConfig, PortKey,
};
use netalloc_types::{Endpoint, EndpointSpec, PortConfig, Protocol};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, instrument, warn};

use crate::state::ClusterState;

/// How a reserved port got its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOrigin {
    /// Picked by the allocator because the spec left the published port at 0.
    Dynamic,
    /// Requested by the user in the spec.
    Fixed,
    /// The owning endpoint has no stored spec to tell.
    Unknown,
}

impl fmt::Display for PortOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortOrigin::Dynamic => write!(f, "dynamic"),
            PortOrigin::Fixed => write!(f, "fixed"),
            PortOrigin::Unknown => write!(f, "unknown"),
        }
    }
}

/// A reserved port together with the service holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedPort {
    pub key: PortKey,
    pub service: Option<String>,
    pub origin: PortOrigin,
}

/// Dynamic range usage of one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicUsage {
    pub protocol: Protocol,
    pub used: usize,
    pub capacity: usize,
}

/// Decides the origin of a realized port from the spec it was allocated
/// for. The port is dynamic when the matching spec descriptor asked for
/// published port 0.
fn port_origin(endpoint: &Endpoint, realized: &PortConfig) -> PortOrigin {
    let Some(spec) = &endpoint.spec else {
        return PortOrigin::Unknown;
    };
    let dynamic = spec
        .ports
        .iter()
        .any(|wanted| wanted.is_dynamic() && ports_mostly_equal(Some(wanted), Some(realized)));
    if dynamic {
        PortOrigin::Dynamic
    } else {
        PortOrigin::Fixed
    }
}

/// One run of the operator tool.
///
/// Holds the only allocator of the process, so requests are naturally
/// serialized.
pub struct Session {
    allocator: PortAllocator,
    state: ClusterState,
    dirty: bool,
}

impl Session {
    /// Builds an allocator from `config` and restores every endpoint in
    /// `state` into it.
    pub fn open(state: ClusterState, config: PortAllocatorConfig) -> Result<Self> {
        let mut allocator =
            PortAllocator::with_config(config).context("Failed to create port allocator")?;
        let endpoints: Vec<Endpoint> = state.endpoints.values().cloned().collect();
        allocator.restore(&endpoints);

        Ok(Self {
            allocator,
            state,
            dirty: false,
        })
    }

    pub fn allocator(&self) -> &PortAllocator {
        &self.allocator
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    /// Returns true if a committed request changed the state.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns every reserved port, sorted, optionally limited to one
    /// protocol.
    pub fn list(&self, protocol: Option<Protocol>) -> Vec<ReservedPort> {
        let mut owners: HashMap<PortKey, (&str, PortOrigin)> = HashMap::new();
        for (service, endpoint) in &self.state.endpoints {
            for port in endpoint.ports.iter().filter(|p| p.is_ingress()) {
                owners.insert(
                    PortKey::from(port),
                    (service.as_str(), port_origin(endpoint, port)),
                );
            }
        }

        self.allocator
            .reserved_ports()
            .into_iter()
            .filter(|key| protocol.map_or(true, |p| key.protocol == p))
            .map(|key| match owners.get(&key) {
                Some((service, origin)) => ReservedPort {
                    key,
                    service: Some(service.to_string()),
                    origin: *origin,
                },
                None => ReservedPort {
                    key,
                    service: None,
                    origin: PortOrigin::Unknown,
                },
            })
            .collect()
    }

    /// Counts the reserved ports of `protocol` inside the configured dynamic
    /// range, whatever their origin.
    pub fn dynamic_usage(&self, protocol: Protocol) -> DynamicUsage {
        let config = self.allocator.config();
        let used = config
            .dynamic_range()
            .filter(|port| self.allocator.is_reserved(protocol, *port))
            .count();
        DynamicUsage {
            protocol,
            used,
            capacity: config.dynamic_port_count(),
        }
    }

    /// Proposes ports for `service`. With `commit`, applies the proposal and
    /// stores the new endpoint.
    #[instrument(skip(self, spec))]
    pub fn allocate(
        &mut self,
        service: &str,
        spec: EndpointSpec,
        commit: bool,
    ) -> Result<Vec<PortConfig>> {
        let endpoint = self.state.endpoint(service);
        if already_allocated(Some(&endpoint), Some(&spec)) {
            info!("Service {} is already allocated", service);
            return Ok(endpoint.ports);
        }

        let proposal = self
            .allocator
            .allocate(&endpoint, Some(&spec))
            .with_context(|| format!("Failed to allocate ports for service {}", service))?;
        let ports = proposal.ports().to_vec();

        if commit {
            proposal.commit();
            self.state.endpoints.insert(
                service.to_string(),
                Endpoint::allocated(Some(spec), ports.clone()),
            );
            self.dirty = true;
            info!("Committed {} port(s) for service {}", ports.len(), service);
        }
        Ok(ports)
    }

    /// Proposes releasing every port of `service`. With `commit`, applies the
    /// proposal and forgets the service. Returns the released ports.
    #[instrument(skip(self))]
    pub fn deallocate(&mut self, service: &str, commit: bool) -> Result<Vec<PortKey>> {
        let Some(endpoint) = self.state.endpoints.get(service).cloned() else {
            warn!("Service {} has no stored endpoint", service);
            return Ok(Vec::new());
        };

        let proposal = self.allocator.deallocate(&endpoint);
        let released: Vec<PortKey> = proposal.released().copied().collect();

        if commit {
            proposal.commit();
            self.state.endpoints.remove(service);
            self.dirty = true;
            info!("Released {} port(s) of service {}", released.len(), service);
        }
        Ok(released)
    }

    /// Returns true if the stored endpoint of `service` already matches
    /// `spec`.
    pub fn check(&self, service: &str, spec: &EndpointSpec) -> bool {
        already_allocated(self.state.endpoints.get(service), Some(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn web_spec() -> EndpointSpec {
        EndpointSpec::new(vec![
            PortConfig::new("web", Protocol::Tcp, 80),
            PortConfig::new("admin", Protocol::Tcp, 8443).published(8443),
        ])
    }

    #[test]
    fn test_open_restores_state() {
        let mut state = ClusterState::default();
        state.endpoints.insert(
            "db".to_string(),
            Endpoint::allocated(
                None,
                vec![PortConfig::new("pg", Protocol::Tcp, 5432).published(5432)],
            ),
        );

        let session = Session::open(state, PortAllocatorConfig::default()).unwrap();
        assert_eq!(
            session.list(None),
            vec![ReservedPort {
                key: PortKey::new(Protocol::Tcp, 5432),
                service: Some("db".to_string()),
                origin: PortOrigin::Unknown,
            }]
        );
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_list_origin_follows_stored_spec() {
        let mut session =
            Session::open(ClusterState::default(), PortAllocatorConfig::default()).unwrap();
        // a user-chosen port inside the dynamic range is still fixed
        let spec = EndpointSpec::new(vec![
            PortConfig::new("web", Protocol::Tcp, 80).published(31000),
            PortConfig::new("api", Protocol::Tcp, 8080),
            PortConfig::new("dns", Protocol::Udp, 53).published(53),
        ]);
        session.allocate("web", spec, true).unwrap();

        let listed: Vec<(String, PortOrigin)> = session
            .list(None)
            .into_iter()
            .map(|r| (r.key.to_string(), r.origin))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("30000/tcp".to_string(), PortOrigin::Dynamic),
                ("31000/tcp".to_string(), PortOrigin::Fixed),
                ("53/udp".to_string(), PortOrigin::Fixed),
            ]
        );

        let udp = session.list(Some(Protocol::Udp));
        assert_eq!(udp.len(), 1);
        assert_eq!(udp[0].service.as_deref(), Some("web"));
    }

    #[test]
    fn test_dynamic_usage_uses_configured_range() {
        let config = PortAllocatorConfig::default().with_dynamic_range(30000, 30009);
        let mut session = Session::open(ClusterState::default(), config).unwrap();
        let spec = EndpointSpec::new(vec![
            PortConfig::new("web", Protocol::Tcp, 80),
            PortConfig::new("admin", Protocol::Tcp, 81).published(30005),
            PortConfig::new("outside", Protocol::Tcp, 82).published(31000),
        ]);
        session.allocate("web", spec, true).unwrap();

        assert_eq!(
            session.dynamic_usage(Protocol::Tcp),
            DynamicUsage {
                protocol: Protocol::Tcp,
                used: 2,
                capacity: 10,
            }
        );
        assert_eq!(session.dynamic_usage(Protocol::Udp).used, 0);
    }

    #[test]
    fn test_allocate_dry_run_keeps_state() {
        let mut session =
            Session::open(ClusterState::default(), PortAllocatorConfig::default()).unwrap();

        let ports = session.allocate("web", web_spec(), false).unwrap();
        assert_eq!(ports[0].published_port, 30000);
        assert_eq!(ports[1].published_port, 8443);
        assert!(session.list(None).is_empty());
        assert!(session.state().endpoints.is_empty());
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_allocate_commit_then_check() {
        let mut session =
            Session::open(ClusterState::default(), PortAllocatorConfig::default()).unwrap();

        let ports = session.allocate("web", web_spec(), true).unwrap();
        assert!(session.is_dirty());
        assert!(session.check("web", &web_spec()));
        assert_eq!(session.allocator().reserved_count(), 2);

        // second identical request is short-circuited
        let again = session.allocate("web", web_spec(), true).unwrap();
        assert_eq!(again, ports);
        assert_eq!(session.allocator().stats().commits, 1);
    }

    #[test]
    fn test_allocate_conflict() {
        let mut session =
            Session::open(ClusterState::default(), PortAllocatorConfig::default()).unwrap();
        session.allocate("web", web_spec(), true).unwrap();

        let err = session.allocate("other", web_spec(), true).unwrap_err();
        assert!(err.to_string().contains("service other"));
        assert!(!session.state().endpoints.contains_key("other"));
    }

    #[test]
    fn test_deallocate() {
        let mut session =
            Session::open(ClusterState::default(), PortAllocatorConfig::default()).unwrap();
        session.allocate("web", web_spec(), true).unwrap();

        assert!(session.deallocate("missing", true).unwrap().is_empty());

        let released = session.deallocate("web", true).unwrap();
        assert_eq!(
            released,
            vec![
                PortKey::new(Protocol::Tcp, 8443),
                PortKey::new(Protocol::Tcp, 30000),
            ]
        );
        assert!(session.list(None).is_empty());
        assert!(!session.check("web", &web_spec()));
    }
}
