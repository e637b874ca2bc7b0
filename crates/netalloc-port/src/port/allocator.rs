//! Cluster port reservation table and allocation logic.

use super::compare::{ports_equal, ports_mostly_equal};
use super::proposal::Proposal;
use super::types::{ingress_keys, PortKey, MASTER_PORT_END};
use crate::config::{ConfigError, PortAllocatorConfig};
use crate::error::{PortAllocError, PortAllocResult};
use netalloc_types::{Endpoint, EndpointSpec, PortConfig, Protocol};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// The port allocator capability set.
///
/// Chooses published ports and keeps track of which ones are in use across
/// the cluster.
pub trait Allocator {
    /// Marks the realized ports of already allocated endpoints as in use.
    ///
    /// Meant to be called once at startup, before any other request. Performs
    /// no conflict detection.
    fn restore(&mut self, endpoints: &[Endpoint]);

    /// Computes the ports `endpoint` should hold for `spec`.
    ///
    /// Ports held by the endpoint but absent from the spec are released. A
    /// missing spec is treated as an empty one.
    fn allocate(
        &mut self,
        endpoint: &Endpoint,
        spec: Option<&EndpointSpec>,
    ) -> PortAllocResult<Proposal<'_>>;

    /// Computes the release of every port held by `endpoint`.
    fn deallocate(&mut self, endpoint: &Endpoint) -> Proposal<'_>;
}

/// Counters kept by a [`PortAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortAllocatorStats {
    /// Keys reserved by restore.
    pub restored: u64,
    /// Proposals committed that changed the reservation table.
    pub commits: u64,
    /// Proposals committed that left the reservation table unchanged.
    pub noop_commits: u64,
}

/// Tracks which `(protocol, published port)` pairs are in use cluster-wide.
///
/// There is one instance per manager process. It is created empty, restored
/// from the persisted endpoints, and only ever mutated through
/// [`Proposal::commit`].
#[derive(Debug, Default)]
pub struct PortAllocator {
    config: PortAllocatorConfig,
    ports: HashSet<PortKey>,
    stats: PortAllocatorStats,
}

impl PortAllocator {
    /// Creates an empty allocator using the default dynamic range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty allocator with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the dynamic range is invalid.
    pub fn with_config(config: PortAllocatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &PortAllocatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &PortAllocatorStats {
        &self.stats
    }

    /// Returns true if the published port is reserved for the protocol.
    pub fn is_reserved(&self, protocol: Protocol, port: u32) -> bool {
        self.ports.contains(&PortKey::new(protocol, port))
    }

    /// Returns the number of reserved ports across all protocols.
    pub fn reserved_count(&self) -> usize {
        self.ports.len()
    }

    /// Returns a sorted snapshot of all reserved ports.
    pub fn reserved_ports(&self) -> Vec<PortKey> {
        let mut keys: Vec<PortKey> = self.ports.iter().copied().collect();
        keys.sort();
        keys
    }

    pub(super) fn reserve(&mut self, key: PortKey) {
        self.ports.insert(key);
    }

    pub(super) fn release(&mut self, key: &PortKey) {
        self.ports.remove(key);
    }

    pub(super) fn record_commit(&mut self, noop: bool) {
        if noop {
            self.stats.noop_commits = self.stats.noop_commits.saturating_add(1);
        } else {
            self.stats.commits = self.stats.commits.saturating_add(1);
        }
    }

    /// Picks a free dynamic port for `protocol`.
    ///
    /// Scans the dynamic range in ascending order. When it is full, falls
    /// back to a dynamic port the same endpoint is giving up in this request,
    /// so an update that swaps ports can still succeed on a full cluster.
    fn pick_dynamic_port(
        &self,
        protocol: Protocol,
        allocate: &BTreeSet<PortKey>,
        deallocate: &BTreeSet<PortKey>,
    ) -> Option<PortKey> {
        let range = self.config.dynamic_range();

        range
            .clone()
            .map(|port| PortKey::new(protocol, port))
            .find(|key| !self.ports.contains(key) && !allocate.contains(key))
            .or_else(|| {
                deallocate.iter().copied().find(|key| {
                    key.protocol == protocol
                        && range.contains(&key.port)
                        && !allocate.contains(key)
                })
            })
    }
}

/// Returns the published port previously chosen for `wanted`, if the user
/// left it dynamic in both the old and the new spec.
///
/// The realized descriptor alone cannot tell whether its published port was
/// user-fixed, so the old spec must hold the same descriptor with a zero
/// published port. A port that moves from fixed to dynamic gets a fresh one.
fn recover_dynamic_port(endpoint: &Endpoint, wanted: &PortConfig) -> Option<u32> {
    let old_spec = endpoint.spec.as_ref()?;
    if !old_spec
        .ports
        .iter()
        .any(|old| ports_equal(Some(old), Some(wanted)))
    {
        return None;
    }

    endpoint
        .ports
        .iter()
        .rev()
        .find(|realized| ports_mostly_equal(Some(wanted), Some(realized)))
        .map(|realized| realized.published_port)
}

fn check_port_range(wanted: &PortConfig) -> PortAllocResult<()> {
    if wanted.published_port > MASTER_PORT_END {
        return Err(PortAllocError::invalid_spec(format!(
            "published port {} isn't in the valid port range",
            wanted.published_port
        )));
    }
    if wanted.target_port > MASTER_PORT_END {
        return Err(PortAllocError::invalid_spec(format!(
            "target port {} isn't in the valid port range",
            wanted.target_port
        )));
    }
    Ok(())
}

impl Allocator for PortAllocator {
    fn restore(&mut self, endpoints: &[Endpoint]) {
        // An unallocated endpoint has no realized ports, so everything found
        // here was validly allocated before. Specs are not consulted, they
        // only describe what the user wants.
        let before = self.ports.len();
        for endpoint in endpoints {
            self.ports.extend(ingress_keys(&endpoint.ports));
        }
        let restored = self.ports.len() - before;
        self.stats.restored = self.stats.restored.saturating_add(restored as u64);

        info!(
            "Restored {} port reservation(s) from {} endpoint(s)",
            restored,
            endpoints.len()
        );
    }

    fn allocate(
        &mut self,
        endpoint: &Endpoint,
        spec: Option<&EndpointSpec>,
    ) -> PortAllocResult<Proposal<'_>> {
        let wanted_ports: &[PortConfig] = spec.map(|s| s.ports.as_slice()).unwrap_or(&[]);

        // Build the final port list, recovering dynamically assigned ports
        // that the spec update did not touch.
        let mut final_ports = Vec::with_capacity(wanted_ports.len());
        for wanted in wanted_ports {
            check_port_range(wanted)?;

            let mut port = wanted.clone();
            if port.is_ingress() && port.is_dynamic() {
                if let Some(published) = recover_dynamic_port(endpoint, wanted) {
                    debug!("Recovered dynamic port {} for {}", published, wanted);
                    port.published_port = published;
                }
            }
            final_ports.push(port);
        }

        let deallocate: BTreeSet<PortKey> = ingress_keys(&endpoint.ports).collect();
        let mut allocate = BTreeSet::new();

        // Fixed ports first, so a dynamic pick can never take a port that a
        // later descriptor explicitly asks for.
        for port in final_ports
            .iter()
            .filter(|p| p.is_ingress() && !p.is_dynamic())
        {
            let key = PortKey::from(port);
            if self.ports.contains(&key) && !deallocate.contains(&key) {
                warn!("Published port {} is already in use", key);
                return Err(PortAllocError::resource_in_use("port", key.to_string()));
            }
            if !allocate.insert(key) {
                return Err(PortAllocError::invalid_spec(format!(
                    "published port {} is assigned to more than 1 port config",
                    key
                )));
            }
        }

        for port in final_ports
            .iter_mut()
            .filter(|p| p.is_ingress() && p.is_dynamic())
        {
            let protocol = port.protocol;
            let key = match self.pick_dynamic_port(protocol, &allocate, &deallocate) {
                Some(key) => key,
                None => {
                    warn!("Dynamic port space exhausted for protocol {}", protocol);
                    return Err(PortAllocError::resource_exhausted(
                        "dynamic port space",
                        format!("protocol {}", protocol),
                    ));
                }
            };
            port.published_port = key.port;
            allocate.insert(key);
        }

        debug!(
            "Proposed {} port(s): reserving {:?}, releasing {:?}",
            final_ports.len(),
            allocate,
            deallocate
        );

        Ok(Proposal::new(self, final_ports, allocate, deallocate))
    }

    fn deallocate(&mut self, endpoint: &Endpoint) -> Proposal<'_> {
        // host-mode ports were never reserved
        let deallocate: BTreeSet<PortKey> = ingress_keys(&endpoint.ports).collect();
        debug!("Proposed release of {} port(s)", deallocate.len());

        Proposal::new(self, Vec::new(), BTreeSet::new(), deallocate)
    }
}
