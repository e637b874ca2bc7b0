//! Cluster-wide published port allocation.
//!
//! This crate decides which published ports every service endpoint in the
//! cluster may use, so that no two endpoints ever hold the same
//! `(protocol, port)` pair in the shared ingress port space:
//!
//! - [`PortAllocator`]: Owner of the cluster reservation table
//! - [`Allocator`]: The restore/allocate/deallocate capability set
//! - [`Proposal`]: A computed reservation delta, applied only on commit
//! - [`already_allocated`]: Cheap check used to skip allocation work
//!
//! # Architecture
//!
//! Allocation is two-phase:
//!
//! 1. At startup the caller restores every persisted endpoint
//! 2. For each endpoint change the caller asks for a [`Proposal`]
//! 3. The caller persists the proposed ports elsewhere (e.g. a raft log)
//! 4. Only then the proposal is committed; on failure it is dropped
//!
//! Nothing is rolled back because nothing is applied before commit.
//!
//! # Example
//!
//! ```
//! use netalloc_port::{Allocator, PortAllocator};
//! use netalloc_types::{Endpoint, EndpointSpec, PortConfig, Protocol};
//!
//! let mut allocator = PortAllocator::new();
//! allocator.restore(&[]);
//!
//! let spec = EndpointSpec::new(vec![PortConfig::new("web", Protocol::Tcp, 80)]);
//! let endpoint = Endpoint::new();
//!
//! let proposal = allocator.allocate(&endpoint, Some(&spec)).unwrap();
//! let ports = proposal.ports().to_vec();
//! proposal.commit();
//!
//! assert_eq!(ports[0].published_port, 30000);
//! assert!(allocator.is_reserved(Protocol::Tcp, 30000));
//! ```
//!
//! # Concurrency
//!
//! The allocator carries no internal locking. A [`Proposal`] mutably borrows
//! its allocator, so no second proposal can be computed until the first one
//! is committed or dropped. Callers sharing an allocator across threads must
//! hold one lock across "compute proposal, persist, commit".

mod config;
mod error;
pub mod port;

pub use config::{ConfigError, PortAllocatorConfig};
pub use error::{PortAllocError, PortAllocResult};
pub use port::{
    already_allocated, ports_equal, ports_mostly_equal, Allocator, PortAllocator,
    PortAllocatorStats, PortKey, Proposal, DYNAMIC_PORT_END, DYNAMIC_PORT_START,
    MASTER_PORT_END,
};
