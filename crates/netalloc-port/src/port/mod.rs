//! Published port allocation for service endpoints.
//!
//! The [`PortAllocator`] owns the `Endpoint.ports` field of every endpoint
//! in the cluster: the port list of a [`Proposal`] is meant to be written
//! back unmodified. As long as nothing else edits realized ports, two
//! endpoints can never end up holding the same ingress port.
//!
//! Host-mode ports are copied through untouched and never reserved; they
//! belong to the node, not to the cluster pool.

mod allocator;
mod compare;
mod proposal;
mod types;

pub use allocator::{Allocator, PortAllocator, PortAllocatorStats};
pub use compare::{already_allocated, ports_equal, ports_mostly_equal};
pub use proposal::Proposal;
pub use types::{PortKey, DYNAMIC_PORT_END, DYNAMIC_PORT_START, MASTER_PORT_END};
