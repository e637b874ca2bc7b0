//! Operator tooling for the cluster port allocator.
//!
//! The `portalloc` binary replays a persisted cluster state file through a
//! [`PortAllocator`](netalloc_port::PortAllocator), the same way a manager
//! does at startup, and then runs a single request against it:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `list` | Print every reserved port with its owner, then dynamic range usage |
//! | `allocate` | Propose ports for a service, optionally commit |
//! | `deallocate` | Propose releasing a service's ports, optionally commit |
//! | `check` | Report whether a service already matches a spec |
//!
//! Committed requests are written back to the state file.

pub mod session;
pub mod state;

pub use session::{DynamicUsage, PortOrigin, ReservedPort, Session};
pub use state::{load_config, load_spec, ClusterState};
