//! Pending reservation changes.

use super::allocator::PortAllocator;
use super::types::PortKey;
use tracing::debug;
use netalloc_types::PortConfig;
use std::collections::BTreeSet;
use std::fmt;

/// The result of an allocate or deallocate request.
///
/// A proposal carries everything needed to change the allocator state but
/// applies nothing on its own. Call [`Proposal::commit`] once the new ports
/// have been persisted; drop the proposal to abandon the change.
///
/// The proposal mutably borrows its allocator, so it must be committed or
/// dropped before the next request against the same allocator.
#[must_use = "a proposal does nothing unless committed"]
pub struct Proposal<'a> {
    allocator: &'a mut PortAllocator,
    ports: Vec<PortConfig>,
    allocate: BTreeSet<PortKey>,
    deallocate: BTreeSet<PortKey>,
}

impl<'a> Proposal<'a> {
    pub(super) fn new(
        allocator: &'a mut PortAllocator,
        ports: Vec<PortConfig>,
        allocate: BTreeSet<PortKey>,
        deallocate: BTreeSet<PortKey>,
    ) -> Self {
        Self {
            allocator,
            ports,
            allocate,
            deallocate,
        }
    }

    /// Returns the port assignments to write to `Endpoint.ports`.
    ///
    /// Empty for a deallocation.
    pub fn ports(&self) -> &[PortConfig] {
        &self.ports
    }

    /// Returns the keys this proposal releases.
    pub fn released(&self) -> impl Iterator<Item = &PortKey> {
        self.deallocate.iter()
    }

    /// Returns true if committing would leave the set of reserved ports
    /// unchanged.
    ///
    /// This does not mean the endpoint's ports are unchanged: a renamed port
    /// keeping its published port is still a noop here.
    pub fn is_noop(&self) -> bool {
        self.allocate == self.deallocate
    }

    /// Applies the proposal to the allocator.
    ///
    /// Every released key is freed, then every reserved key is taken; keys in
    /// both sets stay reserved. Cannot fail for a proposal produced by the
    /// allocator.
    pub fn commit(self) {
        let noop = self.is_noop();
        let Proposal {
            allocator,
            allocate,
            deallocate,
            ..
        } = self;

        if noop {
            debug!("Proposal is a noop, nothing to commit");
            allocator.record_commit(true);
            return;
        }

        debug!(
            "Committing proposal: releasing {} port(s), reserving {} port(s)",
            deallocate.len(),
            allocate.len()
        );
        for key in &deallocate {
            allocator.release(key);
        }
        for key in allocate {
            allocator.reserve(key);
        }
        allocator.record_commit(false);
    }
}

impl fmt::Debug for Proposal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proposal")
            .field("ports", &self.ports)
            .field("allocate", &self.allocate)
            .field("deallocate", &self.deallocate)
            .finish_non_exhaustive()
    }
}
