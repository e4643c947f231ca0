//! Controller-side registry of bound power sequencers.
//!
//! Sequencers register under the device node they were bound to. A
//! controller that references that node in its own description looks the
//! sequencer up and keeps the handle for the lifetime of the host; the
//! handle is whatever the binding chose to store (`&'static` on firmware,
//! a plain borrow in tests).

use core::fmt;

use heapless::Vec;

use crate::sequencer::PowerSequence;

/// Maximum number of sequencers tracked by a default registry.
pub const MAX_PWRSEQ_INSTANCES: usize = 4;

/// Identifies a device node in the board description.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node@{}", self.0)
    }
}

/// Errors raised while managing the registry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegistryError {
    /// Registry has reached its capacity.
    Full,
    /// A sequencer is already registered for the node.
    AlreadyRegistered(NodeId),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Full => f.write_str("power sequencer registry full"),
            RegistryError::AlreadyRegistered(node) => {
                write!(f, "power sequencer already registered for {node}")
            }
        }
    }
}

/// Registry tracking sequencer handles by device node.
pub struct PwrseqRegistry<H, const CAPACITY: usize = MAX_PWRSEQ_INSTANCES> {
    entries: Vec<(NodeId, H), CAPACITY>,
}

impl<H, const CAPACITY: usize> PwrseqRegistry<H, CAPACITY> {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds `handle` under `node`.
    pub fn register(&mut self, node: NodeId, handle: H) -> Result<(), RegistryError> {
        if self.contains(node) {
            return Err(RegistryError::AlreadyRegistered(node));
        }
        self.entries
            .push((node, handle))
            .map_err(|_| RegistryError::Full)
    }

    /// Removes and returns the handle registered under `node`.
    pub fn unregister(&mut self, node: NodeId) -> Option<H> {
        let index = self.entries.iter().position(|(id, _)| *id == node)?;
        Some(self.entries.swap_remove(index).1)
    }

    /// Looks up the handle registered under `node`.
    pub fn find(&self, node: NodeId) -> Option<&H> {
        self.entries
            .iter()
            .find(|(id, _)| *id == node)
            .map(|(_, handle)| handle)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.find(node).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over registered nodes.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }
}

impl<H, const CAPACITY: usize> Default for PwrseqRegistry<H, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

/// Power sequencing hooks as seen from the controller.
///
/// A controller without a sequencer keeps an empty `HostPwrseq`; every hook
/// is then a no-op.
pub struct HostPwrseq<H> {
    handle: Option<H>,
}

impl<H> HostPwrseq<H>
where
    H: PowerSequence + Clone,
{
    /// Controller with no power sequencer reference.
    pub const fn none() -> Self {
        Self { handle: None }
    }

    /// Resolves the sequencer registered under `node`.
    ///
    /// Returns `None` when the description points at a node that has not
    /// bound yet; the controller should retry once it has.
    pub fn attach<const CAPACITY: usize>(
        registry: &PwrseqRegistry<H, CAPACITY>,
        node: NodeId,
    ) -> Option<Self> {
        registry.find(node).map(|handle| Self {
            handle: Some(handle.clone()),
        })
    }

    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// The attached sequencer, if any.
    pub fn sequencer(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn pre_power_on(&self) {
        if let Some(handle) = &self.handle {
            handle.pre_power_on();
        }
    }

    pub fn post_power_on(&self) {
        if let Some(handle) = &self.handle {
            handle.post_power_on();
        }
    }

    pub fn power_off(&self) {
        if let Some(handle) = &self.handle {
            handle.power_off();
        }
    }

    pub fn reset(&self) {
        if let Some(handle) = &self.handle {
            handle.reset();
        }
    }

    /// Drops the reference, leaving the hardware as it is.
    pub fn detach(&mut self) -> Option<H> {
        self.handle.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_duplicate_nodes() {
        let mut registry: PwrseqRegistry<u8, 2> = PwrseqRegistry::new();
        assert_eq!(registry.register(NodeId(1), 10), Ok(()));
        assert_eq!(
            registry.register(NodeId(1), 11),
            Err(RegistryError::AlreadyRegistered(NodeId(1)))
        );
        assert_eq!(registry.find(NodeId(1)), Some(&10));
    }

    #[test]
    fn registry_reports_full() {
        let mut registry: PwrseqRegistry<u8, 1> = PwrseqRegistry::new();
        registry.register(NodeId(1), 1).unwrap();
        assert_eq!(registry.register(NodeId(2), 2), Err(RegistryError::Full));
    }

    #[test]
    fn unregister_frees_the_slot() {
        let mut registry: PwrseqRegistry<u8, 1> = PwrseqRegistry::new();
        registry.register(NodeId(3), 7).unwrap();
        assert_eq!(registry.unregister(NodeId(3)), Some(7));
        assert!(registry.is_empty());
        assert_eq!(registry.unregister(NodeId(3)), None);
        assert_eq!(registry.register(NodeId(4), 8), Ok(()));
    }
}
