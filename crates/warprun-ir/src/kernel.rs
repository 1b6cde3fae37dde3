//! Compiled kernel container: resource metadata plus the hyperblock table
//!
//! A `CompiledKernel` is the opaque handle the executive consumes. It is
//! produced once by the (external) front-end, validated, wrapped in an `Arc`,
//! and never mutated during execution.

use crate::dim::Dim3;
use crate::hyperblock::{Hyperblock, HyperblockId};
use std::collections::BTreeMap;

/// Errors raised while building or validating a compiled kernel
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KernelError {
    /// Two hyperblocks share one id
    #[error("duplicate hyperblock {0}")]
    DuplicateHyperblock(HyperblockId),

    /// A terminator names a hyperblock absent from the table
    #[error("hyperblock {from} transfers to undefined hyperblock {to}")]
    UndefinedTarget { from: HyperblockId, to: HyperblockId },

    /// The entry id named by the resource metadata is absent
    #[error("entry hyperblock {0} not present in kernel")]
    MissingEntry(HyperblockId),

    /// The kernel has no hyperblocks at all
    #[error("kernel '{0}' has an empty hyperblock table")]
    EmptyKernel(String),
}

/// Result type for kernel operations
pub type KernelResult<T> = std::result::Result<T, KernelError>;

/// Read-only per-kernel resource metadata
///
/// Derived once per kernel and shared by every CTA of the same launch.
/// Byte sizes describe the five raw regions a CTA allocates at
/// initialization; `warp_width` is the translation vector width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KernelResources {
    pub shared_bytes: usize,
    pub local_bytes: usize,
    pub parameter_bytes: usize,
    pub argument_bytes: usize,
    pub constant_bytes: usize,
    /// Threads per warp the backend specializes generated code for
    pub warp_width: u32,
    /// Hyperblock every thread starts at
    pub entry: HyperblockId,
}

impl KernelResources {
    /// Metadata with all regions empty and the given warp width and entry
    pub const fn minimal(warp_width: u32, entry: HyperblockId) -> Self {
        Self {
            shared_bytes: 0,
            local_bytes: 0,
            parameter_bytes: 0,
            argument_bytes: 0,
            constant_bytes: 0,
            warp_width,
            entry,
        }
    }
}

/// A compiled kernel: name, resources, and the hyperblock table
///
/// The table is a `BTreeMap` so iteration order (and therefore binary
/// serialization) is deterministic.
///
/// # Example
///
/// ```
/// use warprun_ir::{CompiledKernel, Hyperblock, HyperblockId, KernelResources, Terminator};
///
/// let entry = HyperblockId::new(0);
/// let mut kernel = CompiledKernel::new("noop", KernelResources::minimal(32, entry));
/// kernel.add_hyperblock(Hyperblock::empty(entry, Terminator::Exit)).unwrap();
/// assert!(kernel.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompiledKernel {
    pub name: String,
    pub resources: KernelResources,
    hyperblocks: BTreeMap<HyperblockId, Hyperblock>,
}

impl CompiledKernel {
    /// Create a kernel with an empty hyperblock table
    pub fn new(name: impl Into<String>, resources: KernelResources) -> Self {
        Self {
            name: name.into(),
            resources,
            hyperblocks: BTreeMap::new(),
        }
    }

    /// Add a hyperblock to the table
    ///
    /// # Errors
    ///
    /// Returns `KernelError::DuplicateHyperblock` if the id is taken.
    pub fn add_hyperblock(&mut self, hyperblock: Hyperblock) -> KernelResult<()> {
        let id = hyperblock.id;
        if self.hyperblocks.contains_key(&id) {
            return Err(KernelError::DuplicateHyperblock(id));
        }
        self.hyperblocks.insert(id, hyperblock);
        Ok(())
    }

    /// Resolve a hyperblock id to its content
    ///
    /// `None` signals inconsistent metadata to the caller; the executive
    /// turns it into a fatal launch error rather than skipping the thread.
    pub fn hyperblock(&self, id: HyperblockId) -> Option<&Hyperblock> {
        self.hyperblocks.get(&id)
    }

    /// Number of hyperblocks in the table
    pub fn len(&self) -> usize {
        self.hyperblocks.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.hyperblocks.is_empty()
    }

    /// Iterate hyperblocks in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Hyperblock> {
        self.hyperblocks.values()
    }

    /// Total threads for a block dimension of this kernel
    pub fn threads_per_cta(&self, block_dim: Dim3) -> u64 {
        block_dim.total()
    }

    /// Validate the kernel
    ///
    /// Checks that the table is non-empty, the entry id resolves, and every
    /// terminator target resolves. The executive requires a validated
    /// kernel; an id that slips past validation is still caught at
    /// translation time as an unknown-hyperblock error.
    pub fn validate(&self) -> KernelResult<()> {
        if self.hyperblocks.is_empty() {
            return Err(KernelError::EmptyKernel(self.name.clone()));
        }
        if !self.hyperblocks.contains_key(&self.resources.entry) {
            return Err(KernelError::MissingEntry(self.resources.entry));
        }
        for hb in self.hyperblocks.values() {
            for target in hb.terminator.targets() {
                if !self.hyperblocks.contains_key(&target) {
                    return Err(KernelError::UndefinedTarget { from: hb.id, to: target });
                }
            }
        }
        Ok(())
    }

    /// Serialize to binary format (bincode)
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary format
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperblock::{Reg, Terminator};

    fn two_block_kernel() -> CompiledKernel {
        let entry = HyperblockId::new(0);
        let mut kernel = CompiledKernel::new("two_block", KernelResources::minimal(4, entry));
        kernel
            .add_hyperblock(Hyperblock::empty(
                entry,
                Terminator::Fallthrough {
                    next: HyperblockId::new(1),
                },
            ))
            .unwrap();
        kernel
            .add_hyperblock(Hyperblock::empty(HyperblockId::new(1), Terminator::Exit))
            .unwrap();
        kernel
    }

    #[test]
    fn test_validate_ok() {
        assert!(two_block_kernel().validate().is_ok());
    }

    #[test]
    fn test_duplicate_hyperblock() {
        let mut kernel = two_block_kernel();
        let result = kernel.add_hyperblock(Hyperblock::empty(HyperblockId::new(1), Terminator::Exit));
        assert_eq!(result, Err(KernelError::DuplicateHyperblock(HyperblockId::new(1))));
    }

    #[test]
    fn test_undefined_target() {
        let entry = HyperblockId::new(0);
        let mut kernel = CompiledKernel::new("dangling", KernelResources::minimal(4, entry));
        kernel
            .add_hyperblock(Hyperblock::empty(
                entry,
                Terminator::Branch {
                    pred: Reg::new(0),
                    taken: HyperblockId::new(9),
                    not_taken: entry,
                },
            ))
            .unwrap();
        assert_eq!(
            kernel.validate(),
            Err(KernelError::UndefinedTarget {
                from: entry,
                to: HyperblockId::new(9),
            })
        );
    }

    #[test]
    fn test_missing_entry() {
        let mut kernel = CompiledKernel::new("no_entry", KernelResources::minimal(4, HyperblockId::new(5)));
        kernel
            .add_hyperblock(Hyperblock::empty(HyperblockId::new(0), Terminator::Exit))
            .unwrap();
        assert_eq!(kernel.validate(), Err(KernelError::MissingEntry(HyperblockId::new(5))));
    }

    #[test]
    fn test_empty_kernel() {
        let kernel = CompiledKernel::new("hollow", KernelResources::minimal(4, HyperblockId::new(0)));
        assert_eq!(kernel.validate(), Err(KernelError::EmptyKernel("hollow".to_string())));
    }

    #[test]
    fn test_binary_roundtrip() {
        let kernel = two_block_kernel();
        let bytes = kernel.to_bytes().unwrap();
        let loaded = CompiledKernel::from_bytes(&bytes).unwrap();
        assert_eq!(loaded, kernel);
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_json_form_is_stable_for_tooling() {
        let kernel = two_block_kernel();
        let json = serde_json::to_string(&kernel).unwrap();
        // Field names are part of the dump format external tools read.
        assert!(json.contains("\"warp_width\":4"));
        assert!(json.contains("\"Fallthrough\""));
        let loaded: CompiledKernel = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, kernel);
    }

    #[test]
    fn test_lookup() {
        let kernel = two_block_kernel();
        assert!(kernel.hyperblock(HyperblockId::new(0)).is_some());
        assert!(kernel.hyperblock(HyperblockId::new(42)).is_none());
        assert_eq!(kernel.len(), 2);
    }
}
