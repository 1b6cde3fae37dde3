//! Memory-region provisioning for CTA initialization
//!
//! The executive does not own a memory system; it asks a [`RegionAllocator`]
//! for each raw byte region a CTA needs. The default [`HeapAllocator`] hands
//! out zeroed heap vectors, which is what the reference backend wants. An
//! embedding that pools or caps CTA memory supplies its own implementation
//! and surfaces exhaustion through [`AllocationError`].

use std::fmt;

/// Failure to provision a CTA memory region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationError {
    pub region: &'static str,
    pub requested: usize,
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocation of {} bytes for {} region failed",
            self.requested, self.region
        )
    }
}

impl std::error::Error for AllocationError {}

/// Provider of raw, zero-initialized byte regions
pub trait RegionAllocator: Send + Sync {
    /// Allocate `bytes` zeroed bytes for the named region
    fn allocate(&self, region: &'static str, bytes: usize) -> Result<Vec<u8>, AllocationError>;
}

/// Default allocator backed by the process heap
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl RegionAllocator for HeapAllocator {
    fn allocate(&self, _region: &'static str, bytes: usize) -> Result<Vec<u8>, AllocationError> {
        Ok(vec![0u8; bytes])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_allocator_zeroes() {
        let region = HeapAllocator.allocate("shared", 64).unwrap();
        assert_eq!(region.len(), 64);
        assert!(region.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_sized_region() {
        let region = HeapAllocator.allocate("constant", 0).unwrap();
        assert!(region.is_empty());
    }

    #[test]
    fn test_allocation_error_display() {
        let err = AllocationError {
            region: "local",
            requested: 1 << 40,
        };
        assert!(err.to_string().contains("local"));
    }
}
