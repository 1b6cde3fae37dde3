//! Error types for the dynamic execution engine

use warprun_ir::{HyperblockId, KernelError};

/// Errors surfaced by CTA setup, translation, and the executive loop
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ExecutiveError {
    /// A CTA memory region could not be provisioned
    #[error("allocation of {requested} bytes for {region} region failed")]
    ResourceExhausted { region: &'static str, requested: usize },

    /// The translator rejected a hyperblock
    ///
    /// Non-fatal to unrelated CTAs: residents that never reference the
    /// failing hyperblock are allowed to drain before the launch reports
    /// this error.
    #[error("translation of {block} at warp width {warp_width} failed: {reason}")]
    TranslationFailed {
        block: HyperblockId,
        warp_width: u32,
        reason: String,
    },

    /// A thread asked for a hyperblock id absent from the kernel table
    ///
    /// Inconsistent metadata is fatal immediately; nothing downstream can
    /// recover a meaningful schedule from it.
    #[error("no hyperblock {block} in compiled kernel")]
    UnknownHyperblock { block: HyperblockId },

    /// No warp could be formed but live threads are parked at a barrier
    #[error("barrier deadlock in cta {cta}: {waiting} of {live} live threads waiting")]
    BarrierDeadlock { cta: u64, waiting: usize, live: usize },

    /// Translated code returned the wrong number of per-lane outcomes
    #[error("translation for {block} returned {actual} outcomes for {expected} lanes")]
    LaneCountMismatch {
        block: HyperblockId,
        expected: usize,
        actual: usize,
    },

    /// Out-of-bounds access to a CTA memory region
    #[error("{region} access out of bounds: offset {offset} + {len} bytes exceeds {region_len}")]
    RegionOutOfBounds {
        region: &'static str,
        offset: usize,
        len: usize,
        region_len: usize,
    },

    /// Register index outside the per-thread register file
    #[error("invalid register r{0}")]
    InvalidRegister(u8),

    /// Malformed launch request (empty grid, duplicate CTA, coordinate
    /// outside the grid)
    #[error("invalid launch: {0}")]
    InvalidLaunch(String),

    /// Kernel failed validation before launch
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

impl From<crate::alloc::AllocationError> for ExecutiveError {
    fn from(err: crate::alloc::AllocationError) -> Self {
        ExecutiveError::ResourceExhausted {
            region: err.region,
            requested: err.requested,
        }
    }
}

/// Result type for executive operations
pub type ExecResult<T> = std::result::Result<T, ExecutiveError>;

/// Helper for invalid-launch errors
pub fn invalid_launch(msg: impl Into<String>) -> ExecutiveError {
    ExecutiveError::InvalidLaunch(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExecutiveError::TranslationFailed {
            block: HyperblockId::new(3),
            warp_width: 32,
            reason: "unsupported op".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "translation of hb3 at warp width 32 failed: unsupported op"
        );

        let err = ExecutiveError::BarrierDeadlock {
            cta: 2,
            waiting: 31,
            live: 32,
        };
        assert!(err.to_string().contains("31 of 32"));
    }

    #[test]
    fn test_kernel_error_conversion() {
        let err: ExecutiveError = KernelError::MissingEntry(HyperblockId::new(0)).into();
        assert!(matches!(err, ExecutiveError::Kernel(_)));
    }
}
