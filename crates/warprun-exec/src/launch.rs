//! Launch requests and executive configuration

use std::fmt;
use std::sync::Arc;

use warprun_ir::Dim3;

use crate::alloc::{HeapAllocator, RegionAllocator};
use crate::error::{invalid_launch, ExecResult};

/// One kernel launch: grid and block shape, dynamic shared memory, and the
/// flat argument bytes copied into every CTA's argument region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub grid: Dim3,
    pub block: Dim3,
    /// Shared bytes added on top of the kernel's static shared region
    pub dynamic_shared_bytes: usize,
    pub arguments: Vec<u8>,
}

impl LaunchRequest {
    pub fn new(grid: Dim3, block: Dim3) -> Self {
        Self {
            grid,
            block,
            dynamic_shared_bytes: 0,
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<u8>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_dynamic_shared(mut self, bytes: usize) -> Self {
        self.dynamic_shared_bytes = bytes;
        self
    }

    /// Reject degenerate shapes before any CTA is seated
    pub fn validate(&self) -> ExecResult<()> {
        if self.grid.total() == 0 {
            return Err(invalid_launch(format!("empty grid {}", self.grid)));
        }
        if self.block.total() == 0 {
            return Err(invalid_launch(format!("empty block {}", self.block)));
        }
        Ok(())
    }
}

/// Executive tuning knobs
#[derive(Clone)]
pub struct ExecutiveConfig {
    /// Upper bound on simultaneously resident CTAs per executive; CTAs
    /// added past the bound queue until a resident completes. Clamped to
    /// at least 1.
    pub max_resident_ctas: usize,
    /// Provider of CTA memory regions
    pub allocator: Arc<dyn RegionAllocator>,
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self {
            max_resident_ctas: 16,
            allocator: Arc::new(HeapAllocator),
        }
    }
}

impl ExecutiveConfig {
    pub fn with_max_resident_ctas(mut self, max: usize) -> Self {
        self.max_resident_ctas = max;
        self
    }

    pub fn with_allocator(mut self, allocator: Arc<dyn RegionAllocator>) -> Self {
        self.allocator = allocator;
        self
    }
}

impl fmt::Debug for ExecutiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutiveConfig")
            .field("max_resident_ctas", &self.max_resident_ctas)
            .finish_non_exhaustive()
    }
}
