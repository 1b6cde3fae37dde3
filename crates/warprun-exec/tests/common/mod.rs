//! Shared fixtures for executive integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use warprun_exec::{
    AllocationError, ReferenceTranslator, RegionAllocator, TranslatedBlock, Translator,
};
use warprun_ir::{CompiledKernel, Hyperblock, HyperblockId, KernelResources, Terminator};
use warprun_tracing::{init_global_tracing, TracingConfig};

static TRACING: Once = Once::new();

/// Install the shared subscriber once per test binary.
///
/// `WARPRUN_TRACING_*` variables steer filter and format; the install is
/// best-effort because another test may have won the race.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = init_global_tracing(&TracingConfig::from_env());
    });
}

/// Delegates to the reference translator while counting compiles
pub struct CountingTranslator {
    inner: ReferenceTranslator,
    compiles: Arc<AtomicUsize>,
}

impl CountingTranslator {
    pub fn new(compiles: Arc<AtomicUsize>) -> Self {
        Self {
            inner: ReferenceTranslator,
            compiles,
        }
    }
}

impl Translator for CountingTranslator {
    fn compile(&self, hyperblock: &Hyperblock, warp_width: u32) -> Result<TranslatedBlock, String> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(hyperblock, warp_width)
    }
}

/// Rejects one hyperblock, delegates the rest
pub struct RejectingTranslator {
    inner: ReferenceTranslator,
    pub reject: HyperblockId,
}

impl RejectingTranslator {
    pub fn new(reject: HyperblockId) -> Self {
        Self {
            inner: ReferenceTranslator,
            reject,
        }
    }
}

impl Translator for RejectingTranslator {
    fn compile(&self, hyperblock: &Hyperblock, warp_width: u32) -> Result<TranslatedBlock, String> {
        if hyperblock.id == self.reject {
            return Err("backend cannot lower this hyperblock".to_string());
        }
        self.inner.compile(hyperblock, warp_width)
    }
}

/// Fails every allocation past a byte budget
pub struct BudgetAllocator {
    pub budget: usize,
}

impl RegionAllocator for BudgetAllocator {
    fn allocate(&self, region: &'static str, bytes: usize) -> Result<Vec<u8>, AllocationError> {
        if bytes > self.budget {
            return Err(AllocationError {
                region,
                requested: bytes,
            });
        }
        Ok(vec![0u8; bytes])
    }
}

/// Single hyperblock, every thread exits immediately
pub fn exit_kernel(warp_width: u32) -> Arc<CompiledKernel> {
    let entry = HyperblockId::new(0);
    let mut kernel = CompiledKernel::new("exit", KernelResources::minimal(warp_width, entry));
    kernel
        .add_hyperblock(Hyperblock::empty(entry, Terminator::Exit))
        .unwrap();
    Arc::new(kernel)
}

/// Two hyperblocks: every thread barriers once, then exits
pub fn barrier_kernel(warp_width: u32) -> Arc<CompiledKernel> {
    let entry = HyperblockId::new(0);
    let after = HyperblockId::new(1);
    let mut kernel = CompiledKernel::new("barrier", KernelResources::minimal(warp_width, entry));
    kernel
        .add_hyperblock(Hyperblock::empty(entry, Terminator::Barrier { resume: after }))
        .unwrap();
    kernel
        .add_hyperblock(Hyperblock::empty(after, Terminator::Exit))
        .unwrap();
    Arc::new(kernel)
}
