//! # warprun-exec
//!
//! Dynamic SIMT execution engine: runs a validated [`CompiledKernel`]
//! (from `warprun-ir`) by scheduling cooperative thread arrays, forming
//! warps of same-entry threads, and dispatching them through a translation
//! cache to a pluggable code-generation backend.
//!
//! # Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        run_launch                            |
//! |   (deals CTAs round-robin across processors via rayon)       |
//! +------------------------------+-------------------------------+
//!                                |
//!              +-----------------+------------------+
//!              v                                    v
//!   +---------------------+             +---------------------+
//!   | DynamicExecutive  0 |    . . .    | DynamicExecutive  N |
//!   |  resident CTA map   |             |  resident CTA map   |
//!   |  admission queue    |             |  admission queue    |
//!   +----------+----------+             +----------+----------+
//!              |        shared TranslationCache     |
//!              +-----------------+------------------+
//!                                v
//!                     +--------------------+
//!                     |  Translator seam   |
//!                     | (ReferenceTransla- |
//!                     |  tor or external)  |
//!                     +--------------------+
//! ```
//!
//! Per CTA, the executive owns a [`CtaState`]: five raw memory regions, a
//! thread-slot arena, a ready queue, and a barrier queue. Warps borrow
//! thread contexts for one hyperblock step and return them classified by a
//! closed [`ThreadExit`] sum type; the barrier releases atomically once
//! every live thread of the CTA has arrived.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warprun_exec::{
//!     run_launch, ExecutiveConfig, LaunchRequest, ReferenceTranslator,
//! };
//! use warprun_ir::{CompiledKernel, Dim3, Hyperblock, HyperblockId, KernelResources, Terminator};
//!
//! let entry = HyperblockId::new(0);
//! let mut kernel = CompiledKernel::new("noop", KernelResources::minimal(32, entry));
//! kernel.add_hyperblock(Hyperblock::empty(entry, Terminator::Exit)).unwrap();
//! let kernel = Arc::new(kernel);
//!
//! let request = LaunchRequest::new(Dim3::linear(4), Dim3::linear(64));
//! let stats = run_launch(&kernel, &request, 2, &ExecutiveConfig::default(), |_| {
//!     ReferenceTranslator
//! })
//! .unwrap();
//! assert_eq!(stats.ctas_completed, 4);
//! assert_eq!(stats.threads_retired, 4 * 64);
//! ```

pub mod alloc;
pub mod context;
pub mod cta;
pub mod error;
pub mod executive;
pub mod launch;
pub mod reference;
pub mod translation;
pub mod warp;

pub use alloc::{AllocationError, HeapAllocator, RegionAllocator};
pub use context::{ExitCode, RegisterFile, ThreadContext, ThreadExit, ThreadState, NUM_REGISTERS};
pub use cta::{CtaMemory, CtaState};
pub use error::{ExecResult, ExecutiveError};
pub use executive::{run_launch, DynamicExecutive, ExecutionStats};
pub use launch::{ExecutiveConfig, LaunchRequest};
pub use reference::ReferenceTranslator;
pub use translation::{TranslatedBlock, TranslationCache, Translator, WarpFn};
pub use warp::{form_warp, Warp};

// Re-exported so embedders depend on one crate for the common path.
pub use warprun_ir::{CompiledKernel, Dim3, HyperblockId, KernelResources};
