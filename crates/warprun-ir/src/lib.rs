//! Compiled-kernel representation consumed by the warprun dynamic executive
//!
//! This crate defines the interface boundary between the (out-of-scope)
//! kernel front-end and the execution core:
//!
//! - **Hyperblocks**: maximal straight-line op regions bounded by control
//!   transfers or barriers, the unit of just-in-time translation
//! - **Kernel resource metadata**: per-kernel byte-region sizes, warp width,
//!   and entry hyperblock id
//! - **Validation**: every terminator target must resolve to a hyperblock
//!   in the kernel's table before the executive will accept the kernel
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           Kernel front-end (external)         │
//! │     parsing / analysis / hyperblock passes    │
//! └─────────────────────┬────────────────────────┘
//!                       │ produces
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │              CompiledKernel                   │
//! │   KernelResources + HyperblockId → Hyperblock │
//! └─────────────────────┬────────────────────────┘
//!                       │ consumed by
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │        warprun-exec DynamicExecutive          │
//! └──────────────────────────────────────────────┘
//! ```

pub mod dim;
pub mod hyperblock;
pub mod kernel;

pub use dim::Dim3;
pub use hyperblock::{Hyperblock, HyperblockId, Op, Reg, SpecialReg, Terminator};
pub use kernel::{CompiledKernel, KernelError, KernelResources, KernelResult};
