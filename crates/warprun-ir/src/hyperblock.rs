//! Hyperblocks: the unit of just-in-time translation
//!
//! A hyperblock is a maximal straight-line region of kernel ops bounded by a
//! single control transfer or barrier (its terminator). The executive never
//! looks inside a hyperblock's op list; only the code-generation backend
//! interprets it. The terminator is what the scheduler cares about: it
//! determines how the threads of a warp are re-enqueued after execution.

use std::fmt;

/// Identifier of a hyperblock within one compiled kernel
///
/// Ids are only unique within a single kernel's hyperblock table, which is
/// why translation caches are scoped per kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HyperblockId(pub u32);

impl HyperblockId {
    pub const fn new(id: u32) -> Self {
        HyperblockId(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HyperblockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hb{}", self.0)
    }
}

/// A general-purpose register index within a thread's register file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Reg(pub u8);

impl Reg {
    pub const fn new(index: u8) -> Self {
        Reg(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Built-in per-thread values readable via [`Op::LoadSpecial`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SpecialReg {
    /// Linear thread index within the CTA
    ThreadIdx,
    /// Linear CTA id within the grid
    CtaId,
    /// Total threads per CTA
    CtaSize,
}

/// Straight-line ops inside a hyperblock
///
/// This is a deliberately small set: enough for the reference translator
/// and the conformance suite to exercise register state, argument access,
/// and shared-memory traffic. Full instruction-set semantics belong to the
/// external code-generation backend, not to this representation.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Op {
    /// dst = value
    MovImm { dst: Reg, value: u64 },
    /// dst = src1 + src2 (wrapping)
    Add { dst: Reg, src1: Reg, src2: Reg },
    /// dst = src1 * src2 (wrapping)
    Mul { dst: Reg, src1: Reg, src2: Reg },
    /// dst = u64 read from the CTA argument region at `offset`
    LoadArg { dst: Reg, offset: u32 },
    /// dst = u64 read from CTA shared memory at `offset`
    LoadShared { dst: Reg, offset: u32 },
    /// u64 write of src to CTA shared memory at `offset`
    StoreShared { offset: u32, src: Reg },
    /// dst = built-in per-thread value
    LoadSpecial { dst: Reg, sr: SpecialReg },
}

/// The control transfer that bounds a hyperblock
///
/// Each variant maps onto exactly one thread-exit classification in the
/// executive; there is no catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Terminator {
    /// Unconditional transfer to the next hyperblock
    Fallthrough { next: HyperblockId },
    /// Per-thread conditional transfer: `pred != 0` takes `taken`
    ///
    /// This is the divergence point: threads of one warp may resolve to
    /// different successors and are individually re-enqueued.
    Branch {
        pred: Reg,
        taken: HyperblockId,
        not_taken: HyperblockId,
    },
    /// Transfer to `target`, pushing `return_to` on the thread's call stack
    Call {
        target: HyperblockId,
        return_to: HyperblockId,
    },
    /// Transfer to the hyperblock popped from the call stack
    ///
    /// A return with an empty call stack terminates the thread.
    Return,
    /// CTA-wide barrier; the thread resumes at `resume` once every live
    /// thread of its CTA has arrived
    Barrier { resume: HyperblockId },
    /// Normal thread termination
    Exit,
    /// Abnormal thread termination carrying a diagnostic code
    Trap { code: u32 },
}

impl Terminator {
    /// Hyperblock ids this terminator may transfer control to
    ///
    /// Used by kernel validation; `Return` is resolved dynamically through
    /// the call stack, so its reachable set is the set of `Call` return
    /// sites, which are validated at their `Call`.
    pub fn targets(&self) -> Vec<HyperblockId> {
        match self {
            Terminator::Fallthrough { next } => vec![*next],
            Terminator::Branch { taken, not_taken, .. } => vec![*taken, *not_taken],
            Terminator::Call { target, return_to } => vec![*target, *return_to],
            Terminator::Barrier { resume } => vec![*resume],
            Terminator::Return | Terminator::Exit | Terminator::Trap { .. } => Vec::new(),
        }
    }
}

/// A hyperblock: ops plus the terminator that bounds them
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Hyperblock {
    pub id: HyperblockId,
    pub ops: Vec<Op>,
    pub terminator: Terminator,
}

impl Hyperblock {
    /// Create a hyperblock with no body ops
    pub fn empty(id: HyperblockId, terminator: Terminator) -> Self {
        Self {
            id,
            ops: Vec::new(),
            terminator,
        }
    }

    /// Create a hyperblock from parts
    pub fn new(id: HyperblockId, ops: Vec<Op>, terminator: Terminator) -> Self {
        Self { id, ops, terminator }
    }
}
