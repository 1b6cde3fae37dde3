//! Per-thread execution state
//!
//! A [`ThreadContext`] is the complete architectural state of one SIMT
//! thread: its register file, its call stack, and the hyperblock it will
//! enter next. Contexts live in their CTA's slot arena and are loaned to a
//! warp for the duration of one hyperblock step.

use warprun_ir::{HyperblockId, Reg};

use crate::error::{ExecResult, ExecutiveError};

/// Number of general-purpose registers per thread
pub const NUM_REGISTERS: usize = 32;

/// A thread's general-purpose register file
///
/// Registers are zero-initialized at CTA setup, matching the zeroed memory
/// regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    regs: [u64; NUM_REGISTERS],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGISTERS],
        }
    }

    /// Read a register
    ///
    /// # Errors
    ///
    /// Returns `ExecutiveError::InvalidRegister` for indices past the file.
    pub fn read(&self, reg: Reg) -> ExecResult<u64> {
        self.regs
            .get(reg.index() as usize)
            .copied()
            .ok_or(ExecutiveError::InvalidRegister(reg.index()))
    }

    /// Write a register
    pub fn write(&mut self, reg: Reg, value: u64) -> ExecResult<()> {
        match self.regs.get_mut(reg.index() as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ExecutiveError::InvalidRegister(reg.index())),
        }
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Architectural state of one thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    /// Linear CTA id within the grid
    pub cta: u64,
    /// Linear thread index within the CTA
    pub thread: u32,
    /// Total threads in this thread's CTA
    pub cta_threads: u32,
    /// Hyperblock this thread enters on its next step
    pub entry: HyperblockId,
    pub registers: RegisterFile,
    /// Return sites pushed by `Call` terminators, popped by `Return`
    pub call_stack: Vec<HyperblockId>,
}

impl ThreadContext {
    /// Create a fresh context entering `entry`
    pub fn new(cta: u64, thread: u32, cta_threads: u32, entry: HyperblockId) -> Self {
        Self {
            cta,
            thread,
            cta_threads,
            entry,
            registers: RegisterFile::new(),
            call_stack: Vec::new(),
        }
    }
}

/// Why a thread left the hyperblock it just executed
///
/// Produced per lane by translated code; the executive routes the thread
/// based on the variant. This set is closed: every terminator lowers to
/// exactly one variant and there is no invalid or unknown case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadExit {
    /// Unconditional transfer to the next hyperblock
    Fallthrough { next: HyperblockId },
    /// Conditional transfer; `next` is the side this thread resolved to
    Branch { next: HyperblockId },
    /// Transfer through a popped return site
    Tailcall { next: HyperblockId },
    /// Transfer into a called hyperblock (the return site is already on the
    /// thread's call stack)
    Call { next: HyperblockId },
    /// Arrived at a CTA-wide barrier; resumes at `resume` after release
    Barrier { resume: HyperblockId },
    /// Normal termination
    Exit,
    /// Abnormal termination with a diagnostic code, including a `Return`
    /// executed with an empty call stack
    ExitOther { code: u32 },
}

impl ThreadExit {
    /// Whether this exit terminates the thread
    pub fn is_terminal(&self) -> bool {
        matches!(self, ThreadExit::Exit | ThreadExit::ExitOther { .. })
    }

    /// The hyperblock the thread transfers to, if any
    pub fn next_entry(&self) -> Option<HyperblockId> {
        match self {
            ThreadExit::Fallthrough { next }
            | ThreadExit::Branch { next }
            | ThreadExit::Tailcall { next }
            | ThreadExit::Call { next } => Some(*next),
            ThreadExit::Barrier { resume } => Some(*resume),
            ThreadExit::Exit | ThreadExit::ExitOther { .. } => None,
        }
    }
}

/// Final disposition of a terminated thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Exit,
    Other(u32),
}

/// Scheduling state of a thread slot within its CTA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Eligible for warp formation
    Ready,
    /// Claimed by a formed warp
    Executing,
    /// Parked at the CTA barrier
    Barrier,
    /// Finished; the slot's context has been dropped
    Terminated(ExitCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_file_bounds() {
        let mut regs = RegisterFile::new();
        assert_eq!(regs.read(Reg::new(0)).unwrap(), 0);
        regs.write(Reg::new(31), 42).unwrap();
        assert_eq!(regs.read(Reg::new(31)).unwrap(), 42);

        assert_eq!(
            regs.read(Reg::new(32)),
            Err(ExecutiveError::InvalidRegister(32))
        );
        assert_eq!(
            regs.write(Reg::new(200), 1),
            Err(ExecutiveError::InvalidRegister(200))
        );
    }

    #[test]
    fn test_fresh_context() {
        let ctx = ThreadContext::new(3, 17, 64, HyperblockId::new(0));
        assert_eq!(ctx.cta, 3);
        assert_eq!(ctx.thread, 17);
        assert_eq!(ctx.cta_threads, 64);
        assert!(ctx.call_stack.is_empty());
        assert_eq!(ctx.registers.read(Reg::new(5)).unwrap(), 0);
    }

    #[test]
    fn test_exit_classification() {
        let hb = HyperblockId::new(4);
        assert!(!ThreadExit::Fallthrough { next: hb }.is_terminal());
        assert!(!ThreadExit::Barrier { resume: hb }.is_terminal());
        assert!(ThreadExit::Exit.is_terminal());
        assert!(ThreadExit::ExitOther { code: 9 }.is_terminal());

        assert_eq!(ThreadExit::Tailcall { next: hb }.next_entry(), Some(hb));
        assert_eq!(ThreadExit::Exit.next_entry(), None);
    }
}
