//! Cooperative thread array state
//!
//! A [`CtaState`] owns everything one CTA needs for its lifetime: the five
//! raw memory regions, a slot arena holding every thread's context, the
//! ready queue feeding warp formation, and the barrier queue. Thread
//! contexts never leave the arena except as a short-lived checkout while a
//! warp executes; the warp borrows threads, it does not own them.
//!
//! # Slot states
//!
//! ```text
//!          form_warp/claim            checkin(non-terminal)
//!   Ready ----------------> Executing ---------------------> Ready
//!     ^                          |
//!     |  release_barrier         | checkin(Barrier)
//!     +------- Barrier <---------+
//!                                | checkin(Exit/ExitOther)
//!                                v
//!                           Terminated   (context dropped)
//! ```

use std::collections::VecDeque;

use warprun_ir::{Dim3, KernelResources};
use warprun_tracing::perf_event;

use crate::alloc::RegionAllocator;
use crate::context::{ExitCode, ThreadContext, ThreadExit, ThreadState};
use crate::error::{ExecResult, ExecutiveError};

// ============================================================================
// CTA memory regions
// ============================================================================

/// The five raw byte regions of one CTA
///
/// Sizes come from the kernel's resource metadata; `shared` additionally
/// grows by the launch request's dynamic shared bytes, and `argument` is at
/// least as large as the launch's flat argument bytes. All regions are
/// zero-initialized before the argument copy.
#[derive(Debug)]
pub struct CtaMemory {
    pub local: Vec<u8>,
    pub shared: Vec<u8>,
    pub constant: Vec<u8>,
    pub parameter: Vec<u8>,
    pub argument: Vec<u8>,
}

fn read_u64(region: &[u8], name: &'static str, offset: usize) -> ExecResult<u64> {
    let end = offset
        .checked_add(8)
        .filter(|&end| end <= region.len())
        .ok_or(ExecutiveError::RegionOutOfBounds {
            region: name,
            offset,
            len: 8,
            region_len: region.len(),
        })?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&region[offset..end]);
    Ok(u64::from_le_bytes(buf))
}

fn write_u64(region: &mut [u8], name: &'static str, offset: usize, value: u64) -> ExecResult<()> {
    let end = offset
        .checked_add(8)
        .filter(|&end| end <= region.len())
        .ok_or(ExecutiveError::RegionOutOfBounds {
            region: name,
            offset,
            len: 8,
            region_len: region.len(),
        })?;
    region[offset..end].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

impl CtaMemory {
    /// Read a `u64` from the argument region
    pub fn argument_u64(&self, offset: usize) -> ExecResult<u64> {
        read_u64(&self.argument, "argument", offset)
    }

    /// Read a `u64` from shared memory
    pub fn shared_u64(&self, offset: usize) -> ExecResult<u64> {
        read_u64(&self.shared, "shared", offset)
    }

    /// Write a `u64` to shared memory
    pub fn store_shared_u64(&mut self, offset: usize, value: u64) -> ExecResult<()> {
        write_u64(&mut self.shared, "shared", offset, value)
    }
}

// ============================================================================
// Slot arena
// ============================================================================

/// One arena slot: a scheduling tag plus the thread's context
///
/// The context is `None` only while checked out to an executing warp or
/// after termination. There is no invalid state; misuse of the checkout
/// protocol is an executive bug caught by assertion, not a runtime code.
#[derive(Debug)]
struct ThreadSlot {
    state: ThreadState,
    context: Option<ThreadContext>,
}

/// State of one cooperative thread array
#[derive(Debug)]
pub struct CtaState {
    id: u64,
    block: Dim3,
    pub memory: CtaMemory,
    slots: Vec<ThreadSlot>,
    /// Slots eligible for warp formation, in FIFO order
    ready: VecDeque<usize>,
    /// Slots parked at the barrier, in arrival order
    barrier: Vec<usize>,
    /// Threads not yet terminated
    live: usize,
}

impl CtaState {
    /// Initialize a CTA: provision regions, copy launch arguments, and seed
    /// every thread at the kernel entry
    ///
    /// # Errors
    ///
    /// Returns `ExecutiveError::ResourceExhausted` when the allocator cannot
    /// provision a region.
    pub fn new(
        id: u64,
        block: Dim3,
        block_dim: Dim3,
        resources: &KernelResources,
        allocator: &dyn RegionAllocator,
        arguments: &[u8],
        dynamic_shared_bytes: usize,
    ) -> ExecResult<Self> {
        let argument_bytes = resources.argument_bytes.max(arguments.len());
        let shared_bytes = resources.shared_bytes + dynamic_shared_bytes;

        let mut argument = allocator.allocate("argument", argument_bytes)?;
        argument[..arguments.len()].copy_from_slice(arguments);

        let memory = CtaMemory {
            local: allocator.allocate("local", resources.local_bytes)?,
            shared: allocator.allocate("shared", shared_bytes)?,
            constant: allocator.allocate("constant", resources.constant_bytes)?,
            parameter: allocator.allocate("parameter", resources.parameter_bytes)?,
            argument,
        };

        let threads = block_dim.total() as usize;
        let mut slots = Vec::with_capacity(threads);
        let mut ready = VecDeque::with_capacity(threads);
        for thread in 0..threads {
            slots.push(ThreadSlot {
                state: ThreadState::Ready,
                context: Some(ThreadContext::new(id, thread as u32, threads as u32, resources.entry)),
            });
            ready.push_back(thread);
        }

        tracing::debug!(
            cta = id,
            block = %block,
            threads = threads,
            shared_bytes = shared_bytes,
            "cta_initialized"
        );

        Ok(Self {
            id,
            block,
            memory,
            slots,
            ready,
            barrier: Vec::new(),
            live: threads,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn block(&self) -> Dim3 {
        self.block
    }

    /// Threads not yet terminated
    pub fn live(&self) -> usize {
        self.live
    }

    /// Threads eligible for warp formation
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Threads parked at the barrier
    pub fn barrier_waiting(&self) -> usize {
        self.barrier.len()
    }

    /// Whether every thread has terminated
    pub fn is_complete(&self) -> bool {
        self.live == 0
    }

    /// Ready slots with their next-entry hyperblocks, in queue order
    pub fn ready_entries(&self) -> impl Iterator<Item = (usize, warprun_ir::HyperblockId)> + '_ {
        self.ready
            .iter()
            .filter_map(|&slot| self.slots[slot].context.as_ref().map(|ctx| (slot, ctx.entry)))
    }

    /// Whether any live thread will enter `block` next
    pub fn references(&self, block: warprun_ir::HyperblockId) -> bool {
        self.slots
            .iter()
            .any(|s| s.context.as_ref().is_some_and(|ctx| ctx.entry == block) && !matches!(s.state, ThreadState::Terminated(_)))
    }

    /// Remove `members` from the ready queue and mark them executing
    ///
    /// Members must currently be ready; warp formation guarantees this.
    pub fn claim(&mut self, members: &[usize]) {
        self.ready.retain(|slot| !members.contains(slot));
        for &slot in members {
            debug_assert_eq!(self.slots[slot].state, ThreadState::Ready);
            self.slots[slot].state = ThreadState::Executing;
        }
    }

    /// Return claimed members to the front of the ready queue, unexecuted
    ///
    /// Used when translation resolution fails after a warp was formed.
    pub fn requeue_front(&mut self, members: &[usize]) {
        for &slot in members.iter().rev() {
            debug_assert_eq!(self.slots[slot].state, ThreadState::Executing);
            self.slots[slot].state = ThreadState::Ready;
            self.ready.push_front(slot);
        }
    }

    /// Move an executing slot's context out to the warp
    pub fn checkout(&mut self, slot: usize) -> ThreadContext {
        debug_assert_eq!(self.slots[slot].state, ThreadState::Executing);
        self.slots[slot]
            .context
            .take()
            .expect("executing slot has no context to check out")
    }

    /// Return a context from a dissolved warp and route the thread by its
    /// exit classification
    ///
    /// Returns `true` when the exit terminated the thread.
    pub fn checkin(&mut self, slot: usize, mut context: ThreadContext, exit: ThreadExit) -> bool {
        debug_assert_eq!(self.slots[slot].state, ThreadState::Executing);
        match exit {
            ThreadExit::Fallthrough { next }
            | ThreadExit::Branch { next }
            | ThreadExit::Tailcall { next }
            | ThreadExit::Call { next } => {
                context.entry = next;
                self.slots[slot].context = Some(context);
                self.slots[slot].state = ThreadState::Ready;
                self.ready.push_back(slot);
                false
            }
            ThreadExit::Barrier { resume } => {
                context.entry = resume;
                self.slots[slot].context = Some(context);
                self.slots[slot].state = ThreadState::Barrier;
                self.barrier.push(slot);
                false
            }
            ThreadExit::Exit => {
                self.retire(slot, ExitCode::Exit);
                true
            }
            ThreadExit::ExitOther { code } => {
                self.retire(slot, ExitCode::Other(code));
                true
            }
        }
    }

    fn retire(&mut self, slot: usize, code: ExitCode) {
        self.slots[slot].context = None;
        self.slots[slot].state = ThreadState::Terminated(code);
        self.live -= 1;
    }

    /// Release the barrier if every live thread has arrived
    ///
    /// The release is atomic: either all waiters move back to ready in
    /// arrival order, or none do. With live threads still ready or
    /// executing this is a no-op.
    pub fn release_barrier(&mut self) -> bool {
        if self.live == 0 || self.barrier.len() < self.live {
            return false;
        }
        debug_assert_eq!(self.barrier.len(), self.live);
        for slot in self.barrier.drain(..) {
            self.slots[slot].state = ThreadState::Ready;
            self.ready.push_back(slot);
        }
        perf_event!("barrier_released", cta = self.id, released = self.live);
        true
    }

    /// Final disposition of a terminated slot, if it has one
    pub fn exit_code(&self, slot: usize) -> Option<ExitCode> {
        match self.slots.get(slot)?.state {
            ThreadState::Terminated(code) => Some(code),
            _ => None,
        }
    }
}
