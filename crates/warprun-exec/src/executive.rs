//! The dynamic executive: round-based CTA scheduling over a translation
//! cache
//!
//! One executive drives the CTAs assigned to one processor. Each round it
//! visits every resident CTA in ascending id order, forms at most one warp
//! per CTA, resolves the warp's translation through the cache, executes it,
//! and routes each thread by its exit classification. CTAs past the
//! residency bound wait in an admission queue until a resident completes.
//!
//! # Scheduling round
//!
//! ```text
//!   +-> admit queued CTAs up to the residency bound
//!   |     for each resident CTA (ascending id):
//!   |       form_warp -> cache.get_or_insert -> run -> checkin lanes
//!   |       release barrier if every live thread has arrived
//!   |       remove the CTA when its last thread terminates
//!   +--- repeat while any CTA made progress
//! ```
//!
//! The schedule is deterministic: CTA visit order, warp formation, and
//! barrier release depend only on queue contents, never on timing.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use warprun_ir::{CompiledKernel, Dim3, HyperblockId};
use warprun_tracing::performance::record_warp;
use warprun_tracing::perf_span;

use crate::context::ThreadContext;
use crate::cta::CtaState;
use crate::error::{invalid_launch, ExecResult, ExecutiveError};
use crate::launch::{ExecutiveConfig, LaunchRequest};
use crate::translation::{TranslationCache, Translator};
use crate::warp::form_warp;

// ============================================================================
// Statistics
// ============================================================================

/// Counters accumulated over one executive's run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStats {
    pub warps_executed: u64,
    pub barriers_released: u64,
    pub threads_retired: u64,
    pub ctas_completed: u64,
}

impl ExecutionStats {
    /// Fold another executive's counters into this one
    pub fn merge(&mut self, other: &ExecutionStats) {
        self.warps_executed += other.warps_executed;
        self.barriers_released += other.barriers_released;
        self.threads_retired += other.threads_retired;
        self.ctas_completed += other.ctas_completed;
    }
}

// ============================================================================
// Executive
// ============================================================================

/// Dynamic executive for one processor's share of a launch
///
/// The kernel must already be validated; the executive trusts the table and
/// reports any id that still fails to resolve as
/// [`ExecutiveError::UnknownHyperblock`].
pub struct DynamicExecutive<T: Translator> {
    kernel: Arc<CompiledKernel>,
    request: LaunchRequest,
    translator: T,
    processor: usize,
    max_resident: usize,
    allocator: Arc<dyn crate::alloc::RegionAllocator>,
    cache: Arc<TranslationCache>,
    /// Resident CTAs keyed by linear id; BTreeMap keeps visit order
    /// deterministic
    ctas: BTreeMap<u64, CtaState>,
    /// CTAs waiting for a residency seat, in admission order
    pending: VecDeque<Dim3>,
    stats: ExecutionStats,
    /// First translation failure, reported after unaffected residents drain
    deferred: Option<ExecutiveError>,
}

impl<T: Translator> DynamicExecutive<T> {
    /// Create an executive with a private translation cache
    pub fn new(
        kernel: Arc<CompiledKernel>,
        request: LaunchRequest,
        translator: T,
        processor: usize,
        config: ExecutiveConfig,
    ) -> ExecResult<Self> {
        Self::with_cache(
            kernel,
            request,
            translator,
            processor,
            config,
            Arc::new(TranslationCache::new()),
        )
    }

    /// Create an executive sharing a translation cache with its siblings
    ///
    /// Executives of one launch share the cache so a hyperblock is compiled
    /// once per `(id, width)` across all processors.
    pub fn with_cache(
        kernel: Arc<CompiledKernel>,
        request: LaunchRequest,
        translator: T,
        processor: usize,
        config: ExecutiveConfig,
        cache: Arc<TranslationCache>,
    ) -> ExecResult<Self> {
        request.validate()?;
        if kernel.resources.warp_width == 0 {
            return Err(invalid_launch("warp width must be non-zero"));
        }
        Ok(Self {
            kernel,
            request,
            translator,
            processor,
            max_resident: config.max_resident_ctas.max(1),
            allocator: config.allocator,
            cache,
            ctas: BTreeMap::new(),
            pending: VecDeque::new(),
            stats: ExecutionStats::default(),
            deferred: None,
        })
    }

    /// Hand a CTA to this executive
    ///
    /// Seats it immediately when a residency seat is free, otherwise queues
    /// it. The CTA id is the block coordinate linearized within the grid,
    /// so ids are reproducible across launches.
    ///
    /// # Errors
    ///
    /// - `InvalidLaunch` for coordinates outside the grid or added twice
    /// - `ResourceExhausted` when seating the CTA fails to allocate
    pub fn add_cta(&mut self, block: Dim3) -> ExecResult<()> {
        if !self.request.grid.contains(block) {
            return Err(invalid_launch(format!(
                "block {block} outside grid {}",
                self.request.grid
            )));
        }
        let id = self.request.grid.linear_index_of(block);
        if self.ctas.contains_key(&id) || self.pending.contains(&block) {
            return Err(invalid_launch(format!("cta {id} added twice")));
        }
        if self.ctas.len() < self.max_resident {
            self.seat(block)?;
        } else {
            self.pending.push_back(block);
        }
        Ok(())
    }

    fn seat(&mut self, block: Dim3) -> ExecResult<()> {
        let id = self.request.grid.linear_index_of(block);
        let cta = CtaState::new(
            id,
            block,
            self.request.block,
            &self.kernel.resources,
            self.allocator.as_ref(),
            &self.request.arguments,
            self.request.dynamic_shared_bytes,
        )?;
        self.ctas.insert(id, cta);
        Ok(())
    }

    pub fn resident_ctas(&self) -> usize {
        self.ctas.len()
    }

    pub fn queued_ctas(&self) -> usize {
        self.pending.len()
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    /// Run every added CTA to completion
    ///
    /// Returns the accumulated counters, or the first fatal error. After a
    /// translation failure, residents that never reference the failing
    /// hyperblock drain normally before the failure is reported; a warp
    /// that faults mid-execution aborts the launch immediately.
    pub fn execute(&mut self) -> ExecResult<ExecutionStats> {
        let _perf = perf_span!(
            "execute",
            processor = self.processor,
            kernel = self.kernel.name.as_str()
        );

        loop {
            self.admit_pending();
            if self.ctas.is_empty() {
                break;
            }

            let ids: Vec<u64> = self.ctas.keys().copied().collect();
            let mut progressed = false;
            for id in ids {
                progressed |= self.step_cta(id)?;
            }

            if !progressed {
                // Nothing ready anywhere. Live threads parked at a barrier
                // can never be joined by new arrivals now, so the wait is
                // permanent.
                if let Some((&id, cta)) =
                    self.ctas.iter().find(|(_, cta)| cta.barrier_waiting() > 0)
                {
                    return Err(ExecutiveError::BarrierDeadlock {
                        cta: id,
                        waiting: cta.barrier_waiting(),
                        live: cta.live(),
                    });
                }
                break;
            }
        }

        match self.deferred.take() {
            Some(err) => Err(err),
            None => Ok(self.stats),
        }
    }

    fn admit_pending(&mut self) {
        while self.ctas.len() < self.max_resident {
            let Some(block) = self.pending.pop_front() else {
                return;
            };
            if let Err(err) = self.seat(block) {
                // Late admission failure fails the launch; residents drain.
                self.pending.clear();
                if self.deferred.is_none() {
                    self.deferred = Some(err);
                }
                return;
            }
        }
    }

    /// Advance one CTA by at most one warp; returns whether it progressed
    fn step_cta(&mut self, id: u64) -> ExecResult<bool> {
        let width = self.kernel.resources.warp_width;
        let Some(cta) = self.ctas.get_mut(&id) else {
            return Ok(false);
        };

        let Some(warp) = form_warp(cta, width as usize) else {
            let released = cta.release_barrier();
            if released {
                self.stats.barriers_released += 1;
            }
            return Ok(released);
        };

        let translation =
            match self
                .cache
                .get_or_insert(&self.kernel, warp.entry, width, &self.translator)
            {
                Ok(translation) => translation,
                Err(err @ ExecutiveError::UnknownHyperblock { .. }) => {
                    cta.requeue_front(&warp.members);
                    return Err(err);
                }
                Err(err) => {
                    cta.requeue_front(&warp.members);
                    let block = warp.entry;
                    tracing::warn!(cta = id, block = %block, error = %err, "translation_failed");
                    self.abort_referencing(block);
                    self.pending.clear();
                    if self.deferred.is_none() {
                        self.deferred = Some(err);
                    }
                    return Ok(true);
                }
            };

        let start = Instant::now();
        let mut lanes: Vec<ThreadContext> =
            warp.members.iter().map(|&slot| cta.checkout(slot)).collect();
        let outcomes = translation.run(&mut lanes, &mut cta.memory)?;
        if outcomes.len() != lanes.len() {
            return Err(ExecutiveError::LaneCountMismatch {
                block: warp.entry,
                expected: lanes.len(),
                actual: outcomes.len(),
            });
        }

        let mut retired = 0u64;
        for ((slot, context), exit) in warp.members.iter().copied().zip(lanes).zip(outcomes) {
            if cta.checkin(slot, context, exit) {
                retired += 1;
            }
        }
        record_warp(id, warp.width(), start.elapsed().as_micros() as u64);

        self.stats.warps_executed += 1;
        self.stats.threads_retired += retired;
        if cta.release_barrier() {
            self.stats.barriers_released += 1;
        }

        if cta.is_complete() {
            let block = cta.block();
            self.ctas.remove(&id);
            self.stats.ctas_completed += 1;
            tracing::debug!(cta = id, block = %block, "cta_completed");
        }
        Ok(true)
    }

    /// Discard every resident CTA with a live thread headed for `block`
    fn abort_referencing(&mut self, block: HyperblockId) {
        let doomed: Vec<u64> = self
            .ctas
            .iter()
            .filter(|(_, cta)| cta.references(block))
            .map(|(&id, _)| id)
            .collect();
        for id in doomed {
            tracing::warn!(cta = id, block = %block, "cta_aborted");
            self.ctas.remove(&id);
        }
    }
}

// ============================================================================
// Multi-processor launch driver
// ============================================================================

/// Run a full grid across `processors` executives in parallel
///
/// Blocks are dealt round-robin by linear id, every executive shares one
/// translation cache, and `make_translator` builds each processor's
/// translator. Counters are merged across processors; the first failing
/// processor (in processor order) decides the launch error.
pub fn run_launch<T, F>(
    kernel: &Arc<CompiledKernel>,
    request: &LaunchRequest,
    processors: usize,
    config: &ExecutiveConfig,
    make_translator: F,
) -> ExecResult<ExecutionStats>
where
    T: Translator,
    F: Fn(usize) -> T + Sync,
{
    kernel.validate()?;
    request.validate()?;
    let processors = processors.max(1);
    let cache = Arc::new(TranslationCache::new());

    let results: Vec<ExecResult<ExecutionStats>> = (0..processors)
        .into_par_iter()
        .map(|processor| {
            let mut executive = DynamicExecutive::with_cache(
                Arc::clone(kernel),
                request.clone(),
                make_translator(processor),
                processor,
                config.clone(),
                Arc::clone(&cache),
            )?;
            let grid = request.grid;
            let mut index = processor as u64;
            while index < grid.total() {
                executive.add_cta(grid.coord_of(index))?;
                index += processors as u64;
            }
            executive.execute()
        })
        .collect();

    let mut stats = ExecutionStats::default();
    for result in results {
        stats.merge(&result?);
    }
    Ok(stats)
}
