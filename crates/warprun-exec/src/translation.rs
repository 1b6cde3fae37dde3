//! Translation seam and the per-launch translation cache
//!
//! The executive never interprets hyperblock bodies; it asks a
//! [`Translator`] for an executable [`TranslatedBlock`] and memoizes the
//! result in a [`TranslationCache`] keyed by `(hyperblock id, warp width)`.
//! Width is part of the key so one launch can hold translations specialized
//! to full warps and to narrower remainder warps side by side.
//!
//! The cache is single-flight by construction: a miss compiles while
//! holding the write lock, so concurrent executives asking for the same key
//! serialize on one compile and every caller gets the same `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use warprun_ir::{CompiledKernel, Hyperblock, HyperblockId};
use warprun_tracing::performance::record_translation;

use crate::context::{ThreadContext, ThreadExit};
use crate::cta::CtaMemory;
use crate::error::{ExecResult, ExecutiveError};

/// Executable form of one hyperblock at one warp width
///
/// `code` runs every lane of a warp through the hyperblock body and
/// returns one exit classification per lane, in lane order.
pub type WarpFn =
    Arc<dyn Fn(&mut [ThreadContext], &mut CtaMemory) -> ExecResult<Vec<ThreadExit>> + Send + Sync>;

/// A translated hyperblock, immutable and shared across CTAs
pub struct TranslatedBlock {
    pub entry: HyperblockId,
    pub warp_width: u32,
    code: WarpFn,
}

impl TranslatedBlock {
    pub fn new(entry: HyperblockId, warp_width: u32, code: WarpFn) -> Self {
        Self {
            entry,
            warp_width,
            code,
        }
    }

    /// Execute the translated code over a warp's lanes
    pub fn run(
        &self,
        lanes: &mut [ThreadContext],
        memory: &mut CtaMemory,
    ) -> ExecResult<Vec<ThreadExit>> {
        (self.code)(lanes, memory)
    }
}

impl std::fmt::Debug for TranslatedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatedBlock")
            .field("entry", &self.entry)
            .field("warp_width", &self.warp_width)
            .finish_non_exhaustive()
    }
}

/// Code-generation backend seam
///
/// Implementations are black boxes to the executive; a rejection carries
/// only a reason string, which the cache wraps into
/// [`ExecutiveError::TranslationFailed`].
pub trait Translator: Send + Sync {
    /// Compile one hyperblock specialized to `warp_width` lanes
    fn compile(
        &self,
        hyperblock: &Hyperblock,
        warp_width: u32,
    ) -> Result<TranslatedBlock, String>;
}

/// Per-launch memo of translated hyperblocks
#[derive(Default)]
pub struct TranslationCache {
    entries: RwLock<HashMap<(HyperblockId, u32), Arc<TranslatedBlock>>>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached translations
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether a translation for this key is already cached
    pub fn contains(&self, block: HyperblockId, warp_width: u32) -> bool {
        self.entries.read().contains_key(&(block, warp_width))
    }

    /// Look up a translation, compiling at most once per key
    ///
    /// # Errors
    ///
    /// - `ExecutiveError::UnknownHyperblock` when `block` is absent from the
    ///   kernel table (inconsistent metadata, fatal to the launch)
    /// - `ExecutiveError::TranslationFailed` when the translator rejects the
    ///   hyperblock; the failure is not cached, so metadata-level retries
    ///   remain possible for a future launch
    pub fn get_or_insert(
        &self,
        kernel: &CompiledKernel,
        block: HyperblockId,
        warp_width: u32,
        translator: &dyn Translator,
    ) -> ExecResult<Arc<TranslatedBlock>> {
        let key = (block, warp_width);
        if let Some(translation) = self.entries.read().get(&key) {
            return Ok(Arc::clone(translation));
        }

        let mut entries = self.entries.write();
        // Another executive may have compiled while we waited for the lock.
        if let Some(translation) = entries.get(&key) {
            return Ok(Arc::clone(translation));
        }

        let hyperblock = kernel
            .hyperblock(block)
            .ok_or(ExecutiveError::UnknownHyperblock { block })?;

        let start = std::time::Instant::now();
        let translation = translator.compile(hyperblock, warp_width).map_err(|reason| {
            ExecutiveError::TranslationFailed {
                block,
                warp_width,
                reason,
            }
        })?;
        record_translation(block.id(), warp_width, start.elapsed().as_micros() as u64);

        let translation = Arc::new(translation);
        entries.insert(key, Arc::clone(&translation));
        Ok(translation)
    }
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("entries", &self.len())
            .finish()
    }
}
