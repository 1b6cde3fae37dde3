//! Performance-focused tracing utilities
//!
//! RAII spans with automatic timing and optional threshold filtering, used
//! by the executive's hot paths (warp execution, translation-cache misses).

use std::time::Instant;

/// RAII guard that measures span duration and conditionally logs on drop.
///
/// # Example
///
/// ```rust
/// use warprun_tracing::performance::PerfSpan;
///
/// {
///     let _span = PerfSpan::new("translate_hyperblock", Some(100));
///     // ... operation code ...
/// } // Logged only if duration > 100μs
/// ```
pub struct PerfSpan {
    threshold_us: Option<u64>,
    start: Instant,
    span: tracing::Span,
}

impl PerfSpan {
    /// Create a performance span with optional threshold filtering.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the operation being measured
    /// * `threshold_us` - Minimum duration in microseconds to log (None = always log)
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = tracing::debug_span!("perf", name = %name);
        Self {
            threshold_us,
            start: Instant::now(),
            span,
        }
    }

    /// Create a performance span around an already-built tracing span.
    ///
    /// Used by the `perf_span!` macro so caller-supplied fields live on the
    /// same span that reports the duration.
    pub fn with_span(threshold_us: Option<u64>, span: tracing::Span) -> Self {
        Self {
            threshold_us,
            start: Instant::now(),
            span,
        }
    }

    /// Elapsed time since span creation, in microseconds.
    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Drop for PerfSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();
        if self.threshold_us.is_none_or(|t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(duration_us = elapsed_us, "perf_span_complete");
        }
    }
}

/// Record a warp execution event with standard format.
///
/// # Arguments
///
/// * `cta` - CTA id the warp belonged to
/// * `lanes` - Number of threads in the warp
/// * `duration_us` - Execution time in microseconds
pub fn record_warp(cta: u64, lanes: usize, duration_us: u64) {
    tracing::debug!(
        event = "warp_executed",
        cta = cta,
        lanes = lanes,
        duration_us = duration_us,
        "warp_execution"
    );
}

/// Record a translation-cache miss compile with standard format.
pub fn record_translation(block: u32, warp_width: u32, duration_us: u64) {
    tracing::debug!(
        event = "translation",
        block = block,
        warp_width = warp_width,
        duration_us = duration_us,
        "hyperblock_translated"
    );
}
