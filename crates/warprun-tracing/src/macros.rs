//! Convenience macros for performance tracing

/// Create a performance span with automatic field capture.
///
/// Returns a [`crate::performance::PerfSpan`] guard that logs timing when
/// dropped.
///
/// # Syntax
///
/// ```text
/// perf_span!("name")
/// perf_span!("name", field1 = value1, field2 = value2, ...)
/// ```
///
/// # Example
///
/// ```rust
/// use warprun_tracing::perf_span;
///
/// {
///     let _span = perf_span!("form_warp", ready = 64, width = 32);
///     // ... operation code ...
/// } // Automatically logs duration with fields
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerfSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let span = tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        );
        $crate::performance::PerfSpan::with_span(None, span)
    }};
}

/// Emit a standardized performance event at debug level.
///
/// # Example
///
/// ```rust
/// use warprun_tracing::perf_event;
///
/// perf_event!("barrier_released", cta = 2, waiters = 64);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        tracing::debug!(
            event = $name,
            $($field = $value),+
        );
    };
}
