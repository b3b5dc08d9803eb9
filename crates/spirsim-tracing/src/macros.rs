//! Timing helpers for coarse instrumentation.

/// Run `$block`, then emit a `trace` event with its wall-clock cost.
///
/// Evaluates to `(value, elapsed)` where `elapsed` is a
/// [`std::time::Duration`]. Used around builtin dispatch and memory dumps,
/// where per-call cost matters only when tracing is turned all the way up.
///
/// ```rust
/// use spirsim_tracing::timed_block;
///
/// let (words, elapsed) = timed_block!("pack_words", {
///     [1u8, 2, 3, 4].chunks(2).count()
/// });
/// assert_eq!(words, 2);
/// assert!(elapsed.as_secs() < 60);
/// ```
#[macro_export]
macro_rules! timed_block {
    ($label:expr, $block:block) => {{
        let started = ::std::time::Instant::now();
        let value = $block;
        let elapsed = started.elapsed();
        $crate::trace!(block = $label, elapsed_us = elapsed.as_micros() as u64, "block finished");
        (value, elapsed)
    }};
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    #[test]
    fn test_timed_block_reports_elapsed() {
        let (value, elapsed) = timed_block!("sleep", {
            std::thread::sleep(Duration::from_millis(5));
            7
        });
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn test_timed_block_passes_errors_through() {
        let (outcome, _) = timed_block!("failing", { "x1".parse::<u32>() });
        assert!(outcome.is_err());
    }
}
