//! Utils for the physical operator

/// Implement the [`Source::cursor`] for the operators that do not scan the storage.
/// Calling it is a bug of the caller, it panics
///
/// [`Source::cursor`]: crate::exec::physical_operator::Source::cursor
macro_rules! impl_cursor_for_non_scan {
    () => {
        fn cursor(&self) -> crate::exec::physical_operator::ScanCursor {
            panic!(
                "`{}` does not scan the storage, only the scan operator has cursor",
                self.name()
            )
        }
    };
}

/// Implement the [`Source::collect_output_counts`] and [`Source::reset_counts`] for the
/// operators that have a `source` field and an `output_rows` count metric
///
/// [`Source::collect_output_counts`]: crate::exec::physical_operator::Source::collect_output_counts
/// [`Source::reset_counts`]: crate::exec::physical_operator::Source::reset_counts
macro_rules! impl_counts_for_non_scan {
    () => {
        fn collect_output_counts(&self, counts: &mut Vec<u64>) {
            self.source.collect_output_counts(counts);
            counts.push(self.metrics.output_rows.value());
        }

        fn reset_counts(&mut self) {
            self.source.reset_counts();
            self.metrics.output_rows.reset();
        }
    };
}

pub(super) use impl_counts_for_non_scan;
pub(super) use impl_cursor_for_non_scan;
