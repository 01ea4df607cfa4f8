//! Physical operators
//!
//! Operators are chained together: each operator owns its source operator and pulls
//! data from it synchronously. The parent pulls the operator in the same way, therefore
//! an operator is a source of its parent. Two shapes of pulling exist:
//!
//! - [`RowSource`]: returns one [`EncodedRow`] per pull
//!
//! - [`BatchSource`]: fills a [`Chunk`] per pull
//!
//! After an operator returns an error, its state is unspecified. Pulling it again is
//! a bug of the caller and the operator panics

pub mod aggregate;
pub mod memory_source;
pub mod metric;
pub mod utils;

use std::fmt::{Debug, Display};

use data_chunk::chunk::{Chunk, ChunkError};
use data_chunk::datum::CompareError;
use data_chunk::row::{EncodedRow, RowError};
use data_chunk::types::LogicalType;
use snafu::Snafu;

use self::metric::MetricsSet;
use crate::error::SendableError;
use crate::exec::physical_expr::ExprError;
use crate::exec::physical_expr::function::aggregate::AggregationError;

#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum OperatorError {
    #[snafu(display("`{op}` failed to read data from its source"))]
    ReadData {
        op: &'static str,
        source: SendableError,
    },
    #[snafu(display("`{op}` failed to decode the row read from its source"))]
    Decode { op: &'static str, source: RowError },
    #[snafu(display("`{op}` failed to evaluate the group by expressions"))]
    Evaluate { op: &'static str, source: ExprError },
    #[snafu(display("`{op}` failed to compare the group by values"))]
    CompareGroupValues {
        op: &'static str,
        source: CompareError,
    },
    #[snafu(display("`{op}` failed to update the aggregation states"))]
    UpdateAggregation {
        op: &'static str,
        source: AggregationError,
    },
    #[snafu(display("`{op}` failed to append the result to the output chunk"))]
    AppendResult {
        op: &'static str,
        source: ChunkError,
    },
}

type Result<T> = std::result::Result<T, OperatorError>;
/// Result type of the operators
pub type OperatorResult<T> = Result<T>;

/// Stringify the physical operator
pub trait Stringify {
    /// Get name of the physical operator
    fn name(&self) -> &'static str;

    /// Debug message
    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    /// Display the operator without the source info
    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;
}

/// Position in the storage that the scan operator has reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCursor {
    /// Key of the next row the scan will read
    pub key: Vec<u8>,
    /// Scan in descending order or not
    pub desc: bool,
}

/// Methods shared by the row and batch sources.
///
/// Note that we do not provide default implementation. Because we want to avoid the case
/// that compiler compiles but user forget to implement the method that should implement.
/// You can use some macros defined in the [utils] to avoid repeated code
pub trait Source: Stringify + Send {
    /// Logical types of the fields this source produces
    fn field_types(&self) -> &[LogicalType];

    /// Append the number of rows produced by each operator in the chain, from the
    /// deepest source to this operator
    fn collect_output_counts(&self, counts: &mut Vec<u64>);

    /// Reset the output counts of all of the operators in the chain
    fn reset_counts(&mut self);

    /// Snapshot of the metrics of this operator
    fn metrics(&self) -> MetricsSet;

    /// Cursor of the scan.
    ///
    /// # Panics
    ///
    /// Only the scan operators have cursor, other operators panic. Asking the
    /// non-scan operator for cursor is a bug in the wiring of the operators
    fn cursor(&self) -> ScanCursor;
}

/// Source that produces rows one by one
pub trait RowSource: Source {
    /// Pull the next row, `None` means the source is exhausted.
    ///
    /// The returned row is borrowed from the source and it is only valid until the
    /// next pull. Consumers should copy the data they want to keep
    fn next(&mut self) -> Result<Option<&EncodedRow>>;
}

/// Source that produces batches of rows
pub trait BatchSource: Source {
    /// Clear the output and fill it with at most `max_rows` rows. Empty output means
    /// the source is exhausted.
    ///
    /// # Panics
    ///
    /// The output should be created with [`Source::field_types`], otherwise the
    /// implementation may panic
    fn next_batch(&mut self, max_rows: usize, output: &mut Chunk) -> Result<()>;
}

impl Debug for dyn RowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.debug(f)
    }
}

impl Display for dyn RowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl Debug for dyn BatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.debug(f)
    }
}

impl Display for dyn BatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}
