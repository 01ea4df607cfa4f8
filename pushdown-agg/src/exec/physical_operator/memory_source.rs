//! A scan operator that reads the rows stored in memory. It produces rows in the same
//! shape as the storage scan, therefore it is used to feed the aggregation in tests
//! and benchmarks

use data_chunk::chunk::Chunk;
use data_chunk::datum::Datum;
use data_chunk::row::EncodedRow;
use data_chunk::types::LogicalType;
use pushdown_agg_procedural_macro::MetricsSetBuilder;
use snafu::{ResultExt, Snafu, ensure};

use super::metric::{Count, MetricsSet};
use super::{
    AppendResultSnafu, BatchSource, OperatorResult, RowSource, ScanCursor, Source, Stringify,
};

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum MemorySourceError {
    #[snafu(display(
        "Row `{row}` has {actual} values, however the MemorySource has {expect} fields"
    ))]
    RowWidthMismatch {
        row: usize,
        expect: usize,
        actual: usize,
    },
    #[snafu(display(
        "The `{col}`th value of row `{row}` is `{datum}`, it does not match the field type `{logical_type}`"
    ))]
    ValueTypeMismatch {
        row: usize,
        col: usize,
        datum: String,
        logical_type: LogicalType,
    },
}

const OPERATOR: &str = "MemorySource";

/// Source that reads the rows in memory
#[derive(Debug)]
pub struct MemorySource {
    field_types: Vec<LogicalType>,
    rows: Vec<Vec<Datum>>,
    /// Index of the next row to read
    position: usize,
    /// Reused buffer of the row returned by [`RowSource::next`]
    current: EncodedRow,
    metrics: MemorySourceMetrics,
}

#[derive(Debug, Default, MetricsSetBuilder)]
struct MemorySourceMetrics {
    /// Number of rows produced by the source
    output_rows: Count,
}

impl MemorySource {
    /// Try to create a new [`MemorySource`], each row should match the field types
    pub fn try_new(
        field_types: Vec<LogicalType>,
        rows: Vec<Vec<Datum>>,
    ) -> Result<Self, MemorySourceError> {
        for (row_index, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == field_types.len(),
                RowWidthMismatchSnafu {
                    row: row_index,
                    expect: field_types.len(),
                    actual: row.len()
                }
            );

            for (col, (datum, &logical_type)) in row.iter().zip(&field_types).enumerate() {
                ensure!(
                    datum.as_ref().matches_type(logical_type),
                    ValueTypeMismatchSnafu {
                        row: row_index,
                        col,
                        datum: datum.to_string(),
                        logical_type
                    }
                );
            }
        }

        Ok(Self {
            field_types,
            rows,
            position: 0,
            current: EncodedRow::new(),
            metrics: MemorySourceMetrics::default(),
        })
    }

    /// Number of rows that have not been read
    pub fn remaining(&self) -> usize {
        self.rows.len() - self.position
    }
}

impl Stringify for MemorySource {
    fn name(&self) -> &'static str {
        OPERATOR
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MemorySource: rows={}, field_types={:?}",
            self.rows.len(),
            self.field_types
        )
    }
}

impl Source for MemorySource {
    fn field_types(&self) -> &[LogicalType] {
        &self.field_types
    }

    fn collect_output_counts(&self, counts: &mut Vec<u64>) {
        counts.push(self.metrics.output_rows.value());
    }

    fn reset_counts(&mut self) {
        self.metrics.output_rows.reset();
    }

    fn metrics(&self) -> MetricsSet {
        self.metrics.metrics_set()
    }

    /// Key of the cursor is the big endian index of the next row
    fn cursor(&self) -> ScanCursor {
        ScanCursor {
            key: (self.position as u64).to_be_bytes().to_vec(),
            desc: false,
        }
    }
}

impl RowSource for MemorySource {
    fn next(&mut self) -> OperatorResult<Option<&EncodedRow>> {
        let Some(row) = self.rows.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        self.metrics.output_rows.add(1);

        self.current.clear();
        row.iter()
            .for_each(|datum| self.current.push_datum(datum.as_ref()));
        Ok(Some(&self.current))
    }
}

impl BatchSource for MemorySource {
    fn next_batch(&mut self, max_rows: usize, output: &mut Chunk) -> OperatorResult<()> {
        output.clear();
        let end = std::cmp::min(self.position + max_rows, self.rows.len());
        let mut datums = Vec::with_capacity(self.field_types.len());
        for row in &self.rows[self.position..end] {
            datums.clear();
            datums.extend(row.iter().map(Datum::as_ref));
            output
                .push_row(&datums)
                .context(AppendResultSnafu { op: OPERATOR })?;
        }
        self.metrics.output_rows.add((end - self.position) as u64);
        self.position = end;
        Ok(())
    }
}
