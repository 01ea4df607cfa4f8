//! Stream aggregation that produces chunks

use std::sync::Arc;
use std::time::Duration;

use data_chunk::chunk::Chunk;
use data_chunk::datum::{Datum, DatumRef};
use data_chunk::types::LogicalType;
use pushdown_agg_procedural_macro::MetricsSetBuilder;
use snafu::ResultExt;

use super::super::group_key::GroupKeyBuilder;
use super::super::{
    AggregateError, GroupBoundary, GroupBoundaryDetector, InvalidExecArgsSnafu, referenced_fields,
};
use crate::common::exec_context::ExecContext;
use crate::common::profiler::ScopedTimerGuard;
use crate::common::uuid::QueryId;
use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::aggregate::{
    AggregateState, AggregationFunction, AggregationFunctionList,
};
use crate::exec::physical_expr::utils::compact_display_expressions;
use crate::exec::physical_operator::metric::{Count, MetricsSet, Time};
use crate::exec::physical_operator::utils::{impl_counts_for_non_scan, impl_cursor_for_non_scan};
use crate::exec::physical_operator::{
    AppendResultSnafu, BatchSource, OperatorResult, ReadDataSnafu, Source, Stringify,
    UpdateAggregationSnafu,
};

const OPERATOR: &str = "BatchStreamAggregate";

#[derive(Debug, Default, MetricsSetBuilder)]
struct BatchStreamAggregateMetrics {
    /// Number of rows read from the source
    input_rows: Count,
    /// Number of rows produced by the aggregate
    output_rows: Count,
    /// Time spent in reading the source and aggregating
    aggregate_time: Time,
}

/// Batch version of the [`StreamAggregate`]. It reads chunks from the source and
/// fills the output chunk with the finished groups. Different from the row version,
/// each output row is the group by values followed by the final results of the
/// aggregation functions.
///
/// The output chunk has at most `min(max_rows, chunk_max_rows)` rows. If there is
/// neither group by expression nor aggregation function, the output rows are virtual
/// rows without any column.
///
/// Empty input produces nothing, even if there is no group by expression
///
/// [`StreamAggregate`]: super::StreamAggregate
#[derive(Debug)]
pub struct BatchStreamAggregate {
    source: Box<dyn BatchSource>,
    group_key: GroupKeyBuilder,
    funcs: AggregationFunctionList,
    /// States of the current group
    states: Vec<Box<dyn AggregateState>>,
    detector: GroupBoundaryDetector,
    field_types: Vec<LogicalType>,
    /// Chunk read from the source
    input: Chunk,
    /// Index of the next row to check in the input
    input_cursor: usize,
    input_batch_rows: usize,
    chunk_max_rows: usize,
    /// Rows in the input that belong to the current group and have not been
    /// aggregated into the states
    group_rows: Vec<usize>,
    /// Reused values of the finished group
    result: Vec<Datum>,
    /// The source is exhausted and the last group has been produced
    executed: bool,
    /// The last pull failed
    poisoned: bool,
    query_id: QueryId,
    metrics: BatchStreamAggregateMetrics,
}

impl BatchStreamAggregate {
    /// Try to create a new [`BatchStreamAggregate`]. Fields referenced by the group by
    /// expressions and the arguments of the functions should exist in the source, and
    /// the `exec_args` of the context should be valid
    pub fn try_new(
        exec_ctx: &ExecContext,
        source: Box<dyn BatchSource>,
        group_by: Vec<Arc<dyn PhysicalExpr>>,
        funcs: Vec<Arc<dyn AggregationFunction>>,
    ) -> Result<Self, AggregateError> {
        exec_ctx
            .exec_args
            .validate()
            .context(InvalidExecArgsSnafu { op: OPERATOR })?;
        let funcs = AggregationFunctionList::new(funcs);
        referenced_fields(
            OPERATOR,
            source.field_types().len(),
            group_by.iter().chain(funcs.arguments()),
        )?;
        let group_key = GroupKeyBuilder::new(group_by);
        let field_types = group_key.output_types().chain(funcs.final_types()).collect();

        Ok(Self {
            input: Chunk::with_logical_types(source.field_types()),
            source,
            group_key,
            states: funcs.create_states(),
            funcs,
            detector: GroupBoundaryDetector::new(OPERATOR),
            field_types,
            input_cursor: 0,
            input_batch_rows: exec_ctx.exec_args.input_batch_rows,
            chunk_max_rows: exec_ctx.exec_args.chunk_max_rows,
            group_rows: Vec::new(),
            result: Vec::new(),
            executed: false,
            poisoned: false,
            query_id: exec_ctx.query_id,
            metrics: BatchStreamAggregateMetrics::default(),
        })
    }

    /// Source of the aggregate
    pub fn source(&self) -> &dyn BatchSource {
        &*self.source
    }

    /// Replace the source of the aggregate. It should be called before the first
    /// pull, and the new source should produce the same fields as the old one
    pub fn set_source(&mut self, source: Box<dyn BatchSource>) {
        self.input = Chunk::with_logical_types(source.field_types());
        self.input_cursor = 0;
        self.source = source;
    }

    /// Fill the output until it has `max_rows` rows or the source is exhausted
    fn fill(&mut self, max_rows: usize, output: &mut Chunk) -> OperatorResult<()> {
        while output.len() < max_rows {
            if self.input_cursor == self.input.len() {
                // Rows of the current group in the old input should be aggregated
                // before the input is overwritten
                self.flush_group_rows()?;
                self.source
                    .next_batch(self.input_batch_rows, &mut self.input)
                    .boxed()
                    .context(ReadDataSnafu { op: OPERATOR })?;
                self.input_cursor = 0;

                if self.input.is_empty() {
                    self.executed = true;
                    tracing::debug!(
                        "BatchStreamAggregate: source is exhausted after reading {} rows",
                        self.metrics.input_rows.value()
                    );
                    if self.detector.has_current() {
                        self.append_group(output)?;
                    }
                    return Ok(());
                }
                self.metrics.input_rows.add(self.input.len() as u64);
            }

            while self.input_cursor < self.input.len() {
                let index = self.input_cursor;
                self.input_cursor += 1;
                let boundary = self
                    .detector
                    .check(&self.group_key, self.input.row(index))?;
                if boundary == GroupBoundary::New {
                    self.flush_group_rows()?;
                    self.append_group(output)?;
                    self.funcs.reset_states(&mut self.states);
                    self.detector.adopt();
                    self.group_rows.push(index);
                    break;
                }
                self.group_rows.push(index);
            }
        }
        Ok(())
    }

    /// Aggregate the pending rows of the current group into the states
    fn flush_group_rows(&mut self) -> OperatorResult<()> {
        self.funcs
            .update_states_batch(&mut self.states, &self.input, &self.group_rows)
            .context(UpdateAggregationSnafu { op: OPERATOR })?;
        self.group_rows.clear();
        Ok(())
    }

    /// Append the current group to the output
    fn append_group(&mut self, output: &mut Chunk) -> OperatorResult<()> {
        self.result.clear();
        self.result.extend_from_slice(self.detector.current());
        self.funcs.final_results(&self.states, &mut self.result);
        tracing::trace!("BatchStreamAggregate: produce group {:?}", self.result);

        if self.result.is_empty() {
            output
                .append_virtual_row()
                .context(AppendResultSnafu { op: OPERATOR })
        } else {
            let row = self.result.iter().map(Datum::as_ref).collect::<Vec<DatumRef<'_>>>();
            output
                .push_row(&row)
                .context(AppendResultSnafu { op: OPERATOR })
        }
    }
}

impl Stringify for BatchStreamAggregate {
    fn name(&self) -> &'static str {
        OPERATOR
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BatchStreamAggregate: group_by=")?;
        compact_display_expressions(f, self.group_key.exprs())?;
        write!(f, ", funcs={}", self.funcs)
    }
}

impl Source for BatchStreamAggregate {
    fn field_types(&self) -> &[LogicalType] {
        &self.field_types
    }

    fn metrics(&self) -> MetricsSet {
        self.metrics.metrics_set()
    }

    impl_counts_for_non_scan!();

    impl_cursor_for_non_scan!();
}

impl BatchSource for BatchStreamAggregate {
    fn next_batch(&mut self, max_rows: usize, output: &mut Chunk) -> OperatorResult<()> {
        assert!(
            !self.poisoned,
            "`BatchStreamAggregate` is pulled again after it returned an error"
        );
        assert!(
            max_rows > 0,
            "`BatchStreamAggregate` is pulled with `max_rows` equal to zero"
        );
        output.clear();
        if self.executed {
            return Ok(());
        }

        let _span = tracing::debug_span!("next_batch", op = OPERATOR, query_id = %self.query_id)
            .entered();
        let max_rows = std::cmp::min(max_rows, self.chunk_max_rows);
        self.poisoned = true;
        let mut elapsed = Duration::ZERO;
        let filled = {
            let _guard = ScopedTimerGuard::new(&mut elapsed);
            self.fill(max_rows, output)
        };
        self.metrics.aggregate_time.add_duration(elapsed);
        filled?;
        self.poisoned = false;

        self.metrics.output_rows.add(output.len() as u64);
        Ok(())
    }
}
