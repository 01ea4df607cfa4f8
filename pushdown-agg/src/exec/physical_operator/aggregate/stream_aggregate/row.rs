//! Stream aggregation that produces rows one by one

use std::sync::Arc;
use std::time::Duration;

use data_chunk::datum::Datum;
use data_chunk::row::EncodedRow;
use data_chunk::types::LogicalType;
use pushdown_agg_procedural_macro::MetricsSetBuilder;
use snafu::ResultExt;

use super::super::group_key::GroupKeyBuilder;
use super::super::{AggregateError, GroupBoundary, GroupBoundaryDetector, RowDecoder};
use super::encode_partial_group;
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
    DecodeSnafu, OperatorResult, ReadDataSnafu, RowSource, Source, Stringify,
    UpdateAggregationSnafu,
};

const OPERATOR: &str = "StreamAggregate";

#[derive(Debug, Default, MetricsSetBuilder)]
struct StreamAggregateMetrics {
    /// Number of rows read from the source
    input_rows: Count,
    /// Number of rows produced by the aggregate, it is the number of groups
    output_rows: Count,
    /// Time spent in reading the source and aggregating
    aggregate_time: Time,
}

/// Aggregate the sorted input and produce a row as soon as a group is finished. It
/// produces rows in the same format as the [`HashAggregate`]: the partial results of
/// the aggregation functions followed by the group by values.
///
/// If there is no group by expression, all of the rows belong to a single group and
/// exactly one row is produced, even if the input is empty
///
/// [`HashAggregate`]: crate::exec::physical_operator::aggregate::hash_aggregate::HashAggregate
#[derive(Debug)]
pub struct StreamAggregate {
    source: Box<dyn RowSource>,
    decoder: RowDecoder,
    group_key: GroupKeyBuilder,
    funcs: AggregationFunctionList,
    /// States of the current group
    states: Vec<Box<dyn AggregateState>>,
    detector: GroupBoundaryDetector,
    field_types: Vec<LogicalType>,
    /// Reused output row
    output: EncodedRow,
    /// Reused partial results of a group
    partial_results: Vec<Datum>,
    /// The source is exhausted and the last group has been produced
    executed: bool,
    /// The last pull failed
    poisoned: bool,
    query_id: QueryId,
    metrics: StreamAggregateMetrics,
}

impl StreamAggregate {
    /// Try to create a new [`StreamAggregate`]. Fields referenced by the group by
    /// expressions and the arguments of the functions should exist in the source
    pub fn try_new(
        exec_ctx: &ExecContext,
        source: Box<dyn RowSource>,
        group_by: Vec<Arc<dyn PhysicalExpr>>,
        funcs: Vec<Arc<dyn AggregationFunction>>,
    ) -> Result<Self, AggregateError> {
        let funcs = AggregationFunctionList::new(funcs);
        let decoder = RowDecoder::try_new(
            OPERATOR,
            source.field_types().len(),
            group_by.iter().chain(funcs.arguments()),
        )?;
        let group_key = GroupKeyBuilder::new(group_by);
        let field_types = funcs
            .partial_types()
            .iter()
            .copied()
            .chain(group_key.output_types())
            .collect();

        Ok(Self {
            source,
            decoder,
            group_key,
            states: funcs.create_states(),
            funcs,
            detector: GroupBoundaryDetector::new(OPERATOR),
            field_types,
            output: EncodedRow::new(),
            partial_results: Vec::new(),
            executed: false,
            poisoned: false,
            query_id: exec_ctx.query_id,
            metrics: StreamAggregateMetrics::default(),
        })
    }

    /// Source of the aggregate
    pub fn source(&self) -> &dyn RowSource {
        &*self.source
    }

    /// Replace the source of the aggregate. It should be called before the first
    /// pull, and the new source should produce the same fields as the old one
    pub fn set_source(&mut self, source: Box<dyn RowSource>) {
        self.source = source;
    }

    /// Pull the source until a group is finished and write it into the output row.
    /// Returns false if nothing is produced
    fn aggregate_next_group(&mut self) -> OperatorResult<bool> {
        loop {
            let Some(row) = self
                .source
                .next()
                .boxed()
                .context(ReadDataSnafu { op: OPERATOR })?
            else {
                self.executed = true;
                tracing::debug!(
                    "StreamAggregate: source is exhausted after reading {} rows",
                    self.metrics.input_rows.value()
                );

                // Empty input with group by produces nothing
                if !self.detector.has_current() && !self.group_key.is_empty() {
                    return Ok(false);
                }
                encode_partial_group(
                    &self.funcs,
                    &self.states,
                    self.detector.current(),
                    &mut self.partial_results,
                    &mut self.output,
                );
                return Ok(true);
            };

            self.metrics.input_rows.add(1);
            let row = self
                .decoder
                .decode(row)
                .context(DecodeSnafu { op: OPERATOR })?;
            let boundary = self.detector.check(&self.group_key, row)?;
            if boundary == GroupBoundary::New {
                // Snapshot the finished group before its states are reused
                encode_partial_group(
                    &self.funcs,
                    &self.states,
                    self.detector.current(),
                    &mut self.partial_results,
                    &mut self.output,
                );
                self.funcs.reset_states(&mut self.states);
                self.detector.adopt();
            }

            self.funcs
                .update_states(&mut self.states, row)
                .context(UpdateAggregationSnafu { op: OPERATOR })?;

            if boundary == GroupBoundary::New {
                return Ok(true);
            }
        }
    }
}

impl Stringify for StreamAggregate {
    fn name(&self) -> &'static str {
        OPERATOR
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StreamAggregate: group_by=")?;
        compact_display_expressions(f, self.group_key.exprs())?;
        write!(f, ", funcs={}", self.funcs)
    }
}

impl Source for StreamAggregate {
    fn field_types(&self) -> &[LogicalType] {
        &self.field_types
    }

    fn metrics(&self) -> MetricsSet {
        self.metrics.metrics_set()
    }

    impl_counts_for_non_scan!();

    impl_cursor_for_non_scan!();
}

impl RowSource for StreamAggregate {
    fn next(&mut self) -> OperatorResult<Option<&EncodedRow>> {
        assert!(
            !self.poisoned,
            "`StreamAggregate` is pulled again after it returned an error"
        );
        if self.executed {
            return Ok(None);
        }

        let _span = tracing::debug_span!("next", op = OPERATOR, query_id = %self.query_id)
            .entered();
        self.poisoned = true;
        let mut elapsed = Duration::ZERO;
        let produced = {
            let _guard = ScopedTimerGuard::new(&mut elapsed);
            self.aggregate_next_group()
        };
        self.metrics.aggregate_time.add_duration(elapsed);
        let produced = produced?;
        self.poisoned = false;

        if produced {
            self.metrics.output_rows.add(1);
            tracing::trace!("StreamAggregate: produce group {:?}", self.output);
            Ok(Some(&self.output))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::hash_aggregate::HashAggregate;
    use super::super::super::tests::{
        abc_rows, abc_types, count_star, drain_rows, field, init_tracing, memory_source, sum,
    };
    use super::*;
    use crate::common::exec_context::tests::mock_exec_context;
    use crate::exec::physical_expr::function::aggregate::min_max::Max;
    use crate::exec::physical_operator::OperatorError;
    use crate::exec::physical_operator::memory_source::tests::{
        FailingSource, TruncatedRowSource,
    };
    use expect_test::expect;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn stream_aggregate(
        source: Box<dyn RowSource>,
        group_by: Vec<Arc<dyn PhysicalExpr>>,
        funcs: Vec<Arc<dyn AggregationFunction>>,
    ) -> StreamAggregate {
        StreamAggregate::try_new(&mock_exec_context(), source, group_by, funcs).unwrap()
    }

    #[test]
    fn test_count_sorted_groups() {
        init_tracing();

        let mut agg = stream_aggregate(
            memory_source(abc_types(), abc_rows()),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        assert_eq!(
            agg.field_types(),
            [LogicalType::UnsignedBigInt, LogicalType::VarChar]
        );
        assert_eq!(
            drain_rows(&mut agg),
            [
                vec![Datum::UInt64(2), Datum::from("a")],
                vec![Datum::UInt64(3), Datum::from("b")],
                vec![Datum::UInt64(1), Datum::from("c")],
            ]
        );
        assert!(agg.next().unwrap().is_none());

        let mut counts = Vec::new();
        agg.collect_output_counts(&mut counts);
        assert_eq!(counts, [6, 3]);
        assert_eq!(agg.metrics().count("input_rows"), Some(6));

        agg.reset_counts();
        counts.clear();
        agg.collect_output_counts(&mut counts);
        assert_eq!(counts, [0, 0]);
    }

    #[test]
    fn test_states_are_reset_between_groups() {
        let rows = vec![
            vec![Datum::from("x"), Datum::Int64(60)],
            vec![Datum::from("x"), Datum::Int64(40)],
            vec![Datum::from("y"), Datum::Int64(5)],
        ];
        let mut agg = stream_aggregate(
            memory_source(abc_types(), rows),
            vec![field(0, LogicalType::VarChar)],
            vec![sum(1, LogicalType::BigInt)],
        );
        assert_eq!(
            drain_rows(&mut agg),
            [
                vec![Datum::Int64(100), Datum::from("x")],
                vec![Datum::Int64(5), Datum::from("y")],
            ]
        );
    }

    #[test]
    fn test_unsorted_input_produces_more_groups() {
        let rows = ["a", "b", "a", "a", "b"]
            .into_iter()
            .map(|k| vec![Datum::from(k), Datum::Int64(1)])
            .collect();
        let mut agg = stream_aggregate(
            memory_source(abc_types(), rows),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        // Only 2 distinct keys, however 4 runs
        assert_eq!(
            drain_rows(&mut agg),
            [
                vec![Datum::UInt64(1), Datum::from("a")],
                vec![Datum::UInt64(1), Datum::from("b")],
                vec![Datum::UInt64(2), Datum::from("a")],
                vec![Datum::UInt64(1), Datum::from("b")],
            ]
        );
    }

    #[test]
    fn test_global_aggregation() {
        let mut agg = stream_aggregate(
            memory_source(abc_types(), abc_rows()),
            vec![],
            vec![count_star(), sum(1, LogicalType::BigInt)],
        );
        assert_eq!(
            drain_rows(&mut agg),
            [vec![Datum::UInt64(6), Datum::Int64(15)]]
        );

        // Empty input without group by still produces the initial states
        let mut agg = stream_aggregate(
            memory_source(abc_types(), vec![]),
            vec![],
            vec![count_star(), sum(1, LogicalType::BigInt)],
        );
        assert_eq!(drain_rows(&mut agg), [vec![Datum::UInt64(0), Datum::Null]]);

        // Empty input with group by produces nothing
        let mut agg = stream_aggregate(
            memory_source(abc_types(), vec![]),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        assert!(drain_rows(&mut agg).is_empty());
    }

    #[test]
    fn test_same_as_hash_aggregate_on_sorted_input() {
        let mut rng = StdRng::seed_from_u64(1024);
        let types = vec![LogicalType::BigInt, LogicalType::Double, LogicalType::BigInt];
        let mut rows = (0..300)
            .map(|_| {
                let key = if rng.gen_bool(0.1) {
                    Datum::Null
                } else {
                    Datum::Int64(rng.gen_range(-10..10))
                };
                vec![
                    key,
                    Datum::Float64(rng.gen_range(0..4) as f64 / 2.0),
                    Datum::Int64(rng.gen_range(-100..100)),
                ]
            })
            .collect::<Vec<_>>();
        rows.sort_by(|l, r| {
            l[0].as_ref()
                .compare(&r[0].as_ref())
                .unwrap()
                .then_with(|| l[1].as_ref().compare(&r[1].as_ref()).unwrap())
        });

        let group_by = || vec![field(0, LogicalType::BigInt), field(1, LogicalType::Double)];
        let funcs = || -> Vec<Arc<dyn AggregationFunction>> {
            vec![
                count_star(),
                sum(2, LogicalType::BigInt),
                Arc::new(Max::try_new(vec![field(2, LogicalType::BigInt)]).unwrap()),
            ]
        };

        let mut stream = stream_aggregate(
            memory_source(types.clone(), rows.clone()),
            group_by(),
            funcs(),
        );
        let mut hash = HashAggregate::try_new(
            &mock_exec_context(),
            memory_source(types, rows),
            group_by(),
            funcs(),
        )
        .unwrap();
        // First seen order of the sorted input is the sorted order
        assert_eq!(drain_rows(&mut stream), drain_rows(&mut hash));
    }

    #[test]
    fn test_display() {
        let agg = stream_aggregate(
            memory_source(abc_types(), vec![]),
            vec![field(0, LogicalType::VarChar), field(1, LogicalType::BigInt)],
            vec![count_star()],
        );
        let expect = expect!["StreamAggregate: group_by=[#0, #1], funcs=[CountStar]"];
        expect.assert_eq(&(&agg as &dyn RowSource).to_string());
    }

    #[test]
    fn test_errors_are_propagated() {
        let mut agg = stream_aggregate(
            Box::new(FailingSource::new(abc_types(), abc_rows())),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        // Groups before the failure are produced
        assert!(agg.next().unwrap().is_some());
        assert!(agg.next().unwrap().is_some());
        assert!(matches!(
            agg.next().unwrap_err(),
            OperatorError::ReadData {
                op: "StreamAggregate",
                ..
            }
        ));

        let mut agg = stream_aggregate(
            memory_source(abc_types(), abc_rows()),
            vec![field(1, LogicalType::VarChar)],
            vec![count_star()],
        );
        assert!(matches!(
            agg.next().unwrap_err(),
            OperatorError::Evaluate { .. }
        ));

        let mut agg = stream_aggregate(
            memory_source(
                vec![LogicalType::BigInt],
                vec![vec![Datum::Int64(i64::MAX)], vec![Datum::Int64(1)]],
            ),
            vec![],
            vec![sum(0, LogicalType::BigInt)],
        );
        assert!(matches!(
            agg.next().unwrap_err(),
            OperatorError::UpdateAggregation { .. }
        ));
    }

    #[test]
    fn test_truncated_row() {
        // a, a, b
        let mut rows = abc_rows();
        rows.truncate(3);
        let mut agg = stream_aggregate(
            Box::new(TruncatedRowSource::new(abc_types(), rows)),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        let row = agg.next().unwrap().unwrap().decode().unwrap();
        assert_eq!(row, [Datum::UInt64(2), Datum::from("a")]);
        // Group `b` is not finished when the truncated row arrives, it is not emitted
        assert!(matches!(
            agg.next().unwrap_err(),
            OperatorError::Decode {
                op: "StreamAggregate",
                ..
            }
        ));
    }

    #[test]
    #[should_panic(expected = "pulled again after it returned an error")]
    fn test_pull_after_error() {
        let mut agg = stream_aggregate(
            Box::new(FailingSource::new(abc_types(), vec![])),
            vec![],
            vec![count_star()],
        );
        assert!(agg.next().is_err());
        let _ = agg.next();
    }

    #[test]
    #[should_panic(expected = "only the scan operator has cursor")]
    fn test_cursor() {
        let agg = stream_aggregate(
            memory_source(abc_types(), vec![]),
            vec![],
            vec![count_star()],
        );
        agg.cursor();
    }
}
