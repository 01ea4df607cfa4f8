//! Aggregate based on hash table
//!
//! The [`HashAggregate`] is fully blocking: it reads all of the rows from its source
//! before producing the first output row, because the group of a row is not final
//! until the whole input is seen. Groups are emitted in the order they are first seen.
//! Note that this order depends on the order of the input.
//!
//! Memory consumption is proportional to the number of the distinct groups and it is
//! not capped. If the input is sorted by the group by expressions, use the
//! [`StreamAggregate`] instead, it only keeps a single group in memory
//!
//! [`StreamAggregate`]: super::stream_aggregate::StreamAggregate

use std::sync::Arc;
use std::time::Duration;

use data_chunk::datum::Datum;
use data_chunk::row::EncodedRow;
use data_chunk::types::LogicalType;
use hashbrown::HashTable;
use pushdown_agg_procedural_macro::MetricsSetBuilder;
use snafu::ResultExt;

use super::group_key::GroupKeyBuilder;
use super::{AggregateError, RowDecoder};
use crate::common::exec_context::ExecContext;
use crate::common::profiler::ScopedTimerGuard;
use crate::common::utils::hash::BUILD_HASHER_DEFAULT;
use crate::common::uuid::QueryId;
use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::aggregate::{
    AggregateState, AggregateStates, AggregationFunction, AggregationFunctionList,
};
use crate::exec::physical_expr::utils::compact_display_expressions;
use crate::exec::physical_operator::metric::{Count, MetricsSet, Time};
use crate::exec::physical_operator::utils::{impl_counts_for_non_scan, impl_cursor_for_non_scan};
use crate::exec::physical_operator::{
    DecodeSnafu, EvaluateSnafu, OperatorResult, ReadDataSnafu, RowSource, Source, Stringify,
    UpdateAggregationSnafu,
};

const OPERATOR: &str = "HashAggregate";

/// Groups found by the [`HashAggregate`], stored in the order they are first seen.
///
/// The hash table only stores the index of the group, the keys and states of the
/// groups are stored in the side arenas. The states are flattened: the `i`th group
/// owns the states in `[i * num_funcs, (i + 1) * num_funcs)`
#[derive(Debug)]
struct GroupTable {
    index: HashTable<usize>,
    /// Hash value of the key of each group
    hashes: Vec<u64>,
    /// Key of each group, its columns are the group by values
    keys: Vec<EncodedRow>,
    states: Vec<Box<dyn AggregateState>>,
    num_funcs: usize,
    /// Group of the last row. Consecutive rows often belong to the same group, we can
    /// avoid hashing and probing for them
    last_group: Option<usize>,
}

impl GroupTable {
    fn new(num_funcs: usize) -> Self {
        Self {
            index: HashTable::new(),
            hashes: Vec::new(),
            keys: Vec::new(),
            states: Vec::new(),
            num_funcs,
            last_group: None,
        }
    }

    /// Number of groups
    #[inline]
    fn len(&self) -> usize {
        self.keys.len()
    }

    /// Find the group of the key, create a new group with initial states if it does
    /// not exist
    fn find_or_insert(&mut self, key: &EncodedRow, funcs: &AggregationFunctionList) -> usize {
        let key_bytes = key.as_bytes();
        if let Some(group) = self.last_group {
            if self.keys[group].as_bytes() == key_bytes {
                return group;
            }
        }

        let hash = BUILD_HASHER_DEFAULT.hash_one(key_bytes);
        let group = match self
            .index
            .find(hash, |&group| self.keys[group].as_bytes() == key_bytes)
        {
            Some(&group) => group,
            None => {
                let group = self.keys.len();
                self.index
                    .insert_unique(hash, group, |&group| self.hashes[group]);
                self.hashes.push(hash);
                self.keys.push(key.clone());
                funcs.create_states_into(&mut self.states);
                group
            }
        };
        self.last_group = Some(group);
        group
    }

    #[inline]
    fn group_states(&self, group: usize) -> &AggregateStates {
        &self.states[group * self.num_funcs..(group + 1) * self.num_funcs]
    }

    #[inline]
    fn group_states_mut(&mut self, group: usize) -> &mut AggregateStates {
        &mut self.states[group * self.num_funcs..(group + 1) * self.num_funcs]
    }

    /// Release the memory of all of the groups
    fn clear(&mut self) {
        *self = Self::new(self.num_funcs);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAggregateStatus {
    NotStarted,
    /// Reading the source. If a pull observes this status, the previous pull must
    /// have failed
    Accumulating,
    /// Emitting the groups, `cursor` is the index of the next group
    Draining {
        cursor: usize,
    },
    Exhausted,
}

/// Metrics for the hash aggregate
#[derive(Debug, Default, MetricsSetBuilder)]
struct HashAggregateMetrics {
    /// Number of rows read from the source
    input_rows: Count,
    /// Number of groups
    groups: Count,
    /// Number of rows produced by the aggregate
    output_rows: Count,
    /// Time spent in reading the source and updating the groups
    accumulate_time: Time,
    /// Time spent in probing the hash table
    probing_time: Time,
}

/// Aggregate the rows in any order with hash table. It produces rows in the format:
/// the partial results of the aggregation functions followed by the group by values
#[derive(Debug)]
pub struct HashAggregate {
    source: Box<dyn RowSource>,
    decoder: RowDecoder,
    group_key: GroupKeyBuilder,
    funcs: AggregationFunctionList,
    field_types: Vec<LogicalType>,
    table: GroupTable,
    status: HashAggregateStatus,
    /// Reused key of the current row
    key: EncodedRow,
    /// Reused output row
    output: EncodedRow,
    /// Reused partial results of a group
    partial_results: Vec<Datum>,
    query_id: QueryId,
    metrics: HashAggregateMetrics,
}

impl HashAggregate {
    /// Try to create a new [`HashAggregate`]. Fields referenced by the group by
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
            table: GroupTable::new(funcs.len()),
            group_key,
            funcs,
            field_types,
            status: HashAggregateStatus::NotStarted,
            key: EncodedRow::new(),
            output: EncodedRow::new(),
            partial_results: Vec::new(),
            query_id: exec_ctx.query_id,
            metrics: HashAggregateMetrics::default(),
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

    /// Read all of the rows from the source and aggregate them into the table
    fn accumulate(&mut self) -> OperatorResult<()> {
        let _span = tracing::debug_span!("accumulate", op = OPERATOR, query_id = %self.query_id)
            .entered();

        let mut input_rows = 0_u64;
        let mut accumulate_time = Duration::ZERO;
        let mut probing_time = Duration::ZERO;
        {
            let _guard = ScopedTimerGuard::new(&mut accumulate_time);
            while let Some(row) = self
                .source
                .next()
                .boxed()
                .context(ReadDataSnafu { op: OPERATOR })?
            {
                input_rows += 1;
                let row = self
                    .decoder
                    .decode(row)
                    .context(DecodeSnafu { op: OPERATOR })?;
                self.group_key
                    .build(row, &mut self.key)
                    .context(EvaluateSnafu { op: OPERATOR })?;

                let group = {
                    let _guard = ScopedTimerGuard::new(&mut probing_time);
                    self.table.find_or_insert(&self.key, &self.funcs)
                };
                self.funcs
                    .update_states(self.table.group_states_mut(group), row)
                    .context(UpdateAggregationSnafu { op: OPERATOR })?;
            }
        }

        self.metrics.input_rows.add(input_rows);
        self.metrics.groups.add(self.table.len() as u64);
        self.metrics.accumulate_time.add_duration(accumulate_time);
        self.metrics.probing_time.add_duration(probing_time);
        tracing::debug!(
            "HashAggregate: aggregate {} rows into {} groups in `{:?}`. Probing time: `{:?}`",
            input_rows,
            self.table.len(),
            accumulate_time,
            probing_time
        );
        Ok(())
    }
}

impl Stringify for HashAggregate {
    fn name(&self) -> &'static str {
        OPERATOR
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HashAggregate: group_by=")?;
        compact_display_expressions(f, self.group_key.exprs())?;
        write!(f, ", funcs={}", self.funcs)
    }
}

impl Source for HashAggregate {
    fn field_types(&self) -> &[LogicalType] {
        &self.field_types
    }

    fn metrics(&self) -> MetricsSet {
        self.metrics.metrics_set()
    }

    impl_counts_for_non_scan!();

    impl_cursor_for_non_scan!();
}

impl RowSource for HashAggregate {
    fn next(&mut self) -> OperatorResult<Option<&EncodedRow>> {
        loop {
            match self.status {
                HashAggregateStatus::NotStarted => {
                    self.status = HashAggregateStatus::Accumulating;
                    self.accumulate()?;
                    self.status = HashAggregateStatus::Draining { cursor: 0 };
                }
                HashAggregateStatus::Accumulating => {
                    panic!("`HashAggregate` is pulled again after it returned an error")
                }
                HashAggregateStatus::Draining { cursor } => {
                    if cursor == self.table.len() {
                        self.table.clear();
                        self.status = HashAggregateStatus::Exhausted;
                        return Ok(None);
                    }

                    self.partial_results.clear();
                    self.funcs.partial_results(
                        self.table.group_states(cursor),
                        &mut self.partial_results,
                    );
                    self.output.clear();
                    self.partial_results
                        .iter()
                        .for_each(|datum| self.output.push_datum(datum.as_ref()));
                    self.output.extend_from_row(&self.table.keys[cursor]);

                    self.metrics.output_rows.add(1);
                    self.status = HashAggregateStatus::Draining { cursor: cursor + 1 };
                    return Ok(Some(&self.output));
                }
                HashAggregateStatus::Exhausted => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::super::tests::{
        abc_rows, abc_types, count, count_star, drain_rows, field, init_tracing, memory_source,
        sum,
    };
    use super::*;
    use crate::common::exec_context::tests::mock_exec_context;
    use crate::exec::physical_expr::function::aggregate::avg::Avg;
    use crate::exec::physical_operator::OperatorError;
    use crate::exec::physical_operator::memory_source::tests::{
        FailingSource, TruncatedRowSource,
    };
    use expect_test::expect;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    fn hash_aggregate(
        source: Box<dyn RowSource>,
        group_by: Vec<Arc<dyn PhysicalExpr>>,
        funcs: Vec<Arc<dyn AggregationFunction>>,
    ) -> HashAggregate {
        HashAggregate::try_new(&mock_exec_context(), source, group_by, funcs).unwrap()
    }

    #[test]
    fn test_count_groups_in_first_seen_order() {
        init_tracing();

        let mut rows = abc_rows();
        // c, b, b, b, a, a
        rows.swap(0, 5);
        rows.swap(1, 4);
        let mut agg = hash_aggregate(
            memory_source(abc_types(), rows),
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
                vec![Datum::UInt64(1), Datum::from("c")],
                vec![Datum::UInt64(3), Datum::from("b")],
                vec![Datum::UInt64(2), Datum::from("a")],
            ]
        );
        assert!(agg.next().unwrap().is_none());

        let mut counts = Vec::new();
        agg.collect_output_counts(&mut counts);
        assert_eq!(counts, [6, 3]);
        let metrics = agg.metrics();
        assert_eq!(metrics.count("input_rows"), Some(6));
        assert_eq!(metrics.count("groups"), Some(3));
    }

    #[test]
    fn test_output_is_independent_of_input_order() {
        let mut rng = StdRng::seed_from_u64(44);
        let rows = (0..200_i64)
            .map(|v| vec![Datum::Int64(v % 7), Datum::Int64(v)])
            .collect::<Vec<_>>();
        let types = vec![LogicalType::BigInt, LogicalType::BigInt];

        let aggregate = |rows: Vec<Vec<Datum>>| {
            let mut agg = hash_aggregate(
                memory_source(types.clone(), rows),
                vec![field(0, LogicalType::BigInt)],
                vec![count_star(), sum(1, LogicalType::BigInt)],
            );
            drain_rows(&mut agg)
        };

        let expected = aggregate(rows.clone())
            .into_iter()
            .map(|row| format!("{:?}", row))
            .collect::<BTreeSet<_>>();
        assert_eq!(expected.len(), 7);

        for _ in 0..5 {
            let mut shuffled = rows.clone();
            shuffled.shuffle(&mut rng);
            let first_seen = shuffled.iter().fold(Vec::new(), |mut keys, row| {
                if !keys.contains(&row[0]) {
                    keys.push(row[0].clone());
                }
                keys
            });

            let output = aggregate(shuffled);
            // Emitted in first seen order
            assert_eq!(
                output.iter().map(|row| row[2].clone()).collect::<Vec<_>>(),
                first_seen
            );
            let output = output
                .into_iter()
                .map(|row| format!("{:?}", row))
                .collect::<BTreeSet<_>>();
            assert_eq!(output, expected);
        }
    }

    #[test]
    fn test_group_completeness() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut rows = (0..500_u64)
            .map(|v| {
                let key = if v % 11 == 0 {
                    Datum::Null
                } else {
                    Datum::UInt64(v % 37)
                };
                vec![key, Datum::UInt64(v)]
            })
            .collect::<Vec<_>>();
        rows.shuffle(&mut rng);

        let mut expected = BTreeMap::new();
        for row in &rows {
            let entry = expected
                .entry(format!("{:?}", row[0]))
                .or_insert((0_u64, 0_u64));
            entry.0 += 1;
            let Datum::UInt64(v) = row[1] else {
                unreachable!()
            };
            entry.1 += v;
        }

        let mut agg = hash_aggregate(
            memory_source(
                vec![LogicalType::UnsignedBigInt, LogicalType::UnsignedBigInt],
                rows,
            ),
            vec![field(0, LogicalType::UnsignedBigInt)],
            vec![
                count(1, LogicalType::UnsignedBigInt),
                sum(1, LogicalType::UnsignedBigInt),
            ],
        );
        let actual = drain_rows(&mut agg)
            .into_iter()
            .map(|row| {
                let (Datum::UInt64(count), Datum::UInt64(sum)) = (&row[0], &row[1]) else {
                    panic!("unexpected row: {:?}", row)
                };
                (format!("{:?}", row[2]), (*count, *sum))
            })
            .collect::<BTreeMap<_, _>>();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_global_aggregation() {
        let mut agg = hash_aggregate(
            memory_source(abc_types(), abc_rows()),
            vec![],
            vec![
                count_star(),
                Arc::new(Avg::try_new(vec![field(1, LogicalType::BigInt)]).unwrap()),
            ],
        );
        assert_eq!(
            drain_rows(&mut agg),
            [vec![
                Datum::UInt64(6),
                Datum::UInt64(6),
                Datum::Int64(15)
            ]]
        );

        // Empty input produces nothing, even if there is no group by
        let mut agg = hash_aggregate(
            memory_source(abc_types(), vec![]),
            vec![],
            vec![count_star()],
        );
        assert!(drain_rows(&mut agg).is_empty());
    }

    #[test]
    fn test_display() {
        let agg = hash_aggregate(
            memory_source(abc_types(), vec![]),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star(), sum(1, LogicalType::BigInt)],
        );
        let expect = expect!["HashAggregate: group_by=[#0], funcs=[CountStar, Sum(#1)]"];
        expect.assert_eq(&(&agg as &dyn RowSource).to_string());
    }

    #[test]
    fn test_field_out_of_range() {
        let error = HashAggregate::try_new(
            &mock_exec_context(),
            memory_source(abc_types(), vec![]),
            vec![field(0, LogicalType::VarChar)],
            vec![sum(2, LogicalType::BigInt)],
        )
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "`HashAggregate` references the field `2`, however its source only has 2 fields"
        );
    }

    #[test]
    fn test_errors_are_propagated() {
        // Source
        let mut agg = hash_aggregate(
            Box::new(FailingSource::new(abc_types(), abc_rows())),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        assert!(matches!(
            agg.next().unwrap_err(),
            OperatorError::ReadData {
                op: "HashAggregate",
                ..
            }
        ));

        // Evaluate the group by
        let mut agg = hash_aggregate(
            memory_source(abc_types(), abc_rows()),
            vec![field(0, LogicalType::BigInt)],
            vec![count_star()],
        );
        assert!(matches!(
            agg.next().unwrap_err(),
            OperatorError::Evaluate { .. }
        ));

        // Update the states
        let mut agg = hash_aggregate(
            memory_source(
                vec![LogicalType::UnsignedBigInt],
                vec![vec![Datum::UInt64(u64::MAX)], vec![Datum::UInt64(1)]],
            ),
            vec![],
            vec![sum(0, LogicalType::UnsignedBigInt)],
        );
        let error = agg.next().unwrap_err();
        assert_eq!(
            error.to_string(),
            "`HashAggregate` failed to update the aggregation states"
        );
    }

    #[test]
    fn test_truncated_row() {
        let mut rows = abc_rows();
        rows.truncate(1);
        let mut agg = hash_aggregate(
            Box::new(TruncatedRowSource::new(abc_types(), rows)),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        // The group accumulated before the truncated row is not emitted
        let error = agg.next().unwrap_err();
        assert!(matches!(
            error,
            OperatorError::Decode {
                op: "HashAggregate",
                ..
            }
        ));
        assert_eq!(
            error.to_string(),
            "`HashAggregate` failed to decode the row read from its source"
        );
    }

    #[test]
    #[should_panic(expected = "pulled again after it returned an error")]
    fn test_pull_after_error() {
        let mut agg = hash_aggregate(
            Box::new(FailingSource::new(abc_types(), abc_rows())),
            vec![field(0, LogicalType::VarChar)],
            vec![count_star()],
        );
        assert!(agg.next().is_err());
        let _ = agg.next();
    }

    #[test]
    #[should_panic(expected = "only the scan operator has cursor")]
    fn test_cursor() {
        let agg = hash_aggregate(
            memory_source(abc_types(), vec![]),
            vec![],
            vec![count_star()],
        );
        agg.cursor();
    }
}
