//! Compare the hash aggregate with the stream aggregates on sorted input

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use data_chunk::chunk::Chunk;
use data_chunk::datum::Datum;
use data_chunk::types::LogicalType;
use pushdown_agg::common::exec_context::{ExecArgs, ExecContext};
use pushdown_agg::common::uuid::QueryId;
use pushdown_agg::exec::physical_expr::PhysicalExpr;
use pushdown_agg::exec::physical_expr::field_ref::FieldRef;
use pushdown_agg::exec::physical_expr::function::aggregate::AggregationFunction;
use pushdown_agg::exec::physical_expr::function::aggregate::count::CountStar;
use pushdown_agg::exec::physical_expr::function::aggregate::sum::Sum;
use pushdown_agg::exec::physical_operator::aggregate::hash_aggregate::HashAggregate;
use pushdown_agg::exec::physical_operator::aggregate::stream_aggregate::{
    BatchStreamAggregate, StreamAggregate,
};
use pushdown_agg::exec::physical_operator::memory_source::MemorySource;
use pushdown_agg::exec::physical_operator::{BatchSource, RowSource, Source};
use rand::{Rng, SeedableRng};

const NUM_ROWS: usize = 1 << 16;

/// Rows `(k, v)` sorted by `k`
fn sorted_rows(num_groups: i64) -> Vec<Vec<Datum>> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut keys = (0..NUM_ROWS)
        .map(|_| rng.gen_range(0..num_groups))
        .collect::<Vec<_>>();
    keys.sort_unstable();
    keys.into_iter()
        .map(|k| vec![Datum::Int64(k), Datum::Int64(rng.gen_range(-1000..1000))])
        .collect()
}

fn source(rows: &[Vec<Datum>]) -> Box<MemorySource> {
    Box::new(
        MemorySource::try_new(vec![LogicalType::BigInt, LogicalType::BigInt], rows.to_vec())
            .unwrap(),
    )
}

fn field(index: usize) -> Arc<dyn PhysicalExpr> {
    Arc::new(FieldRef::new(index, LogicalType::BigInt))
}

fn group_by() -> Vec<Arc<dyn PhysicalExpr>> {
    vec![field(0)]
}

fn funcs() -> Vec<Arc<dyn AggregationFunction>> {
    vec![
        Arc::new(CountStar::new()),
        Arc::new(Sum::try_new(vec![field(1)]).unwrap()),
    ]
}

fn bench_aggregate(c: &mut Criterion) {
    let exec_ctx = ExecContext::try_new(QueryId::from_u128(7), ExecArgs::default()).unwrap();
    let mut group = c.benchmark_group("aggregate");

    for num_groups in [16, 1024, 16384] {
        let rows = sorted_rows(num_groups);

        group.bench_with_input(BenchmarkId::new("hash", num_groups), &rows, |b, rows| {
            b.iter(|| {
                let mut agg =
                    HashAggregate::try_new(&exec_ctx, source(rows), group_by(), funcs()).unwrap();
                let mut groups = 0;
                while let Some(row) = agg.next().unwrap() {
                    black_box(row);
                    groups += 1;
                }
                groups
            })
        });

        group.bench_with_input(BenchmarkId::new("stream", num_groups), &rows, |b, rows| {
            b.iter(|| {
                let mut agg =
                    StreamAggregate::try_new(&exec_ctx, source(rows), group_by(), funcs())
                        .unwrap();
                let mut groups = 0;
                while let Some(row) = agg.next().unwrap() {
                    black_box(row);
                    groups += 1;
                }
                groups
            })
        });

        group.bench_with_input(
            BenchmarkId::new("batch_stream", num_groups),
            &rows,
            |b, rows| {
                b.iter(|| {
                    let mut agg =
                        BatchStreamAggregate::try_new(&exec_ctx, source(rows), group_by(), funcs())
                            .unwrap();
                    let mut output = Chunk::with_logical_types(agg.field_types());
                    let mut groups = 0;
                    loop {
                        agg.next_batch(pushdown_agg::STANDARD_VECTOR_SIZE, &mut output)
                            .unwrap();
                        if output.is_empty() {
                            break;
                        }
                        groups += black_box(&output).len();
                    }
                    groups
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
