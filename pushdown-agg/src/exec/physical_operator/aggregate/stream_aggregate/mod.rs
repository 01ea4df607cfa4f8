//! Aggregate the input that is sorted by the group by expressions
//!
//! Rows of a group are adjacent in the sorted input, therefore a group is finished
//! as soon as a row with different group by values is seen. Only the states of the
//! current group are kept, they are reset and reused by the next group.
//!
//! The caller should guarantee the input is sorted, it is not verified. Unsorted input
//! produces a group for each run of the equal group by values, the same group may be
//! emitted many times

mod batch;
mod row;

pub use self::batch::BatchStreamAggregate;
pub use self::row::StreamAggregate;

use data_chunk::datum::Datum;
use data_chunk::row::EncodedRow;

use crate::exec::physical_expr::function::aggregate::{AggregateStates, AggregationFunctionList};

/// Encode the partial results of the states followed by the group by values into
/// the output row
fn encode_partial_group(
    funcs: &AggregationFunctionList,
    states: &AggregateStates,
    group_values: &[Datum],
    partial_results: &mut Vec<Datum>,
    output: &mut EncodedRow,
) {
    partial_results.clear();
    funcs.partial_results(states, partial_results);
    output.clear();
    partial_results
        .iter()
        .chain(group_values)
        .for_each(|datum| output.push_datum(datum.as_ref()));
}
