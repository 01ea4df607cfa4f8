//! Count the distinct tuples of the arguments

use std::sync::Arc;

use data_chunk::codec::encode_value;
use data_chunk::datum::Datum;
use data_chunk::types::LogicalType;
use hashbrown::HashSet;

use crate::common::utils::hash::{BUILD_HASHER_DEFAULT, BuildHasherDefault};
use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::Function;
use crate::exec::physical_expr::utils::compact_display_expressions;

use super::{AggregateState, AggregationFunction, ArgCountMismatchSnafu, Result, Stringify};

/// Aggregation state of the count distinct function. Tuples are deduplicated by their
/// encoded bytes, tuples that contain `NULL` are ignored
#[derive(Debug)]
pub struct CountDistinctState {
    seen: HashSet<Vec<u8>, BuildHasherDefault>,
    scratch: Vec<u8>,
}

impl Default for CountDistinctState {
    fn default() -> Self {
        Self {
            seen: HashSet::with_hasher(BUILD_HASHER_DEFAULT),
            scratch: Vec::new(),
        }
    }
}

impl AggregateState for CountDistinctState {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn update(&mut self, args: &[Datum]) -> Result<()> {
        if args.iter().any(Datum::is_null) {
            return Ok(());
        }

        self.scratch.clear();
        args.iter()
            .for_each(|arg| encode_value(arg.as_ref(), &mut self.scratch));
        if !self.seen.contains(self.scratch.as_slice()) {
            self.seen.insert(self.scratch.clone());
        }
        Ok(())
    }

    fn partial_result(&self, output: &mut Vec<Datum>) {
        output.push(self.final_result());
    }

    fn final_result(&self) -> Datum {
        Datum::UInt64(self.seen.len() as u64)
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

/// Count distinct function.
///
/// The partial result is the number of distinct tuples seen by this executor, the upper
/// layer can only sum the partial results when the executors see disjoint tuples
#[derive(Debug)]
pub struct CountDistinct {
    args: Vec<Arc<dyn PhysicalExpr>>,
}

impl CountDistinct {
    /// Try to create a new [`CountDistinct`] function, it needs at least one argument
    pub fn try_new(args: Vec<Arc<dyn PhysicalExpr>>) -> Result<Self> {
        if args.is_empty() {
            return ArgCountMismatchSnafu {
                func: "CountDistinct",
                expect: "at least 1",
                actual: 0_usize,
            }
            .fail();
        }
        Ok(Self { args })
    }
}

impl Stringify for CountDistinct {
    fn name(&self) -> &'static str {
        "CountDistinct"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CountDistinct")?;
        compact_display_expressions(f, &self.args)
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl Function for CountDistinct {
    fn arguments(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        LogicalType::UnsignedBigInt
    }
}

impl AggregationFunction for CountDistinct {
    fn create_state(&self) -> Box<dyn AggregateState> {
        Box::new(CountDistinctState::default())
    }

    fn partial_types(&self) -> &[LogicalType] {
        &[LogicalType::UnsignedBigInt]
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::field;
    use super::*;

    #[test]
    fn test_count_distinct_tuples() {
        let func: Arc<dyn AggregationFunction> = Arc::new(
            CountDistinct::try_new(vec![
                field(0, LogicalType::BigInt),
                field(1, LogicalType::VarChar),
            ])
            .unwrap(),
        );
        assert_eq!(func.to_string(), "CountDistinct[#0, #1]");

        let mut state = func.create_state();
        let rows = [
            [Datum::Int64(1), Datum::from("a")],
            [Datum::Int64(1), Datum::from("a")],
            [Datum::Int64(1), Datum::from("b")],
            [Datum::Int64(1), Datum::Null],
            [Datum::Int64(2), Datum::from("a")],
        ];
        rows.iter()
            .for_each(|row| state.update(row).unwrap());
        assert_eq!(state.final_result(), Datum::UInt64(3));

        state.reset();
        assert_eq!(state.final_result(), Datum::UInt64(0));
    }

    #[test]
    fn test_count_distinct_without_args() {
        assert!(CountDistinct::try_new(vec![]).is_err());
    }
}
