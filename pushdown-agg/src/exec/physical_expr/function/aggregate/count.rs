//! Count function

use std::sync::Arc;

use data_chunk::chunk::Chunk;
use data_chunk::datum::Datum;
use data_chunk::types::LogicalType;

use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::Function;

use super::{AggregateState, AggregationFunction, Result, Stringify, unary_argument};

/// Count(*) function
pub type CountStar = Count<true>;

/// Aggregation state of the count function
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct CountState(u64);

impl AggregateState for CountState {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    #[inline]
    fn update(&mut self, args: &[Datum]) -> Result<()> {
        // Count(*) does not have argument
        if args.iter().all(|arg| !arg.is_null()) {
            self.0 += 1;
        }
        Ok(())
    }

    fn partial_result(&self, output: &mut Vec<Datum>) {
        output.push(Datum::UInt64(self.0));
    }

    fn final_result(&self) -> Datum {
        Datum::UInt64(self.0)
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Aggregation function that count the number of elements
///
/// If the `STAR` generic is true, the count will take `NULL` into consideration
#[derive(Debug)]
pub struct Count<const STAR: bool> {
    args: Vec<Arc<dyn PhysicalExpr>>,
}

impl CountStar {
    /// Create a new Count(*) function
    pub fn new() -> Self {
        Self { args: Vec::new() }
    }
}

impl Default for CountStar {
    fn default() -> Self {
        Self::new()
    }
}

impl Count<false> {
    /// Try to create a new Count function that counts the non-null values of the
    /// argument
    pub fn try_new(args: Vec<Arc<dyn PhysicalExpr>>) -> Result<Self> {
        let arg = unary_argument("Count", args)?;
        Ok(Self { args: vec![arg] })
    }
}

impl<const STAR: bool> Stringify for Count<STAR> {
    #[inline]
    fn name(&self) -> &'static str {
        if STAR { "CountStar" } else { "Count" }
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if STAR {
            write!(f, "CountStar")
        } else {
            write!(f, "Count(")?;
            self.args[0].compact_display(f)?;
            write!(f, ")")
        }
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl<const STAR: bool> Function for Count<STAR> {
    fn arguments(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        LogicalType::UnsignedBigInt
    }
}

impl<const STAR: bool> AggregationFunction for Count<STAR> {
    fn create_state(&self) -> Box<dyn AggregateState> {
        Box::new(CountState::default())
    }

    fn partial_types(&self) -> &[LogicalType] {
        &[LogicalType::UnsignedBigInt]
    }

    fn update_batch(
        &self,
        state: &mut dyn AggregateState,
        chunk: &Chunk,
        rows: &[usize],
        args: &mut Vec<Datum>,
    ) -> Result<()> {
        if STAR {
            // Count(*) only needs to know the number of rows
            if let Some(state) = state.as_any_mut().downcast_mut::<CountState>() {
                state.0 += rows.len() as u64;
                return Ok(());
            }
        }

        for &row in rows {
            self.update(state, chunk.row(row), args)?;
        }
        Ok(())
    }
}
