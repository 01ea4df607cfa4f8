//! Aggregate functions
//!
//! An aggregation function is split into two parts:
//!
//! - [`AggregationFunction`]: the descriptor. It is shared by all of the groups, it
//! knows the arguments and the types of the function
//!
//! - [`AggregateState`]: the accumulator of a single group, created by the descriptor.
//! The state is updated row by row, it can produce the partial result that will be
//! merged by the upper layer and the final result. Stream aggregation reuses the
//! state across groups via [`AggregateState::reset`]

pub mod avg;
pub mod count;
pub mod count_distinct;
pub mod first_row;
pub mod min_max;
pub mod sum;

use std::fmt::{Debug, Display};
use std::sync::Arc;

use data_chunk::chunk::Chunk;
use data_chunk::datum::Datum;
use data_chunk::row::RowRef;
use data_chunk::types::LogicalType;
use snafu::{ResultExt, Snafu};

use super::Function;
use crate::error::SendableError;
use crate::exec::physical_expr::utils::display_agg_funcs;
use crate::exec::physical_expr::{ExprError, PhysicalExpr, Stringify};

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum AggregationError {
    #[snafu(display(
        "`{func}` aggregation function expect {expect} arguments, found {actual} arguments"
    ))]
    ArgCountMismatch {
        func: &'static str,
        expect: &'static str,
        actual: usize,
    },
    #[snafu(display(
        "`{func}` aggregation function expect `{expect}` argument, however the arg has logical type `{arg_type}`"
    ))]
    ArgTypeMismatch {
        func: &'static str,
        expect: &'static str,
        arg_type: LogicalType,
    },
    #[snafu(display("Failed to evaluate the arguments of the `{func}`"))]
    EvaluateArgs { func: &'static str, source: ExprError },
    #[snafu(display(
        "`{func}` aggregation function receives argument `{datum}` that does not match its signature"
    ))]
    UnexpectedArg { func: &'static str, datum: String },
    #[snafu(display("Overflow happens when computing the `{func}` aggregation function"))]
    Overflow { func: &'static str },
    #[snafu(display("Failed to update the aggregation states of the `{func}`"))]
    UpdateStates {
        func: &'static str,
        source: SendableError,
    },
}

/// Aggregation result
pub type Result<T> = std::result::Result<T, AggregationError>;

/// Accumulator of a single group
pub trait AggregateState: Debug + Send + Sync + 'static {
    /// `as_any_mut` for downcast
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;

    /// Update the state with the evaluated arguments of a row
    fn update(&mut self, args: &[Datum]) -> Result<()>;

    /// Append the partial result to the output. The appended values should match
    /// [`AggregationFunction::partial_types`]
    fn partial_result(&self, output: &mut Vec<Datum>);

    /// Final result of the group
    fn final_result(&self) -> Datum;

    /// Reset the state to the initial state, as if it is newly created
    fn reset(&mut self);
}

/// Descriptor of the aggregation function
pub trait AggregationFunction: Function + Stringify {
    /// Create the initial state
    fn create_state(&self) -> Box<dyn AggregateState>;

    /// Logical types of the partial result
    fn partial_types(&self) -> &[LogicalType];

    /// Evaluate the arguments on the row and update the state with them
    ///
    /// `args` is a scratch buffer that can be reused across calls
    fn update(
        &self,
        state: &mut dyn AggregateState,
        row: RowRef<'_>,
        args: &mut Vec<Datum>,
    ) -> Result<()> {
        args.clear();
        for arg in self.arguments() {
            args.push(arg.eval(row).context(EvaluateArgsSnafu { func: self.name() })?);
        }
        state.update(args)
    }

    /// Update the state with the selected rows in the chunk
    fn update_batch(
        &self,
        state: &mut dyn AggregateState,
        chunk: &Chunk,
        rows: &[usize],
        args: &mut Vec<Datum>,
    ) -> Result<()> {
        for &row in rows {
            self.update(state, chunk.row(row), args)?;
        }
        Ok(())
    }
}

impl Debug for dyn AggregationFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.debug(f)
    }
}

impl Display for dyn AggregationFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

/// States of all of the aggregation functions in a group, the `i`th state belongs
/// to the `i`th function
pub type AggregateStates = [Box<dyn AggregateState>];

/// A self-contained list of aggregation functions. It knows how to create, update and
/// read the states of a group
pub struct AggregationFunctionList {
    /// List of the aggregation functions
    funcs: Vec<Arc<dyn AggregationFunction>>,
    /// Flattened partial types of all of the functions
    partial_types: Vec<LogicalType>,
    /// Scratch buffer for evaluating the arguments
    args: Vec<Datum>,
}

impl Debug for AggregationFunctionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationFunctionList")
            .field("funcs", &self.funcs)
            .finish()
    }
}

impl Display for AggregationFunctionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display_agg_funcs(f, &self.funcs)
    }
}

impl AggregationFunctionList {
    /// Create a new [`AggregationFunctionList`]
    pub fn new(funcs: Vec<Arc<dyn AggregationFunction>>) -> Self {
        let partial_types = funcs
            .iter()
            .flat_map(|func| func.partial_types().iter().copied())
            .collect();
        Self {
            funcs,
            partial_types,
            args: Vec::new(),
        }
    }

    /// Get the functions
    #[inline]
    pub fn funcs(&self) -> &[Arc<dyn AggregationFunction>] {
        &self.funcs
    }

    /// Number of functions
    #[inline]
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    /// Returns true if the list does not have any function
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    /// Flattened partial types of all of the functions
    #[inline]
    pub fn partial_types(&self) -> &[LogicalType] {
        &self.partial_types
    }

    /// Final types of all of the functions
    pub fn final_types(&self) -> impl Iterator<Item = LogicalType> + '_ {
        self.funcs.iter().map(|func| func.return_type())
    }

    /// Iterate the expressions of the arguments of all of the functions
    pub fn arguments(&self) -> impl Iterator<Item = &Arc<dyn PhysicalExpr>> + '_ {
        self.funcs.iter().flat_map(|func| func.arguments())
    }

    /// Create the initial states of a group and append them to `states`
    pub fn create_states_into(&self, states: &mut Vec<Box<dyn AggregateState>>) {
        states.extend(self.funcs.iter().map(|func| func.create_state()));
    }

    /// Create the initial states of a group
    pub fn create_states(&self) -> Vec<Box<dyn AggregateState>> {
        let mut states = Vec::with_capacity(self.funcs.len());
        self.create_states_into(&mut states);
        states
    }

    /// Update the states of a group with the row
    pub fn update_states(&mut self, states: &mut AggregateStates, row: RowRef<'_>) -> Result<()> {
        debug_assert_eq!(states.len(), self.funcs.len());
        for (func, state) in self.funcs.iter().zip(states) {
            func.update(state.as_mut(), row, &mut self.args)?;
        }
        Ok(())
    }

    /// Update the states of a group with the selected rows in the chunk
    pub fn update_states_batch(
        &mut self,
        states: &mut AggregateStates,
        chunk: &Chunk,
        rows: &[usize],
    ) -> Result<()> {
        debug_assert_eq!(states.len(), self.funcs.len());
        if rows.is_empty() {
            return Ok(());
        }
        for (func, state) in self.funcs.iter().zip(states) {
            func.update_batch(state.as_mut(), chunk, rows, &mut self.args)?;
        }
        Ok(())
    }

    /// Append the partial results of the states to the output
    pub fn partial_results(&self, states: &AggregateStates, output: &mut Vec<Datum>) {
        states
            .iter()
            .for_each(|state| state.partial_result(output));
    }

    /// Append the final results of the states to the output
    pub fn final_results(&self, states: &AggregateStates, output: &mut Vec<Datum>) {
        output.extend(states.iter().map(|state| state.final_result()));
    }

    /// Reset the states to the initial states
    pub fn reset_states(&self, states: &mut AggregateStates) {
        states.iter_mut().for_each(|state| state.reset());
    }
}

/// Helper to validate the single argument of the unary aggregation function
fn unary_argument(
    func: &'static str,
    mut args: Vec<Arc<dyn PhysicalExpr>>,
) -> Result<Arc<dyn PhysicalExpr>> {
    match args.len() {
        1 => Ok(args.remove(0)),
        actual => ArgCountMismatchSnafu {
            func,
            expect: "1",
            actual,
        }
        .fail(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exec::physical_expr::field_ref::FieldRef;
    use data_chunk::datum::DatumRef;

    pub(crate) fn field(index: usize, logical_type: LogicalType) -> Arc<dyn PhysicalExpr> {
        Arc::new(FieldRef::new(index, logical_type))
    }

    /// Update the state with each value as the single argument
    pub(crate) fn update_values(
        state: &mut dyn AggregateState,
        values: impl IntoIterator<Item = Datum>,
    ) -> Result<()> {
        values
            .into_iter()
            .try_for_each(|value| state.update(std::slice::from_ref(&value)))
    }

    pub(crate) fn partial_result(state: &dyn AggregateState) -> Vec<Datum> {
        let mut output = Vec::new();
        state.partial_result(&mut output);
        output
    }

    #[test]
    fn test_function_list_lifecycle() {
        let funcs: Vec<Arc<dyn AggregationFunction>> = vec![
            Arc::new(count::CountStar::new()),
            Arc::new(sum::Sum::try_new(vec![field(0, LogicalType::BigInt)]).unwrap()),
            Arc::new(avg::Avg::try_new(vec![field(0, LogicalType::BigInt)]).unwrap()),
        ];
        let mut list = AggregationFunctionList::new(funcs);
        assert_eq!(
            list.partial_types(),
            [
                LogicalType::UnsignedBigInt,
                LogicalType::BigInt,
                LogicalType::UnsignedBigInt,
                LogicalType::BigInt
            ]
        );
        assert_eq!(list.to_string(), "[CountStar, Sum(#0), Avg(#0)]");

        let mut states = list.create_states();
        let mut chunk = Chunk::with_logical_types(&[LogicalType::BigInt]);
        [1, 2, 3, 4].into_iter().for_each(|v| {
            chunk.push_row(&[DatumRef::Int64(v)]).unwrap();
        });
        list.update_states_batch(&mut states, &chunk, &[0, 2, 3])
            .unwrap();
        list.update_states(&mut states, chunk.row(1)).unwrap();

        let mut output = Vec::new();
        list.partial_results(&states, &mut output);
        assert_eq!(
            output,
            [
                Datum::UInt64(4),
                Datum::Int64(10),
                Datum::UInt64(4),
                Datum::Int64(10)
            ]
        );

        output.clear();
        list.final_results(&states, &mut output);
        assert_eq!(
            output,
            [Datum::UInt64(4), Datum::Int64(10), Datum::Float64(2.5)]
        );

        list.reset_states(&mut states);
        output.clear();
        list.partial_results(&states, &mut output);
        assert_eq!(
            output,
            [
                Datum::UInt64(0),
                Datum::Null,
                Datum::UInt64(0),
                Datum::Int64(0)
            ]
        );
    }

    #[test]
    fn test_evaluate_args_failed() {
        let mut list = AggregationFunctionList::new(vec![Arc::new(
            sum::Sum::try_new(vec![field(3, LogicalType::BigInt)]).unwrap(),
        )]);
        let mut states = list.create_states();
        let row = [Datum::Int64(1)];
        let error = list
            .update_states(&mut states, RowRef::from(&row[..]))
            .unwrap_err();
        assert!(matches!(
            error,
            AggregationError::EvaluateArgs { func: "Sum", .. }
        ));
    }
}
