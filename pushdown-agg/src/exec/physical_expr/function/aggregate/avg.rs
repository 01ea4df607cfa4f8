//! Average aggregation function

use std::sync::Arc;

use data_chunk::datum::Datum;
use data_chunk::types::LogicalType;
use snafu::OptionExt;

use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::Function;

use super::sum::SumType;
use super::{
    AggregateState, AggregationFunction, ArgTypeMismatchSnafu, OverflowSnafu, Result, Stringify,
    UnexpectedArgSnafu, unary_argument,
};

/// Aggregation state for average function. The partial result is `(count, sum)`, such
/// that the upper layer can merge the partial results of different executors. The sum
/// has the type of the argument, integers are summed without losing precision
#[derive(Debug)]
pub struct AvgState<S: SumType> {
    /// Number of non-null values
    count: u64,
    /// Sum of the non-null values
    sum: S,
}

impl<S: SumType> Default for AvgState<S> {
    fn default() -> Self {
        Self {
            count: 0,
            sum: S::ZERO,
        }
    }
}

impl<S: SumType> AggregateState for AvgState<S> {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn update(&mut self, args: &[Datum]) -> Result<()> {
        let arg = &args[0];
        if arg.is_null() {
            return Ok(());
        }

        let value = S::from_datum(arg).with_context(|| UnexpectedArgSnafu {
            func: "Avg",
            datum: format!("{:?}", arg),
        })?;
        self.sum = self.sum.sum(value).context(OverflowSnafu { func: "Avg" })?;
        self.count += 1;
        Ok(())
    }

    fn partial_result(&self, output: &mut Vec<Datum>) {
        output.push(Datum::UInt64(self.count));
        output.push(self.sum.into_datum());
    }

    fn final_result(&self) -> Datum {
        if self.count == 0 {
            Datum::Null
        } else {
            Datum::Float64(self.sum.to_f64() / self.count as f64)
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.sum = S::ZERO;
    }
}

/// Average function
#[derive(Debug)]
pub struct Avg {
    args: Vec<Arc<dyn PhysicalExpr>>,
    /// Count followed by the sum
    partial_types: [LogicalType; 2],
}

impl Avg {
    /// Try to create a new [`Avg`] function, the argument should be numeric
    pub fn try_new(args: Vec<Arc<dyn PhysicalExpr>>) -> Result<Self> {
        let arg = unary_argument("Avg", args)?;
        let arg_type = arg.output_type();
        if !arg_type.is_numeric() {
            return ArgTypeMismatchSnafu {
                func: "Avg",
                expect: "numeric",
                arg_type,
            }
            .fail();
        }
        Ok(Self {
            args: vec![arg],
            partial_types: [LogicalType::UnsignedBigInt, arg_type],
        })
    }
}

impl Stringify for Avg {
    fn name(&self) -> &'static str {
        "Avg"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Avg(")?;
        self.args[0].compact_display(f)?;
        write!(f, ")")
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl Function for Avg {
    fn arguments(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        LogicalType::Double
    }
}

impl AggregationFunction for Avg {
    fn create_state(&self) -> Box<dyn AggregateState> {
        match self.partial_types[1] {
            LogicalType::BigInt => Box::new(AvgState::<i64>::default()),
            LogicalType::UnsignedBigInt => Box::new(AvgState::<u64>::default()),
            _ => Box::new(AvgState::<f64>::default()),
        }
    }

    fn partial_types(&self) -> &[LogicalType] {
        &self.partial_types
    }
}

#[cfg(test)]
mod tests {
    use super::super::AggregationError;
    use super::super::tests::{field, partial_result, update_values};
    use super::*;

    #[test]
    fn test_avg() {
        let avg = Avg::try_new(vec![field(0, LogicalType::UnsignedBigInt)]).unwrap();
        let mut state = avg.create_state();
        assert_eq!(state.final_result(), Datum::Null);

        update_values(
            state.as_mut(),
            [Datum::UInt64(1), Datum::Null, Datum::UInt64(4)],
        )
        .unwrap();
        assert_eq!(
            partial_result(state.as_ref()),
            [Datum::UInt64(2), Datum::UInt64(5)]
        );
        assert_eq!(state.final_result(), Datum::Float64(2.5));

        state.reset();
        assert_eq!(
            partial_result(state.as_ref()),
            [Datum::UInt64(0), Datum::UInt64(0)]
        );
    }

    #[test]
    fn test_avg_integer_sum_is_exact() {
        let avg = Avg::try_new(vec![field(0, LogicalType::BigInt)]).unwrap();
        assert_eq!(
            avg.partial_types(),
            [LogicalType::UnsignedBigInt, LogicalType::BigInt]
        );
        let mut state = avg.create_state();
        // Larger than the integers that f64 can represent exactly
        update_values(
            state.as_mut(),
            [Datum::Int64((1 << 53) + 1), Datum::Int64(2)],
        )
        .unwrap();
        assert_eq!(
            partial_result(state.as_ref()),
            [Datum::UInt64(2), Datum::Int64(9007199254740995)]
        );

        let avg = Avg::try_new(vec![field(0, LogicalType::Double)]).unwrap();
        let mut state = avg.create_state();
        update_values(state.as_mut(), [Datum::Float64(0.5), Datum::Float64(1.0)]).unwrap();
        assert_eq!(
            partial_result(state.as_ref()),
            [Datum::UInt64(2), Datum::Float64(1.5)]
        );
        assert_eq!(state.final_result(), Datum::Float64(0.75));
    }

    #[test]
    fn test_avg_overflow() {
        let avg = Avg::try_new(vec![field(0, LogicalType::BigInt)]).unwrap();
        let mut state = avg.create_state();
        let error =
            update_values(state.as_mut(), [Datum::Int64(i64::MAX), Datum::Int64(1)]).unwrap_err();
        assert!(matches!(error, AggregationError::Overflow { func: "Avg" }));
        // The failed value is not counted
        assert_eq!(
            partial_result(state.as_ref()),
            [Datum::UInt64(1), Datum::Int64(i64::MAX)]
        );
    }

    #[test]
    fn test_avg_invalid_arg() {
        let error = Avg::try_new(vec![field(0, LogicalType::Boolean)]).unwrap_err();
        assert_eq!(
            error.to_string(),
            "`Avg` aggregation function expect `numeric` argument, however the arg has logical type `Boolean`"
        );
    }
}
