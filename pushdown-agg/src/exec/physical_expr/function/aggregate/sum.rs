//! Sum the numeric values

use num_traits::CheckedAdd;
use std::fmt::Debug;
use std::sync::Arc;

use data_chunk::datum::Datum;
use data_chunk::types::LogicalType;
use snafu::OptionExt;

use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::Function;
use crate::private::Sealed;

use super::{
    AggregateState, AggregationFunction, ArgTypeMismatchSnafu, OverflowSnafu, Result, Stringify,
    UnexpectedArgSnafu, unary_argument,
};

/// Trait for all of the types that can be result of sum
pub trait SumType: Sealed + Debug + Copy + Send + Sync + 'static {
    /// Logical type of the argument and the result
    const LOGICAL_TYPE: LogicalType;

    /// Additive identity
    const ZERO: Self;

    /// Extract the value from datum, returns `None` if the datum has other type
    fn from_datum(datum: &Datum) -> Option<Self>;

    /// Convert self into datum
    fn into_datum(self) -> Datum;

    /// Add two values, returns `None` if overflow happens
    fn sum(self, other: Self) -> Option<Self>;

    /// Lossy conversion used to compute the average
    fn to_f64(self) -> f64;
}

macro_rules! impl_integer_sum_type {
    ($({$ty:ty, $variant:ident, $logical_type:ident}),+) => {
        $(
            impl Sealed for $ty {}

            impl SumType for $ty {
                const LOGICAL_TYPE: LogicalType = LogicalType::$logical_type;

                const ZERO: Self = 0;

                #[inline]
                fn from_datum(datum: &Datum) -> Option<Self> {
                    match datum {
                        Datum::$variant(v) => Some(*v),
                        _ => None,
                    }
                }

                #[inline]
                fn into_datum(self) -> Datum {
                    Datum::$variant(self)
                }

                #[inline]
                fn sum(self, other: Self) -> Option<Self> {
                    CheckedAdd::checked_add(&self, &other)
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )+
    };
}

impl_integer_sum_type!({i64, Int64, BigInt}, {u64, UInt64, UnsignedBigInt});

impl Sealed for f64 {}

impl SumType for f64 {
    const LOGICAL_TYPE: LogicalType = LogicalType::Double;

    const ZERO: Self = 0.0;

    #[inline]
    fn from_datum(datum: &Datum) -> Option<Self> {
        match datum {
            Datum::Float64(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    fn into_datum(self) -> Datum {
        Datum::Float64(self)
    }

    #[inline]
    fn sum(self, other: Self) -> Option<Self> {
        // Float overflows to infinity
        Some(self + other)
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// Aggregation state of the sum function. The sum is `NULL` if all of the values
/// are `NULL`
#[derive(Debug)]
pub struct SumState<S: SumType> {
    sum: Option<S>,
}

impl<S: SumType> Default for SumState<S> {
    fn default() -> Self {
        Self { sum: None }
    }
}

impl<S: SumType> AggregateState for SumState<S> {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn update(&mut self, args: &[Datum]) -> Result<()> {
        let arg = &args[0];
        if arg.is_null() {
            return Ok(());
        }

        let value = S::from_datum(arg).with_context(|| UnexpectedArgSnafu {
            func: "Sum",
            datum: format!("{:?}", arg),
        })?;
        self.sum = match self.sum {
            None => Some(value),
            Some(sum) => Some(sum.sum(value).context(OverflowSnafu { func: "Sum" })?),
        };
        Ok(())
    }

    fn partial_result(&self, output: &mut Vec<Datum>) {
        output.push(self.final_result());
    }

    fn final_result(&self) -> Datum {
        self.sum.map_or(Datum::Null, SumType::into_datum)
    }

    fn reset(&mut self) {
        self.sum = None;
    }
}

/// Sum function. Sum of the integers uses integer arithmetic, overflow is an error
#[derive(Debug)]
pub struct Sum {
    args: Vec<Arc<dyn PhysicalExpr>>,
    return_type: [LogicalType; 1],
}

impl Sum {
    /// Try to create a new [`Sum`] function, the argument should be numeric
    pub fn try_new(args: Vec<Arc<dyn PhysicalExpr>>) -> Result<Self> {
        let arg = unary_argument("Sum", args)?;
        let arg_type = arg.output_type();
        if !arg_type.is_numeric() {
            return ArgTypeMismatchSnafu {
                func: "Sum",
                expect: "numeric",
                arg_type,
            }
            .fail();
        }

        Ok(Self {
            args: vec![arg],
            return_type: [arg_type],
        })
    }
}

impl Stringify for Sum {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sum(")?;
        self.args[0].compact_display(f)?;
        write!(f, ")")
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl Function for Sum {
    fn arguments(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        self.return_type[0]
    }
}

impl AggregationFunction for Sum {
    fn create_state(&self) -> Box<dyn AggregateState> {
        match self.return_type[0] {
            LogicalType::BigInt => Box::new(SumState::<i64>::default()),
            LogicalType::UnsignedBigInt => Box::new(SumState::<u64>::default()),
            _ => Box::new(SumState::<f64>::default()),
        }
    }

    fn partial_types(&self) -> &[LogicalType] {
        &self.return_type
    }
}
