//! Min/Max aggregation function

use std::cmp::Ordering;
use std::sync::Arc;

use data_chunk::datum::Datum;
use data_chunk::types::LogicalType;

use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::Function;

use super::{AggregateState, AggregationError, AggregationFunction, Result, Stringify, unary_argument};

/// Aggregation state of the min/max function, `NULL` if all of the values are `NULL`
#[derive(Debug, Default)]
pub struct MinMaxState<const IS_MIN: bool> {
    value: Datum,
}

impl<const IS_MIN: bool> AggregateState for MinMaxState<IS_MIN> {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn update(&mut self, args: &[Datum]) -> Result<()> {
        let arg = &args[0];
        if arg.is_null() {
            return Ok(());
        }
        if self.value.is_null() {
            self.value = arg.clone();
            return Ok(());
        }

        let ordering = arg.as_ref().compare(&self.value.as_ref()).map_err(|e| {
            AggregationError::UpdateStates {
                func: if IS_MIN { "Min" } else { "Max" },
                source: Box::new(e),
            }
        })?;
        let replace = if IS_MIN {
            ordering == Ordering::Less
        } else {
            ordering == Ordering::Greater
        };
        if replace {
            self.value = arg.clone();
        }
        Ok(())
    }

    fn partial_result(&self, output: &mut Vec<Datum>) {
        output.push(self.value.clone());
    }

    fn final_result(&self) -> Datum {
        self.value.clone()
    }

    fn reset(&mut self) {
        self.value = Datum::Null;
    }
}

/// Min function
pub type Min = MinMax<true>;
/// Max function
pub type Max = MinMax<false>;

/// Aggregation function that computes the minimum/maximum value
#[derive(Debug)]
pub struct MinMax<const IS_MIN: bool> {
    args: Vec<Arc<dyn PhysicalExpr>>,
    return_type: [LogicalType; 1],
}

impl<const IS_MIN: bool> MinMax<IS_MIN> {
    /// Try to create a new min/max function, it accepts argument of any type
    pub fn try_new(args: Vec<Arc<dyn PhysicalExpr>>) -> Result<Self> {
        let arg = unary_argument(if IS_MIN { "Min" } else { "Max" }, args)?;
        let return_type = [arg.output_type()];
        Ok(Self {
            args: vec![arg],
            return_type,
        })
    }
}

impl<const IS_MIN: bool> Stringify for MinMax<IS_MIN> {
    fn name(&self) -> &'static str {
        if IS_MIN { "Min" } else { "Max" }
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name())?;
        self.args[0].compact_display(f)?;
        write!(f, ")")
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl<const IS_MIN: bool> Function for MinMax<IS_MIN> {
    fn arguments(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        self.return_type[0]
    }
}

impl<const IS_MIN: bool> AggregationFunction for MinMax<IS_MIN> {
    fn create_state(&self) -> Box<dyn AggregateState> {
        Box::new(MinMaxState::<IS_MIN>::default())
    }

    fn partial_types(&self) -> &[LogicalType] {
        &self.return_type
    }
}
