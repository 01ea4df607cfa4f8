//! FirstRow aggregation function. It picks the value of the first row in the group,
//! it is used to output the columns that are functionally dependent on the group by
//! keys

use std::sync::Arc;

use data_chunk::datum::Datum;
use data_chunk::types::LogicalType;

use crate::exec::physical_expr::PhysicalExpr;
use crate::exec::physical_expr::function::Function;

use super::{AggregateState, AggregationFunction, Result, Stringify, unary_argument};

/// Aggregation state of the first row function. `None` means no row is seen, the
/// value of the first row can be `NULL`
#[derive(Debug, Default)]
pub struct FirstRowState {
    value: Option<Datum>,
}

impl AggregateState for FirstRowState {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    #[inline]
    fn update(&mut self, args: &[Datum]) -> Result<()> {
        if self.value.is_none() {
            self.value = Some(args[0].clone());
        }
        Ok(())
    }

    fn partial_result(&self, output: &mut Vec<Datum>) {
        output.push(self.final_result());
    }

    fn final_result(&self) -> Datum {
        self.value.clone().unwrap_or_default()
    }

    fn reset(&mut self) {
        self.value = None;
    }
}

/// FirstRow function
#[derive(Debug)]
pub struct FirstRow {
    args: Vec<Arc<dyn PhysicalExpr>>,
    return_type: [LogicalType; 1],
}

impl FirstRow {
    /// Try to create a new [`FirstRow`] function
    pub fn try_new(args: Vec<Arc<dyn PhysicalExpr>>) -> Result<Self> {
        let arg = unary_argument("FirstRow", args)?;
        let return_type = [arg.output_type()];
        Ok(Self {
            args: vec![arg],
            return_type,
        })
    }
}

impl Stringify for FirstRow {
    fn name(&self) -> &'static str {
        "FirstRow"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FirstRow(")?;
        self.args[0].compact_display(f)?;
        write!(f, ")")
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl Function for FirstRow {
    fn arguments(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        self.return_type[0]
    }
}

impl AggregationFunction for FirstRow {
    fn create_state(&self) -> Box<dyn AggregateState> {
        Box::new(FirstRowState::default())
    }

    fn partial_types(&self) -> &[LogicalType] {
        &self.return_type
    }
}
