//! PhysicalExpression that can be interpreted/executed on a row

pub mod constant;
pub mod field_ref;
pub mod function;
pub mod utils;

use crate::error::SendableError;
use data_chunk::datum::Datum;
use data_chunk::row::RowRef;
use data_chunk::types::LogicalType;
use snafu::Snafu;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use self::field_ref::FieldRef;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum ExprError {
    #[snafu(display("Failed to execute the `{}` expression", expr))]
    Execute { expr: String, source: SendableError },
}

type Result<T> = std::result::Result<T, ExprError>;
/// Result of evaluating the expression
pub type ExprResult<T> = Result<T>;

/// Stringify the [`PhysicalExpr`]
pub trait Stringify {
    /// Name of the expression
    fn name(&self) -> &'static str;

    /// Debug message
    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    /// Display the expression **without** children info
    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    /// Display the expression **with** children info in one line.
    ///
    /// It is used in two cases:
    ///
    /// 1. Error message: Reporting which expression is failed
    ///
    /// 2. Display the operator: Displaying expressions the operator contains
    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;
}

/// Trait for all of the physical expressions
pub trait PhysicalExpr: Stringify + Send + Sync {
    /// `as_any` for downcast
    fn as_any(&self) -> &dyn std::any::Any;

    /// Output type of the expression
    fn output_type(&self) -> LogicalType;

    /// Get children of this expression
    fn children(&self) -> &[Arc<dyn PhysicalExpr>];

    /// Evaluate the expression on the row
    ///
    /// # Notes
    ///
    /// The result is either [`Datum::Null`] or a datum whose logical type is
    /// [`Self::output_type()`]. Implementation should return error instead of
    /// returning the datum with other type
    fn eval(&self, row: RowRef<'_>) -> Result<Datum>;
}

impl Debug for dyn PhysicalExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.debug(f)
    }
}

impl Display for dyn PhysicalExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

/// Collect the indexes of the fields referenced by the expression and its descendants.
/// The indexes are appended to `field_indexes` in visiting order, duplicates may exist
pub fn collect_field_refs(expr: &dyn PhysicalExpr, field_indexes: &mut Vec<usize>) {
    if let Some(field_ref) = expr.as_any().downcast_ref::<FieldRef>() {
        field_indexes.push(field_ref.field_index());
    }

    expr.children()
        .iter()
        .for_each(|child| collect_field_refs(&**child, field_indexes));
}
