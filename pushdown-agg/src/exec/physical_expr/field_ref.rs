//! [`FieldRef`] expression

use data_chunk::datum::Datum;
use data_chunk::row::RowRef;
use data_chunk::types::LogicalType;
use snafu::Snafu;
use std::sync::Arc;

use super::utils::CompactExprDisplayWrapper;
use super::{ExprError, ExprResult, PhysicalExpr, Stringify};

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "FieldIndex: `{}` is out of range. The input row only has {} fields.
         Planner should guarantee it never happens, planner has fatal bug 😭",
        field_index,
        num_fields
    ))]
    IndexOutOfRange {
        field_index: usize,
        num_fields: usize,
    },
    #[snafu(display(
        "FieldIndex: `{}` should have logical type `{:?}`, however the input row has value `{}`",
        field_index,
        output_type,
        datum
    ))]
    TypeMismatch {
        field_index: usize,
        output_type: LogicalType,
        datum: String,
    },
}

/// Represents index into the row that pass through the executor
#[derive(Debug)]
pub struct FieldRef {
    /// Index of the field
    field_index: usize,
    /// Output type of the field
    output_type: LogicalType,
    /// It should always be empty! It can not have children
    children: Vec<Arc<dyn PhysicalExpr>>,
}

impl FieldRef {
    /// Create a new [`FieldRef`]
    #[inline]
    pub fn new(field_index: usize, output_type: LogicalType) -> Self {
        Self {
            field_index,
            output_type,
            children: Vec::new(),
        }
    }

    /// Index of the field
    #[inline]
    pub fn field_index(&self) -> usize {
        self.field_index
    }

    fn execute_error(&self, error: Error) -> ExprError {
        ExprError::Execute {
            expr: CompactExprDisplayWrapper::new(self).to_string(),
            source: Box::new(error),
        }
    }
}

impl Stringify for FieldRef {
    fn name(&self) -> &'static str {
        "FieldRef"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.field_index)
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl PhysicalExpr for FieldRef {
    #[inline]
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    #[inline]
    fn output_type(&self) -> LogicalType {
        self.output_type
    }

    #[inline]
    fn children(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.children
    }

    fn eval(&self, row: RowRef<'_>) -> ExprResult<Datum> {
        let datum = row.datum(self.field_index).ok_or_else(|| {
            self.execute_error(Error::IndexOutOfRange {
                field_index: self.field_index,
                num_fields: row.num_columns(),
            })
        })?;

        if !datum.matches_type(self.output_type) {
            return Err(self.execute_error(Error::TypeMismatch {
                field_index: self.field_index,
                output_type: self.output_type,
                datum: format!("{:?}", datum),
            }));
        }

        Ok(datum.to_owned_datum())
    }
}
