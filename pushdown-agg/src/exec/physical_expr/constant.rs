//! Expression that contains the user literally specified constant

use std::sync::Arc;

use data_chunk::datum::Datum;
use data_chunk::row::RowRef;
use data_chunk::types::LogicalType;
use snafu::Snafu;

use super::{ExprResult, PhysicalExpr, Stringify};

/// Error returned by creating the [`Constant`]
#[derive(Debug, Snafu)]
#[snafu(display("Constant `{value}` does not have logical type `{logical_type}`"))]
pub struct ConstantError {
    /// The value
    value: Datum,
    /// Expected logical type
    logical_type: LogicalType,
}

/// Expression that contains the user literally specified constant
#[derive(Debug)]
pub struct Constant {
    logical_type: LogicalType,
    value: Datum,
    children: Vec<Arc<dyn PhysicalExpr>>,
}

impl Constant {
    /// Try to create a new [`Constant`], the value should be null or has the logical type
    pub fn try_new(value: Datum, logical_type: LogicalType) -> Result<Self, ConstantError> {
        if !value.as_ref().matches_type(logical_type) {
            return ConstantSnafu {
                value,
                logical_type,
            }
            .fail();
        }

        Ok(Self {
            logical_type,
            value,
            children: Vec::new(),
        })
    }
}

impl Stringify for Constant {
    fn name(&self) -> &'static str {
        "Constant"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }

    fn compact_display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

impl PhysicalExpr for Constant {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn children(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.children
    }

    fn output_type(&self) -> LogicalType {
        self.logical_type
    }

    fn eval(&self, _row: RowRef<'_>) -> ExprResult<Datum> {
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let constant = Constant::try_new(Datum::Int64(7), LogicalType::BigInt).unwrap();
        let row: [Datum; 0] = [];
        assert_eq!(constant.eval(RowRef::from(&row[..])).unwrap(), Datum::Int64(7));

        let error = Constant::try_new(Datum::from("x"), LogicalType::Double).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Constant `x` does not have logical type `Double`"
        );
    }
}
