//! Build the group key of a row

use std::fmt::{Debug, Display};
use std::sync::Arc;

use data_chunk::datum::Datum;
use data_chunk::row::{EncodedRow, RowRef};
use data_chunk::types::LogicalType;

use crate::exec::physical_expr::utils::compact_display_expressions;
use crate::exec::physical_expr::{ExprResult, PhysicalExpr};

/// Evaluate the group by expressions on the row and build the group key.
///
/// The key is an [`EncodedRow`]: each group by value is encoded as a column, and the
/// bytes of the whole row is the concatenation of the encoded values. Therefore, two
/// rows belong to the same group iff their keys are byte equal. The columns are
/// emitted as the group by values in the output row, no re-evaluation is needed.
///
/// Zero group by expressions produce an empty key: all of the rows belong to a single
/// implicit group
pub struct GroupKeyBuilder {
    exprs: Vec<Arc<dyn PhysicalExpr>>,
}

impl Debug for GroupKeyBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupKeyBuilder")
            .field("exprs", &self.exprs)
            .finish()
    }
}

impl Display for GroupKeyBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        compact_display_expressions(f, &self.exprs)
    }
}

impl GroupKeyBuilder {
    /// Create a new [`GroupKeyBuilder`]
    pub fn new(exprs: Vec<Arc<dyn PhysicalExpr>>) -> Self {
        Self { exprs }
    }

    /// Group by expressions
    #[inline]
    pub fn exprs(&self) -> &[Arc<dyn PhysicalExpr>] {
        &self.exprs
    }

    /// Number of group by expressions
    #[inline]
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Returns true if there is no group by expression
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Logical types of the group by values
    pub fn output_types(&self) -> impl Iterator<Item = LogicalType> + '_ {
        self.exprs.iter().map(|expr| expr.output_type())
    }

    /// Build the key of the row into `key`. The `key` is cleared first, it can be
    /// reused across rows.
    ///
    /// If the evaluation failed, the content of the `key` is unspecified
    pub fn build(&self, row: RowRef<'_>, key: &mut EncodedRow) -> ExprResult<()> {
        key.clear();
        for expr in &self.exprs {
            let value = expr.eval(row)?;
            key.push_datum(value.as_ref());
        }
        Ok(())
    }

    /// Evaluate the group by values of the row into `values` without encoding them.
    /// The `values` is cleared first
    pub fn eval(&self, row: RowRef<'_>, values: &mut Vec<Datum>) -> ExprResult<()> {
        values.clear();
        for expr in &self.exprs {
            values.push(expr.eval(row)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::physical_expr::constant::Constant;
    use crate::exec::physical_expr::field_ref::FieldRef;
    use data_chunk::datum::DatumRef;

    fn builder() -> GroupKeyBuilder {
        GroupKeyBuilder::new(vec![
            Arc::new(FieldRef::new(1, LogicalType::VarChar)),
            Arc::new(FieldRef::new(0, LogicalType::BigInt)),
            Arc::new(Constant::try_new(Datum::Boolean(true), LogicalType::Boolean).unwrap()),
        ])
    }

    #[test]
    fn test_build_group_key() {
        let builder = builder();
        assert_eq!(builder.to_string(), "[#1, #0, true]");
        assert_eq!(
            builder.output_types().collect::<Vec<_>>(),
            [
                LogicalType::VarChar,
                LogicalType::BigInt,
                LogicalType::Boolean
            ]
        );

        let row = [Datum::Int64(7), Datum::from("pushdown")];
        let mut key = EncodedRow::new();
        builder.build(RowRef::from(&row[..]), &mut key).unwrap();
        assert_eq!(
            key,
            EncodedRow::from_datums([
                DatumRef::String("pushdown"),
                DatumRef::Int64(7),
                DatumRef::Boolean(true)
            ])
        );
        assert_eq!(
            key.decode().unwrap(),
            [Datum::from("pushdown"), Datum::Int64(7), Datum::Boolean(true)]
        );

        // Reuse the key
        let other = [Datum::Int64(7), Datum::Null];
        builder.build(RowRef::from(&other[..]), &mut key).unwrap();
        assert_eq!(key.decode_column(0).unwrap(), Datum::Null);
        assert_eq!(key.len(), 3);

        let mut values = vec![Datum::Int64(100)];
        builder.eval(RowRef::from(&row[..]), &mut values).unwrap();
        assert_eq!(
            values,
            [Datum::from("pushdown"), Datum::Int64(7), Datum::Boolean(true)]
        );
    }

    #[test]
    fn test_empty_group_key() {
        let builder = GroupKeyBuilder::new(vec![]);
        let mut key = EncodedRow::from_datums([DatumRef::Int64(1)]);
        builder
            .build(RowRef::from(&[Datum::Int64(3)][..]), &mut key)
            .unwrap();
        assert!(key.is_empty());
        assert!(key.as_bytes().is_empty());
    }

    #[test]
    fn test_build_failed() {
        let builder = builder();
        let row = [Datum::Int64(7)];
        let mut key = EncodedRow::new();
        assert!(builder.build(RowRef::from(&row[..]), &mut key).is_err());
    }
}
