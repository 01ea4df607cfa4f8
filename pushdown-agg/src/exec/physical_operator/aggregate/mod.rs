//! Aggregate the rows by the group by expressions
//!
//! # Concepts
//!
//! - `GroupKey`: values of the group by expressions, built by the [`GroupKeyBuilder`].
//!
//! - `Payloads`: arguments of the aggregation functions. Only the fields referenced by
//! the group by expressions and the payloads are decoded from the rows read from the
//! source, other fields are left as `NULL`.
//!
//! Two kinds of aggregation are provided:
//!
//! - [`HashAggregate`]: input can have any order, groups are stored in the hash table.
//! Memory consumption is proportional to the number of groups
//!
//! - [`StreamAggregate`]/[`BatchStreamAggregate`]: input should be sorted by the group
//! by expressions. Only the current group is kept in memory
//!
//! [`GroupKeyBuilder`]: self::group_key::GroupKeyBuilder
//! [`HashAggregate`]: self::hash_aggregate::HashAggregate
//! [`StreamAggregate`]: self::stream_aggregate::StreamAggregate
//! [`BatchStreamAggregate`]: self::stream_aggregate::BatchStreamAggregate

pub mod group_key;
pub mod hash_aggregate;
pub mod stream_aggregate;

use std::cmp::Ordering;
use std::sync::Arc;

use data_chunk::datum::Datum;
use data_chunk::row::{EncodedRow, RowError, RowRef};
use snafu::{ResultExt, Snafu, ensure};

use self::group_key::GroupKeyBuilder;
use crate::common::exec_context::ExecArgsError;
use super::{CompareGroupValuesSnafu, EvaluateSnafu, OperatorResult};
use crate::exec::physical_expr::{PhysicalExpr, collect_field_refs};

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum AggregateError {
    #[snafu(display(
        "`{op}` references the field `{field_index}`, however its source only has {num_fields} fields"
    ))]
    FieldOutOfRange {
        op: &'static str,
        field_index: usize,
        num_fields: usize,
    },
    #[snafu(display("`{op}` is created with invalid ExecArgs"))]
    InvalidExecArgs {
        op: &'static str,
        source: ExecArgsError,
    },
}

/// Collect the fields referenced by the expressions and validate that they exist in
/// the source. Returned indexes are sorted and deduplicated
fn referenced_fields<'a>(
    op: &'static str,
    num_fields: usize,
    exprs: impl IntoIterator<Item = &'a Arc<dyn PhysicalExpr>>,
) -> Result<Vec<usize>, AggregateError> {
    let mut fields = Vec::new();
    exprs
        .into_iter()
        .for_each(|expr| collect_field_refs(&**expr, &mut fields));
    fields.sort_unstable();
    fields.dedup();

    if let Some(&field_index) = fields.last() {
        ensure!(
            field_index < num_fields,
            FieldOutOfRangeSnafu {
                op,
                field_index,
                num_fields
            }
        );
    }
    Ok(fields)
}

/// Decode the fields referenced by the aggregation from the encoded rows
#[derive(Debug)]
struct RowDecoder {
    /// Sorted indexes of the referenced fields
    fields: Vec<usize>,
    /// Decoded row, unreferenced fields are always `NULL`
    values: Vec<Datum>,
}

impl RowDecoder {
    fn try_new<'a>(
        op: &'static str,
        num_fields: usize,
        exprs: impl IntoIterator<Item = &'a Arc<dyn PhysicalExpr>>,
    ) -> Result<Self, AggregateError> {
        Ok(Self {
            fields: referenced_fields(op, num_fields, exprs)?,
            values: vec![Datum::Null; num_fields],
        })
    }

    /// Decode the referenced fields of the row. The returned row is valid until the
    /// next decode
    fn decode(&mut self, row: &EncodedRow) -> Result<RowRef<'_>, RowError> {
        for &field in &self.fields {
            self.values[field] = row.decode_column(field)?;
        }
        Ok(RowRef::Datums(&self.values))
    }
}

/// Relation between a row and the group before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupBoundary {
    /// The first row ever seen, it starts the first group
    First,
    /// The row belongs to the current group
    Same,
    /// The row starts a new group
    New,
}

/// Detect the group boundaries in the sorted input. It is shared by the row and batch
/// stream aggregations, such that they have the same semantic
#[derive(Debug)]
struct GroupBoundaryDetector {
    op: &'static str,
    /// Group by values of the current group, owned copy
    current: Vec<Datum>,
    /// Group by values of the last checked row
    lookahead: Vec<Datum>,
    has_current: bool,
}

impl GroupBoundaryDetector {
    fn new(op: &'static str) -> Self {
        Self {
            op,
            current: Vec::new(),
            lookahead: Vec::new(),
            has_current: false,
        }
    }

    /// Check whether the row starts a new group. Values are compared semantically, not
    /// by their encoded bytes.
    ///
    /// If [`GroupBoundary::New`] is returned, the values of the row are kept in the
    /// lookahead buffer, the caller should call [`Self::adopt`] after it finishes
    /// the current group
    fn check(
        &mut self,
        group_key: &GroupKeyBuilder,
        row: RowRef<'_>,
    ) -> OperatorResult<GroupBoundary> {
        group_key
            .eval(row, &mut self.lookahead)
            .context(EvaluateSnafu { op: self.op })?;

        if !self.has_current {
            self.adopt();
            self.has_current = true;
            return Ok(GroupBoundary::First);
        }

        for (current, lookahead) in self.current.iter().zip(&self.lookahead) {
            let ordering = current
                .as_ref()
                .compare(&lookahead.as_ref())
                .context(CompareGroupValuesSnafu { op: self.op })?;
            if ordering != Ordering::Equal {
                return Ok(GroupBoundary::New);
            }
        }
        Ok(GroupBoundary::Same)
    }

    /// Adopt the values in the lookahead buffer as the current group
    #[inline]
    fn adopt(&mut self) {
        std::mem::swap(&mut self.current, &mut self.lookahead);
    }

    /// Group by values of the current group
    #[inline]
    fn current(&self) -> &[Datum] {
        &self.current
    }

    /// Returns true if at least one row has been checked
    #[inline]
    fn has_current(&self) -> bool {
        self.has_current
    }
}
