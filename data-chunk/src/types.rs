//! Logical types of the values

use std::fmt::Display;

/// All of the supported logical types.
///
/// The schema of an operator is a slice of [`LogicalType`]s. Each type has a one-to-one
/// mapping to a variant of [`Datum`](crate::datum::Datum) and a variant of
/// [`ArrayImpl`](crate::array::ArrayImpl)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Boolean value represent `true` or `false`
    Boolean,
    /// Signed 64-bit integer
    BigInt,
    /// Unsigned 64-bit integer
    UnsignedBigInt,
    /// 64-bit float number
    Double,
    /// Variable length Utf-8 String
    VarChar,
    /// Variable length binary
    VarBinary,
}

impl LogicalType {
    /// Returns true if the type is a numeric type
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::BigInt | Self::UnsignedBigInt | Self::Double)
    }
}

impl Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
