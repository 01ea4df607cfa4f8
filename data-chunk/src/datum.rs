//! [`Datum`] is a single typed value. Expressions evaluate to it, aggregation states
//! consume it and the [`codec`](crate::codec) encodes it

use std::cmp::Ordering;
use std::fmt::Display;

use snafu::Snafu;

use crate::types::LogicalType;

/// Error returned by comparing two values
#[derive(Debug, Snafu)]
#[snafu(display("Can not compare `{left}` with `{right}`, they have incomparable types"))]
pub struct CompareError {
    /// Debug message of the left value
    left: String,
    /// Debug message of the right value
    right: String,
}

/// Owned value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Datum {
    /// Missing value
    #[default]
    Null,
    /// Boolean
    Boolean(bool),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// 64-bit float number
    Float64(f64),
    /// Utf-8 String
    String(String),
    /// Binary
    Binary(Vec<u8>),
}

/// Reference to a [`Datum`], the variable length values are borrowed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DatumRef<'a> {
    /// Missing value
    Null,
    /// Boolean
    Boolean(bool),
    /// Signed 64-bit integer
    Int64(i64),
    /// Unsigned 64-bit integer
    UInt64(u64),
    /// 64-bit float number
    Float64(f64),
    /// Utf-8 String
    String(&'a str),
    /// Binary
    Binary(&'a [u8]),
}

impl Datum {
    /// View the datum as [`DatumRef`]
    #[inline]
    pub fn as_ref(&self) -> DatumRef<'_> {
        match self {
            Self::Null => DatumRef::Null,
            Self::Boolean(v) => DatumRef::Boolean(*v),
            Self::Int64(v) => DatumRef::Int64(*v),
            Self::UInt64(v) => DatumRef::UInt64(*v),
            Self::Float64(v) => DatumRef::Float64(*v),
            Self::String(v) => DatumRef::String(v),
            Self::Binary(v) => DatumRef::Binary(v),
        }
    }

    /// Returns true if the datum is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Logical type of the datum, `None` for null
    #[inline]
    pub fn logical_type(&self) -> Option<LogicalType> {
        self.as_ref().logical_type()
    }
}

impl DatumRef<'_> {
    /// Copy the referenced value into an owned [`Datum`]
    #[inline]
    pub fn to_owned_datum(self) -> Datum {
        match self {
            Self::Null => Datum::Null,
            Self::Boolean(v) => Datum::Boolean(v),
            Self::Int64(v) => Datum::Int64(v),
            Self::UInt64(v) => Datum::UInt64(v),
            Self::Float64(v) => Datum::Float64(v),
            Self::String(v) => Datum::String(v.to_owned()),
            Self::Binary(v) => Datum::Binary(v.to_owned()),
        }
    }

    /// Returns true if the datum is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Logical type of the datum, `None` for null
    pub fn logical_type(&self) -> Option<LogicalType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(LogicalType::Boolean),
            Self::Int64(_) => Some(LogicalType::BigInt),
            Self::UInt64(_) => Some(LogicalType::UnsignedBigInt),
            Self::Float64(_) => Some(LogicalType::Double),
            Self::String(_) => Some(LogicalType::VarChar),
            Self::Binary(_) => Some(LogicalType::VarBinary),
        }
    }

    /// Returns true if the datum can be stored in a column of the `logical_type`.
    /// Null can be stored in any column
    #[inline]
    pub fn matches_type(&self, logical_type: LogicalType) -> bool {
        self.logical_type().is_none_or(|ty| ty == logical_type)
    }

    /// Compare two values semantically.
    ///
    /// - `NULL` equals `NULL` and it is less than any other value
    ///
    /// - Numeric values are compared by their numeric value, no matter which numeric
    /// type they have. Boolean is treated as `0/1`. `-0.0` equals `0.0` and all of
    /// the `NaN`s are equal and greater than any other number
    ///
    /// - Strings and binaries are compared lexicographically by bytes
    pub fn compare(&self, other: &DatumRef<'_>) -> Result<Ordering, CompareError> {
        use DatumRef::*;
        let ordering = match (*self, *other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (String(l), String(r)) => l.as_bytes().cmp(r.as_bytes()),
            (Binary(l), Binary(r)) => l.cmp(r),
            (String(l), Binary(r)) => l.as_bytes().cmp(r),
            (Binary(l), String(r)) => l.cmp(r.as_bytes()),
            (l, r) => match (Numeric::try_from_datum(l), Numeric::try_from_datum(r)) {
                (Some(l), Some(r)) => l.cmp(r),
                _ => {
                    return CompareSnafu {
                        left: format!("{:?}", self),
                        right: format!("{:?}", other),
                    }
                    .fail();
                }
            },
        };
        Ok(ordering)
    }
}

/// Numeric view used in comparison
#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Numeric {
    #[inline]
    fn try_from_datum(datum: DatumRef<'_>) -> Option<Self> {
        match datum {
            DatumRef::Boolean(v) => Some(Self::Int(v as i64)),
            DatumRef::Int64(v) => Some(Self::Int(v)),
            DatumRef::UInt64(v) => Some(Self::UInt(v)),
            DatumRef::Float64(v) => Some(Self::Float(v)),
            _ => None,
        }
    }

    fn cmp(self, other: Self) -> Ordering {
        match (self, other) {
            (Self::Int(l), Self::Int(r)) => l.cmp(&r),
            (Self::UInt(l), Self::UInt(r)) => l.cmp(&r),
            (Self::Int(l), Self::UInt(r)) => {
                if l < 0 {
                    Ordering::Less
                } else {
                    (l as u64).cmp(&r)
                }
            }
            (Self::UInt(_), Self::Int(_)) => other.cmp(self).reverse(),
            (Self::Float(l), Self::Float(r)) => normalize_f64(l).total_cmp(&normalize_f64(r)),
            (Self::Float(l), r) => normalize_f64(l).total_cmp(&r.as_f64()),
            (l, Self::Float(r)) => l.as_f64().total_cmp(&normalize_f64(r)),
        }
    }

    #[inline]
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => normalize_f64(v),
        }
    }
}

/// Normalize the float: `-0.0` becomes `0.0` and all of the `NaN`s become the
/// canonical positive `NaN`
#[inline]
pub fn normalize_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

impl Display for DatumRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float64(v) => write!(f, "{:?}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::Binary(v) => {
                write!(f, "0x")?;
                v.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
            }
        }
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_ref().fmt(f)
    }
}

impl From<i64> for Datum {
    #[inline]
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for Datum {
    #[inline]
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f64> for Datum {
    #[inline]
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for Datum {
    #[inline]
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Datum {
    #[inline]
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Datum {
    #[inline]
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    #[inline]
    fn from(v: Option<T>) -> Self {
        v.map_or(Datum::Null, Into::into)
    }
}
