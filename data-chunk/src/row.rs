//! Row representations
//!
//! - [`EncodedRow`] is the row exchanged between row oriented operators. Each column
//! stores one value encoded by the [`codec`](crate::codec)
//!
//! - [`RowRef`] is a read only view of a decoded row, expressions are evaluated on it

use snafu::{OptionExt, ResultExt, Snafu};

use crate::chunk::Chunk;
use crate::codec::{self, CodecError};
use crate::datum::{Datum, DatumRef};

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum RowError {
    #[snafu(display("Column `{index}` is out of range, the row only has {num_columns} columns"))]
    ColumnOutOfRange { index: usize, num_columns: usize },
    #[snafu(display("Failed to decode the `{index}`th column of the row"))]
    DecodeColumn { index: usize, source: CodecError },
}

type Result<T> = std::result::Result<T, RowError>;

/// Row whose columns are encoded values. All of the columns are stored contiguously
/// in a single buffer, therefore the bytes of the whole row are the concatenation of
/// the encoded columns. The row can be cleared and reused without reallocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EncodedRow {
    data: Vec<u8>,
    /// End offset of each column in data
    ends: Vec<usize>,
}

impl EncodedRow {
    /// Create a new empty row
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row by encoding the datums
    pub fn from_datums<'a>(datums: impl IntoIterator<Item = DatumRef<'a>>) -> Self {
        let mut row = Self::new();
        datums.into_iter().for_each(|datum| row.push_datum(datum));
        row
    }

    /// Number of columns
    #[inline]
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// Returns true if the row does not have any column
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Remove all of the columns, the allocated memory is kept
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
        self.ends.clear();
    }

    /// Encode the datum and append it as a new column
    #[inline]
    pub fn push_datum(&mut self, datum: DatumRef<'_>) {
        codec::encode_value(datum, &mut self.data);
        self.ends.push(self.data.len());
    }

    /// Append a column that is already encoded
    #[inline]
    pub fn push_encoded(&mut self, encoded: &[u8]) {
        self.data.extend_from_slice(encoded);
        self.ends.push(self.data.len());
    }

    /// Append all of the columns in other row
    pub fn extend_from_row(&mut self, other: &EncodedRow) {
        let base = self.data.len();
        self.data.extend_from_slice(&other.data);
        self.ends.extend(other.ends.iter().map(|end| base + end));
    }

    /// Get the encoded bytes of the `index`th column
    #[inline]
    pub fn column(&self, index: usize) -> Option<&[u8]> {
        let end = *self.ends.get(index)?;
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        Some(&self.data[start..end])
    }

    /// Iterate the encoded columns
    pub fn columns(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len()).filter_map(|index| self.column(index))
    }

    /// Bytes of the whole row: concatenation of all of the encoded columns
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Decode the `index`th column
    pub fn decode_column(&self, index: usize) -> Result<Datum> {
        let encoded = self.column(index).context(ColumnOutOfRangeSnafu {
            index,
            num_columns: self.len(),
        })?;
        codec::decode_one(encoded).context(DecodeColumnSnafu { index })
    }

    /// Decode all of the columns
    pub fn decode(&self) -> Result<Vec<Datum>> {
        (0..self.len())
            .map(|index| self.decode_column(index))
            .collect()
    }
}

/// Read only view of a row that has been decoded
#[derive(Debug, Clone, Copy)]
pub enum RowRef<'a> {
    /// Row whose values are owned by a slice
    Datums(&'a [Datum]),
    /// `index`th row in the chunk
    Chunk {
        /// Chunk contains the row
        chunk: &'a Chunk,
        /// Index of the row in the chunk
        index: usize,
    },
}

impl<'a> RowRef<'a> {
    /// Number of columns in the row
    #[inline]
    pub fn num_columns(&self) -> usize {
        match self {
            Self::Datums(datums) => datums.len(),
            Self::Chunk { chunk, .. } => chunk.num_arrays(),
        }
    }

    /// Get the value of the `col`th column, returns `None` if the column does not exist
    #[inline]
    pub fn datum(&self, col: usize) -> Option<DatumRef<'a>> {
        match *self {
            Self::Datums(datums) => datums.get(col).map(Datum::as_ref),
            Self::Chunk { chunk, index } => chunk.datum(col, index),
        }
    }
}

impl<'a> From<&'a [Datum]> for RowRef<'a> {
    #[inline]
    fn from(datums: &'a [Datum]) -> Self {
        Self::Datums(datums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;

    #[test]
    fn test_encoded_row() {
        let mut row =
            EncodedRow::from_datums([DatumRef::String("a"), DatumRef::Null, DatumRef::Int64(3)]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.column(1), Some(&[codec::NIL_FLAG][..]));
        assert_eq!(row.column(3), None);
        assert_eq!(row.decode_column(2).unwrap(), Datum::Int64(3));
        assert_eq!(
            row.as_bytes(),
            row.columns().flatten().copied().collect::<Vec<_>>()
        );

        let other = EncodedRow::from_datums([DatumRef::Boolean(false)]);
        row.extend_from_row(&other);
        assert_eq!(
            row.decode().unwrap(),
            [
                Datum::String("a".to_string()),
                Datum::Null,
                Datum::Int64(3),
                Datum::Boolean(false)
            ]
        );

        row.clear();
        assert!(row.is_empty());
        assert!(row.as_bytes().is_empty());
    }

    #[test]
    fn test_decode_invalid_column() {
        let mut row = EncodedRow::new();
        row.push_encoded(&[codec::INT_FLAG, 1]);
        assert!(matches!(
            row.decode_column(0),
            Err(RowError::DecodeColumn { index: 0, .. })
        ));
        assert!(matches!(
            row.decode_column(1),
            Err(RowError::ColumnOutOfRange {
                index: 1,
                num_columns: 1
            })
        ));
    }

    #[test]
    fn test_row_ref() {
        let datums = [Datum::UInt64(1), Datum::Null];
        let row = RowRef::from(&datums[..]);
        assert_eq!(row.num_columns(), 2);
        assert_eq!(row.datum(0), Some(DatumRef::UInt64(1)));
        assert_eq!(row.datum(2), None);

        let mut chunk = Chunk::with_logical_types(&[LogicalType::Double]);
        chunk.push_row(&[DatumRef::Float64(0.5)]).unwrap();
        let row = chunk.row(0);
        assert_eq!(row.num_columns(), 1);
        assert_eq!(row.datum(0), Some(DatumRef::Float64(0.5)));
    }
}
