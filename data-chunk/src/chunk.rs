//! A batch of rows stored in columnar format

use std::fmt::Display;

use snafu::{ResultExt, Snafu, ensure};
use tabled::builder::Builder as TableBuilder;

use crate::array::{ArrayError, ArrayImpl};
use crate::datum::DatumRef;
use crate::row::RowRef;
use crate::types::LogicalType;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum ChunkError {
    #[snafu(display(
        "Arrays passed to create the chunk should have same length, array `{index}` has length `{actual}` but the first array has length `{expect}`"
    ))]
    LengthMismatch {
        index: usize,
        expect: usize,
        actual: usize,
    },
    #[snafu(display("Row with {actual} values can not be pushed into chunk with {expect} arrays"))]
    WidthMismatch { expect: usize, actual: usize },
    #[snafu(display("Failed to push the `{index}`th value of the row"))]
    PushValue { index: usize, source: ArrayError },
    #[snafu(display(
        "Virtual row can only be appended to the chunk that does not have arrays, found {num_arrays} arrays"
    ))]
    VirtualRow { num_arrays: usize },
}

type Result<T> = std::result::Result<T, ChunkError>;

/// A batch of rows. It is the unit exchanged between the batch operators
///
/// # Virtual rows
///
/// A chunk without arrays still has a length. Rows of such chunk are called virtual
/// rows: they do not have any value, only the number of rows is meaningful. For
/// example, `SELECT 1 FROM t GROUP BY a` only needs to know how many groups exist
#[derive(Debug, Clone)]
pub struct Chunk {
    arrays: Vec<ArrayImpl>,
    length: usize,
}

impl Chunk {
    /// Create a new empty chunk with given logical types
    pub fn with_logical_types(logical_types: &[LogicalType]) -> Self {
        Self {
            arrays: logical_types
                .iter()
                .map(|&logical_type| ArrayImpl::new(logical_type))
                .collect(),
            length: 0,
        }
    }

    /// Try to create a new chunk from the arrays, all of the arrays should have same length
    pub fn try_new(arrays: Vec<ArrayImpl>) -> Result<Self> {
        let length = arrays.first().map_or(0, ArrayImpl::len);
        for (index, array) in arrays.iter().enumerate() {
            ensure!(
                array.len() == length,
                LengthMismatchSnafu {
                    index,
                    expect: length,
                    actual: array.len()
                }
            );
        }
        Ok(Self { arrays, length })
    }

    /// Number of rows in the chunk
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the chunk does not have any row
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of arrays in the chunk
    #[inline]
    pub fn num_arrays(&self) -> usize {
        self.arrays.len()
    }

    /// Get the arrays
    #[inline]
    pub fn arrays(&self) -> &[ArrayImpl] {
        &self.arrays
    }

    /// Get the `index`th array
    #[inline]
    pub fn get_array(&self, index: usize) -> Option<&ArrayImpl> {
        self.arrays.get(index)
    }

    /// Logical types of the arrays
    pub fn logical_types(&self) -> impl Iterator<Item = LogicalType> + '_ {
        self.arrays.iter().map(ArrayImpl::logical_type)
    }

    /// Get the value in `col`th array and `row`th row
    #[inline]
    pub fn datum(&self, col: usize, row: usize) -> Option<DatumRef<'_>> {
        self.arrays.get(col)?.get(row)
    }

    /// View the `index`th row
    #[inline]
    pub fn row(&self, index: usize) -> RowRef<'_> {
        RowRef::Chunk { chunk: self, index }
    }

    /// Append a row to the end of the chunk. The row is pushed atomically: if any value
    /// does not match the type of the array, nothing is pushed
    pub fn push_row(&mut self, row: &[DatumRef<'_>]) -> Result<()> {
        ensure!(
            row.len() == self.arrays.len(),
            WidthMismatchSnafu {
                expect: self.arrays.len(),
                actual: row.len()
            }
        );

        if let Some((index, (array, &datum))) = self
            .arrays
            .iter()
            .zip(row)
            .enumerate()
            .find(|(_, (array, datum))| !array.accepts(**datum))
        {
            return Err(ArrayError::TypeMismatch {
                datum: datum.to_string(),
                logical_type: array.logical_type(),
            })
            .context(PushValueSnafu { index });
        }

        for (index, (array, &datum)) in self.arrays.iter_mut().zip(row).enumerate() {
            array.push(datum).context(PushValueSnafu { index })?;
        }
        self.length += 1;

        #[cfg(feature = "verify")]
        assert!(self.arrays.iter().all(|array| array.len() == self.length));

        Ok(())
    }

    /// Append a virtual row, the chunk should not have any array
    pub fn append_virtual_row(&mut self) -> Result<()> {
        ensure!(
            self.arrays.is_empty(),
            VirtualRowSnafu {
                num_arrays: self.arrays.len()
            }
        );
        self.length += 1;
        Ok(())
    }

    /// Remove all of the rows, the allocated memory is kept
    pub fn clear(&mut self) {
        self.arrays.iter_mut().for_each(ArrayImpl::clear);
        self.length = 0;
    }
}

impl Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.arrays.is_empty() {
            return write!(f, "Chunk with {} virtual rows", self.length);
        }

        let mut table_builder = TableBuilder::default();
        table_builder.push_record(self.logical_types().map(|ty| ty.to_string()));
        (0..self.length).for_each(|row| {
            table_builder.push_record(
                self.arrays
                    .iter()
                    .map(|array| array.get(row).unwrap_or(DatumRef::Null).to_string()),
            );
        });
        write!(
            f,
            "{}",
            table_builder
                .build()
                .with(tabled::settings::style::Style::modern())
        )
    }
}
