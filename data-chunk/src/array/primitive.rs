//! Array of the fixed size values

use std::fmt::Debug;

use crate::bitmap::Bitmap;
use crate::private::Sealed;
use crate::types::LogicalType;

/// Types that can be stored in the [`PrimitiveArray`]
pub trait PrimitiveType: Sealed + Debug + Default + Copy + Send + Sync + 'static {
    /// Logical type of the array that stores this type
    const LOGICAL_TYPE: LogicalType;
}

macro_rules! impl_primitive_type {
    ($({$ty:ty, $logical_type:ident}),+) => {
        $(
            impl Sealed for $ty {}

            impl PrimitiveType for $ty {
                const LOGICAL_TYPE: LogicalType = LogicalType::$logical_type;
            }
        )+
    };
}

impl_primitive_type!(
    {bool, Boolean},
    {i64, BigInt},
    {u64, UnsignedBigInt},
    {f64, Double}
);

/// Array of [`PrimitiveType`]. Null elements store the default value
#[derive(Debug, Clone, Default)]
pub struct PrimitiveArray<T: PrimitiveType> {
    values: Vec<T>,
    validity: Bitmap,
}

impl<T: PrimitiveType> PrimitiveArray<T> {
    /// Create a new empty array
    #[inline]
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            validity: Bitmap::new(),
        }
    }

    /// Logical type of the array
    #[inline]
    pub fn logical_type(&self) -> LogicalType {
        T::LOGICAL_TYPE
    }

    /// Number of elements in the array
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the array is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the element with index. Outer `None` means the index is out of bound,
    /// inner `None` means the element is null
    #[inline]
    pub fn get(&self, index: usize) -> Option<Option<T>> {
        let valid = self.validity.get(index)?;
        Some(valid.then(|| self.values[index]))
    }

    /// Append an element to the end of the array
    #[inline]
    pub fn push(&mut self, value: Option<T>) {
        self.validity.push(value.is_some());
        self.values.push(value.unwrap_or_default());
    }

    /// Validity of the elements
    #[inline]
    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    /// Remove all of the elements, the allocated memory is kept
    #[inline]
    pub fn clear(&mut self) {
        self.values.clear();
        self.validity.clear();
    }

    /// Iterate the elements
    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        self.values
            .iter()
            .zip(self.validity.iter())
            .map(|(&value, valid)| valid.then_some(value))
    }
}

impl<T: PrimitiveType> FromIterator<Option<T>> for PrimitiveArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        let mut array = Self::new();
        iter.into_iter().for_each(|value| array.push(value));
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_array() {
        let mut array = [Some(-1_i64), None, Some(7)]
            .into_iter()
            .collect::<PrimitiveArray<i64>>();
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(0), Some(Some(-1)));
        assert_eq!(array.get(1), Some(None));
        assert_eq!(array.get(3), None);
        assert_eq!(array.validity().count_zeros(), 1);

        array.clear();
        assert!(array.is_empty());
        array.push(Some(3));
        assert_eq!(array.iter().collect::<Vec<_>>(), [Some(3)]);
    }
}
