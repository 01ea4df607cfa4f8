//! Array of the variable length values

use std::fmt::Debug;

use crate::bitmap::Bitmap;
use crate::private::Sealed;
use crate::types::LogicalType;

/// Types that can be stored in the [`VarLenArray`]
pub trait VarLenType: Sealed + Debug + Send + Sync + 'static {
    /// Logical type of the array that stores this type
    const LOGICAL_TYPE: LogicalType;

    /// View self as bytes
    fn as_bytes(&self) -> &[u8];

    /// View the bytes as self
    ///
    /// # Safety
    ///
    /// The bytes should be produced by [`Self::as_bytes`]
    unsafe fn from_bytes_unchecked(bytes: &[u8]) -> &Self;
}

impl Sealed for str {}

impl VarLenType for str {
    const LOGICAL_TYPE: LogicalType = LogicalType::VarChar;

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        str::as_bytes(self)
    }

    #[inline]
    unsafe fn from_bytes_unchecked(bytes: &[u8]) -> &Self {
        // SAFETY: the bytes are produced by `str::as_bytes`, it is valid utf-8
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }
}

impl Sealed for [u8] {}

impl VarLenType for [u8] {
    const LOGICAL_TYPE: LogicalType = LogicalType::VarBinary;

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        self
    }

    #[inline]
    unsafe fn from_bytes_unchecked(bytes: &[u8]) -> &Self {
        bytes
    }
}

/// Array of [`VarLenType`]. All of the elements are stored in a single buffer, the
/// `i`th element is `bytes[offsets[i]..offsets[i+1]]`
#[derive(Debug)]
pub struct VarLenArray<T: VarLenType + ?Sized> {
    offsets: Vec<usize>,
    bytes: Vec<u8>,
    validity: Bitmap,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: VarLenType + ?Sized> Clone for VarLenArray<T> {
    fn clone(&self) -> Self {
        Self {
            offsets: self.offsets.clone(),
            bytes: self.bytes.clone(),
            validity: self.validity.clone(),
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: VarLenType + ?Sized> Default for VarLenArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: VarLenType + ?Sized> VarLenArray<T> {
    /// Create a new empty array
    #[inline]
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            bytes: Vec::new(),
            validity: Bitmap::new(),
            _phantom: std::marker::PhantomData,
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
        self.validity.len()
    }

    /// Returns true if the array is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    /// Get the element with index. Outer `None` means the index is out of bound,
    /// inner `None` means the element is null
    #[inline]
    pub fn get(&self, index: usize) -> Option<Option<&T>> {
        let valid = self.validity.get(index)?;
        Some(valid.then(|| {
            let bytes = &self.bytes[self.offsets[index]..self.offsets[index + 1]];
            // SAFETY: bytes are pushed via `T::as_bytes`
            unsafe { T::from_bytes_unchecked(bytes) }
        }))
    }

    /// Append an element to the end of the array
    #[inline]
    pub fn push(&mut self, value: Option<&T>) {
        self.validity.push(value.is_some());
        if let Some(value) = value {
            self.bytes.extend_from_slice(value.as_bytes());
        }
        self.offsets.push(self.bytes.len());
    }

    /// Validity of the elements
    #[inline]
    pub fn validity(&self) -> &Bitmap {
        &self.validity
    }

    /// Remove all of the elements, the allocated memory is kept
    #[inline]
    pub fn clear(&mut self) {
        self.offsets.truncate(1);
        self.bytes.clear();
        self.validity.clear();
    }

    /// Iterate the elements
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        (0..self.len()).map(|index| self.get(index).flatten())
    }
}

impl<'a, T: VarLenType + ?Sized> FromIterator<Option<&'a T>> for VarLenArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<&'a T>>>(iter: I) -> Self {
        let mut array = Self::new();
        iter.into_iter().for_each(|value| array.push(value));
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_array() {
        let mut array = [Some("pushdown"), None, Some(""), Some("group")]
            .into_iter()
            .collect::<VarLenArray<str>>();
        assert_eq!(array.len(), 4);
        assert_eq!(array.get(0), Some(Some("pushdown")));
        assert_eq!(array.get(1), Some(None));
        assert_eq!(array.get(2), Some(Some("")));
        assert_eq!(array.get(4), None);

        array.clear();
        array.push(Some("x"));
        assert_eq!(array.iter().collect::<Vec<_>>(), [Some("x")]);
    }

    #[test]
    fn test_binary_array() {
        let array = [Some(&[1_u8, 2][..]), None]
            .into_iter()
            .collect::<VarLenArray<[u8]>>();
        assert_eq!(array.get(0), Some(Some(&[1_u8, 2][..])));
        assert_eq!(array.validity().count_zeros(), 1);
    }
}
