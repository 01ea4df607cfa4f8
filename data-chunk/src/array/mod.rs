//! Typed arrays, each array stores the elements of a column

pub mod primitive;
pub mod varlen;

use snafu::Snafu;

use crate::datum::DatumRef;
use crate::for_all_variants;
use crate::types::LogicalType;

pub use self::primitive::{PrimitiveArray, PrimitiveType};
pub use self::varlen::{VarLenArray, VarLenType};

/// Array of `bool`
pub type BooleanArray = PrimitiveArray<bool>;
/// Array of `i64`
pub type Int64Array = PrimitiveArray<i64>;
/// Array of `u64`
pub type UInt64Array = PrimitiveArray<u64>;
/// Array of `f64`
pub type Float64Array = PrimitiveArray<f64>;
/// Array of utf-8 string
pub type StringArray = VarLenArray<str>;
/// Array of binary
pub type BinaryArray = VarLenArray<[u8]>;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum ArrayError {
    #[snafu(display("Can not push `{datum}` into the array with logical type `{logical_type}`"))]
    TypeMismatch {
        datum: String,
        logical_type: LogicalType,
    },
}

macro_rules! array_impl {
    ($({$variant:ident, $array_ty:ident, $logical_type:ident}),+) => {
        /// Implementations of the arrays, enum dispatch
        #[derive(Debug, Clone)]
        pub enum ArrayImpl {
            $(
                #[doc = concat!("Array with logical type [`LogicalType::", stringify!($logical_type), "`]")]
                $variant($array_ty)
            ),+
        }

        impl ArrayImpl {
            /// Create a new empty [`ArrayImpl`] based on the [`LogicalType`]
            pub fn new(logical_type: LogicalType) -> Self {
                match logical_type {
                    $(
                        LogicalType::$logical_type => Self::$variant($array_ty::new()),
                    )+
                }
            }

            /// Logical type of the array
            pub fn logical_type(&self) -> LogicalType {
                match self {
                    $(
                        Self::$variant(_) => LogicalType::$logical_type,
                    )+
                }
            }

            /// Get the number of elements in the Array
            pub fn len(&self) -> usize {
                match self {
                    $(
                        Self::$variant(array) => array.len(),
                    )+
                }
            }

            /// Returns true if the array is empty
            #[inline]
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Get the element with index, null element is [`DatumRef::Null`]. Returns
            /// `None` if the index is out of bound
            pub fn get(&self, index: usize) -> Option<DatumRef<'_>> {
                match self {
                    $(
                        Self::$variant(array) => array
                            .get(index)
                            .map(|value| value.map_or(DatumRef::Null, DatumRef::$variant)),
                    )+
                }
            }

            /// Returns true if the datum can be pushed into the array
            #[inline]
            pub fn accepts(&self, datum: DatumRef<'_>) -> bool {
                datum.matches_type(self.logical_type())
            }

            /// Append the datum to the end of the array
            pub fn push(&mut self, datum: DatumRef<'_>) -> Result<(), ArrayError> {
                match (self, datum) {
                    $(
                        (Self::$variant(array), DatumRef::$variant(value)) => array.push(Some(value)),
                        (Self::$variant(array), DatumRef::Null) => array.push(None),
                    )+
                    (array, datum) => {
                        return TypeMismatchSnafu {
                            datum: datum.to_string(),
                            logical_type: array.logical_type(),
                        }
                        .fail()
                    }
                }
                Ok(())
            }

            /// Remove all of the elements, the allocated memory is kept
            pub fn clear(&mut self) {
                match self {
                    $(
                        Self::$variant(array) => array.clear(),
                    )+
                }
            }

            paste::paste! {
                $(
                    #[doc = concat!("Downcast to [`", stringify!($array_ty), "`]")]
                    #[inline]
                    pub fn [<as_ $variant:lower>](&self) -> Option<&$array_ty> {
                        match self {
                            Self::$variant(array) => Some(array),
                            #[allow(unreachable_patterns)]
                            _ => None,
                        }
                    }
                )+
            }
        }

        $(
            impl From<$array_ty> for ArrayImpl {
                #[inline]
                fn from(array: $array_ty) -> Self {
                    Self::$variant(array)
                }
            }
        )+
    };
}

for_all_variants!(array_impl);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut array = ArrayImpl::new(LogicalType::VarChar);
        array.push(DatumRef::String("a")).unwrap();
        array.push(DatumRef::Null).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(0), Some(DatumRef::String("a")));
        assert_eq!(array.get(1), Some(DatumRef::Null));
        assert_eq!(array.get(2), None);
        assert_eq!(
            array.as_string().unwrap().iter().collect::<Vec<_>>(),
            [Some("a"), None]
        );
        assert!(array.as_int64().is_none());
    }

    #[test]
    fn test_push_type_mismatch() {
        let mut array = ArrayImpl::new(LogicalType::BigInt);
        assert!(!array.accepts(DatumRef::UInt64(1)));
        let err = array.push(DatumRef::UInt64(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can not push `1` into the array with logical type `BigInt`"
        );
        assert!(array.is_empty());
    }
}
