//! Macros used in the data-chunk

/// Macros for all of the variants in the array
///
/// Tuple: {enum variant name, array type, logical type variant}
///
/// The enum variant name is shared by [`ArrayImpl`], [`Datum`] and [`DatumRef`]
///
/// [`ArrayImpl`]: crate::array::ArrayImpl
/// [`Datum`]: crate::datum::Datum
/// [`DatumRef`]: crate::datum::DatumRef
#[macro_export]
macro_rules! for_all_variants {
    ($macro:ident) => {
        $macro! {
            {Boolean, BooleanArray, Boolean},
            {Int64, Int64Array, BigInt},
            {UInt64, UInt64Array, UnsignedBigInt},
            {Float64, Float64Array, Double},
            {String, StringArray, VarChar},
            {Binary, BinaryArray, VarBinary}
        }
    };
}
