//! # DataChunk
//!
//! `DataChunk` contains the value representations shared by the aggregation engines
//! of `pushdown-agg`:
//!
//! - [`Datum`](datum::Datum): a single typed value, the unit expressions evaluate to
//!
//! - [`codec`]: the order preserving value codec. Group keys and the rows exchanged
//! between operators are built from it
//!
//! - [`EncodedRow`](row::EncodedRow): a row whose columns are encoded values
//!
//! - [`Chunk`](chunk::Chunk): a batch of rows stored column by column

pub mod array;
pub mod bitmap;
pub mod chunk;
pub mod codec;
pub mod datum;
mod macros;
pub mod row;
pub mod types;

mod private {
    /// Sealed trait protect against downstream implementations
    pub trait Sealed {}
}
