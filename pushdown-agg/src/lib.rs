#![warn(clippy::todo)]
#![deny(
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    rustdoc::private_intra_doc_links,
    rust_2018_idioms,
    missing_docs,
    clippy::needless_borrow,
    clippy::redundant_clone,
    missing_debug_implementations
)]

//! # PushdownAgg
//!
//! `PushdownAgg` is the GROUP BY aggregation executor that runs close to the storage.
//! It partially aggregates the rows produced by the storage scan, the upper layer merges
//! the partial results.
//!
//! Two strategies are provided:
//!
//! - [`HashAggregate`]: input can have any order. It is fully blocking, groups are
//! emitted in first-seen order
//!
//! - [`StreamAggregate`]/[`BatchStreamAggregate`]: input is sorted by the group by
//! expressions. A group is emitted as soon as its last row is seen
//!
//! [`HashAggregate`]: exec::physical_operator::aggregate::hash_aggregate::HashAggregate
//! [`StreamAggregate`]: exec::physical_operator::aggregate::stream_aggregate::StreamAggregate
//! [`BatchStreamAggregate`]: exec::physical_operator::aggregate::stream_aggregate::BatchStreamAggregate

pub mod common;
pub mod error;
pub mod exec;

/// The default vector size used by the pushdown-agg
pub const STANDARD_VECTOR_SIZE: usize = 1024;

mod private {
    /// Sealed trait protect against downstream implementations
    pub trait Sealed {}
}
