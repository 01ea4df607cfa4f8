//! Common utilities shared by the executors

pub mod exec_context;
pub mod profiler;
pub mod utils;
pub mod uuid;
