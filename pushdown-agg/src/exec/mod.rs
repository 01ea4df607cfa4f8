//! Execution module contains the expressions, the aggregation functions and the
//! operators that execute the pushed down aggregation

pub mod physical_expr;
pub mod physical_operator;
