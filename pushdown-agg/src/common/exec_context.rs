//! [`ExecContext`] holds the information relevant to the current statement during
//! the execution

use snafu::{Snafu, ensure};

use super::uuid::QueryId;
use crate::STANDARD_VECTOR_SIZE;

/// Error returned by validating the [`ExecArgs`]
#[derive(Debug, Snafu)]
#[snafu(display("`{name}` in the ExecArgs should be greater than zero"))]
pub struct ExecArgsError {
    /// Name of the invalid argument
    name: &'static str,
}

/// Holds the information relevant to the current statement
#[derive(Debug)]
pub struct ExecContext {
    /// Query id
    pub query_id: QueryId,
    /// Execution args
    pub exec_args: ExecArgs,
}

impl ExecContext {
    /// Try to create a new [`ExecContext`], the args are validated
    pub fn try_new(query_id: QueryId, exec_args: ExecArgs) -> Result<Self, ExecArgsError> {
        exec_args.validate()?;
        Ok(Self {
            query_id,
            exec_args,
        })
    }
}

/// Arguments for execution
#[derive(Debug, Clone)]
pub struct ExecArgs {
    /// Maximum number of rows in the chunk produced by the batch operators
    pub chunk_max_rows: usize,
    /// Number of rows the batch operators request from their source each time
    pub input_batch_rows: usize,
}

impl ExecArgs {
    /// Validate the args
    pub fn validate(&self) -> Result<(), ExecArgsError> {
        ensure!(
            self.chunk_max_rows > 0,
            ExecArgsSnafu {
                name: "chunk_max_rows"
            }
        );
        ensure!(
            self.input_batch_rows > 0,
            ExecArgsSnafu {
                name: "input_batch_rows"
            }
        );
        Ok(())
    }
}

impl Default for ExecArgs {
    fn default() -> Self {
        Self {
            chunk_max_rows: STANDARD_VECTOR_SIZE,
            input_batch_rows: STANDARD_VECTOR_SIZE,
        }
    }
}
