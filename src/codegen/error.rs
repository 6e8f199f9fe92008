//! Specific error types for code generation operations

use thiserror::Error;

use crate::error::{Error as CrateError, LimitError};

/// Errors that can occur during constant pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstPoolError {
    #[error("Constant pool is out of space")]
    OutOfSpace,
    #[error("Utf8 constant of {length} bytes is too long")]
    Utf8TooLong { length: usize },
}

/// Generic result type for constant pool operations
pub type ConstPoolResult<T> = Result<T, ConstPoolError>;

impl ConstPoolError {
    /// Lift into a crate error scoped to the class being emitted
    pub fn for_class(self, class: &str, pool_count: usize) -> CrateError {
        match self {
            ConstPoolError::OutOfSpace => {
                CrateError::limit(class, LimitError::ConstantPool { count: pool_count + 1 })
            }
            ConstPoolError::Utf8TooLong { length } => {
                CrateError::limit(class, LimitError::ConstantTooLong { length })
            }
        }
    }
}
