use itertools::Itertools;
use thiserror::Error;

use crate::middle::ty::VariableType;

/// Everything that can stop a function from being compiled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// No instance could be resolved for the requested operation with the
    /// given operand types. Fatal for the current function only.
    #[error(
        "operation `{operation}` is not supported for input types ({})",
        types.iter().join(", ")
    )]
    UnsupportedOperation {
        operation: String,
        types: Vec<VariableType>,
    },
    /// An IR invariant was found to be violated. This is a compiler bug.
    #[error("[{context}] {message}")]
    InternalConsistency { context: String, message: String },
    /// No conversion rule bridges the two types.
    #[error("cannot convert {from} to {to}")]
    TypeConversion { from: VariableType, to: VariableType },
}

impl CompileError {
    pub fn unsupported(operation: impl Into<String>, types: &[VariableType]) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
            types: types.to_vec(),
        }
    }

    pub fn internal(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InternalConsistency {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn conversion(from: &VariableType, to: &VariableType) -> Self {
        Self::TypeConversion {
            from: from.clone(),
            to: to.clone(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalConsistency { .. })
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
