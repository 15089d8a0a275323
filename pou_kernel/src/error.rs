//! Kernel error types.

use thiserror::Error;

use crate::types::ValueKind;

/// A logic error raised while executing one cycle of a POU body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("division by zero in {op}")]
    DivisionByZero { op: &'static str },
    #[error("arithmetic overflow in {op}")]
    Overflow { op: &'static str },
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: ValueKind },
    /// Raised explicitly by program logic.
    #[error("program fault: {0}")]
    Program(String),
}

/// By-name access to an instance record failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("unknown variable {0:?}")]
    UnknownVariable(String),
    #[error("variable {name:?} is {expected}, got {found}")]
    KindMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// A retain image could not be applied to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetainError {
    #[error("retain image belongs to layout {found}, instance layout is {expected}")]
    LayoutMismatch { expected: String, found: String },
    #[error("variable {0:?} is not declared retain")]
    NotRetain(String),
    #[error(transparent)]
    Access(#[from] AccessError),
}
