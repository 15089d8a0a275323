#![forbid(unsafe_code)]

//! Runtime contract for generated IEC 61131-3 program organization units.
//!
//! A POU is a fixed record declared with [`declare_pou!`] plus a hand-written
//! [`pou::Pou::body`]. The host allocates the record once, calls `init` once
//! and `body` once per scan cycle.

/// Record-layout ABI. Part of every layout fingerprint.
pub const ABI_VERSION: u32 = 1;

pub mod arithmetic;
pub mod error;
pub mod hashing;
pub mod pou;
pub mod programs;
pub mod retain;
pub mod types;
pub mod vars;

pub use error::{AccessError, Fault, RetainError};
pub use pou::{CycleContext, Pou, PouKind, PouLayout, VarAccess};
pub use types::{IecType, Value, ValueKind};
