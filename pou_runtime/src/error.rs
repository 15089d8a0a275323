//! Runtime error types. Every failure surfaces to the scheduler's caller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use pou_kernel::vars::VarClass;
use pou_kernel::{AccessError, Fault, RetainError};

/// Retain persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("retain store I/O: {0}")]
    Io(#[from] io::Error),
    #[error("retain frame is corrupt: {0}")]
    Corrupt(String),
    #[error("retain frame decode: {0}")]
    Decode(String),
    #[error("retain frame of {len} bytes exceeds the {max}-byte limit")]
    Oversized { len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// An I/O binding could not exchange values with the instance.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("variable {name:?} ({class:?}) cannot be driven from outside")]
    NotAnInput { name: String, class: VarClass },
    #[error(transparent)]
    Access(#[from] AccessError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler has not been started")]
    NotStarted,
    #[error("scheduler is halted after a fault in cycle {cycle}")]
    Halted { cycle: u64 },
    #[error("cycle {cycle} faulted: {fault}")]
    Fault { cycle: u64, fault: Fault },
    #[error("program is not deterministic: cycle {cycle} diverged")]
    Nondeterministic { cycle: u64 },
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Retain(#[from] RetainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
