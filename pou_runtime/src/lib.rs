#![forbid(unsafe_code)]

//! Scan-cycle host for `pou_kernel` programs.
//!
//! Owns one instance per `Scheduler`, drives `init`/`body`, persists
//! retain variables, binds interface variables to a process image and
//! exposes snapshots for monitoring.
//!
//! No control logic lives here; it all stays in the POU bodies.

pub mod config;
pub mod error;
pub mod io;
pub mod monitor;
pub mod proto_bridge;
pub mod proto_types;
pub mod retain_store;
pub mod scheduler;

pub use config::RuntimeConfig;
pub use error::SchedulerError;
pub use scheduler::{Scheduler, SchedulerState, StartMode};
