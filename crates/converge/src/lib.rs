//! # Converge
//!
//! The shared core that every resource module is built on.
//!
//! A resource module converges one piece of system state (a package, a
//! cron entry, a line in a file) toward a desired description. The module
//! itself is a thin shell-out plus some text parsing; everything reusable
//! lives here:
//!
//! - **Executor**: runs an external program and captures stdout, stderr,
//!   and the exit status. Injectable behind a trait so modules can be
//!   tested against a scripted fake instead of a live system.
//! - **Options**: the validate/default contract for caller-supplied
//!   options records, backed by the [`IsZero`] zero-value rules.
//! - **Resource**: the lifecycle contract (`read`, `exists`, `create`,
//!   `update`, `delete`) with [`Error::NotFound`] as the distinguished
//!   "legitimately absent" signal.
//! - **text**: the parsing conventions - structured extraction that never
//!   errors on malformed input, and the idempotent line-level edit.
//!
//! The core holds no state between calls: there is no resource registry,
//! cache, or session, and every `read` re-derives state from the live
//! system. Execution is fully synchronous; the only suspension point is
//! waiting on a spawned child process.
//!
//! Concurrent convergence of the same external resource (the same crontab,
//! the same file) is out of contract - callers must ensure a single writer
//! at a time.

pub mod error;
pub mod exec;
pub mod lifecycle;
pub mod options;
pub mod testing;
pub mod text;

#[cfg(unix)]
pub mod system;

// Re-export main types at crate root
pub use error::{Error, Result, ValidationError};
pub use exec::{ExecRequest, ExecResult, Executor, SystemExecutor, required_commands};
pub use lifecycle::Resource;
pub use options::{IsZero, Options, default_bool, default_str, require};
