//! # Steward
//!
//! Declarative system-state convergence for Unix hosts.
//!
//! Each module under [`resource`] converges one kind of system state
//! toward a desired description: apt packages, keys, PPAs and source
//! entries, cron entries, files, directories, ini entries, lines in
//! files, git checkouts, users, and groups. They all share the same
//! contract from the [`converge`] core: derive current state with
//! `read`, answer presence with `exists`, and move between absent and
//! present with idempotent `create`/`update`/`delete`.
//!
//! ```no_run
//! use converge::{Resource, SystemExecutor};
//! use steward::resource::apt_package::{AptPackage, CreateOpts};
//!
//! # fn main() -> converge::Result<()> {
//! let exec = SystemExecutor::new();
//! let pkg = AptPackage::new(&exec, "vim");
//!
//! if !pkg.exists()? {
//!     pkg.create(CreateOpts::default())?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Composition across resources (ordering, planning, rollback) is the
//! caller's business; so is making sure only one convergence pass touches
//! a given crontab, file, or apt database at a time.

pub mod resource;

pub use converge::{Error, Executor, Resource, Result, SystemExecutor};
