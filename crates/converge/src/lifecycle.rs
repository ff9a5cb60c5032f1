//! The resource lifecycle contract.
//!
//! A resource instance is always in one of two states, `Absent` or
//! `Present`, and the contract's operations move between them:
//!
//! - [`Resource::read`] derives the current state from the live system and
//!   reports `Absent` as [`Error::NotFound`].
//! - [`Resource::exists`] is sugar over `read`: the not-found sentinel
//!   becomes `Ok(false)`, a populated read becomes `Ok(true)`, and every
//!   other failure propagates unchanged.
//! - [`Resource::create`] is `Absent -> Present`. Calling it while already
//!   present has module-specific behavior; usually the underlying tool
//!   fails ("file exists").
//! - [`Resource::update`] is `Present -> Present`. Modules either pass
//!   only the fields that differ from current state to the mutating
//!   command, or reconstruct (delete then create) at the cost of a
//!   transient absent window.
//! - [`Resource::delete`] is `Present -> Absent`, idempotent-safe where
//!   the underlying tool allows it.
//!
//! Observed state is never cached; each call re-derives it. Listing every
//! present instance of a type is a module-level operation outside this
//! contract, conventionally `list(...)` in the module.

use crate::error::{Error, Result};
use crate::options::Options;

/// A unit of managed system state.
///
/// The implementing struct carries the instance's identity (a package
/// name, a file path, a user name) plus whatever capability handle it
/// converges through - typically a [`crate::Executor`]. Attributes that
/// describe the desired state travel in the options records instead.
pub trait Resource {
    /// Fully populated observed state, re-derived on every read.
    type State;
    /// Options accepted by [`Resource::create`].
    type CreateOpts: Options;
    /// Options accepted by [`Resource::update`].
    type UpdateOpts: Options;

    /// Resource type label used in errors and logs.
    const TYPE: &'static str;

    /// Derive current state from the live system.
    ///
    /// Returns [`Error::NotFound`] when the instance is legitimately
    /// absent - that outcome models the `Absent` state, not a failure.
    fn read(&self) -> Result<Self::State>;

    /// Whether the instance currently exists.
    fn exists(&self) -> Result<bool> {
        match self.read() {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Bring an absent instance into existence.
    fn create(&self, opts: Self::CreateOpts) -> Result<()>;

    /// Converge a present instance toward the requested attributes.
    ///
    /// Modules that have nothing updatable keep the default body.
    fn update(&self, _opts: Self::UpdateOpts) -> Result<()> {
        Err(Error::execution(format!(
            "{} does not support update",
            Self::TYPE
        )))
    }

    /// Remove a present instance.
    fn delete(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flag {
        present: bool,
        broken: bool,
    }

    impl Resource for Flag {
        type State = ();
        type CreateOpts = ();
        type UpdateOpts = ();

        const TYPE: &'static str = "Flag";

        fn read(&self) -> Result<()> {
            if self.broken {
                return Err(Error::execution("probe failed"));
            }
            if !self.present {
                return Err(Error::not_found(Self::TYPE, "flag"));
            }
            Ok(())
        }

        fn create(&self, (): ()) -> Result<()> {
            Ok(())
        }

        fn delete(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exists_absorbs_not_found() {
        let absent = Flag {
            present: false,
            broken: false,
        };
        assert!(!absent.exists().unwrap());

        let present = Flag {
            present: true,
            broken: false,
        };
        assert!(present.exists().unwrap());
    }

    #[test]
    fn test_exists_propagates_other_errors() {
        let broken = Flag {
            present: false,
            broken: true,
        };
        assert!(matches!(
            broken.exists().unwrap_err(),
            Error::Execution { .. }
        ));
    }

    #[test]
    fn test_update_unsupported_by_default() {
        let flag = Flag {
            present: true,
            broken: false,
        };
        let err = flag.update(()).unwrap_err();
        assert!(err.to_string().contains("does not support update"));
    }
}
