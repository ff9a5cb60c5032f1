//! Validation and defaulting for options records.
//!
//! Every lifecycle operation takes a caller-supplied options record. Before
//! any side effect, the record is checked for required fields and unset
//! fields are filled with defaults. Both checks hinge on one question - is
//! this field still at its zero value? - answered by [`IsZero`].
//!
//! Each options type implements [`Options`] explicitly:
//!
//! ```
//! use converge::{Options, ValidationError, default_str, require};
//!
//! #[derive(Debug, Default)]
//! struct CreateOpts {
//!     name: String,
//!     shell: String,
//! }
//!
//! impl Options for CreateOpts {
//!     fn validate(&self) -> Result<(), ValidationError> {
//!         require("Name", &self.name)
//!     }
//!
//!     fn with_defaults(mut self) -> Self {
//!         default_str(&mut self.shell, "/usr/sbin/nologin");
//!         self
//!     }
//! }
//!
//! let opts = CreateOpts { name: "deploy".into(), ..Default::default() }
//!     .build()
//!     .unwrap();
//! assert_eq!(opts.shell, "/usr/sbin/nologin");
//! ```
//!
//! Validation is fail-fast: the first required field found at zero aborts
//! with an error naming it. Cross-field constraints ("either A or B") are
//! not the validator's business; the calling module enforces those.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ValidationError;

/// Zero-value determination, total and non-panicking over every supported
/// kind.
///
/// The rules: `Option` is zero iff `None`; strings iff empty; numbers iff
/// `0`; `bool` iff `false`; collections iff empty; fixed arrays iff every
/// element is zero; a timestamp iff it denotes "no time set" (the epoch
/// placeholder). Composite options types implement this over their fields.
pub trait IsZero {
    fn is_zero(&self) -> bool;
}

macro_rules! impl_is_zero_num {
    ($($t:ty)*) => {
        $(impl IsZero for $t {
            fn is_zero(&self) -> bool {
                *self == 0
            }
        })*
    };
}

impl_is_zero_num!(u8 u16 u32 u64 usize i8 i16 i32 i64 isize);

impl IsZero for bool {
    fn is_zero(&self) -> bool {
        !*self
    }
}

impl IsZero for String {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl IsZero for &str {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl IsZero for PathBuf {
    fn is_zero(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

impl<T> IsZero for Option<T> {
    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T> IsZero for Vec<T> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsZero for HashMap<K, V> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> IsZero for BTreeMap<K, V> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: IsZero, const N: usize> IsZero for [T; N] {
    fn is_zero(&self) -> bool {
        self.iter().all(IsZero::is_zero)
    }
}

// Timestamp carve-out: zero means "no time set", not a field-by-field
// comparison. The epoch is the placeholder for an unset bare timestamp;
// an optional timestamp is zero iff None.
impl IsZero for SystemTime {
    fn is_zero(&self) -> bool {
        *self == UNIX_EPOCH
    }
}

/// The validate/default contract for an options record.
pub trait Options: Sized {
    /// Check required fields, failing fast with the first one left at its
    /// zero value.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Fill defaults for fields still at their zero value.
    ///
    /// Only string and bool fields take defaults. A bool carries the
    /// original contract's wart: an explicit `false` is indistinguishable
    /// from unset, so a `true` default wins over it.
    fn with_defaults(self) -> Self {
        self
    }

    /// Validate, then default. Modules call this once at the top of every
    /// mutating operation.
    fn build(self) -> Result<Self, ValidationError> {
        self.validate()?;
        Ok(self.with_defaults())
    }
}

/// No-options marker for operations that take no record.
impl Options for () {}

/// Fail with `MissingField` if `value` is at its zero value.
pub fn require<T: IsZero>(field: &'static str, value: &T) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::MissingField { field });
    }

    Ok(())
}

/// Set a string field to `default` if it is still empty.
pub fn default_str(value: &mut String, default: &str) {
    if value.is_zero() {
        *value = default.to_string();
    }
}

/// Set a bool field to `default` if it is still `false`.
pub fn default_bool(value: &mut bool, default: bool) {
    if value.is_zero() {
        *value = default;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct SampleOpts {
        name: String,
        version: String,
        refresh: bool,
        groups: Vec<String>,
    }

    impl Options for SampleOpts {
        fn validate(&self) -> Result<(), ValidationError> {
            require("Name", &self.name)
        }

        fn with_defaults(mut self) -> Self {
            default_str(&mut self.version, "latest");
            default_bool(&mut self.refresh, true);
            self
        }
    }

    #[test]
    fn test_required_field_missing() {
        let err = SampleOpts::default().build().unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "Name" });
    }

    #[test]
    fn test_required_field_present() {
        let opts = SampleOpts {
            name: "vim".to_string(),
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(opts.name, "vim");
    }

    #[test]
    fn test_defaults_fill_zero_fields() {
        let opts = SampleOpts {
            name: "vim".to_string(),
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(opts.version, "latest");
        assert!(opts.refresh);
        assert!(opts.groups.is_empty());
    }

    #[test]
    fn test_defaults_leave_set_fields_untouched() {
        let opts = SampleOpts {
            name: "vim".to_string(),
            version: "2:9.0".to_string(),
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(opts.version, "2:9.0");
    }

    #[derive(Debug, Default)]
    struct Nested {
        id: u32,
        tags: [u8; 3],
    }

    impl IsZero for Nested {
        fn is_zero(&self) -> bool {
            self.id.is_zero() && self.tags.is_zero()
        }
    }

    #[test]
    fn test_is_zero_scalars() {
        assert!(0u32.is_zero());
        assert!(!7u32.is_zero());
        assert!(false.is_zero());
        assert!(!true.is_zero());
        assert!(String::new().is_zero());
        assert!(!"x".is_zero());
        assert!(PathBuf::new().is_zero());
    }

    #[test]
    fn test_is_zero_containers() {
        assert!(None::<String>.is_zero());
        assert!(!Some(String::new()).is_zero());
        assert!(Vec::<u8>::new().is_zero());
        assert!(HashMap::<String, u8>::new().is_zero());
        assert!(BTreeMap::<String, u8>::new().is_zero());
        assert!([0u8, 0, 0].is_zero());
        assert!(![0u8, 1, 0].is_zero());
    }

    #[test]
    fn test_is_zero_structs_recursive() {
        assert!(Nested::default().is_zero());
        assert!(!Nested { id: 1, tags: [0; 3] }.is_zero());
        assert!(
            !Nested {
                id: 0,
                tags: [0, 2, 0]
            }
            .is_zero()
        );
    }

    #[test]
    fn test_is_zero_timestamp_carve_out() {
        assert!(UNIX_EPOCH.is_zero());
        assert!(!SystemTime::now().is_zero());
        assert!(None::<SystemTime>.is_zero());
        assert!(!Some(SystemTime::now()).is_zero());
    }
}
