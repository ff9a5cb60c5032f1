//! Packages managed by apt.
//!
//! State comes from `apt-cache policy`; mutations go through
//! noninteractive `apt-get` runs with the environment fully replaced so
//! frontends and listers cannot prompt.

use std::sync::LazyLock;

use converge::{Error, ExecRequest, Executor, Options, Resource, Result, text};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::apt_env;

/// A package managed by apt.
pub struct AptPackage<'a> {
    exec: &'a dyn Executor,
    name: String,
}

/// Observed package state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageState {
    /// Package name
    pub name: String,
    /// Installed version ("(none)" when known to apt but not installed)
    pub version: String,
    /// Latest candidate version available
    pub latest_version: String,
}

/// Options for installing a package.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// A specific version number, or "latest" (the default behavior).
    pub version: String,
}

impl Options for CreateOpts {}

/// Options for upgrading a package.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    /// A specific version number, or "latest".
    pub version: String,
}

impl Options for UpdateOpts {}

impl<'a> AptPackage<'a> {
    pub fn new(exec: &'a dyn Executor, name: impl Into<String>) -> Self {
        Self {
            exec,
            name: name.into(),
        }
    }
}

impl Resource for AptPackage<'_> {
    type State = PackageState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "AptPkg";

    fn read(&self) -> Result<PackageState> {
        log::debug!("reading package {}", self.name);

        let result = self
            .exec
            .exec(&ExecRequest::new(format!("apt-cache policy {}", self.name)))?;

        // Empty policy output means apt has never heard of the package.
        if result.stdout.is_empty() {
            return Err(Error::not_found(Self::TYPE, &self.name));
        }

        let (installed, candidate) = parse_policy(&result.stdout);
        Ok(PackageState {
            name: self.name.clone(),
            version: installed,
            latest_version: candidate,
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("installing package {}", self.name);
        let opts = opts.build()?;

        let target = if !opts.version.is_empty() && opts.version != "latest" {
            format!("{}={}", self.name, opts.version)
        } else {
            self.name.clone()
        };

        let req = ExecRequest::new(format!(
            "apt-get install -y --allow-downgrades --allow-remove-essential \
             --allow-change-held-packages -o DPkg::Options::=--force-confold {target}"
        ))
        .with_env(apt_env());

        self.exec.exec(&req)?;
        Ok(())
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("upgrading package {}", self.name);
        let opts = opts.build()?;

        self.create(CreateOpts {
            version: opts.version,
        })
    }

    fn delete(&self) -> Result<()> {
        log::debug!("purging package {}", self.name);

        let req = ExecRequest::new(format!("apt-get purge -q -y {}", self.name)).with_env(apt_env());
        self.exec.exec(&req)?;
        Ok(())
    }
}

/// List every installed package via `dpkg -l`.
pub fn list(exec: &dyn Executor) -> Result<Vec<PackageState>> {
    log::debug!("listing installed packages");

    let result = exec.exec(&ExecRequest::new("dpkg -l"))?;
    Ok(parse_dpkg_list(&result.stdout))
}

static INSTALLED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Installed: (.+)").unwrap());
static CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Candidate: (.+)").unwrap());
static DPKG_ROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ii\s+(\S+)\s+(\S+)").unwrap());

/// Pull installed and candidate versions out of `apt-cache policy` output.
/// Absent fields stay empty.
fn parse_policy(stdout: &str) -> (String, String) {
    (
        text::capture(&INSTALLED_RE, stdout).unwrap_or_default(),
        text::capture(&CANDIDATE_RE, stdout).unwrap_or_default(),
    )
}

fn parse_dpkg_list(stdout: &str) -> Vec<PackageState> {
    stdout
        .lines()
        .filter_map(|line| {
            let caps = DPKG_ROW_RE.captures(line)?;
            Some(PackageState {
                name: caps[1].to_string(),
                version: caps[2].to_string(),
                latest_version: String::new(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::testing::FakeExecutor;

    const POLICY_OUTPUT: &str = "enscript:\n  \
        Installed: (none)\n  \
        Candidate: 3.03-17build1\n  \
        Version table:\n     3.03-17build1 500\n";

    #[test]
    fn test_parse_policy() {
        let (installed, candidate) = parse_policy(POLICY_OUTPUT);
        assert_eq!(installed, "(none)");
        assert_eq!(candidate, "3.03-17build1");
    }

    #[test]
    fn test_parse_policy_malformed_yields_empty() {
        let (installed, candidate) = parse_policy("N: Unable to locate package foo\n");
        assert_eq!(installed, "");
        assert_eq!(candidate, "");
    }

    #[test]
    fn test_parse_dpkg_list() {
        let listing = "Desired=Unknown/Install\n\
                       ii  vim    2:8.1-1    amd64  Vi IMproved\n\
                       rc  nano   2.9.3-2    amd64  small editor\n\
                       ii  git    1:2.17.1   amd64  fast scm\n";

        let pkgs = parse_dpkg_list(listing);
        assert_eq!(pkgs.len(), 2);
        assert_eq!(pkgs[0].name, "vim");
        assert_eq!(pkgs[0].version, "2:8.1-1");
        assert_eq!(pkgs[1].name, "git");
    }

    #[test]
    fn test_read_unknown_package_is_not_found() {
        let exec = FakeExecutor::new();
        let pkg = AptPackage::new(&exec, "no-such-pkg");

        assert!(pkg.read().unwrap_err().is_not_found());
        assert!(!pkg.exists().unwrap());
    }

    #[test]
    fn test_read_known_package() {
        let _ = env_logger::builder().is_test(true).try_init();

        let exec = FakeExecutor::new().respond_stdout("apt-cache policy enscript", POLICY_OUTPUT);
        let pkg = AptPackage::new(&exec, "enscript");

        let state = pkg.read().unwrap();
        assert_eq!(state.version, "(none)");
        assert_eq!(state.latest_version, "3.03-17build1");
        assert!(pkg.exists().unwrap());
    }

    #[test]
    fn test_create_pins_version() {
        let exec = FakeExecutor::new();
        let pkg = AptPackage::new(&exec, "vim");

        pkg.create(CreateOpts {
            version: "2:8.1-1".to_string(),
        })
        .unwrap();

        let calls = exec.calls();
        assert!(calls[0].starts_with("apt-get install -y"));
        assert!(calls[0].ends_with("vim=2:8.1-1"));
    }

    #[test]
    fn test_create_latest_does_not_pin() {
        let exec = FakeExecutor::new();
        let pkg = AptPackage::new(&exec, "vim");

        pkg.create(CreateOpts {
            version: "latest".to_string(),
        })
        .unwrap();

        assert!(exec.calls()[0].ends_with(" vim"));
    }
}
