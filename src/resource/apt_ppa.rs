//! Ubuntu PPAs managed by apt-add-repository.
//!
//! A PPA named `owner/archive` materializes as a source file under
//! `/etc/apt/sources.list.d` whose name folds in the distributor and
//! codename from `lsb_release`, so presence checks and listing are pure
//! filename mapping plus a stat.

use std::fs;
use std::path::{Path, PathBuf};

use converge::system::{self, LsbInfo};
use converge::{Error, ExecRequest, Executor, Options, Resource, Result, default_bool};
use serde::{Deserialize, Serialize};

const SOURCES_DIR: &str = "/etc/apt/sources.list.d";

/// A PPA installed on the system, named without the `ppa:` prefix.
pub struct AptPpa<'a> {
    exec: &'a dyn Executor,
    name: String,
}

/// Observed PPA state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PpaState {
    /// PPA name, e.g. "ondrej/php"
    pub name: String,
}

/// Options for installing a PPA.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Run `apt-get update` after installing. Defaults to true.
    pub refresh: bool,
}

impl Options for CreateOpts {
    fn with_defaults(mut self) -> Self {
        default_bool(&mut self.refresh, true);
        self
    }
}

impl<'a> AptPpa<'a> {
    pub fn new(exec: &'a dyn Executor, name: impl Into<String>) -> Self {
        Self {
            exec,
            name: name.into(),
        }
    }

    fn source_file(&self) -> Result<PathBuf> {
        let lsb = system::lsb_info(self.exec)?;
        Ok(Path::new(SOURCES_DIR).join(ppa_file_name(&self.name, &lsb)))
    }
}

impl Resource for AptPpa<'_> {
    type State = PpaState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = ();

    const TYPE: &'static str = "AptPPA";

    fn read(&self) -> Result<PpaState> {
        log::debug!("reading PPA {}", self.name);

        let path = self.source_file()?;
        log::debug!("PPA file: {}", path.display());

        if !path.exists() {
            return Err(Error::not_found(Self::TYPE, &self.name));
        }

        Ok(PpaState {
            name: self.name.clone(),
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating PPA {}", self.name);
        let opts = opts.build()?;

        self.exec.exec(&ExecRequest::new(format!(
            "apt-add-repository -y ppa:{}",
            self.name
        )))?;

        if opts.refresh {
            self.exec.exec(&ExecRequest::new("apt-get update -qq"))?;
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting PPA {}", self.name);

        self.exec.exec(&ExecRequest::new(format!(
            "apt-add-repository -y -r ppa:{}",
            self.name
        )))?;

        let path = self.source_file()?;
        fs::remove_file(path)?;

        self.exec.exec(&ExecRequest::new("apt-get update -qq"))?;
        Ok(())
    }
}

/// List every PPA installed on the system.
pub fn list(exec: &dyn Executor) -> Result<Vec<PpaState>> {
    log::debug!("listing PPAs");

    let lsb = system::lsb_info(exec)?;
    let mut ppas = Vec::new();

    for entry in fs::read_dir(SOURCES_DIR)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if let Some(name) = ppa_from_file_name(&file_name, &lsb) {
            ppas.push(PpaState { name });
        }
    }

    Ok(ppas)
}

/// Map a PPA name to the source file apt-add-repository writes for it.
fn ppa_file_name(name: &str, lsb: &LsbInfo) -> String {
    let distro = format!("-{}-", lsb.distributor_id.to_lowercase());
    let codename = lsb.codename.to_lowercase();

    let mapped = name.replace('/', &distro).replace(':', "-").replace('.', "_");
    format!("{mapped}-{codename}.list")
}

/// Reverse of [`ppa_file_name`]; `None` for files that are not PPA
/// sources.
fn ppa_from_file_name(file_name: &str, lsb: &LsbInfo) -> Option<String> {
    let distro = format!("-{}-", lsb.distributor_id.to_lowercase());
    let release = format!("-{}", lsb.codename.to_lowercase());

    let name = file_name
        .replace(&distro, "/")
        .replace(&release, "")
        .replace(".list", "");

    name.contains('/').then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::testing::FakeExecutor;

    fn xenial() -> LsbInfo {
        LsbInfo {
            distributor_id: "Ubuntu".to_string(),
            codename: "xenial".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ppa_file_name() {
        assert_eq!(
            ppa_file_name("ondrej/php", &xenial()),
            "ondrej-ubuntu-php-xenial.list"
        );
    }

    #[test]
    fn test_ppa_file_name_round_trip() {
        let lsb = xenial();
        let file = ppa_file_name("gluster/glusterfs-3_8", &lsb);
        assert_eq!(
            ppa_from_file_name(&file, &lsb),
            Some("gluster/glusterfs-3_8".to_string())
        );
    }

    #[test]
    fn test_non_ppa_file_is_skipped() {
        assert_eq!(ppa_from_file_name("docker.list", &xenial()), None);
    }

    #[test]
    fn test_create_refreshes_by_default() {
        let exec = FakeExecutor::new();
        AptPpa::new(&exec, "ondrej/php")
            .create(CreateOpts::default())
            .unwrap();

        assert_eq!(
            exec.calls(),
            vec!["apt-add-repository -y ppa:ondrej/php", "apt-get update -qq"]
        );
    }
}
