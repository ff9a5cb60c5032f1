//! Directories with converged ownership and permissions.
//!
//! Purely filesystem-backed: no subprocess involved. Ownership changes go
//! through chown and therefore need the matching privilege at runtime.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use converge::system;
use converge::{Error, Options, Resource, Result, default_str};
use serde::{Deserialize, Serialize};

/// A directory on the local system.
pub struct Directory {
    path: PathBuf,
}

/// Observed directory state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryState {
    /// Directory path
    pub path: PathBuf,
    /// Owning user name
    pub owner: String,
    /// Owning group name
    pub group: String,
    /// Permission bits as an octal string, e.g. "0755"
    pub mode: String,
}

/// Options for creating a directory.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Owning user. Defaults to root.
    pub owner: String,
    /// Owning group. Defaults to root.
    pub group: String,
    /// Permission bits as an octal string. Defaults to "0755".
    pub mode: String,
    /// Create missing parent directories, applying ownership and mode to
    /// the whole subtree.
    pub parents: bool,
}

impl Options for CreateOpts {
    fn with_defaults(mut self) -> Self {
        default_str(&mut self.owner, "root");
        default_str(&mut self.group, "root");
        default_str(&mut self.mode, "0755");
        self
    }
}

/// Options for updating a directory. Empty fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    pub owner: String,
    pub group: String,
    pub mode: String,
    /// Apply the changes to everything beneath the directory as well.
    pub recurse: bool,
}

impl Options for UpdateOpts {}

impl Directory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Remove the directory and everything beneath it.
    pub fn delete_recursive(&self) -> Result<()> {
        log::debug!("deleting directory {} recursively", self.path.display());
        fs::remove_dir_all(&self.path)?;
        Ok(())
    }
}

impl Resource for Directory {
    type State = DirectoryState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "Directory";

    fn read(&self) -> Result<DirectoryState> {
        log::debug!("reading directory {}", self.path.display());

        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(Self::TYPE, self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !meta.is_dir() {
            return Err(Error::execution(format!(
                "{} is not a directory",
                self.path.display()
            )));
        }

        let (uid, gid) = system::file_owner(&self.path)?;

        Ok(DirectoryState {
            path: self.path.clone(),
            owner: system::uid_to_username(uid)?,
            group: system::gid_to_groupname(gid)?,
            mode: system::format_mode(meta.permissions().mode()),
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating directory {}", self.path.display());
        let opts = opts.build()?;

        let mode = system::parse_mode(&opts.mode)?;
        let (uid, gid) = system::uid_gid(&opts.owner, &opts.group)?;

        if opts.parents {
            fs::create_dir_all(&self.path)?;
            system::chown_recursive(&self.path, uid, gid)?;
            system::chmod_recursive(&self.path, mode)?;
        } else {
            fs::create_dir(&self.path)?;
            // create_dir is subject to the umask; set the mode explicitly.
            fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))?;
            system::chown_path(&self.path, uid, gid)?;
        }

        Ok(())
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("updating directory {}", self.path.display());
        let opts = opts.build()?;

        if !opts.mode.is_empty() {
            let mode = system::parse_mode(&opts.mode)?;
            if opts.recurse {
                system::chmod_recursive(&self.path, mode)?;
            } else {
                fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))?;
            }
        }

        if !opts.owner.is_empty() || !opts.group.is_empty() {
            let (mut uid, mut gid) = system::file_owner(&self.path)?;
            if !opts.owner.is_empty() {
                uid = system::username_to_uid(&opts.owner)?;
            }
            if !opts.group.is_empty() {
                gid = system::group_to_gid(&opts.group)?;
            }

            if opts.recurse {
                system::chown_recursive(&self.path, uid, gid)?;
            } else {
                system::chown_path(&self.path, uid, gid)?;
            }
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting directory {}", self.path.display());
        fs::remove_dir(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Ownership of the scratch dir itself, so chown targets the running
    // user and the tests work unprivileged.
    fn current_owner(dir: &std::path::Path) -> (String, String) {
        let (uid, gid) = system::file_owner(dir).unwrap();
        (
            system::uid_to_username(uid).unwrap(),
            system::gid_to_groupname(gid).unwrap(),
        )
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = Directory::new(scratch.path().join("absent"));

        assert!(dir.read().unwrap_err().is_not_found());
        assert!(!dir.exists().unwrap());
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("plain");
        fs::write(&path, "x").unwrap();

        let err = Directory::new(&path).read().unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_lifecycle_round_trip() {
        let scratch = tempfile::tempdir().unwrap();
        let (owner, group) = current_owner(scratch.path());
        let dir = Directory::new(scratch.path().join("sub"));

        dir.create(CreateOpts {
            owner: owner.clone(),
            group: group.clone(),
            mode: "0750".to_string(),
            parents: false,
        })
        .unwrap();

        let state = dir.read().unwrap();
        assert_eq!(state.owner, owner);
        assert_eq!(state.group, group);
        assert_eq!(state.mode, "0750");

        dir.update(UpdateOpts {
            mode: "0700".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(dir.read().unwrap().mode, "0700");

        dir.delete().unwrap();
        assert!(!dir.exists().unwrap());
    }

    #[test]
    fn test_create_with_parents() {
        let scratch = tempfile::tempdir().unwrap();
        let (owner, group) = current_owner(scratch.path());
        let dir = Directory::new(scratch.path().join("a/b/c"));

        dir.create(CreateOpts {
            owner,
            group,
            mode: "0755".to_string(),
            parents: true,
        })
        .unwrap();

        assert!(dir.exists().unwrap());
        dir.delete_recursive().unwrap();
    }
}
