//! Regular files with converged ownership, permissions, and content.
//!
//! Content is tracked as an MD5 digest so callers can compare desired
//! and observed state without holding file bodies. Content writes go
//! through the atomic rewrite path.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use converge::system;
use converge::{Error, Options, Resource, Result, default_str, text};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// A regular file on the local system.
pub struct File {
    path: PathBuf,
}

/// Observed file state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// File path
    pub path: PathBuf,
    /// Owning user name
    pub owner: String,
    /// Owning group name
    pub group: String,
    /// Permission bits as an octal string, e.g. "0640"
    pub mode: String,
    /// Lowercase hex MD5 of the file contents
    pub md5: String,
}

/// Options for creating a file.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Owning user. Defaults to root.
    pub owner: String,
    /// Owning group. Defaults to root.
    pub group: String,
    /// Permission bits as an octal string. Defaults to "0640".
    pub mode: String,
    /// File contents. Empty creates an empty file.
    pub content: String,
}

impl Options for CreateOpts {
    fn with_defaults(mut self) -> Self {
        default_str(&mut self.owner, "root");
        default_str(&mut self.group, "root");
        default_str(&mut self.mode, "0640");
        self
    }
}

/// Options for updating a file. Empty fields are left untouched, which
/// also means content cannot be updated to empty.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    pub owner: String,
    pub group: String,
    pub mode: String,
    pub content: String,
}

impl Options for UpdateOpts {}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Resource for File {
    type State = FileState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "File";

    fn read(&self) -> Result<FileState> {
        log::debug!("reading file {}", self.path.display());

        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(Self::TYPE, self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !meta.is_file() {
            return Err(Error::execution(format!(
                "{} is not a file",
                self.path.display()
            )));
        }

        let (uid, gid) = system::file_owner(&self.path)?;
        let digest = Md5::digest(fs::read(&self.path)?);

        Ok(FileState {
            path: self.path.clone(),
            owner: system::uid_to_username(uid)?,
            group: system::gid_to_groupname(gid)?,
            mode: system::format_mode(meta.permissions().mode()),
            md5: format!("{digest:x}"),
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating file {}", self.path.display());
        let opts = opts.build()?;

        let mode = system::parse_mode(&opts.mode)?;

        text::write_atomic(&self.path, &opts.content)?;
        fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))?;

        let (uid, gid) = system::uid_gid(&opts.owner, &opts.group)?;
        system::chown_path(&self.path, uid, gid)?;

        Ok(())
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("updating file {}", self.path.display());
        let opts = opts.build()?;

        if !opts.mode.is_empty() {
            let mode = system::parse_mode(&opts.mode)?;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))?;
        }

        if !opts.content.is_empty() {
            // write_atomic carries the existing mode over to the rewrite.
            text::write_atomic(&self.path, &opts.content)?;
        }

        if !opts.owner.is_empty() || !opts.group.is_empty() {
            let (mut uid, mut gid) = system::file_owner(&self.path)?;
            if !opts.owner.is_empty() {
                uid = system::username_to_uid(&opts.owner)?;
            }
            if !opts.group.is_empty() {
                gid = system::group_to_gid(&opts.group)?;
            }
            system::chown_path(&self.path, uid, gid)?;
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting file {}", self.path.display());
        fs::remove_file(&self.path)?;
        Ok(())
    }
}
