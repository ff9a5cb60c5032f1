//! Unix identity and filesystem helpers shared by resource modules.
//!
//! Name/id lookups go through the system user database; ownership and
//! permission changes come in flat and recursive flavors. Everything here
//! re-queries the live system on each call.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::LazyLock;

use nix::unistd::{Gid, Group, Uid, User, chown};
use regex::Regex;

use crate::error::{Error, Result};
use crate::exec::{ExecRequest, Executor};
use crate::text;

/// Resolve a username to its uid.
pub fn username_to_uid(name: &str) -> Result<u32> {
    let user = User::from_name(name)
        .map_err(|e| Error::execution(format!("user lookup failed: {e}")))?
        .ok_or_else(|| Error::execution(format!("unknown user: {name}")))?;

    Ok(user.uid.as_raw())
}

/// Resolve a uid to its username.
pub fn uid_to_username(uid: u32) -> Result<String> {
    let user = User::from_uid(Uid::from_raw(uid))
        .map_err(|e| Error::execution(format!("user lookup failed: {e}")))?
        .ok_or_else(|| Error::execution(format!("unknown uid: {uid}")))?;

    Ok(user.name)
}

/// Resolve a group name to its gid.
pub fn group_to_gid(name: &str) -> Result<u32> {
    let group = Group::from_name(name)
        .map_err(|e| Error::execution(format!("group lookup failed: {e}")))?
        .ok_or_else(|| Error::execution(format!("unknown group: {name}")))?;

    Ok(group.gid.as_raw())
}

/// Resolve a gid to its group name.
pub fn gid_to_groupname(gid: u32) -> Result<String> {
    let group = Group::from_gid(Gid::from_raw(gid))
        .map_err(|e| Error::execution(format!("group lookup failed: {e}")))?
        .ok_or_else(|| Error::execution(format!("unknown gid: {gid}")))?;

    Ok(group.name)
}

/// Resolve an owner/group name pair to raw ids.
pub fn uid_gid(owner: &str, group: &str) -> Result<(u32, u32)> {
    Ok((username_to_uid(owner)?, group_to_gid(group)?))
}

/// Read the owning uid/gid of a path.
pub fn file_owner(path: impl AsRef<Path>) -> Result<(u32, u32)> {
    let meta = fs::metadata(path)?;
    Ok((meta.uid(), meta.gid()))
}

/// Change ownership of a single path.
pub fn chown_path(path: impl AsRef<Path>, uid: u32, gid: u32) -> Result<()> {
    chown(
        path.as_ref(),
        Some(Uid::from_raw(uid)),
        Some(Gid::from_raw(gid)),
    )
    .map_err(|e| Error::execution(format!("chown failed: {e}")))
}

/// Change ownership of a path and everything beneath it.
pub fn chown_recursive(path: impl AsRef<Path>, uid: u32, gid: u32) -> Result<()> {
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.map_err(|e| Error::execution(format!("walk failed: {e}")))?;
        chown_path(entry.path(), uid, gid)?;
    }

    Ok(())
}

/// Change permissions of a path and everything beneath it.
pub fn chmod_recursive(path: impl AsRef<Path>, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.map_err(|e| Error::execution(format!("walk failed: {e}")))?;
        fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode))?;
    }

    Ok(())
}

/// Parse an octal mode string such as "0640".
pub fn parse_mode(value: &str) -> Result<u32> {
    u32::from_str_radix(value, 8).map_err(|_| Error::parse(format!("invalid mode: {value}")))
}

/// Render a mode as the octal string resource state carries.
pub fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode & 0o7777)
}

/// Distribution facts reported by `lsb_release -a`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LsbInfo {
    pub distributor_id: String,
    pub description: String,
    pub release: String,
    pub codename: String,
}

/// Probe the distribution via `lsb_release -a`.
pub fn lsb_info(exec: &dyn Executor) -> Result<LsbInfo> {
    let result = exec.exec(&ExecRequest::new("lsb_release -a"))?;
    Ok(parse_lsb_info(&result.stdout))
}

static DISTRIBUTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Distributor ID:\s+(.+)").unwrap());
static DESCRIPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Description:\s+(.+)").unwrap());
static RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Release:\s+(.+)").unwrap());
static CODENAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Codename:\s+(.+)").unwrap());

fn parse_lsb_info(stdout: &str) -> LsbInfo {
    let probe = |re: &Regex| text::capture(re, stdout).unwrap_or_default();

    LsbInfo {
        distributor_id: probe(&DISTRIBUTOR_RE),
        description: probe(&DESCRIPTION_RE),
        release: probe(&RELEASE_RE),
        codename: probe(&CODENAME_RE),
    }
}
