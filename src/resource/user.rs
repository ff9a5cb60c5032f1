//! User accounts managed through the shadow-utils tools.
//!
//! State is assembled from several places: `getent passwd` for the
//! account record, `getent shadow` for the password hash, a sudoers.d
//! probe, and a membership scan of the group database. Mutations shell
//! out to useradd/usermod/userdel with the non-empty-stderr failure
//! heuristic. Because command lines are whitespace-split, comments
//! containing spaces cannot be expressed.

use std::path::PathBuf;

use converge::{Error, ExecRequest, Executor, Options, Resource, Result, default_str, text};
use serde::{Deserialize, Serialize};

const GROUP_FILE: &str = "/etc/group";
const PASSWD_FILE: &str = "/etc/passwd";
const SUDOERS_DIR: &str = "/etc/sudoers.d";

/// A user account.
pub struct User<'a> {
    exec: &'a dyn Executor,
    name: String,
    group_file: PathBuf,
    sudoers_dir: PathBuf,
}

/// Observed account state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    /// Account name
    pub name: String,
    /// User id, as the decimal string the passwd database carries
    pub uid: String,
    /// Primary group id
    pub gid: String,
    /// GECOS comment
    pub comment: String,
    /// Home directory
    pub home_dir: String,
    /// Login shell
    pub shell: String,
    /// Password hash from the shadow database, when readable
    pub passwd: String,
    /// Whether a sudoers.d entry exists for the account
    pub sudo: bool,
    /// Groups the account is a supplementary member of
    pub groups: Vec<String>,
}

/// Options for creating an account.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Explicit uid; empty lets useradd pick one.
    pub uid: String,
    /// Primary group id
    pub gid: String,
    /// Login shell. Defaults to /usr/sbin/nologin.
    pub shell: String,
    /// Home directory path
    pub home_dir: String,
    /// Create the home directory
    pub create_home: bool,
    /// Make this a system account
    pub system: bool,
    /// GECOS comment
    pub comment: String,
    /// Supplementary groups
    pub groups: Vec<String>,
    /// Password hash to install
    pub passwd: String,
}

impl Options for CreateOpts {
    fn with_defaults(mut self) -> Self {
        default_str(&mut self.shell, "/usr/sbin/nologin");
        self
    }
}

/// Options for updating an account. Only fields that differ from the
/// current state are passed to usermod.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    pub uid: String,
    pub gid: String,
    pub shell: String,
    pub home_dir: String,
    pub comment: String,
    pub groups: Vec<String>,
}

impl Options for UpdateOpts {}

impl<'a> User<'a> {
    pub fn new(exec: &'a dyn Executor, name: impl Into<String>) -> Self {
        Self {
            exec,
            name: name.into(),
            group_file: PathBuf::from(GROUP_FILE),
            sudoers_dir: PathBuf::from(SUDOERS_DIR),
        }
    }

    /// Override the group database path (tests scan fixture files).
    pub fn with_group_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.group_file = path.into();
        self
    }

    /// Override the sudoers fragment directory (tests probe fixtures).
    pub fn with_sudoers_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sudoers_dir = dir.into();
        self
    }

    /// Fetch and split one record from a getent database.
    fn getent(&self, database: &str) -> Result<Vec<String>> {
        let result = self.exec.exec(&ExecRequest::new(format!(
            "getent {database} {}",
            self.name
        )))?;

        Ok(result
            .stdout
            .trim_end()
            .split(':')
            .map(str::to_string)
            .collect())
    }

    /// Supplementary groups listing this account as a member.
    fn memberships(&self) -> Result<Vec<String>> {
        Ok(text::read_lines(&self.group_file)?
            .iter()
            .filter_map(|line| {
                let fields: Vec<&str> = line.split(':').collect();
                if fields.len() < 4 {
                    return None;
                }
                fields[3]
                    .split(',')
                    .any(|member| member == self.name)
                    .then(|| fields[0].to_string())
            })
            .collect())
    }

    fn run_checked(&self, command: String, action: &str) -> Result<()> {
        let result = self.exec.exec(&ExecRequest::new(command))?;
        if !result.stderr.is_empty() {
            return Err(Error::execution_with_stderr(
                format!("unable to {action} user {}", self.name),
                result.stderr,
            ));
        }

        Ok(())
    }
}

impl Resource for User<'_> {
    type State = UserState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "User";

    fn read(&self) -> Result<UserState> {
        log::debug!("reading user {}", self.name);

        let passwd_record = self.getent("passwd")?;
        if passwd_record.len() < 7 {
            return Err(Error::not_found(Self::TYPE, &self.name));
        }

        // Shadow is only readable as root; absence of the record is fine.
        let shadow_record = self.getent("shadow")?;
        let passwd = shadow_record.get(1).cloned().unwrap_or_default();

        Ok(UserState {
            name: self.name.clone(),
            uid: passwd_record[2].clone(),
            gid: passwd_record[3].clone(),
            comment: passwd_record[4].clone(),
            home_dir: passwd_record[5].clone(),
            shell: passwd_record[6].clone(),
            passwd,
            sudo: self.sudoers_dir.join(&self.name).exists(),
            groups: self.memberships()?,
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating user {}", self.name);
        let opts = opts.build()?;

        let mut args = Vec::new();
        if !opts.uid.is_empty() {
            args.push(format!("-u {}", opts.uid));
        }
        if !opts.gid.is_empty() {
            args.push(format!("-g {}", opts.gid));
        }
        if !opts.home_dir.is_empty() {
            args.push(format!("-d {}", opts.home_dir));
        }
        if opts.create_home {
            args.push("-m".to_string());
        }
        if !opts.shell.is_empty() {
            args.push(format!("-s {}", opts.shell));
        }
        if !opts.passwd.is_empty() {
            args.push(format!("-p {}", opts.passwd));
        }
        if !opts.comment.is_empty() {
            args.push(format!("-c {}", opts.comment));
        }
        if !opts.groups.is_empty() {
            args.push(format!("-G {}", opts.groups.join(",")));
        }
        if opts.system {
            args.push("-r".to_string());
        }
        args.push(self.name.clone());

        self.run_checked(format!("useradd {}", args.join(" ")), "create")
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("updating user {}", self.name);
        let opts = opts.build()?;

        let current = self.read()?;

        let mut args = Vec::new();
        if !opts.uid.is_empty() && opts.uid != current.uid {
            args.push(format!("-u {}", opts.uid));
        }
        if !opts.gid.is_empty() && opts.gid != current.gid {
            args.push(format!("-g {}", opts.gid));
        }
        if !opts.comment.is_empty() && opts.comment != current.comment {
            args.push(format!("-c {}", opts.comment));
        }
        if !opts.home_dir.is_empty() && opts.home_dir != current.home_dir {
            args.push(format!("-d {}", opts.home_dir));
        }
        if !opts.shell.is_empty() && opts.shell != current.shell {
            args.push(format!("-s {}", opts.shell));
        }
        if !opts.groups.is_empty() {
            args.push(format!("-G {}", opts.groups.join(",")));
        }
        args.push(self.name.clone());

        self.run_checked(format!("usermod {}", args.join(" ")), "update")
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting user {}", self.name);
        self.run_checked(format!("userdel {}", self.name), "delete")
    }
}

/// List every account in the passwd database that can be read in full.
pub fn list(exec: &dyn Executor) -> Result<Vec<UserState>> {
    log::debug!("listing users");

    Ok(text::read_lines(PASSWD_FILE)?
        .iter()
        .filter_map(|line| {
            let name = line.split(':').next()?;
            if name.is_empty() {
                return None;
            }
            User::new(exec, name).read().ok()
        })
        .collect())
}
