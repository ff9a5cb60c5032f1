//! System groups managed through the shadow-utils tools.
//!
//! Lookup goes through the system group database; mutations shell out to
//! groupadd/groupmod/groupdel, which exit 0 for some soft failures, so
//! any stderr output is treated as failure.

use std::path::Path;

use converge::system;
use converge::{Error, ExecRequest, Executor, Options, Resource, Result, text};
use serde::{Deserialize, Serialize};

/// A system group.
pub struct Group<'a> {
    exec: &'a dyn Executor,
    name: String,
}

/// Observed group state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    /// Group name
    pub name: String,
    /// Group id, as the decimal string the group database carries
    pub gid: String,
}

/// Options for creating a group.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Explicit group id; empty lets groupadd pick one.
    pub gid: String,
}

impl Options for CreateOpts {}

/// Options for changing a group's id.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    pub gid: String,
}

impl Options for UpdateOpts {}

impl<'a> Group<'a> {
    pub fn new(exec: &'a dyn Executor, name: impl Into<String>) -> Self {
        Self {
            exec,
            name: name.into(),
        }
    }

    fn run_checked(&self, command: String, action: &str) -> Result<()> {
        let result = self.exec.exec(&ExecRequest::new(command))?;
        if !result.stderr.is_empty() {
            return Err(Error::execution_with_stderr(
                format!("unable to {action} group {}", self.name),
                result.stderr,
            ));
        }

        Ok(())
    }
}

impl Resource for Group<'_> {
    type State = GroupState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "Group";

    fn read(&self) -> Result<GroupState> {
        log::debug!("reading group {}", self.name);

        // Any lookup failure reads as absent.
        let Ok(gid) = system::group_to_gid(&self.name) else {
            return Err(Error::not_found(Self::TYPE, &self.name));
        };

        Ok(GroupState {
            name: self.name.clone(),
            gid: gid.to_string(),
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating group {}", self.name);
        let opts = opts.build()?;

        let mut args = Vec::new();
        if !opts.gid.is_empty() {
            args.push(format!("-g {}", opts.gid));
        }
        args.push(self.name.clone());

        self.run_checked(format!("groupadd {}", args.join(" ")), "add")
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("updating group {}", self.name);
        let opts = opts.build()?;

        let mut args = Vec::new();
        if !opts.gid.is_empty() {
            args.push(format!("-g {}", opts.gid));
        }
        args.push(self.name.clone());

        self.run_checked(format!("groupmod {}", args.join(" ")), "update")
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting group {}", self.name);
        self.run_checked(format!("groupdel {}", self.name), "delete")
    }
}

/// List every group in the group database.
pub fn list() -> Result<Vec<GroupState>> {
    list_in(Path::new("/etc/group"))
}

fn list_in(path: &Path) -> Result<Vec<GroupState>> {
    log::debug!("listing groups from {}", path.display());

    Ok(text::read_lines(path)?
        .iter()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 3 {
                return None;
            }
            Some(GroupState {
                name: fields[0].to_string(),
                gid: fields[2].to_string(),
            })
        })
        .collect())
}
