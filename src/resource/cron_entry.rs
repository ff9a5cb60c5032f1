//! Cron entries in per-user crontabs.
//!
//! An entry is one crontab line tagged with a trailing `# name` comment
//! that serves as its identity. The crontab is always read with
//! `crontab -l` and reinstalled whole from a staged temporary file, so
//! update is delete-then-create with a transient absent window.

use std::io::Write;
use std::sync::LazyLock;

use converge::{
    Error, ExecRequest, Executor, Options, Resource, Result, ValidationError, default_str, require,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A cron entry for one user, addressed by its tag name.
pub struct CronEntry<'a> {
    exec: &'a dyn Executor,
    user: String,
    name: String,
}

/// Observed cron entry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronEntryState {
    /// Tag name identifying the entry
    pub name: String,
    /// Command cron runs
    pub command: String,
    /// Minute field
    pub minute: String,
    /// Hour field
    pub hour: String,
    /// Day-of-month field
    pub day_of_month: String,
    /// Month field
    pub month: String,
    /// Day-of-week field
    pub day_of_week: String,
}

/// Options for creating a cron entry. Schedule fields default to `*`.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Command cron will run. May not contain whitespace beyond the
    /// schedule contract: the whole line must parse back into seven
    /// tokens.
    pub command: String,
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
}

impl Options for CreateOpts {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require("Command", &self.command)
    }

    fn with_defaults(mut self) -> Self {
        default_str(&mut self.minute, "*");
        default_str(&mut self.hour, "*");
        default_str(&mut self.day_of_month, "*");
        default_str(&mut self.month, "*");
        default_str(&mut self.day_of_week, "*");
        self
    }
}

/// Options for replacing an existing entry's schedule or command.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    pub command: String,
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
}

impl Options for UpdateOpts {}

impl<'a> CronEntry<'a> {
    pub fn new(
        exec: &'a dyn Executor,
        user: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            exec,
            user: user.into(),
            name: name.into(),
        }
    }

    /// Current crontab lines for the user, empties dropped.
    fn entries(&self) -> Result<Vec<String>> {
        read_entries(self.exec, &self.user)
    }

    /// Reinstall the user's crontab from the given lines.
    fn install(&self, entries: &[String]) -> Result<()> {
        let mut staged = tempfile::NamedTempFile::new()?;
        writeln!(staged, "{}", entries.join("\n"))?;
        staged.flush()?;

        self.exec.exec(&ExecRequest::new(format!(
            "crontab -u {} {}",
            self.user,
            staged.path().display()
        )))?;

        Ok(())
    }

    fn tag(&self) -> String {
        format!("# {}", self.name)
    }
}

impl Resource for CronEntry<'_> {
    type State = CronEntryState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "CronEntry";

    fn read(&self) -> Result<CronEntryState> {
        log::debug!("reading cron entry {} for user {}", self.name, self.user);

        let tag = self.tag();
        let entries = self.entries()?;
        let Some(line) = entries.iter().find(|line| line.contains(&tag)) else {
            return Err(Error::not_found(Self::TYPE, &self.name));
        };

        parse_line(line)
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating cron entry {} for user {}", self.name, self.user);
        let opts = opts.build()?;

        let mut entries = self.entries()?;
        entries.push(format!(
            "{} {} {} {} {} {} {}",
            opts.minute,
            opts.hour,
            opts.day_of_month,
            opts.month,
            opts.day_of_week,
            opts.command,
            self.tag()
        ));

        self.install(&entries)
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("updating cron entry {} for user {}", self.name, self.user);
        let opts = opts.build()?;

        self.delete()?;
        self.create(CreateOpts {
            command: opts.command,
            minute: opts.minute,
            hour: opts.hour,
            day_of_month: opts.day_of_month,
            month: opts.month,
            day_of_week: opts.day_of_week,
        })
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting cron entry {} for user {}", self.name, self.user);

        let tag = self.tag();
        let entries: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|line| !line.contains(&tag))
            .collect();

        self.install(&entries)
    }
}

/// List every parseable cron entry for a user. Untagged or malformed
/// lines are skipped.
pub fn list(exec: &dyn Executor, user: &str) -> Result<Vec<CronEntryState>> {
    log::debug!("listing cron entries for user {user}");

    Ok(read_entries(exec, user)?
        .iter()
        .filter_map(|line| parse_line(line).ok())
        .collect())
}

fn read_entries(exec: &dyn Executor, user: &str) -> Result<Vec<String>> {
    let result = exec.exec(&ExecRequest::new(format!("crontab -u {user} -l")))?;

    Ok(result
        .stdout
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+#\s+(.+)$").unwrap()
});

/// Parse one tagged crontab line. The seven-token shape is a hard error
/// on mismatch.
fn parse_line(line: &str) -> Result<CronEntryState> {
    let caps = ENTRY_RE
        .captures(line)
        .ok_or_else(|| Error::parse(format!("unable to parse cron entry [{line}]")))?;

    Ok(CronEntryState {
        minute: caps[1].to_string(),
        hour: caps[2].to_string(),
        day_of_month: caps[3].to_string(),
        month: caps[4].to_string(),
        day_of_week: caps[5].to_string(),
        command: caps[6].to_string(),
        name: caps[7].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::testing::FakeExecutor;

    #[test]
    fn test_parse_line_round_trip() {
        let state = parse_line("*/5 0 * * 1 /usr/bin/uptime # heartbeat").unwrap();
        assert_eq!(state.minute, "*/5");
        assert_eq!(state.hour, "0");
        assert_eq!(state.day_of_week, "1");
        assert_eq!(state.command, "/usr/bin/uptime");
        assert_eq!(state.name, "heartbeat");
    }

    #[test]
    fn test_parse_untagged_line_is_hard_error() {
        let err = parse_line("*/5 0 * * 1 /usr/bin/uptime").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_read_finds_tagged_entry() {
        let exec = FakeExecutor::new().respond_stdout(
            "crontab -u deploy -l",
            "0 3 * * * /usr/local/bin/backup # nightly\n\
             * * * * * /usr/bin/true # keepalive\n",
        );

        let entry = CronEntry::new(&exec, "deploy", "nightly");
        let state = entry.read().unwrap();
        assert_eq!(state.hour, "3");
        assert_eq!(state.command, "/usr/local/bin/backup");
    }

    #[test]
    fn test_read_missing_entry_is_not_found() {
        let exec = FakeExecutor::new();
        let entry = CronEntry::new(&exec, "deploy", "nightly");

        assert!(entry.read().unwrap_err().is_not_found());
        assert!(!entry.exists().unwrap());
    }

    #[test]
    fn test_create_defaults_and_installs() {
        let exec = FakeExecutor::new();
        let entry = CronEntry::new(&exec, "deploy", "heartbeat");

        entry
            .create(CreateOpts {
                command: "/usr/bin/uptime".to_string(),
                minute: "*/5".to_string(),
                ..Default::default()
            })
            .unwrap();

        let calls = exec.calls();
        assert_eq!(calls[0], "crontab -u deploy -l");
        assert!(calls[1].starts_with("crontab -u deploy "));
    }

    #[test]
    fn test_create_requires_command() {
        let exec = FakeExecutor::new();
        let entry = CronEntry::new(&exec, "deploy", "heartbeat");

        let err = entry.create(CreateOpts::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing input: Command");
    }

    #[test]
    fn test_list_skips_unparseable_lines() {
        let exec = FakeExecutor::new().respond_stdout(
            "crontab -u deploy -l",
            "MAILTO=ops@example.com\n\
             0 3 * * * /usr/local/bin/backup # nightly\n",
        );

        let entries = list(&exec, "deploy").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "nightly");
    }
}
