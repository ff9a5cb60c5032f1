//! Resource modules.
//!
//! Every module follows the same shape: a handle struct carrying the
//! instance's identity (and a [`converge::Executor`] where commands are
//! involved), a serializable state struct re-derived from the live system
//! on every read, options records implementing [`converge::Options`], and
//! a module-level `list` returning every present instance.

pub mod apt_key;
pub mod apt_package;
pub mod apt_ppa;
pub mod apt_source;
pub mod cron_entry;
pub mod directory;
pub mod file;
pub mod file_ini;
pub mod file_line;
pub mod git_repo;
pub mod group;
pub mod user;

/// Environment for noninteractive apt runs.
///
/// The executor replaces the child environment wholesale, so PATH has to
/// be carried over explicitly.
pub(crate) fn apt_env() -> Vec<String> {
    vec![
        "DEBIAN_FRONTEND=noninteractive".to_string(),
        "APT_LISTBUGS_FRONTEND=none".to_string(),
        "APT_LISTCHANGES_FRONTEND=none".to_string(),
        format!("PATH={}", std::env::var("PATH").unwrap_or_default()),
    ]
}
