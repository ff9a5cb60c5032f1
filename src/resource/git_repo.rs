//! Git checkouts on the local filesystem.
//!
//! Read shells out to git inside the checkout: current branch, a remote
//! probe to tell whether HEAD is behind, the HEAD commit, and the nearest
//! tag. Create clones quietly, pins commit/tag/branch in that order, and
//! chowns the tree to its owner.

use std::fs;
use std::path::PathBuf;

use converge::system;
use converge::{
    Error, ExecRequest, Executor, Options, Resource, Result, ValidationError, default_str, require,
};
use serde::{Deserialize, Serialize};

/// A git repository checked out at a local path.
pub struct GitRepo<'a> {
    exec: &'a dyn Executor,
    path: PathBuf,
}

/// Observed checkout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    /// Checkout path
    pub path: PathBuf,
    /// Current branch (or "HEAD" when detached)
    pub branch: String,
    /// HEAD commit hash
    pub commit: String,
    /// Nearest tag, falling back to an abbreviated commit
    pub tag: String,
    /// Whether the checkout is up to date with its remote
    pub latest: bool,
}

/// Options for cloning a repository.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Clone source URL or path
    pub source: String,
    /// Owning user for the whole tree. Defaults to root.
    pub owner: String,
    /// Owning group for the whole tree. Defaults to root.
    pub group: String,
    /// Branch to check out after cloning
    pub branch: String,
    /// Commit to check out after cloning
    pub commit: String,
    /// Tag to check out after cloning
    pub tag: String,
}

impl Options for CreateOpts {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require("Source", &self.source)
    }

    fn with_defaults(mut self) -> Self {
        default_str(&mut self.owner, "root");
        default_str(&mut self.group, "root");
        self
    }
}

/// Options for moving an existing checkout. Empty fields are skipped;
/// ownership changes only when both owner and group are given.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    pub owner: String,
    pub group: String,
    pub branch: String,
    pub commit: String,
    pub tag: String,
    /// Pull the branch after checking it out
    pub latest: bool,
}

impl Options for UpdateOpts {}

impl<'a> GitRepo<'a> {
    pub fn new(exec: &'a dyn Executor, path: impl Into<PathBuf>) -> Self {
        Self {
            exec,
            path: path.into(),
        }
    }

    /// Run a git command inside the checkout, returning trimmed stdout.
    fn git(&self, command: &str) -> Result<String> {
        let result = self
            .exec
            .exec(&ExecRequest::new(command).in_dir(&self.path))?;
        Ok(result.stdout.trim().to_string())
    }
}

impl Resource for GitRepo<'_> {
    type State = RepoState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "GitRepo";

    fn read(&self) -> Result<RepoState> {
        log::debug!("reading git repo {}", self.path.display());

        if !self.path.exists() {
            return Err(Error::not_found(Self::TYPE, self.path.display().to_string()));
        }

        if !self.path.join(".git/config").exists() {
            return Err(Error::execution(format!(
                "{} is not a git repository",
                self.path.display()
            )));
        }

        let branch = self.git("git rev-parse --abbrev-ref HEAD")?;

        self.git("git remote update")?;
        let status = self.git("git status -uno")?;
        let latest = status.contains("up-to-date") || status.contains("up to date");

        let commit = self.git("git rev-parse HEAD")?;
        let tag = self.git("git describe --always --tag")?;

        Ok(RepoState {
            path: self.path.clone(),
            branch,
            commit,
            tag,
            latest,
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating git repo {}", self.path.display());
        let opts = opts.build()?;

        self.exec.exec(&ExecRequest::new(format!(
            "git clone --quiet {} {}",
            opts.source,
            self.path.display()
        )))?;

        if !opts.commit.is_empty() {
            self.git(&format!("git checkout {}", opts.commit))?;
        }
        if !opts.tag.is_empty() {
            self.git(&format!("git checkout tags/{}", opts.tag))?;
        }
        if !opts.branch.is_empty() {
            self.git(&format!("git checkout {}", opts.branch))?;
        }

        let (uid, gid) = system::uid_gid(&opts.owner, &opts.group)?;
        system::chown_recursive(&self.path, uid, gid)?;

        Ok(())
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("updating git repo {}", self.path.display());
        let opts = opts.build()?;

        if !opts.branch.is_empty() {
            self.git(&format!("git checkout {}", opts.branch))?;
            if opts.latest {
                self.git("git pull")?;
            }
        }

        if !opts.commit.is_empty() {
            self.git(&format!("git checkout {}", opts.commit))?;
        }
        if !opts.tag.is_empty() {
            self.git(&format!("git checkout tags/{}", opts.tag))?;
        }

        if !opts.owner.is_empty() && !opts.group.is_empty() {
            let (uid, gid) = system::uid_gid(&opts.owner, &opts.group)?;
            system::chown_recursive(&self.path, uid, gid)?;
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting git repo {}", self.path.display());
        fs::remove_dir_all(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::testing::FakeExecutor;

    fn checkout(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("repo");
        fs::create_dir_all(path.join(".git")).unwrap();
        fs::write(path.join(".git/config"), "[core]\n").unwrap();
        path
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let exec = FakeExecutor::new();
        let repo = GitRepo::new(&exec, "/nonexistent/checkout");

        assert!(repo.read().unwrap_err().is_not_found());
        assert!(!repo.exists().unwrap());
    }

    #[test]
    fn test_plain_directory_is_not_a_repository() {
        let scratch = tempfile::tempdir().unwrap();
        let exec = FakeExecutor::new();
        let repo = GitRepo::new(&exec, scratch.path());

        let err = repo.read().unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
    }

    #[test]
    fn test_read_probes_the_checkout() {
        let scratch = tempfile::tempdir().unwrap();
        let path = checkout(scratch.path());

        let exec = FakeExecutor::new()
            .respond_stdout("git rev-parse --abbrev-ref HEAD", "main\n")
            .respond_stdout("git status -uno", "Your branch is up to date with 'origin/main'.\n")
            .respond_stdout("git rev-parse HEAD", "a1b2c3d4\n")
            .respond_stdout("git describe --always --tag", "v1.2.0\n");

        let state = GitRepo::new(&exec, &path).read().unwrap();
        assert_eq!(state.branch, "main");
        assert_eq!(state.commit, "a1b2c3d4");
        assert_eq!(state.tag, "v1.2.0");
        assert!(state.latest);
    }

    #[test]
    fn test_create_requires_source() {
        let exec = FakeExecutor::new();
        let repo = GitRepo::new(&exec, "/tmp/checkout");

        let err = repo.create(CreateOpts::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing input: Source");
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn test_update_checks_out_and_pulls_branch() {
        let exec = FakeExecutor::new();
        let repo = GitRepo::new(&exec, "/srv/app");

        repo.update(UpdateOpts {
            branch: "release".to_string(),
            latest: true,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(exec.calls(), vec!["git checkout release", "git pull"]);
    }

    #[test]
    fn test_update_tag_uses_tags_ref() {
        let exec = FakeExecutor::new();
        let repo = GitRepo::new(&exec, "/srv/app");

        repo.update(UpdateOpts {
            tag: "v2.0.0".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(exec.calls(), vec!["git checkout tags/v2.0.0"]);
    }
}
