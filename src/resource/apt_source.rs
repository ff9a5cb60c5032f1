//! Apt source entries under sources.list.d.
//!
//! A source named `NAME` lives in `NAME.list` as a single
//! `deb URI DISTRIBUTION COMPONENT` line, with an optional companion
//! `NAME-src.list` holding the matching `deb-src` line. The four-token
//! shape is load-bearing: anything else is a hard parse error, unlike the
//! soft extraction used elsewhere.

use std::fs;
use std::path::{Path, PathBuf};

use converge::{
    Error, ExecRequest, Executor, Options, Resource, Result, ValidationError, default_bool,
    require, text,
};
use serde::{Deserialize, Serialize};

const SOURCES_DIR: &str = "/etc/apt/sources.list.d";

/// An apt source entry, named after the file that contains it.
pub struct AptSource<'a> {
    exec: &'a dyn Executor,
    name: String,
    dir: PathBuf,
}

/// Observed source entry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    /// Entry name (the file stem under sources.list.d)
    pub name: String,
    /// Repository URI
    pub uri: String,
    /// Distribution
    pub distribution: String,
    /// Component
    pub component: String,
    /// Whether a companion deb-src entry exists
    pub include_src: bool,
}

/// Options for creating a source entry.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    /// Repository URI
    pub uri: String,
    /// Distribution
    pub distribution: String,
    /// Component
    pub component: String,
    /// Also write the companion deb-src entry
    pub include_src: bool,
    /// Run `apt-get update` afterward. Defaults to true.
    pub refresh: bool,
}

impl Options for CreateOpts {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require("URI", &self.uri)?;
        require("Distribution", &self.distribution)
    }

    fn with_defaults(mut self) -> Self {
        default_bool(&mut self.refresh, true);
        self
    }
}

impl<'a> AptSource<'a> {
    pub fn new(exec: &'a dyn Executor, name: impl Into<String>) -> Self {
        Self {
            exec,
            name: name.into(),
            dir: PathBuf::from(SOURCES_DIR),
        }
    }

    /// Override the sources directory (tests converge scratch trees).
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    fn list_path(&self) -> PathBuf {
        self.dir.join(format!("{}.list", self.name))
    }

    fn src_list_path(&self) -> PathBuf {
        self.dir.join(format!("{}-src.list", self.name))
    }
}

impl Resource for AptSource<'_> {
    type State = SourceState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = ();

    const TYPE: &'static str = "AptSource";

    fn read(&self) -> Result<SourceState> {
        log::debug!("reading apt source entry {}", self.name);

        let path = self.list_path();
        if !path.exists() {
            return Err(Error::not_found(Self::TYPE, &self.name));
        }

        let content = fs::read_to_string(&path)?;
        let entry = parse_entry(content.trim_end())?;

        Ok(SourceState {
            name: self.name.clone(),
            uri: entry.uri,
            distribution: entry.distribution,
            component: entry.component,
            include_src: self.src_list_path().exists(),
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating apt source entry {}", self.name);
        let opts = opts.build()?;

        let entry = Entry {
            uri: opts.uri,
            distribution: opts.distribution,
            component: opts.component,
            source: false,
        };

        text::write_atomic(self.list_path(), &format!("{}\n", build_entry(&entry, false)))?;

        if opts.include_src {
            text::write_atomic(
                self.src_list_path(),
                &format!("{}\n", build_entry(&entry, true)),
            )?;
        }

        if opts.refresh {
            self.exec.exec(&ExecRequest::new("apt-get update -qq"))?;
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting apt source entry {}", self.name);

        fs::remove_file(self.list_path())?;

        let src = self.src_list_path();
        if src.exists() {
            fs::remove_file(src)?;
        }

        self.exec.exec(&ExecRequest::new("apt-get update -qq"))?;
        Ok(())
    }
}

/// List every source entry in the sources directory.
pub fn list() -> Result<Vec<SourceState>> {
    list_in(Path::new(SOURCES_DIR))
}

fn list_in(dir: &Path) -> Result<Vec<SourceState>> {
    log::debug!("listing apt source entries");

    let mut sources = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let file_name = dir_entry.file_name().to_string_lossy().into_owned();
        let Some(name) = file_name.strip_suffix(".list") else {
            continue;
        };

        let content = fs::read_to_string(dir_entry.path())?;

        // A file may carry both a binary and a source line; the last
        // entry wins so one state represents the whole file.
        let mut state: Option<SourceState> = None;
        for line in content.lines() {
            if !line.starts_with("deb") {
                continue;
            }

            let entry = parse_entry(line)?;
            state = Some(SourceState {
                name: name.to_string(),
                uri: entry.uri,
                distribution: entry.distribution,
                component: entry.component,
                include_src: entry.source,
            });
        }

        if let Some(state) = state {
            sources.push(state);
        }
    }

    Ok(sources)
}

#[derive(Debug, Clone)]
struct Entry {
    uri: String,
    distribution: String,
    component: String,
    source: bool,
}

fn build_entry(entry: &Entry, source: bool) -> String {
    let deb = if source { "deb-src" } else { "deb" };
    format!(
        "{deb} {} {} {}",
        entry.uri, entry.distribution, entry.component
    )
}

/// Parse a `deb`/`deb-src` line. The four-token arity is a hard error on
/// mismatch.
fn parse_entry(line: &str) -> Result<Entry> {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() != 4 {
        return Err(Error::parse(format!("unable to parse source entry [{line}]")));
    }

    Ok(Entry {
        uri: tokens[1].to_string(),
        distribution: tokens[2].to_string(),
        component: tokens[3].to_string(),
        source: tokens[0] == "deb-src",
    })
}
