//! Single lines in arbitrary text files.
//!
//! The line-level idempotent edit convention applied directly: create
//! replaces lines matching the pattern in place, else appends; delete
//! drops matching or literally equal lines. All writes are atomic.

use std::path::PathBuf;

use converge::{Error, Resource, Result, text};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One line in a file, addressed literally or by a match pattern.
#[derive(Debug)]
pub struct FileLine {
    path: PathBuf,
    line: String,
    matcher: Option<Regex>,
}

/// Observed line state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineState {
    /// File the line lives in
    pub path: PathBuf,
    /// The line as currently present, which for a pattern-addressed line
    /// may differ from the desired one
    pub line: String,
}

impl FileLine {
    pub fn new(path: impl Into<PathBuf>, line: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: line.into(),
            matcher: None,
        }
    }

    /// Address existing lines by regex instead of literal equality.
    pub fn with_match(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .map_err(|e| Error::parse(format!("invalid match pattern [{pattern}]: {e}")))?;
        self.matcher = Some(re);
        Ok(self)
    }

    fn title(&self) -> String {
        let needle = self
            .matcher
            .as_ref()
            .map_or(self.line.as_str(), Regex::as_str);
        format!("{}/{}", self.path.display(), needle)
    }

    fn matches(&self, candidate: &str) -> bool {
        match &self.matcher {
            Some(re) => re.is_match(candidate),
            None => candidate == self.line,
        }
    }

    fn load(&self) -> Result<Vec<String>> {
        let mut lines = text::read_lines(&self.path)?;
        // Drop the empty tail of a newline-terminated file so edits do not
        // accumulate blank lines.
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        Ok(lines)
    }

    fn store(&self, lines: &[String]) -> Result<()> {
        text::write_atomic(&self.path, &format!("{}\n", lines.join("\n")))
    }
}

impl Resource for FileLine {
    type State = LineState;
    type CreateOpts = ();
    type UpdateOpts = ();

    const TYPE: &'static str = "FileLine";

    fn read(&self) -> Result<LineState> {
        log::debug!("reading line {}", self.title());

        let lines = self.load()?;
        let found = lines.iter().rev().find(|candidate| self.matches(candidate));

        match found {
            Some(line) if !line.is_empty() => Ok(LineState {
                path: self.path.clone(),
                line: line.clone(),
            }),
            _ => Err(Error::not_found(Self::TYPE, self.title())),
        }
    }

    fn create(&self, (): ()) -> Result<()> {
        log::debug!("adding line {}", self.title());

        let lines = self.load()?;
        let edited = text::upsert_line(&lines, &self.line, self.matcher.as_ref());
        self.store(&edited)
    }

    fn delete(&self) -> Result<()> {
        log::debug!("removing line {}", self.title());

        let lines = self.load()?;
        let edited = text::remove_lines(&lines, &self.line, self.matcher.as_ref());
        self.store(&edited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture(content: &str) -> (tempfile::TempDir, PathBuf) {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("file.txt");
        fs::write(&path, content).unwrap();
        (scratch, path)
    }

    #[test]
    fn test_literal_lifecycle() {
        let (_scratch, path) = fixture("keep this line\n");
        let line = FileLine::new(&path, "foo bar baz");

        assert!(!line.exists().unwrap());

        line.create(()).unwrap();
        assert_eq!(line.read().unwrap().line, "foo bar baz");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "keep this line\nfoo bar baz\n"
        );

        line.delete().unwrap();
        assert!(!line.exists().unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep this line\n");
    }

    #[test]
    fn test_match_appends_then_replaces() {
        let (_scratch, path) = fixture("keep this line\n");

        // No line matches ^-m yet, so the new line is appended.
        FileLine::new(&path, "-m 512")
            .with_match("^-m")
            .unwrap()
            .create(())
            .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "keep this line\n-m 512\n"
        );

        // Now it matches, so the line is replaced in place.
        let line = FileLine::new(&path, "-m 256").with_match("^-m").unwrap();
        line.create(()).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "keep this line\n-m 256\n"
        );
        assert_eq!(line.read().unwrap().line, "-m 256");
    }

    #[test]
    fn test_read_by_match_reports_current_line() {
        let (_scratch, path) = fixture("-m 1024\n");
        let line = FileLine::new(&path, "-m 256").with_match("^-m").unwrap();

        assert_eq!(line.read().unwrap().line, "-m 1024");
    }

    #[test]
    fn test_invalid_pattern_is_parse_error() {
        let err = FileLine::new("/tmp/x", "y").with_match("^(").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_delete_by_match() {
        let (_scratch, path) = fixture("alpha\n-m 512\nomega\n");
        FileLine::new(&path, "")
            .with_match("^-m")
            .unwrap()
            .delete()
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "alpha\nomega\n");
    }
}
