//! Text-state parsing conventions.
//!
//! Two recurring algorithms back every text-shaped resource:
//!
//! - **Structured extraction**: command or file output is probed with
//!   regexes to pull out named fields. Malformed or non-matching lines are
//!   silently skipped - an absent match yields an empty field, which
//!   downstream logic reads as "not found". Extraction never errors.
//! - **Line-level idempotent edit**: given existing lines and a new line
//!   plus an optional match pattern, a matching line is replaced in place
//!   (position preserved); with no match the new line is appended.
//!   Removal mirrors this: matching (or literally equal) lines are
//!   dropped, everything else keeps its relative order. Applying the same
//!   edit twice yields the same line set as applying it once.
//!
//! File IO here is whole-file and atomic: [`write_atomic`] stages content
//! in a same-directory temporary file and renames it over the target, so
//! the file is never observed half-written on any exit path.

use std::fs;
use std::io::Write;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};

/// Extract the first capture group of the first match, if any.
pub fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract the first capture group from every matching line, in order.
pub fn capture_lines(re: &Regex, text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| capture(re, line))
        .collect()
}

/// Replace lines matching `matcher` with `line`, preserving their
/// position; if nothing matched, append `line`.
pub fn upsert_line(lines: &[String], line: &str, matcher: Option<&Regex>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() + 1);
    let mut replaced = false;

    for existing in lines {
        if matcher.is_some_and(|re| re.is_match(existing)) {
            replaced = true;
            out.push(line.to_string());
        } else {
            out.push(existing.clone());
        }
    }

    if !replaced {
        out.push(line.to_string());
    }

    out
}

/// Drop lines matching `matcher` (or literally equal to `line` when no
/// matcher is given), preserving the order of everything else.
pub fn remove_lines(lines: &[String], line: &str, matcher: Option<&Regex>) -> Vec<String> {
    lines
        .iter()
        .filter(|existing| match matcher {
            Some(re) => !re.is_match(existing),
            None => existing.as_str() != line,
        })
        .cloned()
        .collect()
}

/// Read a file into lines.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.split('\n').map(str::to_string).collect())
}

/// Write `content` to `path` atomically.
///
/// Content is staged in a temporary file in the target's directory, fsynced,
/// then renamed over the target. The mode of an existing target is
/// preserved; new files get 0644.
pub fn write_atomic(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path)
            .map(|meta| meta.permissions().mode())
            .unwrap_or(0o644)
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    }

    tmp.persist(path)
        .map_err(|e| Error::Io(e.error))?;

    Ok(())
}
