//! Single entries in ini files.
//!
//! The document model keeps sections and keys in file order, including
//! the unnamed section at the top and boolean keys that carry no value.
//! Update is delete-then-create inside one load/save cycle pair, and
//! every save rewrites the file atomically.

use std::fs;
use std::path::PathBuf;

use converge::{Error, Options, Resource, Result, text};
use serde::{Deserialize, Serialize};

/// One `section/key` entry in an ini file.
pub struct FileIni {
    path: PathBuf,
    section: String,
    key: String,
}

/// Observed ini entry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IniState {
    /// File the entry lives in
    pub path: PathBuf,
    /// Section name, empty for the unnamed leading section
    pub section: String,
    /// Entry key
    pub key: String,
    /// Entry value; boolean keys read as "true"
    pub value: String,
}

/// Options for creating an ini entry. An empty value produces a boolean
/// key, a bare key with no `=`.
#[derive(Debug, Clone, Default)]
pub struct CreateOpts {
    pub value: String,
}

impl Options for CreateOpts {}

/// Options for replacing an entry's value.
#[derive(Debug, Clone, Default)]
pub struct UpdateOpts {
    pub value: String,
}

impl Options for UpdateOpts {}

impl FileIni {
    pub fn new(
        path: impl Into<PathBuf>,
        section: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            section: section.into(),
            key: key.into(),
        }
    }

    fn title(&self) -> String {
        format!("{}/{}/{}", self.path.display(), self.section, self.key)
    }

    fn load(&self) -> Result<IniDocument> {
        Ok(parse_document(&fs::read_to_string(&self.path)?))
    }

    fn save(&self, doc: &IniDocument) -> Result<()> {
        text::write_atomic(&self.path, &render_document(doc))
    }
}

impl Resource for FileIni {
    type State = IniState;
    type CreateOpts = CreateOpts;
    type UpdateOpts = UpdateOpts;

    const TYPE: &'static str = "FileIni";

    fn read(&self) -> Result<IniState> {
        log::debug!("reading ini entry {}", self.title());

        let doc = self.load()?;
        let Some(value) = doc.get(&self.section, &self.key) else {
            return Err(Error::not_found(Self::TYPE, self.title()));
        };

        Ok(IniState {
            path: self.path.clone(),
            section: self.section.clone(),
            key: self.key.clone(),
            value,
        })
    }

    fn create(&self, opts: CreateOpts) -> Result<()> {
        log::debug!("creating ini entry {}", self.title());
        let opts = opts.build()?;

        let mut doc = self.load()?;
        let value = (!opts.value.is_empty()).then_some(opts.value);
        doc.section_mut(&self.section).entries.push(Entry {
            key: self.key.clone(),
            value,
        });

        self.save(&doc)
    }

    fn update(&self, opts: UpdateOpts) -> Result<()> {
        log::debug!("updating ini entry {}", self.title());
        let opts = opts.build()?;

        if !self.exists()? {
            return Err(Error::execution("ini entry does not exist"));
        }

        self.delete()?;
        self.create(CreateOpts { value: opts.value })
    }

    fn delete(&self) -> Result<()> {
        log::debug!("deleting ini entry {}", self.title());

        let mut doc = self.load()?;
        doc.section_mut(&self.section)
            .entries
            .retain(|entry| entry.key != self.key);

        self.save(&doc)
    }
}

#[derive(Debug, Clone, Default)]
struct IniDocument {
    sections: Vec<Section>,
}

#[derive(Debug, Clone)]
struct Section {
    name: String,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: Option<String>,
}

impl IniDocument {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections
            .iter()
            .find(|s| s.name == section)?
            .entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.clone().unwrap_or_else(|| "true".to_string()))
    }

    fn section_mut(&mut self, name: &str) -> &mut Section {
        if let Some(idx) = self.sections.iter().position(|s| s.name == name) {
            return &mut self.sections[idx];
        }

        self.sections.push(Section {
            name: name.to_string(),
            entries: Vec::new(),
        });

        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }
}

/// Parse an ini document. Comments and blank lines are dropped; a later
/// rewrite does not preserve them.
fn parse_document(content: &str) -> IniDocument {
    let mut doc = IniDocument::default();
    let mut current = String::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.trim().to_string();
            // Materialize the section even when it has no entries yet.
            doc.section_mut(&current);
            continue;
        }

        let entry = match line.split_once('=') {
            Some((key, value)) => Entry {
                key: key.trim().to_string(),
                value: Some(value.trim().to_string()),
            },
            None => Entry {
                key: line.to_string(),
                value: None,
            },
        };

        doc.section_mut(&current).entries.push(entry);
    }

    doc
}

fn render_document(doc: &IniDocument) -> String {
    let mut out = String::new();

    for section in &doc.sections {
        if !section.name.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section.name));
        }

        for entry in &section.entries {
            match &entry.value {
                Some(value) => out.push_str(&format!("{} = {}\n", entry.key, value)),
                None => out.push_str(&format!("{}\n", entry.key)),
            }
        }
    }

    out
}
