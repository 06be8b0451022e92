//! Where template text comes from: inline text or a file, plus the loader
//! used for `[include:...]` markers.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::compiler::compile;
use crate::cond::FlagSet;
use crate::config::ParseOptions;
use crate::error::{Error, Result};
use crate::model::Model;

/// Resolves subtemplate names found in `[include:name]` markers.
pub trait SubtemplateLoader {
    fn load(&self, name: &str) -> Result<String>;
}

/// Loads subtemplates from files relative to a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoader {
    base: PathBuf,
}

impl FileLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl SubtemplateLoader for FileLoader {
    fn load(&self, name: &str) -> Result<String> {
        read_file(&self.base.join(name))
    }
}

/// In-memory subtemplates keyed by name.
impl SubtemplateLoader for HashMap<String, String> {
    fn load(&self, name: &str) -> Result<String> {
        self.get(name).cloned().ok_or_else(|| Error::Load {
            path: PathBuf::from(name),
            source: io::Error::new(io::ErrorKind::NotFound, "no such subtemplate"),
        })
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Load {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateSource {
    Text(String),
    File(PathBuf),
}

/// Everything needed to build a model: the source, the condition flags
/// active at parse time, where includes are resolved, and parse options.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateSpec {
    pub source: TemplateSource,
    pub flags: FlagSet,
    /// Base directory for includes. Defaults to the template file's directory.
    pub subtemplate_base: Option<PathBuf>,
    pub options: ParseOptions,
}

impl TemplateSpec {
    pub fn new(source: TemplateSource) -> Self {
        Self {
            source,
            flags: FlagSet::new(),
            subtemplate_base: None,
            options: ParseOptions::default(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(TemplateSource::Text(text.into()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(TemplateSource::File(path.into()))
    }

    pub fn flag(mut self, flag: impl AsRef<str>) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.flags.extend(flags);
        self
    }

    pub fn subtemplate_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.subtemplate_base = Some(base.into());
        self
    }

    pub fn options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn load_source(&self) -> Result<Cow<'_, str>> {
        match &self.source {
            TemplateSource::Text(text) => Ok(Cow::Borrowed(text.as_str())),
            TemplateSource::File(path) => read_file(path).map(Cow::Owned),
        }
    }

    /// The loader includes resolve through, if the spec has a base directory.
    pub fn loader(&self) -> Option<FileLoader> {
        match (&self.subtemplate_base, &self.source) {
            (Some(base), _) => Some(FileLoader::new(base.clone())),
            (None, TemplateSource::File(path)) => Some(FileLoader::new(
                path.parent().map(Path::to_path_buf).unwrap_or_default(),
            )),
            (None, TemplateSource::Text(_)) => None,
        }
    }

    pub fn compile(&self) -> Result<Model> {
        let text = self.load_source()?;
        let loader = self.loader();
        compile(
            &text,
            &self.flags,
            &self.options,
            loader.as_ref().map(|l| l as &dyn SubtemplateLoader),
        )
    }
}
