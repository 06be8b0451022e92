//! Error types for parsing, binding and rendering.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 1-based location of a marker in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("malformed marker")]
    MalformedMarker,
    #[error("invalid name `{0}`")]
    InvalidName(String),
    #[error("marker requires an argument")]
    MissingArgument,
    #[error("invalid condition: {0}")]
    InvalidCondition(String),
    #[error("block `{0}` is never closed")]
    UnclosedBlock(String),
    #[error("end of block `{found}` does not match open block `{expected}`")]
    MismatchedEndBlock { expected: String, found: String },
    #[error("end of block without a matching begin")]
    UnexpectedEndBlock,
    #[error("conditional is never closed")]
    UnclosedConditional,
    #[error("conditional marker without a matching `if`")]
    UnexpectedConditional,
    #[error("`elseif` or `else` after `else`")]
    BranchAfterElse,
    #[error("conditional marker crosses the boundary of block `{0}`")]
    CrossesBlock(String),
    #[error("block `{0}` is nested inside a block with the same name")]
    NestedSameName(String),
    #[error("include requires a subtemplate loader")]
    IncludeUnavailable,
    #[error("include depth exceeds {0}")]
    IncludeTooDeep(usize),
}

/// A malformed or mismatched marker, found while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct TemplateSyntaxError {
    pub kind: SyntaxErrorKind,
    pub position: Position,
    /// Raw text of the offending marker (empty at end of input).
    pub marker: String,
    /// Name of the subtemplate the error occurred in, if any.
    pub origin: Option<String>,
}

impl TemplateSyntaxError {
    pub fn new(kind: SyntaxErrorKind, position: Position, marker: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            marker: marker.into(),
            origin: None,
        }
    }

    pub(crate) fn in_subtemplate(mut self, name: &str) -> Self {
        if self.origin.is_none() {
            self.origin = Some(name.to_string());
        }
        self
    }
}

impl fmt::Display for TemplateSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.position)?;
        if !self.marker.is_empty() {
            write!(f, " (`{}`)", self.marker)?;
        }
        if let Some(origin) = &self.origin {
            write!(f, " in subtemplate `{}`", origin)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("variable `{0}` is referenced but was never assigned")]
    UnboundVariable(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("template syntax error: {0}")]
    Syntax(#[from] TemplateSyntaxError),
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("unknown block `{0}`")]
    UnknownBlock(String),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("failed to read `{}`: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
