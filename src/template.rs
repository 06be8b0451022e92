use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::compiler;
use crate::cond::FlagSet;
use crate::error::Result;
use crate::eval;
use crate::model::Model;
use crate::source::TemplateSpec;
use crate::state::Bindings;

/// A parsed template plus the binding state of one document.
///
/// The model is shared and read-only; the bindings are owned. Use
/// [`Template::clone_reset`] to start another document over the same model
/// without reparsing.
#[derive(Debug, Clone)]
pub struct Template {
    model: Arc<Model>,
    bindings: Bindings,
}

impl Template {
    /// Parses inline text with no condition flags.
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with_flags(source, &FlagSet::new())
    }

    pub fn parse_with_flags(source: &str, flags: &FlagSet) -> Result<Self> {
        Ok(Self::with_model(Arc::new(compiler::parse(source, flags)?)))
    }

    pub fn from_spec(spec: &TemplateSpec) -> Result<Self> {
        Ok(Self::with_model(Arc::new(spec.compile()?)))
    }

    /// Starts an empty document over an already compiled model.
    pub fn with_model(model: Arc<Model>) -> Self {
        let bindings = Bindings::new(&model);
        Self { model, bindings }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn variable_exists(&self, name: &str) -> bool {
        self.model.lookup_variable(name).is_some()
    }

    pub fn block_exists(&self, name: &str) -> bool {
        self.model.lookup_blocks(name).is_some()
    }

    /// Sets `name` for the next captures and for the document root.
    ///
    /// Fails with [`crate::Error::UnknownVariable`] if the template never
    /// references `name`.
    pub fn set_variable(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        self.bindings.set_variable(&self.model, name, value)
    }

    /// Like [`Template::set_variable`], but undeclared names are ignored.
    /// Returns whether the variable exists.
    pub fn set_variable_opt(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.model.lookup_variable(name) {
            Some(var) => {
                self.bindings.set(var, value.into());
                true
            }
            None => false,
        }
    }

    /// Sets `name` to `value` with HTML special characters escaped.
    pub fn set_variable_esc(&mut self, name: &str, value: &str) -> Result<()> {
        self.set_variable(name, escape_html(value))
    }

    /// Seals an instance of block `name` from the current values, taking
    /// along any instances of its child blocks added since the last seal.
    ///
    /// Values are not cleared afterwards.
    pub fn add_block(&mut self, name: &str) -> Result<()> {
        self.bindings.add_block(&self.model, name)
    }

    /// Like [`Template::add_block`], but undeclared names are ignored.
    /// Returns whether the block exists.
    pub fn add_block_opt(&mut self, name: &str) -> bool {
        self.bindings.add_block(&self.model, name).is_ok()
    }

    pub fn render(&self) -> Result<String> {
        Ok(eval::render(&self.model, &self.bindings)?)
    }

    /// Renders fully, then writes. Nothing is written if rendering fails.
    pub fn render_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let output = self.render()?;
        writer.write_all(output.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn render_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let output = self.render()?;
        fs::write(path, output)?;
        Ok(())
    }

    /// Clears all variable values and block instances in place.
    pub fn reset(&mut self) {
        self.bindings.clear();
    }

    /// A new, empty document over the same shared model.
    pub fn clone_reset(&self) -> Self {
        Self::with_model(Arc::clone(&self.model))
    }
}

/// Escapes `& < > " '` for use inside HTML text and attribute values.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
