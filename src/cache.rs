//! Shared cache of compiled models.
//!
//! One parse per distinct `(source, flags, include base, options)`; every
//! `get` hands out a fresh [`Template`] over the shared model, so callers
//! never see bindings left over from another document.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::cond::FlagSet;
use crate::config::ParseOptions;
use crate::error::Result;
use crate::model::Model;
use crate::source::{TemplateSource, TemplateSpec};
use crate::template::Template;

/// Cache key. Flags are uppercased and sorted by [`FlagSet`], so the order
/// and case they were supplied in do not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: TemplateSource,
    flags: FlagSet,
    subtemplate_base: Option<PathBuf>,
    options: ParseOptions,
}

impl From<&TemplateSpec> for CacheKey {
    fn from(spec: &TemplateSpec) -> Self {
        Self {
            source: spec.source.clone(),
            flags: spec.flags.clone(),
            subtemplate_base: spec.subtemplate_base.clone(),
            options: spec.options,
        }
    }
}

#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: Mutex<HashMap<CacheKey, Arc<Model>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an empty template for `spec`, compiling it on first use.
    ///
    /// Lookup, compile and insert happen under one lock, so concurrent
    /// callers with the same spec compile it once. Failed compiles are not
    /// cached.
    pub fn get(&self, spec: &TemplateSpec) -> Result<Template> {
        let key = CacheKey::from(spec);
        let mut entries = self.entries.lock();
        if let Some(model) = entries.get(&key) {
            debug!(source = ?key.source, flags = %key.flags, "template cache hit");
            return Ok(Template::with_model(Arc::clone(model)));
        }

        debug!(source = ?key.source, flags = %key.flags, "template cache miss");
        let model = Arc::new(spec.compile()?);
        entries.insert(key, Arc::clone(&model));
        Ok(Template::with_model(model))
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        debug!(entries = entries.len(), "clearing template cache");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
