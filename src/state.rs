//! Per-render binding state: current variable values and the block
//! instances captured so far.
//!
//! Sealed instances live in one arena and refer to their child instances
//! by [`InstanceId`], so arbitrarily deep nesting stays flat in memory.

use tracing::trace;

use crate::error::{Error, Result};
use crate::model::{BlockId, Model, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub(crate) usize);

/// A sealed occurrence of a block. Immutable once captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instance {
    /// Parallel to the block's `variables`; `None` where unset at capture.
    pub(crate) values: Vec<Option<String>>,
    /// Parallel to the block's `children`: the child instances that were
    /// pending when this instance was sealed.
    pub(crate) children: Vec<Vec<InstanceId>>,
}

impl Instance {
    pub(crate) fn value(&self, slot: usize) -> Option<&str> {
        self.values.get(slot).and_then(|v| v.as_deref())
    }

    pub(crate) fn children(&self, slot: usize) -> &[InstanceId] {
        self.children.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Mutable state for one document. Only meaningful together with the
/// [`Model`] it was created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    values: Vec<Option<String>>,
    /// Per block definition: instances added since its parent last sealed.
    pending: Vec<Vec<InstanceId>>,
    instances: Vec<Instance>,
}

impl Bindings {
    pub fn new(model: &Model) -> Self {
        Self {
            values: vec![None; model.variable_count()],
            pending: vec![Vec::new(); model.block_count()],
            instances: Vec::new(),
        }
    }

    /// Drops every value and instance, keeping the shape.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = None);
        self.pending.iter_mut().for_each(Vec::clear);
        self.instances.clear();
    }

    pub fn set_variable(&mut self, model: &Model, name: &str, value: impl Into<String>) -> Result<()> {
        let var = model
            .lookup_variable(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
        self.set(var, value.into());
        Ok(())
    }

    /// Seals a new instance of every block definition named `name`.
    pub fn add_block(&mut self, model: &Model, name: &str) -> Result<()> {
        let ids = model
            .lookup_blocks(name)
            .ok_or_else(|| Error::UnknownBlock(name.to_string()))?;
        for &id in ids {
            self.capture(model, id);
        }
        Ok(())
    }

    pub(crate) fn set(&mut self, var: VarId, value: String) {
        if let Some(slot) = self.values.get_mut(var.0) {
            *slot = Some(value);
        }
    }

    pub(crate) fn value(&self, var: VarId) -> Option<&str> {
        self.values.get(var.0).and_then(|v| v.as_deref())
    }

    pub(crate) fn pending(&self, id: BlockId) -> &[InstanceId] {
        self.pending.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.0)
    }

    fn capture(&mut self, model: &Model, id: BlockId) {
        let block = model.block(id);
        let children = block
            .children()
            .iter()
            .map(|child| {
                self.pending
                    .get_mut(child.0)
                    .map(std::mem::take)
                    .unwrap_or_default()
            })
            .collect();
        let values = block
            .variables()
            .iter()
            .map(|var| self.values.get(var.0).cloned().flatten())
            .collect();
        let instance = InstanceId(self.instances.len());
        if let Some(pending) = self.pending.get_mut(id.0) {
            self.instances.push(Instance { values, children });
            pending.push(instance);
            trace!(block = block.name(), pending = pending.len(), "captured block instance");
        }
    }
}
