//! The structural model: an immutable tree of literal, variable and block
//! nodes for one (source, flag set) pair, plus name indexes.
//!
//! Blocks live in an arena and refer to each other by [`BlockId`]. The
//! document root is itself a block ([`Model::MAIN`]) that has no name and is
//! never addressed through the binding API.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    /// `slot` indexes the owning block's `variables`.
    Variable { var: VarId, slot: usize },
    Block(BlockId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDef {
    pub(crate) name: String,
    pub(crate) parent: Option<BlockId>,
    /// Index of this block in its parent's `children`.
    pub(crate) slot: usize,
    pub(crate) body: Vec<Node>,
    /// Variables referenced directly in `body`, in first-use order.
    pub(crate) variables: Vec<VarId>,
    /// Blocks nested directly in `body`, in source order.
    pub(crate) children: Vec<BlockId>,
}

impl BlockDef {
    pub(crate) fn new(name: String, parent: Option<BlockId>, slot: usize) -> Self {
        Self {
            name,
            parent,
            slot,
            body: Vec::new(),
            variables: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn body(&self) -> &[Node] {
        &self.body
    }

    pub fn variables(&self) -> &[VarId] {
        &self.variables
    }

    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    pub(crate) fn variable_slot(&self, var: VarId) -> Option<usize> {
        self.variables.iter().position(|v| *v == var)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub(crate) blocks: Vec<BlockDef>,
    pub(crate) variables: Vec<String>,
    pub(crate) variable_index: HashMap<String, VarId>,
    /// Every definition of a block name; sibling and disjoint scopes may
    /// reuse a name.
    pub(crate) block_index: HashMap<String, Vec<BlockId>>,
}

impl Model {
    pub const MAIN: BlockId = BlockId(0);

    pub(crate) fn new() -> Self {
        Self {
            blocks: vec![BlockDef::new(String::new(), None, 0)],
            variables: Vec::new(),
            variable_index: HashMap::new(),
            block_index: HashMap::new(),
        }
    }

    /// Top-level nodes of the document.
    pub fn root(&self) -> &[Node] {
        &self.blocks[Self::MAIN.0].body
    }

    pub fn block(&self, id: BlockId) -> &BlockDef {
        &self.blocks[id.0]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_name(&self, id: VarId) -> &str {
        &self.variables[id.0]
    }

    pub fn lookup_variable(&self, name: &str) -> Option<VarId> {
        self.variable_index.get(name).copied()
    }

    /// All definitions named `name`, in source order.
    pub fn lookup_blocks(&self, name: &str) -> Option<&[BlockId]> {
        self.block_index.get(name).map(Vec::as_slice)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// Distinct block names, in order of first definition.
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        let mut seen = std::collections::HashSet::new();
        self.blocks[1..]
            .iter()
            .map(|b| b.name.as_str())
            .filter(move |name| seen.insert(*name))
    }

    pub(crate) fn intern_variable(&mut self, name: &str) -> VarId {
        if let Some(id) = self.variable_index.get(name) {
            return *id;
        }
        let id = VarId(self.variables.len());
        self.variables.push(name.to_string());
        self.variable_index.insert(name.to_string(), id);
        id
    }

    /// Records that `var` is referenced directly inside `owner` and returns
    /// its slot there.
    pub(crate) fn use_variable(&mut self, owner: BlockId, var: VarId) -> usize {
        let block = &mut self.blocks[owner.0];
        match block.variable_slot(var) {
            Some(slot) => slot,
            None => {
                block.variables.push(var);
                block.variables.len() - 1
            }
        }
    }

    pub(crate) fn declare_block(&mut self, name: &str, parent: BlockId) -> BlockId {
        let id = BlockId(self.blocks.len());
        let slot = self.blocks[parent.0].children.len();
        self.blocks.push(BlockDef::new(name.to_string(), Some(parent), slot));
        self.blocks[parent.0].children.push(id);
        self.block_index.entry(name.to_string()).or_default().push(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_are_interned_once() {
        let mut model = Model::new();
        let a = model.intern_variable("a");
        let b = model.intern_variable("b");
        assert_eq!(model.intern_variable("a"), a);
        assert_ne!(a, b);
        assert_eq!(model.variable_count(), 2);
        assert_eq!(model.variable_name(b), "b");
    }

    #[test]
    fn variable_slots_are_per_block() {
        let mut model = Model::new();
        let row = model.declare_block("row", Model::MAIN);
        let a = model.intern_variable("a");
        let b = model.intern_variable("b");
        assert_eq!(model.use_variable(row, b), 0);
        assert_eq!(model.use_variable(row, a), 1);
        assert_eq!(model.use_variable(row, b), 0);
        assert_eq!(model.use_variable(Model::MAIN, a), 0);
        assert_eq!(model.block(row).variables(), &[b, a]);
    }

    #[test]
    fn same_name_blocks_share_an_index_entry() {
        let mut model = Model::new();
        let outer = model.declare_block("outer", Model::MAIN);
        let first = model.declare_block("cell", outer);
        let second = model.declare_block("cell", Model::MAIN);
        assert_eq!(model.lookup_blocks("cell"), Some(&[first, second][..]));
        assert_eq!(model.block(second).slot, 1);
        assert_eq!(model.block_names().collect::<Vec<_>>(), vec!["outer", "cell"]);
        assert_eq!(model.block(first).parent(), Some(outer));
    }
}
