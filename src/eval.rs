use std::slice;

use tracing::trace;

use crate::error::RenderError;
use crate::model::{BlockId, Model, Node, VarId};
use crate::state::{Bindings, Instance, InstanceId};

/// One block instance being rendered.
struct Scope<'a> {
    block: BlockId,
    instance: &'a Instance,
}

enum Frame<'a> {
    /// Remaining nodes of a body. `scoped` bodies belong to the instance on
    /// top of the scope stack.
    Body {
        nodes: slice::Iter<'a, Node>,
        scoped: bool,
    },
    /// Instances of one block still to render.
    Instances {
        block: BlockId,
        remaining: slice::Iter<'a, InstanceId>,
    },
}

/// Walks a model against a binding state with an explicit work stack. The
/// scope stack holds the block instances currently being rendered,
/// innermost last; an empty stack means the document root, which reads the
/// current variable values.
pub struct Evaluator<'a> {
    model: &'a Model,
    bindings: &'a Bindings,
    scopes: Vec<Scope<'a>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(model: &'a Model, bindings: &'a Bindings) -> Self {
        Self {
            model,
            bindings,
            scopes: Vec::new(),
        }
    }

    /// Innermost instance first, then enclosing instances. Inside a block
    /// only sealed snapshots are read, so a value set after the capture
    /// never reaches an instance. At the root the current values are read.
    fn get_var(&self, var: VarId, slot: usize) -> Option<&'a str> {
        let mut scopes = self.scopes.iter().rev();
        let Some(innermost) = scopes.next() else {
            let bindings: &'a Bindings = self.bindings;
            return bindings.value(var);
        };
        let instance: &'a Instance = innermost.instance;
        if let Some(value) = instance.value(slot) {
            return Some(value);
        }
        scopes.find_map(|scope| {
            let instance: &'a Instance = scope.instance;
            self.model
                .block(scope.block)
                .variable_slot(var)
                .and_then(|slot| instance.value(slot))
        })
    }

    fn instances(&self, id: BlockId) -> &'a [InstanceId] {
        match self.scopes.last() {
            Some(scope) => {
                let instance: &'a Instance = scope.instance;
                instance.children(self.model.block(id).slot)
            }
            None => {
                let bindings: &'a Bindings = self.bindings;
                bindings.pending(id)
            }
        }
    }

    pub fn render(&mut self, nodes: &'a [Node], output: &mut String) -> Result<(), RenderError> {
        let model: &'a Model = self.model;
        let bindings: &'a Bindings = self.bindings;
        let mut frames = vec![Frame::Body {
            nodes: nodes.iter(),
            scoped: false,
        }];

        while let Some(frame) = frames.last_mut() {
            let next = match frame {
                Frame::Body { nodes, scoped } => match nodes.next() {
                    Some(Node::Literal(text)) => {
                        output.push_str(text);
                        None
                    }
                    Some(Node::Variable { var, slot }) => match self.get_var(*var, *slot) {
                        Some(value) => {
                            output.push_str(value);
                            None
                        }
                        None => {
                            return Err(RenderError::UnboundVariable(
                                model.variable_name(*var).to_string(),
                            ))
                        }
                    },
                    Some(Node::Block(id)) => Some(Frame::Instances {
                        block: *id,
                        remaining: self.instances(*id).iter(),
                    }),
                    None => {
                        if *scoped {
                            self.scopes.pop();
                        }
                        frames.pop();
                        continue;
                    }
                },
                Frame::Instances { block, remaining } => match remaining.next() {
                    Some(id) => {
                        let block = *block;
                        match bindings.instance(*id) {
                            Some(instance) => {
                                self.scopes.push(Scope { block, instance });
                                Some(Frame::Body {
                                    nodes: model.block(block).body().iter(),
                                    scoped: true,
                                })
                            }
                            None => None,
                        }
                    }
                    None => {
                        frames.pop();
                        continue;
                    }
                },
            };
            if let Some(frame) = next {
                frames.push(frame);
            }
        }
        Ok(())
    }
}

/// Renders the whole document, or nothing at all.
pub fn render(model: &Model, bindings: &Bindings) -> Result<String, RenderError> {
    let mut output = String::new();
    Evaluator::new(model, bindings).render(model.root(), &mut output)?;
    trace!(bytes = output.len(), "rendered template");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parse;
    use crate::cond::FlagSet;

    fn setup(source: &str) -> (Model, Bindings) {
        let model = parse(source, &FlagSet::new()).unwrap();
        let bindings = Bindings::new(&model);
        (model, bindings)
    }

    #[test]
    fn literals_and_variables() {
        let (model, mut state) = setup("Hello {name}!");
        state.set_variable(&model, "name", "World").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "Hello World!");
    }

    #[test]
    fn block_repeats_in_capture_order() {
        let (model, mut state) =
            setup("Hello {name}!\n[beginblock:item]- {label}\n[endblock:item]");
        state.set_variable(&model, "name", "World").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "Hello World!\n");

        for label in ["a", "b"] {
            state.set_variable(&model, "label", label).unwrap();
            state.add_block(&model, "item").unwrap();
        }
        assert_eq!(render(&model, &state).unwrap(), "Hello World!\n- a\n- b\n");
    }

    #[test]
    fn unbound_variable_aborts_render() {
        let (model, mut state) = setup("a{x}b[beginblock:r]{y}[endblock:r]");
        assert_eq!(
            render(&model, &state),
            Err(RenderError::UnboundVariable("x".into()))
        );
        state.set_variable(&model, "x", "").unwrap();
        state.add_block(&model, "r").unwrap();
        assert_eq!(
            render(&model, &state),
            Err(RenderError::UnboundVariable("y".into()))
        );
    }

    #[test]
    fn instance_value_overrides_outer_scopes() {
        let (model, mut state) = setup(
            "[beginblock:outer]<{title}:[beginblock:inner]{title}[endblock:inner]>[endblock:outer]",
        );
        state.set_variable(&model, "title", "o").unwrap();
        state.add_block(&model, "inner").unwrap();
        state.add_block(&model, "outer").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "<o:o>");
    }

    #[test]
    fn unset_instance_value_falls_through_to_enclosing_instance() {
        let (model, mut state) = setup(
            "{title}|[beginblock:outer]{title}[beginblock:inner]({title}{n})[endblock:inner]/[endblock:outer]",
        );
        // inner captured before title is ever set
        state.set_variable(&model, "n", "1").unwrap();
        state.add_block(&model, "inner").unwrap();
        state.set_variable(&model, "title", "T").unwrap();
        state.add_block(&model, "outer").unwrap();
        state.set_variable(&model, "title", "root").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "root|T(T1)/");
    }

    #[test]
    fn value_set_after_capture_does_not_reach_the_instance() {
        let (model, mut state) = setup("[beginblock:r]{x}[endblock:r]");
        state.add_block(&model, "r").unwrap();
        state.set_variable(&model, "x", "late").unwrap();
        assert_eq!(
            render(&model, &state),
            Err(RenderError::UnboundVariable("x".into()))
        );
    }

    #[test]
    fn enclosing_instance_without_the_variable_does_not_fall_back_to_root() {
        let (model, mut state) =
            setup("{x}[beginblock:outer]<[beginblock:inner]{x}[endblock:inner]>[endblock:outer]");
        state.add_block(&model, "inner").unwrap();
        state.add_block(&model, "outer").unwrap();
        state.set_variable(&model, "x", "root").unwrap();
        assert_eq!(
            render(&model, &state),
            Err(RenderError::UnboundVariable("x".into()))
        );
    }

    #[test]
    fn same_name_blocks_repeat_together() {
        let (model, mut state) =
            setup("[beginblock:x]a{v}[endblock:x]-[beginblock:x]b{v}[endblock:x]");
        state.set_variable(&model, "v", "1").unwrap();
        state.add_block(&model, "x").unwrap();
        state.set_variable(&model, "v", "2").unwrap();
        state.add_block(&model, "x").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "a1a2-b1b2");
    }

    #[test]
    fn pending_inner_instances_without_outer_seal_are_not_rendered() {
        let (model, mut state) = setup("[beginblock:o][beginblock:i]x[endblock:i][endblock:o]");
        state.add_block(&model, "i").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "");
        state.add_block(&model, "o").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "x");
    }

    #[test]
    fn deeply_nested_instances_render_without_recursion() {
        let depth = 20_000;
        let source = format!(
            "{}{{v}}{}",
            (0..depth).map(|n| format!("[beginblock:b{}]", n)).collect::<String>(),
            "[endblock]".repeat(depth)
        );
        let (model, mut state) = setup(&source);
        state.set_variable(&model, "v", "x").unwrap();
        for n in (0..depth).rev() {
            state.add_block(&model, &format!("b{}", n)).unwrap();
        }
        assert_eq!(render(&model, &state).unwrap(), "x");
    }

    #[test]
    fn render_does_not_consume_state() {
        let (model, mut state) = setup("[beginblock:r]{v}[endblock:r]");
        state.set_variable(&model, "v", "z").unwrap();
        state.add_block(&model, "r").unwrap();
        let first = render(&model, &state).unwrap();
        assert_eq!(first, render(&model, &state).unwrap());
    }
}
