//! Lowers parse items into a [`Model`]: conditionals are decided against
//! the flags given at compile time, includes are spliced in, and every
//! block and variable is registered in the model's indexes.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Document, Item};
use crate::cond::FlagSet;
use crate::config::ParseOptions;
use crate::error::{Error, Position, Result, SyntaxErrorKind, TemplateSyntaxError};
use crate::model::{BlockId, Model, Node};
use crate::parser::parse_document;
use crate::source::SubtemplateLoader;

/// Parses `source` with default options and no include support.
pub fn parse(source: &str, flags: &FlagSet) -> Result<Model> {
    compile(source, flags, &ParseOptions::default(), None)
}

pub fn compile(
    source: &str,
    flags: &FlagSet,
    options: &ParseOptions,
    loader: Option<&dyn SubtemplateLoader>,
) -> Result<Model> {
    let document = parse_document(source, options)?;
    let compiler = Compiler {
        model: Model::new(),
        flags,
        options,
        loader,
    };
    let model = compiler.lower(document)?;

    debug!(
        blocks = model.block_count() - 1,
        variables = model.variable_count(),
        flags = %flags,
        "compiled template"
    );
    Ok(model)
}

struct Compiler<'a> {
    model: Model,
    flags: &'a FlagSet,
    options: &'a ParseOptions,
    loader: Option<&'a dyn SubtemplateLoader>,
}

/// A document whose items are being lowered: the main template or an
/// included subtemplate.
struct Source {
    items: std::vec::IntoIter<Item>,
    origin: Option<String>,
    depth: usize,
}

/// A scope opened by an item and not yet closed.
enum Open {
    /// A block being built; its body is on top of the body stack.
    Block(String),
    /// A block inside a discarded branch.
    Skipped,
    Conditional {
        /// A branch of this conditional has been taken.
        decided: bool,
        /// Whether the conditional itself sits in retained text.
        enclosing_active: bool,
    },
}

fn syntax_error(
    kind: SyntaxErrorKind,
    position: Position,
    marker: impl Into<String>,
    origin: Option<&str>,
) -> Error {
    let mut err = TemplateSyntaxError::new(kind, position, marker);
    err.origin = origin.map(str::to_string);
    Error::Syntax(err)
}

fn push_literal(out: &mut Vec<Node>, text: String) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(Node::Literal(prev)) => prev.push_str(&text),
        _ => out.push(Node::Literal(text)),
    }
}

impl Compiler<'_> {
    /// Lowers `document` and everything it includes with explicit stacks,
    /// so nesting depth costs no call stack.
    fn lower(mut self, document: Document) -> Result<Model> {
        let mut sources = vec![Source {
            items: document.into_iter(),
            origin: None,
            depth: 0,
        }];
        // (block, body under construction), innermost last
        let mut bodies: Vec<(BlockId, Vec<Node>)> = vec![(Model::MAIN, Vec::new())];
        let mut open: Vec<Open> = Vec::new();
        // how many blocks with each name are currently open
        let mut open_names: HashMap<String, usize> = HashMap::new();
        let mut active = true;

        loop {
            let Some(source) = sources.last_mut() else {
                break;
            };
            let Some(item) = source.items.next() else {
                sources.pop();
                continue;
            };
            let depth = source.depth;
            let origin = || sources.last().and_then(|s| s.origin.as_deref());

            match item {
                Item::If(cond) => {
                    let taken = active && cond.eval(self.flags);
                    open.push(Open::Conditional {
                        decided: taken,
                        enclosing_active: active,
                    });
                    active = taken;
                }
                Item::ElseIf(_) | Item::Else => {
                    if let Some(Open::Conditional {
                        decided,
                        enclosing_active,
                    }) = open.last_mut()
                    {
                        let taken = *enclosing_active
                            && !*decided
                            && match &item {
                                Item::ElseIf(cond) => cond.eval(self.flags),
                                _ => true,
                            };
                        *decided |= taken;
                        active = taken;
                    }
                }
                Item::EndIf => {
                    if let Some(Open::Conditional {
                        enclosing_active, ..
                    }) = open.pop()
                    {
                        active = enclosing_active;
                    }
                }
                Item::BeginBlock { .. } if !active => open.push(Open::Skipped),
                Item::EndBlock => match open.pop() {
                    Some(Open::Block(name)) => {
                        if let Some(count) = open_names.get_mut(&name) {
                            *count -= 1;
                        }
                        if let Some((id, body)) = bodies.pop() {
                            self.model.blocks[id.0].body = body;
                            if let Some((_, parent)) = bodies.last_mut() {
                                parent.push(Node::Block(id));
                            }
                        }
                    }
                    _ => {}
                },
                _ if !active => {}
                Item::Text(text) => {
                    if let Some((_, out)) = bodies.last_mut() {
                        push_literal(out, text);
                    }
                }
                Item::Variable(name) => {
                    if let Some((owner, out)) = bodies.last_mut() {
                        let var = self.model.intern_variable(&name);
                        let slot = self.model.use_variable(*owner, var);
                        out.push(Node::Variable { var, slot });
                    }
                }
                Item::BeginBlock { name, position } => {
                    let count = open_names.entry(name.clone()).or_default();
                    if *count > 0 {
                        let marker = format!("[beginblock:{}]", name);
                        return Err(syntax_error(
                            SyntaxErrorKind::NestedSameName(name),
                            position,
                            marker,
                            origin(),
                        ));
                    }
                    *count += 1;
                    let parent = bodies.last().map_or(Model::MAIN, |(id, _)| *id);
                    let id = self.model.declare_block(&name, parent);
                    bodies.push((id, Vec::new()));
                    open.push(Open::Block(name));
                }
                Item::Include {
                    name,
                    position,
                    marker,
                } => {
                    if depth >= self.options.max_include_depth {
                        return Err(syntax_error(
                            SyntaxErrorKind::IncludeTooDeep(self.options.max_include_depth),
                            position,
                            marker,
                            origin(),
                        ));
                    }
                    let Some(loader) = self.loader else {
                        return Err(syntax_error(
                            SyntaxErrorKind::IncludeUnavailable,
                            position,
                            marker,
                            origin(),
                        ));
                    };
                    debug!(subtemplate = %name, depth, "loading subtemplate");
                    let text = loader.load(&name)?;
                    let document = parse_document(&text, self.options)
                        .map_err(|err| err.in_subtemplate(&name))?;
                    sources.push(Source {
                        items: document.into_iter(),
                        origin: Some(name),
                        depth: depth + 1,
                    });
                }
            }
        }

        // Items are balanced, so only the root body is left.
        if let Some((_, body)) = bodies.pop() {
            self.model.blocks[Model::MAIN.0].body = body;
        }
        Ok(self.model)
    }
}
