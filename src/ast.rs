//! Parse items produced by [`crate::parser::Parser`], before conditionals and
//! includes are resolved into a [`crate::model::Model`].
//!
//! The document is a flat list in source order. Blocks and conditionals are
//! delimited by their opening and closing items rather than nested, and the
//! parser guarantees every opened scope is closed in order.

use crate::cond::Condition;
use crate::error::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text(String),
    Variable(String),
    BeginBlock {
        name: String,
        position: Position,
    },
    EndBlock,
    If(Condition),
    ElseIf(Condition),
    Else,
    EndIf,
    Include {
        name: String,
        position: Position,
        marker: String,
    },
}

pub type Document = Vec<Item>;
