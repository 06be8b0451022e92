//! minitmpl: a small block/variable template engine.
//!
//! A template is plain text with markers for variables, repeatable blocks,
//! parse-time conditionals and includes. It is parsed once into an
//! immutable [`Model`]; a document is then built by setting variables and
//! sealing block instances in ordinary imperative order, and rendered in
//! one go.
//!
//! Markers:
//! - `{name}`: variable.
//! - `[beginblock:name]` ... `[endblock:name]`: repeatable block. The
//!   name on `[endblock]` may be omitted.
//! - `[if:cond]` ... `[elseif:cond]` ... `[else]` ... `[endif]`: decided
//!   once, at parse time, against the condition flags given to the parser.
//!   `cond` is made of flag names, `!`, `&&`, `||` and parentheses. Flags are
//!   case-insensitive.
//! - `[include:name]`: splices in a subtemplate at parse time.
//! - `\{`, `\[` and `\\` produce a literal `{`, `[` and `\`, so `\\{x}` is a
//!   backslash followed by the variable `x`. Any other backslash is literal.
//!
//! Anything that is not a well-formed marker is literal text. Keywords are
//! case-insensitive; variable and block names are not.
//!
//! Block semantics:
//! - `add_block(name)` seals a snapshot of the block's variables as they are
//!   right now. Later `set_variable` calls do not touch sealed instances,
//!   and values are not cleared by sealing.
//! - Sealing an outer block takes along every instance of its inner blocks
//!   added since the previous seal, so inner instances are built first and
//!   the outer block closes them, like a nested loop.
//! - A block with no instances renders nothing.
//! - Inside an instance a variable resolves to the instance's own value,
//!   then to enclosing instances. Only sealed snapshots are read there, so a
//!   value set after a capture never shows up in it. Outside blocks the
//!   current document value is used. Unbound variables abort the render.
//! - Block and conditional nesting depth is limited only by memory.
//!   Parentheses and `!` inside one condition nest at most 64 deep.
//!
//! Whitespace:
//! - Text is copied verbatim. The engine never adds newlines.
//! - A line holding only block/conditional/include markers and whitespace
//!   is dropped entirely, terminator included (see [`ParseOptions`]).
//!
//! ```
//! use minitmpl::Template;
//!
//! let mut t = Template::parse("Hello {name}!\n[beginblock:item]- {label}\n[endblock:item]")?;
//! t.set_variable("name", "World")?;
//! for label in ["a", "b"] {
//!     t.set_variable("label", label)?;
//!     t.add_block("item")?;
//! }
//! assert_eq!(t.render()?, "Hello World!\n- a\n- b\n");
//! # Ok::<(), minitmpl::Error>(())
//! ```

pub mod ast;
pub mod cache;
pub mod compiler;
pub mod cond;
pub mod config;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod source;
pub mod state;
pub mod template;

pub use cache::TemplateCache;
pub use compiler::{compile, parse};
pub use cond::{Condition, FlagSet};
pub use config::ParseOptions;
pub use error::{Error, Position, RenderError, Result, SyntaxErrorKind, TemplateSyntaxError};
pub use eval::render;
pub use model::{BlockId, Model, VarId};
pub use source::{FileLoader, SubtemplateLoader, TemplateSource, TemplateSpec};
pub use state::Bindings;
pub use template::{escape_html, Template};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_scenario_from_the_crate_docs() {
        let mut t =
            Template::parse("Hello {name}!\n[beginblock:item]- {label}\n[endblock:item]").unwrap();
        t.set_variable("name", "World").unwrap();
        assert_eq!(t.render().unwrap(), "Hello World!\n");

        t.set_variable("label", "a").unwrap();
        t.add_block("item").unwrap();
        t.set_variable("label", "b").unwrap();
        t.add_block("item").unwrap();
        assert_eq!(t.render().unwrap(), "Hello World!\n- a\n- b\n");
    }

    #[test]
    fn low_level_api_composes() {
        let flags: FlagSet = ["html"].into_iter().collect();
        let model = parse("[if:html]<b>{x}</b>[else]{x}[endif]", &flags).unwrap();
        let mut state = Bindings::new(&model);
        state.set_variable(&model, "x", "y").unwrap();
        assert_eq!(render(&model, &state).unwrap(), "<b>y</b>");
    }

    #[test]
    fn model_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Model>();
        assert_send_sync::<TemplateCache>();
        assert_send_sync::<Template>();
    }
}
