use crate::ast::*;
use crate::cond::Condition;
use crate::config::ParseOptions;
use crate::error::{Position, SyntaxErrorKind, TemplateSyntaxError};
use crate::lexer::{Spanned, Token, Tokenizer};

type ParseResult<T> = Result<T, TemplateSyntaxError>;

/// A scope opened by a marker and not yet closed.
enum Frame {
    Block {
        name: String,
        position: Position,
        marker: String,
    },
    Conditional {
        position: Position,
        marker: String,
        seen_else: bool,
    },
}

/// Checks marker structure with an explicit stack of open scopes, so
/// nesting depth is limited only by memory.
pub struct Parser<'a> {
    lexer: Tokenizer<'a>,
    open: Vec<Frame>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, options: &ParseOptions) -> Self {
        Self {
            lexer: Tokenizer::new(input).trim_marker_lines(options.trim_marker_lines),
            open: Vec::new(),
        }
    }

    fn error(kind: SyntaxErrorKind, at: &Spanned) -> TemplateSyntaxError {
        TemplateSyntaxError::new(kind, at.position, at.raw.clone())
    }

    /// Name of the innermost open block, if any.
    fn enclosing_block(&self) -> Option<&str> {
        self.open.iter().rev().find_map(|frame| match frame {
            Frame::Block { name, .. } => Some(name.as_str()),
            Frame::Conditional { .. } => None,
        })
    }

    /// Error for a closing marker that does not belong to the innermost scope.
    fn misplaced(&self, at: &Spanned, unmatched: SyntaxErrorKind) -> TemplateSyntaxError {
        match self.enclosing_block() {
            Some(name) => Self::error(SyntaxErrorKind::CrossesBlock(name.to_string()), at),
            None => Self::error(unmatched, at),
        }
    }

    pub fn parse(&mut self) -> ParseResult<Document> {
        let mut items = Vec::new();
        while let Some(spanned) = self.lexer.next_token()? {
            let item = match &spanned.token {
                Token::Text(text) => Item::Text(text.clone()),
                Token::Variable(name) => Item::Variable(name.clone()),
                Token::BeginBlock(name) => {
                    self.open.push(Frame::Block {
                        name: name.clone(),
                        position: spanned.position,
                        marker: spanned.raw.clone(),
                    });
                    Item::BeginBlock {
                        name: name.clone(),
                        position: spanned.position,
                    }
                }
                Token::EndBlock(found) => {
                    self.close_block(found.as_deref(), &spanned)?;
                    Item::EndBlock
                }
                Token::If(expr) => {
                    let cond = Self::condition(expr, &spanned)?;
                    self.open.push(Frame::Conditional {
                        position: spanned.position,
                        marker: spanned.raw.clone(),
                        seen_else: false,
                    });
                    Item::If(cond)
                }
                Token::ElseIf(expr) => {
                    self.branch(&spanned, false)?;
                    Item::ElseIf(Self::condition(expr, &spanned)?)
                }
                Token::Else => {
                    self.branch(&spanned, true)?;
                    Item::Else
                }
                Token::EndIf => {
                    if !matches!(self.open.last(), Some(Frame::Conditional { .. })) {
                        return Err(self.misplaced(&spanned, SyntaxErrorKind::UnexpectedConditional));
                    }
                    self.open.pop();
                    Item::EndIf
                }
                Token::Include(name) => Item::Include {
                    name: name.clone(),
                    position: spanned.position,
                    marker: spanned.raw.clone(),
                },
            };
            items.push(item);
        }

        // The innermost unclosed scope is reported.
        match self.open.pop() {
            None => Ok(items),
            Some(Frame::Block {
                name,
                position,
                marker,
            }) => Err(TemplateSyntaxError::new(
                SyntaxErrorKind::UnclosedBlock(name),
                position,
                marker,
            )),
            Some(Frame::Conditional {
                position, marker, ..
            }) => Err(TemplateSyntaxError::new(
                SyntaxErrorKind::UnclosedConditional,
                position,
                marker,
            )),
        }
    }

    fn close_block(&mut self, found: Option<&str>, end: &Spanned) -> ParseResult<()> {
        let expected = match self.open.last() {
            Some(Frame::Block { name, .. }) => name.as_str(),
            _ => return Err(self.misplaced(end, SyntaxErrorKind::UnexpectedEndBlock)),
        };
        if let Some(found) = found {
            if found != expected {
                return Err(Self::error(
                    SyntaxErrorKind::MismatchedEndBlock {
                        expected: expected.to_string(),
                        found: found.to_string(),
                    },
                    end,
                ));
            }
        }
        self.open.pop();
        Ok(())
    }

    /// `[elseif]` and `[else]` continue the innermost conditional.
    fn branch(&mut self, at: &Spanned, is_else: bool) -> ParseResult<()> {
        if let Some(Frame::Conditional { seen_else, .. }) = self.open.last_mut() {
            if *seen_else {
                return Err(Self::error(SyntaxErrorKind::BranchAfterElse, at));
            }
            *seen_else = is_else;
            return Ok(());
        }
        Err(self.misplaced(at, SyntaxErrorKind::UnexpectedConditional))
    }

    fn condition(expr: &str, at: &Spanned) -> ParseResult<Condition> {
        Condition::parse(expr).map_err(|msg| Self::error(SyntaxErrorKind::InvalidCondition(msg), at))
    }
}

/// Parses `input` into a flat item list without resolving anything.
pub fn parse_document(input: &str, options: &ParseOptions) -> ParseResult<Document> {
    Parser::new(input, options).parse()
}
