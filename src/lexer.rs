use std::collections::VecDeque;

use crate::error::{Position, SyntaxErrorKind, TemplateSyntaxError};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Variable(String),   // {name}
    BeginBlock(String), // [beginblock:name]
    EndBlock(Option<String>),
    If(String),     // [if:cond]
    ElseIf(String), // [elseif:cond]
    Else,
    EndIf,
    Include(String), // [include:name]
}

impl Token {
    /// Block, conditional and include markers. These are the tokens that may
    /// stand alone on a line that gets trimmed.
    pub fn is_marker(&self) -> bool {
        !matches!(self, Token::Text(_) | Token::Variable(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: Position,
    /// Raw source text of the marker; empty for text.
    pub raw: String,
}

const KEYWORDS: &[&str] = &[
    "beginblock",
    "endblock",
    "if",
    "elseif",
    "else",
    "endif",
    "include",
];

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    match name.chars().next() {
        Some(first) if first.is_ascii_alphanumeric() || first == '_' => {
            name.chars().all(is_name_char)
        }
        _ => false,
    }
}

/// Line-at-a-time tokenizer. Markers never span lines, so each line is
/// lexed on its own and marker-only lines can be dropped whole.
#[derive(Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    cursor: usize,
    line: usize,
    trim_marker_lines: bool,
    buffer: VecDeque<Spanned>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            line: 1,
            trim_marker_lines: true,
            buffer: VecDeque::new(),
        }
    }

    pub fn trim_marker_lines(mut self, trim: bool) -> Self {
        self.trim_marker_lines = trim;
        self
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor += n;
    }


    pub fn next_token(&mut self) -> Result<Option<Spanned>, TemplateSyntaxError> {
        loop {
            if let Some(token) = self.buffer.pop_front() {
                return Ok(Some(token));
            }
            if self.remaining().is_empty() {
                return Ok(None);
            }
            self.lex_line()?;
        }
    }

    fn lex_line(&mut self) -> Result<(), TemplateSyntaxError> {
        let rest = self.remaining();
        let (content, terminator) = match rest.find('\n') {
            Some(idx) => {
                let line = &rest[..idx];
                let content = line.strip_suffix('\r').unwrap_or(line);
                (content, &rest[content.len()..=idx])
            }
            None => (rest, ""),
        };

        let line_no = self.line;
        let mut tokens = lex_content(content, line_no)?;
        self.advance(content.len() + terminator.len());
        self.line += 1;

        let marker_only = self.trim_marker_lines
            && tokens.iter().any(|t| t.token.is_marker())
            && tokens.iter().all(|t| match &t.token {
                Token::Text(s) => s.trim().is_empty(),
                Token::Variable(_) => false,
                _ => true,
            });

        if marker_only {
            tokens.retain(|t| t.token.is_marker());
        } else if !terminator.is_empty() {
            let position = Position::new(line_no, content.chars().count() + 1);
            match tokens.last_mut() {
                Some(Spanned {
                    token: Token::Text(text),
                    ..
                }) => text.push_str(terminator),
                _ => tokens.push(Spanned {
                    token: Token::Text(terminator.to_string()),
                    position,
                    raw: String::new(),
                }),
            }
        }

        self.buffer.extend(tokens);
        Ok(())
    }
}

fn flush_text(tokens: &mut Vec<Spanned>, text: &mut String, position: Position) {
    if !text.is_empty() {
        tokens.push(Spanned {
            token: Token::Text(std::mem::take(text)),
            position,
            raw: String::new(),
        });
    }
}

/// Lexes one line without its terminator. `\{`, `\[` and `\\` are escapes
/// for a literal `{`, `[` and `\`; any other backslash is literal.
fn lex_content(line: &str, line_no: usize) -> Result<Vec<Spanned>, TemplateSyntaxError> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut text_start = Position::new(line_no, 1);
    let mut i = 0;
    // 1-based character column of byte `i`
    let mut column = 1;

    while let Some(c) = line[i..].chars().next() {
        let rest = &line[i..];
        let position = Position::new(line_no, column);
        let marker = match c {
            '\\' => match rest[1..].chars().next() {
                Some(escaped @ ('{' | '[' | '\\')) => {
                    if text.is_empty() {
                        text_start = position;
                    }
                    text.push(escaped);
                    i += 2;
                    column += 2;
                    continue;
                }
                _ => None,
            },
            '{' => scan_variable(rest).map(|(name, len)| (Token::Variable(name.to_string()), len)),
            '[' => scan_marker(rest, position)?,
            _ => None,
        };

        match marker {
            Some((token, len)) => {
                flush_text(&mut tokens, &mut text, text_start);
                let raw = &rest[..len];
                tokens.push(Spanned {
                    token,
                    position,
                    raw: raw.to_string(),
                });
                i += len;
                column += raw.chars().count();
            }
            None => {
                if text.is_empty() {
                    text_start = position;
                }
                text.push(c);
                i += c.len_utf8();
                column += 1;
            }
        }
    }

    flush_text(&mut tokens, &mut text, text_start);
    Ok(tokens)
}

/// `rest` starts with `{`. Returns the name and the byte length of the marker.
fn scan_variable(rest: &str) -> Option<(&str, usize)> {
    let body = &rest[1..];
    let len = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
    let name = &body[..len];
    if is_valid_name(name) && body[len..].starts_with('}') {
        Some((name, len + 2))
    } else {
        None
    }
}

/// `rest` starts with `[`. `Ok(None)` means the bracket is literal text.
fn scan_marker(
    rest: &str,
    position: Position,
) -> Result<Option<(Token, usize)>, TemplateSyntaxError> {
    let body = &rest[1..];
    let keyword_len = body
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(body.len());
    let keyword = body[..keyword_len].to_ascii_lowercase();
    if !KEYWORDS.contains(&keyword.as_str()) {
        return Ok(None);
    }

    let after = &body[keyword_len..];
    let (argument, len) = match after.chars().next() {
        Some(']') => (None, keyword_len + 2),
        Some(':') => match after.find(']') {
            Some(end) => (Some(after[1..end].trim()), keyword_len + end + 2),
            None => {
                return Err(TemplateSyntaxError::new(
                    SyntaxErrorKind::MalformedMarker,
                    position,
                    rest,
                ))
            }
        },
        _ => return Ok(None),
    };

    let raw = &rest[..len];
    let error = |kind| TemplateSyntaxError::new(kind, position, raw);
    let argument = argument.filter(|arg| !arg.is_empty());
    let name = |arg: &str| {
        if is_valid_name(arg) {
            Ok(arg.to_string())
        } else {
            Err(error(SyntaxErrorKind::InvalidName(arg.to_string())))
        }
    };

    let token = match (keyword.as_str(), argument) {
        ("beginblock", Some(arg)) => Token::BeginBlock(name(arg)?),
        ("endblock", Some(arg)) => Token::EndBlock(Some(name(arg)?)),
        ("endblock", None) => Token::EndBlock(None),
        ("if", Some(arg)) => Token::If(arg.to_string()),
        ("elseif", Some(arg)) => Token::ElseIf(arg.to_string()),
        ("include", Some(arg)) => Token::Include(arg.to_string()),
        ("else", None) => Token::Else,
        ("endif", None) => Token::EndIf,
        ("else" | "endif", Some(_)) => return Err(error(SyntaxErrorKind::MalformedMarker)),
        (_, _) => return Err(error(SyntaxErrorKind::MissingArgument)),
    };

    Ok(Some((token, len)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Tokenizer::new(input);
        let mut out = Vec::new();
        while let Some(t) = lexer.next_token().unwrap() {
            out.push(t.token);
        }
        out
    }

    #[test]
    fn variables_and_text() {
        assert_eq!(
            tokens("Hello {name}!"),
            vec![
                Token::Text("Hello ".into()),
                Token::Variable("name".into()),
                Token::Text("!".into()),
            ]
        );
    }

    #[test]
    fn braces_and_brackets_that_are_not_markers_stay_literal() {
        assert_eq!(
            tokens("a { b } {x y} [1] [iffy] {}"),
            vec![Token::Text("a { b } {x y} [1] [iffy] {}".into())]
        );
    }

    #[test]
    fn escapes_produce_literal_delimiters() {
        assert_eq!(
            tokens(r"\{name} \[if:x] \n"),
            vec![Token::Text(r"{name} [if:x] \n".into())]
        );
    }

    #[test]
    fn escaped_backslash_before_a_marker() {
        assert_eq!(
            tokens(r"C:\\{dir} \\\{x} a\b"),
            vec![
                Token::Text(r"C:\".into()),
                Token::Variable("dir".into()),
                Token::Text(r" \{x} a\b".into()),
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            tokens("[BeginBlock:row]x[ENDBLOCK:row]"),
            vec![
                Token::BeginBlock("row".into()),
                Token::Text("x".into()),
                Token::EndBlock(Some("row".into())),
            ]
        );
    }

    #[test]
    fn marker_only_lines_are_dropped_whole() {
        assert_eq!(
            tokens("a\n  [beginblock:row]  \r\n{x}\n[endblock]\nb"),
            vec![
                Token::Text("a\n".into()),
                Token::BeginBlock("row".into()),
                Token::Variable("x".into()),
                Token::Text("\n".into()),
                Token::EndBlock(None),
                Token::Text("b".into()),
            ]
        );
    }

    #[test]
    fn marker_lines_are_kept_when_trimming_is_off() {
        let mut lexer = Tokenizer::new("[if:a]\nx\n").trim_marker_lines(false);
        let mut out = Vec::new();
        while let Some(t) = lexer.next_token().unwrap() {
            out.push(t.token);
        }
        assert_eq!(
            out,
            vec![
                Token::If("a".into()),
                Token::Text("\n".into()),
                Token::Text("x\n".into()),
            ]
        );
    }

    #[test]
    fn markers_sharing_a_line_with_a_variable_are_not_trimmed() {
        assert_eq!(
            tokens("[beginblock:r]{x}[endblock:r]\n"),
            vec![
                Token::BeginBlock("r".into()),
                Token::Variable("x".into()),
                Token::EndBlock(Some("r".into())),
                Token::Text("\n".into()),
            ]
        );
    }

    #[test]
    fn unterminated_marker_is_an_error() {
        let mut lexer = Tokenizer::new("ok\n  [beginblock:row");
        let err = lexer.next_token().and_then(|_| lexer.next_token()).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::MalformedMarker);
        assert_eq!(err.position, Position::new(2, 3));
        assert_eq!(err.marker, "[beginblock:row");
    }

    #[test]
    fn invalid_block_name_is_an_error() {
        let err = Tokenizer::new("[beginblock:a b]").next_token().unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::InvalidName("a b".into()));
    }

    #[test]
    fn missing_argument_is_an_error() {
        let err = Tokenizer::new("[if]").next_token().unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::MissingArgument);
        let err = Tokenizer::new("[beginblock:]").next_token().unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::MissingArgument);
    }

    #[test]
    fn positions_count_characters_not_bytes() {
        let mut lexer = Tokenizer::new("ü {x}");
        lexer.next_token().unwrap();
        let var = lexer.next_token().unwrap().unwrap();
        assert_eq!(var.position, Position::new(1, 3));
        assert_eq!(var.raw, "{x}");
    }
}
