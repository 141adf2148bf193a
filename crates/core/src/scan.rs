//! Lexical scanning over raw source text.
//!
//! The scanner knows just enough of the language to tell code apart from comments, string
//! literals and directive lines. Text-level passes use it to stay out of protected spans,
//! and AST-level passes use it for the few positions the AST does not record, such as
//! the opening brace of a contract or a trailing semicolon.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    LineComment,
    BlockComment,
    Punct,
    Whitespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Splits `text` into tokens covering every byte exactly once.
pub fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < text.len() {
        let start = i;
        let Some(c) = text[i..].chars().next() else {
            break;
        };
        let kind = if c.is_whitespace() {
            while let Some(c) = text[i..].chars().next().filter(|c| c.is_whitespace()) {
                i += c.len_utf8();
            }
            TokenKind::Whitespace
        } else if text[i..].starts_with("//") {
            while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                i += 1;
            }
            TokenKind::LineComment
        } else if text[i..].starts_with("/*") {
            i = match text[i + 2..].find("*/") {
                Some(close) => i + 2 + close + 2,
                None => text.len(),
            };
            TokenKind::BlockComment
        } else if c == '"' || c == '\'' {
            i += 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b if b == c as u8 => {
                        i += 1;
                        break;
                    }
                    b'\n' => break,
                    _ => i += 1,
                }
            }
            i = i.min(text.len());
            TokenKind::Str
        } else if c.is_ascii_digit() {
            let hex = text[i..].starts_with("0x") || text[i..].starts_with("0X");
            i += 1;
            while i < bytes.len() {
                let b = bytes[i];
                let exp_sign = !hex
                    && (b == b'-' || b == b'+')
                    && matches!(bytes[i - 1], b'e' | b'E')
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
                let fraction =
                    !hex && b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
                if b.is_ascii_alphanumeric() || b == b'_' || exp_sign || fraction {
                    i += 1;
                } else {
                    break;
                }
            }
            TokenKind::Number
        } else if is_ident_start(c) {
            i += 1;
            while i < bytes.len() && is_ident_continue(bytes[i] as char) {
                i += 1;
            }
            TokenKind::Ident
        } else {
            i += c.len_utf8();
            TokenKind::Punct
        };
        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }
    tokens
}

/// Tokens that are neither whitespace nor comments.
pub fn code_tokens(text: &str) -> Vec<Token> {
    tokenize(text).into_iter().filter(|t| !t.is_trivia()).collect()
}

/// `true` for a comment that carries the license identifier.
pub fn is_license_comment(text: &str) -> bool {
    text.contains("SPDX-License-Identifier")
}

/// Byte spans that no pass may rewrite: comments, string literals and directives
/// (`pragma ...;` statements and the license comment). Sorted and non-overlapping.
pub fn protected_spans(text: &str) -> Vec<(usize, usize)> {
    let tokens = tokenize(text);
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        let tok = tokens[idx];
        match tok.kind {
            TokenKind::Str | TokenKind::LineComment | TokenKind::BlockComment => {
                spans.push((tok.start, tok.end));
            }
            TokenKind::Ident if tok.text(text) == "pragma" => {
                let mut end = tok.end;
                while idx + 1 < tokens.len() {
                    idx += 1;
                    end = tokens[idx].end;
                    if tokens[idx].kind == TokenKind::Punct && tokens[idx].text(text) == ";" {
                        break;
                    }
                }
                spans.push((tok.start, end));
            }
            _ => {}
        }
        idx += 1;
    }
    spans
}

/// `true` when `offset` falls inside any of the sorted `spans`.
pub fn in_spans(spans: &[(usize, usize)], offset: usize) -> bool {
    let idx = spans.partition_point(|&(_, end)| end <= offset);
    spans.get(idx).is_some_and(|&(start, _)| start <= offset)
}

/// Extends a statement that ends at `end` over a directly following `;`.
///
/// The compiler reports simple statements without their terminating semicolon. Only
/// whitespace may sit between the statement and the semicolon.
pub fn extend_statement_end(text: &str, end: usize) -> usize {
    let rest = match text.get(end..) {
        Some(rest) => rest,
        None => return end,
    };
    let trimmed = rest.trim_start();
    if trimmed.starts_with(';') {
        end + (rest.len() - trimmed.len()) + 1
    } else {
        end
    }
}

/// Offset of the `{` that opens the body starting at or after `from`, skipping comments
/// and strings. Returns the position of the brace itself.
pub fn body_start(text: &str, from: usize, to: usize) -> Option<usize> {
    let window = text.get(from..to.min(text.len()))?;
    code_tokens(window)
        .into_iter()
        .find(|t| t.kind == TokenKind::Punct && t.text(window) == "{")
        .map(|t| from + t.start)
}

/// Finds the first code occurrence of the keyword `word` in `start..end`.
pub fn find_keyword(text: &str, start: usize, end: usize, word: &str) -> Option<(usize, usize)> {
    let window = text.get(start..end.min(text.len()))?;
    code_tokens(window)
        .into_iter()
        .find(|t| t.kind == TokenKind::Ident && t.text(window) == word)
        .map(|t| (start + t.start, start + t.end))
}

/// Version constraint of the first `pragma solidity` directive, e.g. `^0.8.20`.
pub fn pragma_version(text: &str) -> Option<String> {
    let tokens = code_tokens(text);
    let pos = tokens.windows(2).position(|w| {
        w[0].kind == TokenKind::Ident
            && w[0].text(text) == "pragma"
            && w[1].text(text) == "solidity"
    })?;
    let start = tokens[pos + 1].end;
    let end = tokens[pos + 2..]
        .iter()
        .find(|t| t.text(text) == ";")
        .map(|t| t.start)?;
    let version = text[start..end].trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Every identifier-shaped token in the code, used to keep generated names unique.
pub fn identifiers(text: &str) -> HashSet<String> {
    code_tokens(text)
        .into_iter()
        .filter(|t| t.kind == TokenKind::Ident)
        .map(|t| t.text(text).to_string())
        .collect()
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_ident_start) && chars.all(is_ident_continue)
}

/// Byte offset where the line containing `offset` starts.
///
/// Searches bytes, so an offset past the end or inside a multi-byte character is fine.
pub fn line_start(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |nl| nl + 1)
}

/// Leading whitespace of the line containing `offset`.
pub fn indent_of(text: &str, offset: usize) -> &str {
    let start = line_start(text, offset);
    let line = &text[start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

/// Column (in bytes) of `offset` within its line.
pub fn column_of(text: &str, offset: usize) -> usize {
    offset - line_start(text, offset)
}

/// Re-indents a snippet copied from column `from_col` so its first line starts at
/// `indent` and continuation lines keep their relative indentation.
pub fn reindent(snippet: &str, from_col: usize, indent: &str) -> String {
    let mut out = String::with_capacity(snippet.len() + indent.len());
    for (n, line) in snippet.lines().enumerate() {
        if n > 0 {
            out.push('\n');
        }
        if n == 0 {
            out.push_str(indent);
            out.push_str(line.trim_start());
            continue;
        }
        let leading = line.len() - line.trim_start_matches([' ', '\t']).len();
        let strip = leading.min(from_col);
        if line.trim().is_empty() {
            continue;
        }
        out.push_str(indent);
        out.push_str(&line[strip..]);
    }
    out
}
