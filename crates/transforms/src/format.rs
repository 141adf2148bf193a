use crate::{Pass, PassConfig, PassOutput, Result};
use rand::rngs::StdRng;
use shroud_core::scan::{self, Token, TokenKind};
use shroud_core::{SourceAst, SourceBuffer};
use tracing::debug;

const OPERATOR_CHARS: &str = "+-*/%=<>!&|^~?:";

/// Rebuilds the layout with the least whitespace that keeps every token intact.
///
/// Directive lines and line comments keep their own lines. String literals are copied
/// byte for byte.
pub struct FormatScrambler {
    one_line: bool,
}

impl FormatScrambler {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            one_line: config.format_one_line,
        }
    }

    pub fn scramble(&self, text: &str) -> String {
        let tokens = scan::tokenize(text);
        let mut out = String::with_capacity(text.len());
        let mut prev: Option<Token> = None;
        let mut gap = false;
        let mut idx = 0;

        while idx < tokens.len() {
            let tok = tokens[idx];
            idx += 1;
            match tok.kind {
                TokenKind::Whitespace => gap = true,
                TokenKind::LineComment => {
                    if scan::is_license_comment(tok.text(text)) {
                        start_line(&mut out);
                    }
                    out.push_str(tok.text(text));
                    out.push('\n');
                    prev = None;
                    gap = false;
                }
                TokenKind::BlockComment => {
                    out.push_str(tok.text(text));
                    gap = true;
                }
                TokenKind::Ident if tok.text(text) == "pragma" => {
                    let end = tokens[idx..]
                        .iter()
                        .position(|t| t.kind == TokenKind::Punct && t.text(text) == ";")
                        .map_or(tokens.len(), |p| idx + p + 1);
                    let stop = tokens.get(end - 1).map_or(text.len(), |t| t.end);
                    start_line(&mut out);
                    out.push_str(&text[tok.start..stop]);
                    out.push('\n');
                    idx = end;
                    prev = None;
                    gap = false;
                }
                _ => {
                    if let Some(p) = prev {
                        if gap && fuses(text, &p, &tok) {
                            out.push(' ');
                        }
                    }
                    out.push_str(tok.text(text));
                    prev = Some(tok);
                    gap = false;
                    if !self.one_line && matches!(tok.text(text), ";" | "{" | "}") {
                        out.push('\n');
                        prev = None;
                    }
                }
            }
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

fn start_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// `true` if writing `b` right after `a` would change how either one lexes.
fn fuses(text: &str, a: &Token, b: &Token) -> bool {
    let word = |t: &Token| matches!(t.kind, TokenKind::Ident | TokenKind::Number);
    let op = |t: &Token| t.kind == TokenKind::Punct && OPERATOR_CHARS.contains(t.text(text));
    let dot = |t: &Token| t.kind == TokenKind::Punct && t.text(text) == ".";
    (word(a) && word(b))
        || (op(a) && op(b))
        || (a.kind == TokenKind::Number && dot(b))
        || (dot(a) && b.kind == TokenKind::Number)
}

impl Pass for FormatScrambler {
    fn name(&self) -> &'static str {
        "FormatScramble"
    }

    fn requires_ast(&self) -> bool {
        false
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        _ast: Option<&SourceAst>,
        _rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let out = self.scramble(source.as_str());
        if out == source.as_str() {
            return Ok(PassOutput::unchanged(source));
        }
        let before = source.line_count();
        let after = SourceBuffer::new(out);
        debug!("layout {} -> {} lines", before, after.line_count());
        Ok(PassOutput {
            changes: before.saturating_sub(after.line_count()).max(1),
            source: after,
        })
    }
}
