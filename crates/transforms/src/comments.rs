use crate::{Pass, PassConfig, PassOutput, Result};
use rand::rngs::StdRng;
use shroud_core::scan::{self, Token, TokenKind};
use shroud_core::{EditSet, SourceAst, SourceBuffer};
use tracing::debug;

/// Removes comments outside string literals. Works on text alone.
pub struct CommentStripper {
    keep_license: bool,
}

impl CommentStripper {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            keep_license: config.strip_keep_license,
        }
    }

    /// Returns the stripped text and the number of comments removed.
    pub fn strip(&self, text: &str) -> (String, usize) {
        let tokens = scan::tokenize(text);
        let mut edits = EditSet::new();
        let mut removed = 0;

        for (idx, tok) in tokens.iter().enumerate() {
            if !tok.is_comment() {
                continue;
            }
            if self.keep_license && scan::is_license_comment(tok.text(text)) {
                continue;
            }
            removed += 1;

            let prev = idx.checked_sub(1).and_then(|i| tokens.get(i));
            let next = tokens.get(idx + 1);
            let (start, end, replacement) = match (prev, next) {
                // Alone on its line: drop the line, including its newline.
                (prev, next) if owns_line(text, prev, next) => {
                    let start = prev.map_or(tok.start, |p| line_tail_start(text, p));
                    let end = next.map_or(tok.end, |n| after_first_newline(text, n));
                    (start, end, "")
                }
                // A block comment between two code tokens still separates them.
                (Some(p), Some(n))
                    if tok.kind == TokenKind::BlockComment
                        && p.kind != TokenKind::Whitespace
                        && n.kind != TokenKind::Whitespace =>
                {
                    (tok.start, tok.end, " ")
                }
                _ => (tok.start, tok.end, ""),
            };
            edits.propose(start, end, replacement, "strip-comment");
        }

        let source = SourceBuffer::new(text);
        let (out, _) = edits.commit(&source);
        (out.as_str().to_string(), removed)
    }
}

/// `true` when only whitespace sits between the comment and the surrounding line breaks.
fn owns_line(text: &str, prev: Option<&Token>, next: Option<&Token>) -> bool {
    let before = match prev {
        None => true,
        Some(p) => p.kind == TokenKind::Whitespace && (p.start == 0 || p.text(text).contains('\n')),
    };
    let after = match next {
        None => true,
        Some(n) => n.kind == TokenKind::Whitespace && n.text(text).contains('\n'),
    };
    before && after
}

/// Start of the indentation that precedes a comment inside whitespace token `prev`.
fn line_tail_start(text: &str, prev: &Token) -> usize {
    match prev.text(text).rfind('\n') {
        Some(nl) => prev.start + nl + 1,
        None => prev.start,
    }
}

/// End of the first line break inside whitespace token `next`.
fn after_first_newline(text: &str, next: &Token) -> usize {
    match next.text(text).find('\n') {
        Some(nl) => next.start + nl + 1,
        None => next.end,
    }
}

impl Pass for CommentStripper {
    fn name(&self) -> &'static str {
        "StripComments"
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
        let (text, removed) = self.strip(source.as_str());
        debug!("stripped {} comments", removed);
        if removed == 0 {
            return Ok(PassOutput::unchanged(source));
        }
        Ok(PassOutput {
            source: SourceBuffer::new(text),
            changes: removed,
        })
    }
}
