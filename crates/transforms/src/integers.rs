use crate::text::node_text;
use crate::{Pass, PassConfig, PassOutput, Result};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use shroud_core::ast::{CallKind, LiteralKind, NodeKind};
use shroud_core::scan::{self, Token, TokenKind};
use shroud_core::walker::collect;
use shroud_core::{EditSet, SourceAst, SourceBuffer};
use tracing::debug;

/// Suffixes that turn a number into a different quantity.
const UNITS: &[&str] = &[
    "wei", "gwei", "ether", "seconds", "minutes", "hours", "days", "weeks", "years",
];

/// Arithmetic identity wrapped around a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    AddSub,
    SubAdd,
    MulDiv,
    Shift,
    Xor,
}

/// An integer literal rewritten as an expression with the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisguisedInt {
    pub value: u128,
    pub identity: Identity,
    pub operand: u128,
}

impl DisguisedInt {
    /// Picks an identity whose intermediate results fit for `value`.
    pub fn generate(value: u128, rng: &mut StdRng) -> Self {
        let mut options = vec![Identity::Xor];
        if value <= u128::MAX - 1_000 {
            options.push(Identity::AddSub);
        }
        if value >= 1 {
            options.push(Identity::SubAdd);
        }
        if value <= u128::MAX / 16 {
            options.push(Identity::MulDiv);
            options.push(Identity::Shift);
        }
        let identity = options
            .choose(rng)
            .copied()
            .unwrap_or(Identity::Xor);
        let operand = match identity {
            Identity::AddSub => rng.random_range(1..=1_000),
            Identity::SubAdd => rng.random_range(1..=value.min(1_000)),
            Identity::MulDiv => rng.random_range(2..=16),
            Identity::Shift => rng.random_range(1..=4),
            Identity::Xor => u128::from(rng.random::<u32>()),
        };
        Self {
            value,
            identity,
            operand,
        }
    }

    pub fn render(&self) -> String {
        let (n, r) = (self.value, self.operand);
        match self.identity {
            Identity::AddSub => format!("(({n} + {r}) - {r})"),
            Identity::SubAdd => format!("(({n} - {r}) + {r})"),
            Identity::MulDiv => format!("(({n} * {r}) / {r})"),
            Identity::Shift => format!("(({n} << {r}) >> {r})"),
            Identity::Xor => format!("(({n} ^ {r}) ^ {r})"),
        }
    }

    /// Value of [`Self::render`] under wrapping 128-bit arithmetic.
    pub fn eval(&self) -> u128 {
        let (n, r) = (self.value, self.operand);
        match self.identity {
            Identity::AddSub => n.wrapping_add(r).wrapping_sub(r),
            Identity::SubAdd => n.wrapping_sub(r).wrapping_add(r),
            Identity::MulDiv => n.wrapping_mul(r) / r,
            Identity::Shift => n.wrapping_shl(r as u32).wrapping_shr(r as u32),
            Identity::Xor => (n ^ r) ^ r,
        }
    }
}

/// A plain decimal literal such as `42`: no units, exponent, fraction or separators.
fn plain_decimal(text: &str) -> Option<u128> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Replaces integer literals with arithmetic identities.
pub struct IntegerDisguise {
    max_per_unit: usize,
}

impl IntegerDisguise {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            max_per_unit: config.integer_max_per_unit,
        }
    }

    fn cap<T>(&self, mut sites: Vec<T>, rng: &mut StdRng) -> Vec<T> {
        if self.max_per_unit > 0 && sites.len() > self.max_per_unit {
            sites.shuffle(rng);
            sites.truncate(self.max_per_unit);
        }
        sites
    }

    /// Literal sites found through the AST, as `(start, end, value)`.
    fn ast_sites(&self, source: &SourceBuffer, ast: &SourceAst) -> Result<Vec<(usize, usize, u128)>> {
        let literals = collect(ast.root(), |n, cx| {
            let NodeKind::Literal {
                kind: LiteralKind::Number,
                subdenomination: None,
                ..
            } = &n.kind
            else {
                return false;
            };
            let converted = cx.parent().is_some_and(|p| {
                matches!(&p.kind, NodeKind::Call { kind: CallKind::TypeConversion, .. })
            });
            !converted && !cx.within("ArrayTypeName") && cx.contract().is_some()
        });
        let mut sites = Vec::new();
        for lit in literals {
            if let Some(value) = plain_decimal(node_text(source, &lit.src)?) {
                sites.push((lit.src.start, lit.src.end(), value));
            }
        }
        Ok(sites)
    }

    /// Literal sites found by scanning tokens, used when no AST is available.
    pub fn text_sites(&self, text: &str) -> Vec<(usize, usize, u128)> {
        let tokens = scan::code_tokens(text);
        let spans = scan::protected_spans(text);
        let mut sites = Vec::new();
        let mut assembly_depth: Option<usize> = None;
        let mut depth = 0usize;

        for (idx, tok) in tokens.iter().enumerate() {
            let word = tok.text(text);
            match word {
                "{" => depth += 1,
                "}" => {
                    depth = depth.saturating_sub(1);
                    if assembly_depth == Some(depth) {
                        assembly_depth = None;
                    }
                }
                "assembly" if assembly_depth.is_none() => assembly_depth = Some(depth),
                _ => {}
            }
            if tok.kind != TokenKind::Number
                || assembly_depth.is_some()
                || scan::in_spans(&spans, tok.start)
            {
                continue;
            }
            let Some(value) = plain_decimal(word) else { continue };
            let prev = |back: usize| idx.checked_sub(back).and_then(|i| tokens.get(i));
            let next = tokens.get(idx + 1);
            if prev(1).is_some_and(|p| p.text(text) == "[")
                || next.is_some_and(|n| UNITS.contains(&n.text(text)) || n.text(text) == ".")
                || is_conversion_argument(text, prev(1), prev(2))
            {
                continue;
            }
            sites.push((tok.start, tok.end, value));
        }
        sites
    }
}

/// `address(0)`, `bytes32(0)` and friends only accept a bare literal.
fn is_conversion_argument(text: &str, open: Option<&Token>, callee: Option<&Token>) -> bool {
    let (Some(open), Some(callee)) = (open, callee) else {
        return false;
    };
    open.text(text) == "("
        && callee.kind == TokenKind::Ident
        && matches!(
            callee.text(text),
            t if t == "address" || t == "payable" || t.starts_with("bytes") || t.starts_with("uint") || t.starts_with("int")
        )
}

impl Pass for IntegerDisguise {
    fn name(&self) -> &'static str {
        "IntegerDisguise"
    }

    fn requires_ast(&self) -> bool {
        false
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let sites = match ast {
            Some(ast) => {
                ast.check(source)?;
                self.ast_sites(source, ast)?
            }
            None => {
                debug!("no AST, scanning tokens for integer literals");
                self.text_sites(source.as_str())
            }
        };
        let sites = self.cap(sites, rng);
        if sites.is_empty() {
            return Ok(PassOutput::unchanged(source));
        }

        let mut edits = EditSet::new();
        for (start, end, value) in sites {
            let disguised = DisguisedInt::generate(value, rng);
            edits.propose(start, end, disguised.render(), "integer");
        }
        let (out, applied) = edits.commit(source);
        debug!("disguised {} integer literals", applied);
        Ok(PassOutput {
            source: out,
            changes: applied,
        })
    }
}
