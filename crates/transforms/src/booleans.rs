use crate::{Pass, PassConfig, PassOutput, Result};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use shroud_core::ast::{LiteralKind, NodeKind};
use shroud_core::scan::{self, TokenKind};
use shroud_core::walker::collect;
use shroud_core::{EditSet, SourceAst, SourceBuffer};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Less,
    SumGrows,
    ModZero,
    XorDiffers,
}

const SHAPES: [Shape; 4] = [Shape::Less, Shape::SumGrows, Shape::ModZero, Shape::XorDiffers];

/// A comparison between constants that always yields `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolExpr {
    pub value: bool,
    pub shape: Shape,
    pub a: u64,
    pub b: u64,
}

impl BoolExpr {
    pub fn generate(value: bool, rng: &mut StdRng) -> Self {
        let shape = SHAPES.choose(rng).copied().unwrap_or(Shape::Less);
        let a = rng.random_range(1..=10_000u64);
        let b = loop {
            let b = rng.random_range(1..=10_000u64);
            if b != a {
                break b;
            }
        };
        Self {
            value,
            shape,
            a: a.min(b),
            b: a.max(b),
        }
    }

    pub fn render(&self) -> String {
        let (a, b) = (self.a, self.b);
        match (self.shape, self.value) {
            (Shape::Less, true) => format!("({a} < {b})"),
            (Shape::Less, false) => format!("({b} < {a})"),
            (Shape::SumGrows, true) => format!("(({a} + {b}) > {a})"),
            (Shape::SumGrows, false) => format!("(({a} + {b}) <= {a})"),
            (Shape::ModZero, true) => format!("((({a} * {b}) % {b}) == 0)"),
            (Shape::ModZero, false) => format!("((({a} * {b}) % {b}) != 0)"),
            (Shape::XorDiffers, true) => format!("(({a} ^ {b}) != {a})"),
            (Shape::XorDiffers, false) => format!("(({a} ^ {b}) == {a})"),
        }
    }

    /// Value of [`Self::render`].
    pub fn eval(&self) -> bool {
        let (a, b) = (u128::from(self.a), u128::from(self.b));
        match (self.shape, self.value) {
            (Shape::Less, true) => a < b,
            (Shape::Less, false) => b < a,
            (Shape::SumGrows, true) => a + b > a,
            (Shape::SumGrows, false) => a + b <= a,
            (Shape::ModZero, true) => (a * b) % b == 0,
            (Shape::ModZero, false) => (a * b) % b != 0,
            (Shape::XorDiffers, true) => (a ^ b) != a,
            (Shape::XorDiffers, false) => (a ^ b) == a,
        }
    }
}

/// Replaces `true`/`false` with constant comparisons.
pub struct BooleanDisguise {
    max_per_unit: usize,
}

impl BooleanDisguise {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            max_per_unit: config.boolean_max_per_unit,
        }
    }

    fn ast_sites(&self, ast: &SourceAst) -> Vec<(usize, usize, bool)> {
        collect(ast.root(), |n, cx| {
            let in_constant = cx
                .ancestors()
                .iter()
                .any(|a| a.as_var_decl().is_some_and(|v| v.constant));
            matches!(
                n.kind,
                NodeKind::Literal {
                    kind: LiteralKind::Bool,
                    ..
                }
            ) && cx.contract().is_some()
                && !in_constant
        })
        .into_iter()
        .filter_map(|lit| match &lit.kind {
            NodeKind::Literal { value, .. } => {
                Some((lit.src.start, lit.src.end(), value.as_deref() == Some("true")))
            }
            _ => None,
        })
        .collect()
    }

    /// `true`/`false` tokens outside directives, strings, comments and assembly.
    pub fn text_sites(&self, text: &str) -> Vec<(usize, usize, bool)> {
        let spans = scan::protected_spans(text);
        let mut sites = Vec::new();
        let mut assembly_depth: Option<usize> = None;
        let mut depth = 0usize;
        let mut constant_decl = false;

        for tok in scan::code_tokens(text) {
            let word = tok.text(text);
            match word {
                "{" => depth += 1,
                "}" => {
                    depth = depth.saturating_sub(1);
                    if assembly_depth == Some(depth) {
                        assembly_depth = None;
                    }
                }
                ";" => constant_decl = false,
                "constant" => constant_decl = true,
                "assembly" if assembly_depth.is_none() => assembly_depth = Some(depth),
                _ => {}
            }
            if tok.kind != TokenKind::Ident
                || !matches!(word, "true" | "false")
                || assembly_depth.is_some()
                || constant_decl
                || scan::in_spans(&spans, tok.start)
            {
                continue;
            }
            sites.push((tok.start, tok.end, word == "true"));
        }
        sites
    }
}

impl Pass for BooleanDisguise {
    fn name(&self) -> &'static str {
        "BooleanDisguise"
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
        let mut sites = match ast {
            Some(ast) => {
                ast.check(source)?;
                self.ast_sites(ast)
            }
            None => {
                debug!("no AST, scanning tokens for boolean literals");
                self.text_sites(source.as_str())
            }
        };
        if self.max_per_unit > 0 && sites.len() > self.max_per_unit {
            sites.shuffle(rng);
            sites.truncate(self.max_per_unit);
        }
        if sites.is_empty() {
            return Ok(PassOutput::unchanged(source));
        }

        let mut edits = EditSet::new();
        for (start, end, value) in sites {
            edits.propose(start, end, BoolExpr::generate(value, rng).render(), "boolean");
        }
        let (out, applied) = edits.commit(source);
        debug!("disguised {} boolean literals", applied);
        Ok(PassOutput {
            source: out,
            changes: applied,
        })
    }
}
