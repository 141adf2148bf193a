use crate::text::{callee_name, canonical_type, fresh_name, node_text};
use crate::{Error, Pass, PassOutput, Result};
use rand::rngs::StdRng;
use rand::Rng;
use shroud_core::ast::{AstNode, CallKind, ContractKind, LiteralKind, NodeId, NodeKind};
use shroud_core::walker::{collect, WalkContext};
use shroud_core::{scan, EditSet, SourceAst, SourceBuffer};
use std::collections::HashMap;
use tracing::debug;

const INTS_STEM: &str = "__ints";
const BOOLS_STEM: &str = "__bools";
const MAX_BOOLS: usize = 128;
const ARITH_OPERATORS: &[&str] = &["+", "-", "*", "/", "%", "<", ">", "<=", ">=", "==", "!="];
const ASSIGN_OPERATORS: &[&str] = &["=", "+=", "-=", "*=", "/=", "%="];

/// Moves literal constants out of function bodies into per-contract accessors.
///
/// Integers are only moved where the surrounding expression already has type `uint256`,
/// so the accessor's return type never changes how the expression type-checks.
pub struct StaticData;

impl StaticData {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StaticData {
    fn default() -> Self {
        Self::new()
    }
}

struct Scope<'s, 'a> {
    source: &'s SourceBuffer,
    index: HashMap<NodeId, &'a AstNode>,
}

impl<'a> Scope<'_, 'a> {
    fn is_uint256(&self, node: &AstNode) -> bool {
        node.as_var_decl()
            .and_then(|v| v.elementary.as_deref())
            .is_some_and(|t| canonical_type(t) == "uint256")
    }

    fn refers_to_uint256(&self, node: &AstNode) -> bool {
        matches!(node.kind, NodeKind::Identifier { .. })
            && node
                .referenced()
                .and_then(|id| self.index.get(&id))
                .is_some_and(|decl| self.is_uint256(decl))
    }

    /// `true` if `lit` sits where a `uint256` value is expected.
    fn uint256_context(&self, lit: &AstNode, cx: &WalkContext<'a>) -> bool {
        let Some(parent) = cx.parent() else {
            return false;
        };
        match &parent.kind {
            NodeKind::VariableDeclarationStatement {
                declarations,
                initial_value,
            } => {
                initial_value.as_ref().is_some_and(|v| v.id == lit.id)
                    && declarations.len() == 1
                    && declarations[0].as_ref().is_some_and(|d| self.is_uint256(d))
            }
            NodeKind::Return { .. } => cx.function().is_some_and(|(_, f)| {
                f.return_parameters.len() == 1 && self.is_uint256(&f.return_parameters[0])
            }),
            NodeKind::Call {
                kind: CallKind::TypeConversion,
                expression,
                ..
            } => node_text(self.source, &expression.src).is_ok_and(|t| {
                let t = t.trim();
                t.starts_with("uint") || t == "int256" || t == "bytes32"
            }),
            NodeKind::Other {
                node_type,
                operator,
                children,
                ..
            } => {
                let op = operator.as_deref().unwrap_or_default();
                let other = children.iter().find(|c| c.id != lit.id);
                match node_type.as_str() {
                    "Assignment" => {
                        ASSIGN_OPERATORS.contains(&op)
                            && children.len() == 2
                            && children[1].id == lit.id
                            && self.refers_to_uint256(&children[0])
                    }
                    "BinaryOperation" => {
                        ARITH_OPERATORS.contains(&op)
                            && children.len() == 2
                            && other.is_some_and(|o| self.refers_to_uint256(o))
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

/// Guard calls and generated accessors keep their literals.
fn excluded(cx: &WalkContext<'_>) -> bool {
    let guarded = cx
        .ancestors()
        .iter()
        .any(|a| matches!(callee_name(a), Some("require" | "assert")));
    let generated = cx.function().is_some_and(|(_, f)| {
        f.name.starts_with(INTS_STEM) || f.name.starts_with(BOOLS_STEM)
    });
    guarded || generated || cx.within("ArrayTypeName")
}

fn ints_accessor(name: &str, stored: &[u128], mask: u64, indent: &str) -> String {
    let values: Vec<String> = stored
        .iter()
        .enumerate()
        .map(|(i, v)| if i == 0 { format!("uint256({v})") } else { v.to_string() })
        .collect();
    format!(
        "{indent}function {name}(uint256 i) internal pure returns (uint256) {{\n\
         {indent}    uint256[{n}] memory v = [{list}];\n\
         {indent}    return v[i] ^ {mask};\n\
         {indent}}}\n",
        n = stored.len(),
        list = values.join(", "),
    )
}

fn bools_accessor(name: &str, bits: u128, mask: u128, indent: &str) -> String {
    format!(
        "{indent}function {name}(uint256 i) internal pure returns (bool) {{\n\
         {indent}    return (((uint256({stored}) ^ uint256({mask})) >> i) & 1) == 1;\n\
         {indent}}}\n",
        stored = bits ^ mask,
    )
}

impl Pass for StaticData {
    fn name(&self) -> &'static str {
        "StaticData"
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let ast = ast.ok_or(Error::MissingAst(self.name()))?;
        ast.check(source)?;

        let scope = Scope {
            source,
            index: ast.index(),
        };
        let mut taken = scan::identifiers(source.as_str());
        let mut edits = EditSet::new();
        let mut moved = 0usize;

        for contract in ast.contracts() {
            let Some(def) = contract.as_contract() else { continue };
            if def.kind != ContractKind::Contract {
                continue;
            }

            let mut ints: Vec<(&AstNode, u128)> = Vec::new();
            let mut bools: Vec<(&AstNode, bool)> = Vec::new();
            let literals = collect(contract, |n, cx| {
                matches!(n.kind, NodeKind::Literal { .. })
                    && (cx.function().is_some() || cx.modifier().is_some())
                    && !excluded(cx)
                    && match &n.kind {
                        NodeKind::Literal {
                            kind: LiteralKind::Number,
                            subdenomination: None,
                            ..
                        } => scope.uint256_context(n, cx),
                        NodeKind::Literal {
                            kind: LiteralKind::Bool,
                            ..
                        } => true,
                        _ => false,
                    }
            });
            for lit in literals {
                let NodeKind::Literal { kind, value, .. } = &lit.kind else {
                    continue;
                };
                match kind {
                    LiteralKind::Bool if bools.len() < MAX_BOOLS => {
                        bools.push((lit, value.as_deref() == Some("true")));
                    }
                    LiteralKind::Number => {
                        let text = node_text(source, &lit.src)?;
                        if text.bytes().all(|b| b.is_ascii_digit()) {
                            if let Ok(v) = text.parse::<u128>() {
                                ints.push((lit, v));
                            }
                        }
                    }
                    _ => {}
                }
            }
            if ints.is_empty() && bools.is_empty() {
                continue;
            }

            let indent = format!("{}    ", scan::indent_of(source.as_str(), contract.src.start));
            let mut accessors = String::from("\n");

            if !ints.is_empty() {
                let name = fresh_name(&mut taken, INTS_STEM, rng);
                let mask: u64 = rng.random();
                let stored: Vec<u128> = ints.iter().map(|(_, v)| v ^ u128::from(mask)).collect();
                for (i, (lit, _)) in ints.iter().enumerate() {
                    edits.replace(&lit.src, format!("{name}({i})"), "static-int");
                }
                accessors.push_str(&ints_accessor(&name, &stored, mask, &indent));
            }
            if !bools.is_empty() {
                let name = fresh_name(&mut taken, BOOLS_STEM, rng);
                let mask: u128 = rng.random();
                let bits = bools
                    .iter()
                    .enumerate()
                    .fold(0u128, |acc, (i, (_, b))| acc | (u128::from(*b) << i));
                for (i, (lit, _)) in bools.iter().enumerate() {
                    edits.replace(&lit.src, format!("{name}({i})"), "static-bool");
                }
                accessors.push_str(&bools_accessor(&name, bits, mask, &indent));
            }

            debug!(
                "  {}: {} integers, {} booleans moved to accessors",
                def.name,
                ints.len(),
                bools.len()
            );
            moved += ints.len() + bools.len();
            edits.insert(contract.src.end() - 1, accessors, "static-accessor");
        }

        if moved == 0 {
            return Ok(PassOutput::unchanged(source));
        }
        let (out, _) = edits.commit(source);
        Ok(PassOutput {
            source: out,
            changes: moved,
        })
    }
}
