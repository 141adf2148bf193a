use crate::text::{contains_assembly, fresh_name, is_value_type, node_text};
use crate::{Error, Pass, PassOutput, Result};
use rand::rngs::StdRng;
use sha3::{Digest, Keccak256};
use shroud_core::ast::{AstNode, ContractKind, NodeId, NodeKind, Visibility};
use shroud_core::{scan, EditSet, SourceAst, SourceBuffer};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Merges plain private/internal state scalars of a contract into one struct instance.
pub struct ScalarGrouping;

impl ScalarGrouping {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScalarGrouping {
    fn default() -> Self {
        Self::new()
    }
}

/// Struct member name for a grouped variable.
pub fn member_name(name: &str) -> String {
    let digest = hex::encode(Keccak256::digest(name.as_bytes()));
    format!("m_{}", &digest[..16])
}

/// Extends `start..end` over the whole line when nothing else shares it.
pub(crate) fn line_span(text: &str, start: usize, end: usize) -> Result<(usize, usize)> {
    let malformed = || shroud_core::Error::MalformedOffset {
        start,
        end,
        len: text.len(),
    };
    let line_start = scan::line_start(text, start);
    let before = text.get(line_start..start).ok_or_else(malformed)?;
    let rest = text.get(end..).ok_or_else(malformed)?;
    let line_end = rest.find('\n').map_or(text.len(), |nl| end + nl + 1);
    let after = &text[end..line_end];
    if before.trim().is_empty() && after.trim().is_empty() {
        Ok((line_start, line_end))
    } else {
        Ok((start, end))
    }
}

fn groupable(node: &AstNode, pinned: &HashSet<String>) -> bool {
    let Some(v) = node.as_var_decl() else {
        return false;
    };
    v.state_variable
        && !v.constant
        && !v.immutable
        && v.value.is_none()
        && matches!(
            v.visibility,
            Visibility::Private | Visibility::Internal | Visibility::Default
        )
        && v.elementary.as_deref().is_some_and(is_value_type)
        && !pinned.contains(&v.name)
}

impl Pass for ScalarGrouping {
    fn name(&self) -> &'static str {
        "ScalarToStruct"
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let ast = ast.ok_or(Error::MissingAst(self.name()))?;
        ast.check(source)?;
        let text = source.as_str();

        // Assembly anywhere in the unit may address a slot by name.
        let mut pinned = HashSet::new();
        ast.root().for_each(&mut |n| {
            if n.node_type() == "InlineAssembly" {
                if let Ok(body) = node_text(source, &n.src) {
                    pinned.extend(scan::identifiers(body));
                }
            }
        });

        let mut taken = scan::identifiers(text);
        let mut edits = EditSet::new();
        let mut targets: HashMap<NodeId, String> = HashMap::new();

        for contract in ast.contracts() {
            let Some(def) = contract.as_contract() else { continue };
            if def.kind != ContractKind::Contract || contains_assembly(contract) {
                continue;
            }
            let fields: Vec<&AstNode> = def
                .nodes
                .iter()
                .filter(|n| groupable(n, &pinned))
                .collect();
            if fields.len() < 2 {
                continue;
            }

            let type_name = fresh_name(&mut taken, "ScalarGroup", rng);
            let tag = type_name.trim_start_matches("ScalarGroup_").to_string();
            let instance = format!("__scalars_{tag}");
            taken.insert(instance.clone());

            let indent = scan::indent_of(text, fields[0].src.start);
            let mut members = Vec::with_capacity(fields.len());
            for field in &fields {
                let Some(v) = field.as_var_decl() else { continue };
                let Some(type_node) = v.type_name.as_deref() else { continue };
                let member = member_name(&v.name);
                members.push(format!(
                    "{indent}    {} {member};",
                    node_text(source, &type_node.src)?
                ));
                targets.insert(field.id, format!("{instance}.{member}"));
            }

            let declaration = format!(
                "{indent}struct {type_name} {{\n{}\n{indent}}}\n{indent}{type_name} internal {instance};\n",
                members.join("\n")
            );
            for (i, field) in fields.iter().enumerate() {
                let end = scan::extend_statement_end(text, field.src.end());
                let (start, end) = line_span(text, field.src.start, end)?;
                let replacement = if i == 0 { declaration.clone() } else { String::new() };
                edits.propose(start, end, replacement, "scalar-field");
            }
            debug!("  {}: grouped {} fields into {}", def.name, fields.len(), type_name);
        }

        if targets.is_empty() {
            return Ok(PassOutput::unchanged(source));
        }
        ast.root().for_each(&mut |n| {
            if let (NodeKind::Identifier { .. }, Some(access)) =
                (&n.kind, n.referenced().and_then(|id| targets.get(&id)))
            {
                edits.replace(&n.src, access.clone(), "scalar-ref");
            }
        });

        let (out, _) = edits.commit(source);
        Ok(PassOutput {
            source: out,
            changes: targets.len(),
        })
    }
}
