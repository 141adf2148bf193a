//! Identifier hashing.
//!
//! Every eligible name maps to `prefix + keccak256(name)[..len]`, so all declarations that
//! share a name (overloads, overrides, same-named locals) keep sharing it. Which sites get
//! rewritten is decided by declaration id, never by text search.

use crate::text::node_text;
use crate::{Pass, PassConfig, PassOutput, Result};
use rand::rngs::StdRng;
use sha3::{Digest, Keccak256};
use shroud_core::ast::{AstNode, FunctionKind, NodeId, NodeKind, SrcRange, Visibility};
use shroud_core::walker::{collect, WalkContext};
use shroud_core::{scan, EditSet, SourceAst, SourceBuffer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Names that must never be declared or produced.
const RESERVED: &[&str] = &[
    "this", "super", "msg", "block", "tx", "abi", "now", "_", "constructor", "fallback",
    "receive", "selfdestruct", "keccak256", "sha256", "ripemd160", "ecrecover", "addmod",
    "mulmod", "gasleft", "blockhash", "require", "assert", "revert", "type",
];

pub struct Renamer {
    prefix: String,
    hash_len: usize,
    contracts: bool,
}

impl Renamer {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            prefix: config.rename_prefix.clone(),
            hash_len: config.rename_hash_len.clamp(1, 64),
            contracts: config.rename_contracts,
        }
    }

    pub fn hashed(&self, name: &str) -> String {
        let digest = hex::encode(Keccak256::digest(name.as_bytes()));
        format!("{}{}", self.prefix, &digest[..self.hash_len])
    }

    /// Maps every name to its hashed form.
    ///
    /// Fails with `HashCollision` if two names share a hash, or if a hash equals an
    /// identifier in `existing` that is not itself being renamed.
    pub fn mapping<'n>(
        &self,
        names: impl IntoIterator<Item = &'n str>,
        existing: &HashSet<String>,
    ) -> Result<BTreeMap<String, String>> {
        let names: BTreeSet<&str> = names.into_iter().collect();
        let mut owners: HashMap<String, &str> = HashMap::new();
        let mut out = BTreeMap::new();
        for name in &names {
            let hashed = self.hashed(name);
            if let Some(first) = owners.insert(hashed.clone(), name) {
                return Err(shroud_core::Error::HashCollision {
                    first: first.to_string(),
                    second: name.to_string(),
                    hashed,
                }
                .into());
            }
            if existing.contains(&hashed) && !names.contains(hashed.as_str()) {
                return Err(shroud_core::Error::HashCollision {
                    first: hashed.clone(),
                    second: name.to_string(),
                    hashed,
                }
                .into());
            }
            out.insert(name.to_string(), hashed);
        }
        Ok(out)
    }

    fn eligible(&self, node: &AstNode, cx: &WalkContext<'_>) -> bool {
        match &node.kind {
            NodeKind::VariableDeclaration(v) => {
                if v.name.is_empty()
                    || cx.within("EventDefinition")
                    || cx.within("ErrorDefinition")
                    || cx.within("FunctionTypeName")
                    || cx
                        .parent()
                        .is_some_and(|p| p.node_type() == "StructDefinition")
                {
                    return false;
                }
                !v.state_variable || v.visibility != Visibility::Public
            }
            NodeKind::Function(f) => {
                matches!(f.kind, FunctionKind::Function | FunctionKind::Free)
                    && !f.name.is_empty()
                    && !f.visibility.is_exposed()
            }
            NodeKind::Modifier(_) => true,
            NodeKind::Contract(_) => self.contracts,
            NodeKind::Other { node_type, .. } => {
                matches!(node_type.as_str(), "StructDefinition" | "EnumDefinition")
            }
            _ => false,
        }
    }
}

/// Byte range of the name in a declaration.
fn declared_name(source: &SourceBuffer, node: &AstNode) -> Option<SrcRange> {
    let (name, located) = match &node.kind {
        NodeKind::VariableDeclaration(v) => (v.name.as_str(), v.name_src),
        NodeKind::Function(f) => (f.name.as_str(), f.name_src),
        NodeKind::Modifier(m) => (m.name.as_str(), m.name_src),
        NodeKind::Contract(c) => (c.name.as_str(), c.name_src),
        _ => (node.name()?, None),
    };
    if located.is_some() {
        return located;
    }
    let from = match &node.kind {
        NodeKind::VariableDeclaration(v) => v
            .type_name
            .as_ref()
            .map_or(node.src.start, |t| t.src.end()),
        _ => node.src.start,
    };
    scan::find_keyword(source.as_str(), from, node.src.end(), name)
        .map(|(start, end)| SrcRange::new(start, end - start))
}

/// Range of `name` at the end of a reference such as `x`, `Lib.S` or `a.b.member`.
fn trailing_name(source: &SourceBuffer, src: &SrcRange, name: &str) -> Option<SrcRange> {
    let text = node_text(source, src).ok()?;
    let trimmed = text.trim_end();
    if !trimmed.ends_with(name) {
        return None;
    }
    let start = src.start + trimmed.len() - name.len();
    Some(SrcRange::new(start, name.len()))
}

impl Pass for Renamer {
    fn name(&self) -> &'static str {
        "Rename"
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        _rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let ast = ast.ok_or(crate::Error::MissingAst(self.name()))?;
        ast.check(source)?;
        let root = ast.root();

        // Names the source relies on textually.
        let mut pinned: HashSet<String> = RESERVED.iter().map(|s| s.to_string()).collect();
        root.for_each(&mut |n| match &n.kind {
            NodeKind::Call { names, .. } => pinned.extend(names.iter().cloned()),
            NodeKind::Other { node_type, .. } if node_type == "InlineAssembly" => {
                if let Ok(text) = node_text(source, &n.src) {
                    pinned.extend(scan::identifiers(text));
                }
            }
            _ => {}
        });

        let declarations: Vec<&AstNode> = collect(root, |n, cx| self.eligible(n, cx))
            .into_iter()
            .filter(|n| n.name().is_some_and(|name| !pinned.contains(name)))
            .collect();
        if declarations.is_empty() {
            return Ok(PassOutput::unchanged(source));
        }
        let ids: HashMap<NodeId, &str> = declarations
            .iter()
            .filter_map(|n| Some((n.id, n.name()?)))
            .collect();

        let names: BTreeSet<&str> = ids.values().copied().collect();
        let existing = scan::identifiers(source.as_str());
        let mapping = self.mapping(names.iter().copied(), &existing)?;

        let mut edits = EditSet::new();
        for decl in &declarations {
            let Some(name) = decl.name() else { continue };
            match declared_name(source, decl) {
                Some(range) => edits.replace(&range, mapping[name].clone(), "rename"),
                None => debug!("no name location for {} ({})", name, decl.node_type()),
            }
        }
        root.for_each(&mut |n| {
            let Some(target) = n.referenced().filter(|id| ids.contains_key(id)) else {
                return;
            };
            let name = ids[&target];
            let src = match &n.kind {
                NodeKind::Identifier { .. } => trailing_name(source, &n.src, name),
                NodeKind::Other { node_type, .. }
                    if matches!(node_type.as_str(), "MemberAccess" | "UserDefinedTypeName") =>
                {
                    trailing_name(source, &n.src, name)
                }
                _ => None,
            };
            if let Some(src) = src {
                edits.replace(&src, mapping[name].clone(), "rename");
            }
        });

        let (out, applied) = edits.commit(source);
        debug!("renamed {} names at {} sites", mapping.len(), applied);
        Ok(PassOutput {
            source: out,
            changes: applied,
        })
    }
}
