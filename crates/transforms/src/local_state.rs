use crate::callgraph::CallGraph;
use crate::text::{is_value_type, node_text};
use crate::{Error, Pass, PassOutput, Result};
use rand::rngs::StdRng;
use shroud_core::ast::{AstNode, ContractKind, NodeId, NodeKind, StorageLocation};
use shroud_core::walker::collect;
use shroud_core::{scan, EditSet, SourceAst, SourceBuffer};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Promotes initialized locals of state-changing functions to private state variables.
pub struct LocalToState;

impl LocalToState {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalToState {
    fn default() -> Self {
        Self::new()
    }
}

/// A local declaration statement that can move to storage.
struct Candidate<'a> {
    statement: &'a AstNode,
    decl: &'a AstNode,
    init: &'a AstNode,
}

fn candidate<'a>(stmt: &'a AstNode, pinned: &HashSet<String>) -> Option<Candidate<'a>> {
    let NodeKind::VariableDeclarationStatement {
        declarations,
        initial_value: Some(init),
    } = &stmt.kind
    else {
        return None;
    };
    let [Some(decl)] = declarations.as_slice() else {
        return None;
    };
    let v = decl.as_var_decl()?;
    let value_typed = v.storage_location == StorageLocation::Default
        && v.elementary.as_deref().is_some_and(is_value_type);
    (value_typed && !pinned.contains(&v.name)).then_some(Candidate {
        statement: stmt,
        decl,
        init,
    })
}

impl Pass for LocalToState {
    fn name(&self) -> &'static str {
        "LocalToState"
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        _rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let ast = ast.ok_or(Error::MissingAst(self.name()))?;
        ast.check(source)?;
        let text = source.as_str();
        let graph = CallGraph::build(ast);

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
        let mut globals: HashMap<NodeId, String> = HashMap::new();
        let mut counter = 0usize;

        for contract in ast.contracts() {
            let Some(def) = contract.as_contract() else { continue };
            if def.kind != ContractKind::Contract {
                continue;
            }
            let statements = collect(contract, |n, cx| {
                matches!(n.kind, NodeKind::VariableDeclarationStatement { .. })
                    && cx.modifier().is_none()
                    && cx.function().is_some_and(|(f_node, f)| {
                        !f.mutability.is_read_only() && !graph.is_recursive(f_node.id)
                    })
            });

            let mut declarations = Vec::new();
            for stmt in statements {
                let Some(c) = candidate(stmt, &pinned) else { continue };
                let Some(v) = c.decl.as_var_decl() else { continue };
                let Some(type_node) = v.type_name.as_deref() else { continue };

                let global = loop {
                    counter += 1;
                    let name = format!("__state_{}_{}", v.name, counter);
                    if taken.insert(name.clone()) {
                        break name;
                    }
                };
                declarations.push(format!(
                    "{} private {global};",
                    node_text(source, &type_node.src)?
                ));
                // `uint256 x = ` becomes `__state_x_1 = `, the initializer stays in place.
                edits.propose(
                    c.statement.src.start,
                    c.init.src.start,
                    format!("{global} = "),
                    "local-state-decl",
                );
                globals.insert(c.decl.id, global);
            }
            if declarations.is_empty() {
                continue;
            }

            let Some(brace) = scan::body_start(text, contract.src.start, contract.src.end()) else {
                continue;
            };
            let indent = format!("{}    ", scan::indent_of(text, contract.src.start));
            let block: String = declarations
                .iter()
                .map(|d| format!("\n{indent}{d}"))
                .collect();
            edits.insert(brace + 1, block, "local-state-var");
            debug!("  {}: promoted {} locals", def.name, declarations.len());
        }

        if globals.is_empty() {
            return Ok(PassOutput::unchanged(source));
        }
        ast.root().for_each(&mut |n| {
            if let (NodeKind::Identifier { .. }, Some(global)) =
                (&n.kind, n.referenced().and_then(|id| globals.get(&id)))
            {
                edits.replace(&n.src, global.clone(), "local-state-ref");
            }
        });

        let (out, _) = edits.commit(source);
        Ok(PassOutput {
            source: out,
            changes: globals.len(),
        })
    }
}
