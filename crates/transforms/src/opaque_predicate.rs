use crate::callgraph::CallGraph;
use crate::chaotic::{ChaoticPredicate, Variant};
use crate::text::{fresh_name, node_text};
use crate::{Error, Pass, PassConfig, PassOutput, Result};
use rand::rngs::StdRng;
use shroud_core::ast::{AstNode, ContractKind, FunctionKind, LoopKind, Mutability, NodeId, NodeKind};
use shroud_core::walker::collect;
use shroud_core::{scan, EditSet, SourceAst, SourceBuffer};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Marker every generated helper name starts with.
const HELPER_STEM: &str = "__cpm_map";
const STATE_STEM: &str = "__cpm_state";

/// Conjoins every `if`/`while` condition with a chaotic-map tautology backed by a
/// per-contract state variable.
pub struct OpaquePredicate {
    variants: Vec<Variant>,
}

impl OpaquePredicate {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            variants: config.opaque_variants.clone(),
        }
    }
}

/// A condition to rewrite, attributed to the function or modifier that contains it.
struct Target<'a> {
    condition: &'a AstNode,
    owner: NodeId,
}

fn conditions_in<'a>(contract: &'a AstNode, source: &SourceBuffer) -> Vec<Target<'a>> {
    let mut out = Vec::new();
    let statements = collect(contract, |n, cx| {
        let owned = cx.function().is_some() || cx.modifier().is_some();
        owned
            && match &n.kind {
                NodeKind::If { .. } => true,
                NodeKind::Loop(l) => matches!(l.kind, LoopKind::While | LoopKind::DoWhile),
                _ => false,
            }
    });
    for stmt in statements {
        let condition = match &stmt.kind {
            NodeKind::If { condition, .. } => Some(condition.as_ref()),
            NodeKind::Loop(l) => l.condition.as_deref(),
            _ => None,
        };
        let Some(condition) = condition else { continue };
        if node_text(source, &condition.src).is_ok_and(|t| t.contains(HELPER_STEM)) {
            continue;
        }
        out.push(Target {
            condition,
            owner: -1,
        });
    }
    // Attribute each condition to its innermost function or modifier.
    let owners = collect(contract, |n, _| {
        matches!(n.kind, NodeKind::Function(_) | NodeKind::Modifier(_))
    });
    for target in &mut out {
        if let Some(owner) = owners
            .iter()
            .filter(|o| o.src.contains(&target.condition.src))
            .min_by_key(|o| o.src.len)
        {
            target.owner = owner.id;
        }
    }
    out.retain(|t| t.owner >= 0);
    out
}

/// A pure function that must keep its mutability.
fn is_frozen(graph: &CallGraph<'_>, contract_of: &HashMap<NodeId, &AstNode>, id: NodeId) -> bool {
    let Some(NodeKind::Function(f)) = graph.definition(id).map(|d| &d.kind) else {
        return false;
    };
    if f.mutability != Mutability::Pure {
        return false;
    }
    let inherits = contract_of
        .get(&id)
        .and_then(|c| c.as_contract())
        .is_some_and(|c| !c.bases.is_empty());
    f.overrides
        || f.kind == FunctionKind::Free
        || graph.is_used_as_value(id)
        || (f.visibility.is_exposed() && inherits)
        || contract_of
            .get(&id)
            .and_then(|c| c.as_contract())
            .is_some_and(|c| c.kind != ContractKind::Contract)
}

/// Pure functions that have to become `view` once `owner` reads contract state.
fn widening_for(graph: &CallGraph<'_>, owner: NodeId) -> HashSet<NodeId> {
    graph
        .transitive_callers(owner)
        .into_iter()
        .filter(|id| {
            graph
                .definition(*id)
                .and_then(|d| d.as_function())
                .is_some_and(|f| f.mutability == Mutability::Pure)
        })
        .collect()
}

impl Pass for OpaquePredicate {
    fn name(&self) -> &'static str {
        "OpaquePredicate"
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let ast = ast.ok_or(Error::MissingAst(self.name()))?;
        ast.check(source)?;
        debug!("=== OpaquePredicate Transform Start ===");

        let graph = CallGraph::build(ast);
        let mut contract_of: HashMap<NodeId, &AstNode> = HashMap::new();
        for contract in ast.contracts() {
            contract.for_each(&mut |n| {
                if matches!(n.kind, NodeKind::Function(_) | NodeKind::Modifier(_)) {
                    contract_of.insert(n.id, contract);
                }
            });
        }

        let mut taken = scan::identifiers(source.as_str());
        let mut edits = EditSet::new();
        let mut widen: HashSet<NodeId> = HashSet::new();
        let mut rewritten = 0usize;

        for contract in ast.contracts() {
            let Some(def) = contract.as_contract() else { continue };
            if def.kind != ContractKind::Contract {
                continue;
            }

            let mut by_owner: BTreeMap<NodeId, Vec<&AstNode>> = BTreeMap::new();
            for target in conditions_in(contract, source) {
                by_owner.entry(target.owner).or_default().push(target.condition);
            }

            let mut accepted: Vec<&AstNode> = Vec::new();
            for (owner, conditions) in by_owner {
                let needed = widening_for(&graph, owner);
                if needed.iter().any(|id| is_frozen(&graph, &contract_of, *id)) {
                    debug!(
                        "  {}: skipping {} conditions in node {} (mutability is fixed)",
                        def.name,
                        conditions.len(),
                        owner
                    );
                    continue;
                }
                widen.extend(needed);
                accepted.extend(conditions);
            }
            if accepted.is_empty() {
                continue;
            }

            let Some(brace) = scan::body_start(source.as_str(), contract.src.start, contract.src.end())
            else {
                continue;
            };
            let predicate = ChaoticPredicate::generate(
                fresh_name(&mut taken, STATE_STEM, rng),
                fresh_name(&mut taken, HELPER_STEM, rng),
                &self.variants,
                rng,
            );
            debug!(
                "  {}: {:?} predicate over {} conditions",
                def.name,
                predicate.variant,
                accepted.len()
            );

            let indent = format!("{}    ", scan::indent_of(source.as_str(), contract.src.start));
            edits.insert(
                brace + 1,
                format!(
                    "\n{indent}{}\n\n{indent}{}\n",
                    predicate.state_declaration(),
                    predicate.helper_definition(&indent)
                ),
                "opaque-helper",
            );

            let tautology = predicate.condition();
            for condition in accepted {
                let text = node_text(source, &condition.src)?;
                edits.replace(
                    &condition.src,
                    format!("({text}) && {tautology}"),
                    "opaque-condition",
                );
                rewritten += 1;
            }
        }

        for id in &widen {
            let Some(node) = graph.definition(*id) else { continue };
            let Some(f) = node.as_function() else { continue };
            let header_end = f.body.as_ref().map_or(node.src.end(), |b| b.src.start);
            let header_start = f
                .parameters
                .last()
                .map_or(node.src.start, |p| p.src.end());
            if let Some((start, end)) =
                scan::find_keyword(source.as_str(), header_start, header_end, "pure")
            {
                debug!("  widening {} to view", f.name);
                edits.propose(start, end, "view", "opaque-widen");
            }
        }

        if rewritten == 0 {
            return Ok(PassOutput::unchanged(source));
        }
        let (out, _) = edits.commit(source);
        debug!("=== OpaquePredicate Transform Complete: {} conditions ===", rewritten);
        Ok(PassOutput {
            source: out,
            changes: rewritten,
        })
    }
}
