//! Modifier and function inlining.
//!
//! A modifier invocation is replaced by the modifier's code around the original body,
//! which becomes a nested block in place of the placeholder. A call to a function whose
//! body is a single `return` is replaced by the returned expression, converted to the
//! declared return type.

use crate::callgraph::CallGraph;
use crate::text::{is_side_effect_free, is_value_type, node_text, parenthesize, splice};
use crate::{Error, Pass, PassOutput, Result};
use rand::rngs::StdRng;
use shroud_core::ast::{
    AstNode, CallKind, FunctionDef, FunctionKind, Mutability, NodeId, NodeKind, SrcRange,
    Visibility,
};
use shroud_core::edit::apply;
use shroud_core::{scan, EditSet, SourceAst, SourceBuffer};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct Inliner;

impl Inliner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Inliner {
    fn default() -> Self {
        Self::new()
    }
}

/// Names declared anywhere under `node`.
fn declared_names(node: &AstNode) -> HashSet<String> {
    let mut out = HashSet::new();
    node.for_each(&mut |n| {
        if let Some(v) = n.as_var_decl() {
            out.insert(v.name.clone());
        }
    });
    out
}

/// Names of identifiers under `node` that resolve outside of `own`.
fn free_names(node: &AstNode, own: &HashSet<NodeId>) -> HashSet<String> {
    let mut out = HashSet::new();
    node.for_each(&mut |n| {
        if let NodeKind::Identifier { name, referenced } = &n.kind {
            if !referenced.is_some_and(|id| own.contains(&id)) {
                out.insert(name.clone());
            }
        }
    });
    out
}

fn parameter_names(f: &FunctionDef) -> HashSet<String> {
    f.parameters
        .iter()
        .chain(&f.return_parameters)
        .filter_map(|p| p.name().map(str::to_string))
        .collect()
}

/// Identifier uses of each parameter id under `node`.
fn parameter_uses<'a>(node: &'a AstNode, params: &[AstNode]) -> HashMap<NodeId, Vec<&'a AstNode>> {
    let ids: HashSet<NodeId> = params.iter().map(|p| p.id).collect();
    let mut out: HashMap<NodeId, Vec<&'a AstNode>> = HashMap::new();
    node.for_each(&mut |n| {
        if let (NodeKind::Identifier { .. }, Some(id)) = (&n.kind, n.referenced()) {
            if ids.contains(&id) {
                out.entry(id).or_default().push(n);
            }
        }
    });
    out
}

/// Substitutes `arguments` for `params` inside `start..end` of `node`, or `None` when an
/// argument cannot be duplicated or dropped safely.
fn substitute(
    source: &SourceBuffer,
    node: &AstNode,
    start: usize,
    end: usize,
    params: &[AstNode],
    arguments: &[AstNode],
) -> Result<Option<String>> {
    let uses = parameter_uses(node, params);
    let mut subs: Vec<(SrcRange, String)> = Vec::new();
    for (param, arg) in params.iter().zip(arguments) {
        let sites = uses.get(&param.id).map_or(&[][..], Vec::as_slice);
        if !is_side_effect_free(arg) && sites.len() != 1 {
            return Ok(None);
        }
        let text = parenthesize(node_text(source, &arg.src)?, arg);
        subs.extend(sites.iter().map(|s| (s.src, text.clone())));
    }
    splice(source, start, end, &subs).map(Some)
}

struct ModifierInlining<'s, 'a> {
    source: &'s SourceBuffer,
    index: &'s HashMap<NodeId, &'a AstNode>,
    contract_members: HashSet<NodeId>,
}

impl<'a> ModifierInlining<'_, 'a> {
    /// Wraps `body_text` in the code of the invoked modifier.
    fn wrap(
        &self,
        function: &FunctionDef,
        invocation: &AstNode,
        body_text: &str,
        body_returns: bool,
    ) -> Result<Option<String>> {
        let NodeKind::ModifierInvocation { arguments, .. } = &invocation.kind else {
            return Ok(None);
        };
        let Some(target) = invocation.referenced() else {
            return Ok(None);
        };
        if !self.contract_members.contains(&target) {
            return Ok(None);
        }
        let Some(modifier_node) = self.index.get(&target).copied() else {
            return Ok(None);
        };
        let Some(modifier) = modifier_node.as_modifier() else {
            return Ok(None);
        };
        let Some(body) = modifier.body.as_deref() else {
            return Ok(None);
        };
        if modifier.is_virtual || modifier.overrides || arguments.len() != modifier.parameters.len() {
            return Ok(None);
        }

        let statements = body.statements();
        let placeholders: Vec<usize> = statements
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s.kind, NodeKind::Placeholder))
            .map(|(i, _)| i)
            .collect();
        let [at] = placeholders.as_slice() else {
            return Ok(None);
        };
        let mut total = 0usize;
        body.for_each(&mut |n| total += usize::from(matches!(n.kind, NodeKind::Placeholder)));
        if total != 1 {
            return Ok(None);
        }
        if body.any(&mut |n| matches!(n.kind, NodeKind::Return { .. })) {
            return Ok(None);
        }
        let has_post = *at + 1 < statements.len();
        if has_post && body_returns {
            return Ok(None);
        }

        // Modifier locals must not capture names of the body or the arguments, and the
        // function's parameters must not capture names the modifier refers to.
        let locals = declared_names(body);
        let param_ids: HashSet<NodeId> = modifier.parameters.iter().map(|p| p.id).collect();
        let function_names = parameter_names(function);
        let mut body_names = HashSet::new();
        if let Some(fb) = function.body.as_deref() {
            body_names = free_names(fb, &HashSet::new());
            body_names.extend(declared_names(fb));
        }
        let arg_names: HashSet<String> = arguments
            .iter()
            .flat_map(|a| free_names(a, &HashSet::new()))
            .collect();
        if !locals.is_disjoint(&body_names)
            || !locals.is_disjoint(&arg_names)
            || !locals.is_disjoint(&function_names)
            || !free_names(body, &param_ids).is_disjoint(&function_names)
        {
            return Ok(None);
        }

        let placeholder = statements[*at];
        let placeholder_end = scan::extend_statement_end(self.source.as_str(), placeholder.src.end());
        let Some(pre) = substitute(
            self.source,
            body,
            body.src.start + 1,
            placeholder.src.start,
            &modifier.parameters,
            arguments,
        )?
        else {
            return Ok(None);
        };
        let Some(post) = substitute(
            self.source,
            body,
            placeholder_end,
            body.src.end() - 1,
            &modifier.parameters,
            arguments,
        )?
        else {
            return Ok(None);
        };
        // A parameter read after the body would see state the body may have changed.
        if has_post && arguments.iter().any(|a| !matches!(a.kind, NodeKind::Literal { .. })) {
            let uses = parameter_uses(body, &modifier.parameters);
            let late = uses
                .values()
                .flatten()
                .any(|u| u.src.start >= placeholder_end);
            if late {
                return Ok(None);
            }
        }
        debug!("  inlining modifier {}", modifier.name);
        Ok(Some(format!("{{{pre}{body_text}{post}}}")))
    }
}

struct Callee<'a> {
    def: &'a FunctionDef,
    expression: &'a AstNode,
    return_type: String,
}

fn inlinable_function<'a>(
    source: &SourceBuffer,
    node: &'a AstNode,
    graph: &CallGraph<'_>,
) -> Result<Option<Callee<'a>>> {
    let Some(f) = node.as_function() else {
        return Ok(None);
    };
    let eligible = f.kind == FunctionKind::Function
        && matches!(f.visibility, Visibility::Internal | Visibility::Private)
        && !f.is_virtual
        && matches!(f.mutability, Mutability::Pure | Mutability::View)
        && f.implemented
        && f.modifiers.is_empty()
        && f.return_parameters.len() == 1
        && !graph.is_recursive(node.id);
    if !eligible {
        return Ok(None);
    }
    let Some(body) = f.body.as_deref() else {
        return Ok(None);
    };
    let statements = body.statements();
    if statements.len() != 1 {
        return Ok(None);
    }
    let stmt = statements[0];
    let NodeKind::Return {
        expression: Some(expression),
    } = &stmt.kind
    else {
        return Ok(None);
    };
    let Some(ret) = f.return_parameters[0].as_var_decl() else {
        return Ok(None);
    };
    let Some(type_node) = ret.type_name.as_deref() else {
        return Ok(None);
    };
    let return_type = node_text(source, &type_node.src)?.trim().to_string();
    if return_type.contains(char::is_whitespace) || !ret.elementary.as_deref().is_some_and(is_value_type) {
        return Ok(None);
    }
    Ok(Some(Callee {
        def: f,
        expression,
        return_type,
    }))
}

impl Pass for Inliner {
    fn name(&self) -> &'static str {
        "Inline"
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        _rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let ast = ast.ok_or(Error::MissingAst(self.name()))?;
        ast.check(source)?;
        let graph = CallGraph::build(ast);
        let index = ast.index();
        let mut edits = EditSet::new();

        for contract in ast.contracts() {
            let Some(def) = contract.as_contract() else { continue };
            let members: HashSet<NodeId> = def.nodes.iter().map(|n| n.id).collect();
            let inliner = ModifierInlining {
                source,
                index: &index,
                contract_members: members,
            };

            // Modifiers: only a trailing run can move into the body without reordering.
            for node in &def.nodes {
                let Some(f) = node.as_function() else { continue };
                let Some(body) = f.body.as_deref() else { continue };
                if f.modifiers.is_empty() {
                    continue;
                }
                let body_returns = body.any(&mut |n| matches!(n.kind, NodeKind::Return { .. }));
                let mut text = node_text(source, &body.src)?.to_string();
                let mut inlined = Vec::new();
                for invocation in f.modifiers.iter().rev() {
                    match inliner.wrap(f, invocation, &text, body_returns)? {
                        Some(wrapped) => {
                            text = wrapped;
                            inlined.push(invocation);
                        }
                        None => break,
                    }
                }
                if inlined.is_empty() {
                    continue;
                }
                for invocation in &inlined {
                    let start = source.as_str()[..invocation.src.start].trim_end().len();
                    edits.delete(start, invocation.src.end(), "inline-modifier-use");
                }
                edits.replace(&body.src, text, "inline-modifier");
            }

            // Single-return functions, called by name from the same contract.
            let mut callees: HashMap<NodeId, Callee<'_>> = HashMap::new();
            for node in &def.nodes {
                if let Some(callee) = inlinable_function(source, node, &graph)? {
                    callees.insert(node.id, callee);
                }
            }
            if callees.is_empty() {
                continue;
            }
            for node in &def.nodes {
                let Some(caller) = node.as_function() else { continue };
                let Some(body) = caller.body.as_deref() else { continue };
                let mut caller_names = parameter_names(caller);
                caller_names.extend(declared_names(body));

                let mut calls = Vec::new();
                body.for_each(&mut |n| {
                    if let NodeKind::Call {
                        expression,
                        arguments,
                        names,
                        kind: CallKind::FunctionCall,
                    } = &n.kind
                    {
                        if let (NodeKind::Identifier { .. }, Some(id)) =
                            (&expression.kind, expression.referenced())
                        {
                            if names.is_empty() && id != node.id && callees.contains_key(&id) {
                                calls.push((n, id, arguments));
                            }
                        }
                    }
                });

                for (call, id, arguments) in calls {
                    let callee = &callees[&id];
                    if arguments.len() != callee.def.parameters.len()
                        || arguments.iter().filter(|a| !is_side_effect_free(a)).count() > 1
                    {
                        continue;
                    }
                    let own: HashSet<NodeId> = callee.def.parameters.iter().map(|p| p.id).collect();
                    if !free_names(callee.expression, &own).is_disjoint(&caller_names) {
                        continue;
                    }
                    let Some(expr) = substitute(
                        source,
                        callee.expression,
                        callee.expression.src.start,
                        callee.expression.src.end(),
                        &callee.def.parameters,
                        arguments,
                    )?
                    else {
                        continue;
                    };
                    debug!("  inlining call to {} in {}", callee.def.name, caller.name);
                    edits.replace(
                        &call.src,
                        format!("{}({expr})", callee.return_type),
                        "inline-call",
                    );
                }
            }
        }

        let finalized = edits.finalize(source);
        let changes = finalized
            .ops
            .iter()
            .filter(|op| matches!(op.tag, "inline-modifier" | "inline-call"))
            .count();
        if changes == 0 {
            return Ok(PassOutput::unchanged(source));
        }
        Ok(PassOutput {
            source: apply(source, &finalized.ops),
            changes,
        })
    }
}
