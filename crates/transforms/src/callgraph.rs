//! Internal call graph over functions and modifiers of one source unit.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use shroud_core::ast::{AstNode, NodeId, NodeKind};
use shroud_core::walker::{walk, Visitor, Walk, WalkContext};
use shroud_core::SourceAst;
use std::collections::{HashMap, HashSet};

/// Edges point from a function or modifier to everything it invokes, including the
/// modifiers a function is decorated with.
pub struct CallGraph<'a> {
    graph: DiGraph<NodeId, ()>,
    nodes: HashMap<NodeId, NodeIndex>,
    definitions: HashMap<NodeId, &'a AstNode>,
    used_as_value: HashSet<NodeId>,
}

struct Builder<'g, 'a> {
    graph: &'g mut CallGraph<'a>,
}

impl<'a> Visitor<'a> for Builder<'_, 'a> {
    fn enter(&mut self, node: &'a AstNode, cx: &WalkContext<'a>) -> Walk {
        let enclosing = cx
            .nearest(|n| matches!(n.kind, NodeKind::Function(_) | NodeKind::Modifier(_)))
            .map(|n| n.id);

        match &node.kind {
            NodeKind::ModifierInvocation { .. } => {
                if let (Some(from), Some(to)) = (enclosing, node.referenced()) {
                    self.graph.add_edge(from, to);
                }
                return Walk::Continue;
            }
            NodeKind::Identifier { .. } | NodeKind::Other { .. } => {}
            _ => return Walk::Continue,
        }

        let Some(target) = node.referenced() else {
            return Walk::Continue;
        };
        if !self
            .graph
            .definitions
            .get(&target)
            .is_some_and(|d| matches!(d.kind, NodeKind::Function(_)))
        {
            return Walk::Continue;
        }
        if cx.parent().is_some_and(|p| p.node_type() == "ModifierInvocation") {
            return Walk::Continue;
        }

        let is_callee = cx.parent().is_some_and(|p| match &p.kind {
            NodeKind::Call { expression, .. } => expression.id == node.id,
            _ => false,
        });
        if is_callee {
            if let Some(from) = enclosing {
                self.graph.add_edge(from, target);
            }
        } else {
            self.graph.used_as_value.insert(target);
        }
        Walk::Continue
    }
}

impl<'a> CallGraph<'a> {
    pub fn build(ast: &'a SourceAst) -> Self {
        let mut graph = CallGraph {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            definitions: HashMap::new(),
            used_as_value: HashSet::new(),
        };
        ast.root().for_each(&mut |node| {
            if matches!(node.kind, NodeKind::Function(_) | NodeKind::Modifier(_)) {
                graph.definitions.insert(node.id, node);
                let idx = graph.graph.add_node(node.id);
                graph.nodes.insert(node.id, idx);
            }
        });
        walk(ast.root(), &mut Builder { graph: &mut graph });
        graph
    }

    fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if let (Some(&a), Some(&b)) = (self.nodes.get(&from), self.nodes.get(&to)) {
            self.graph.update_edge(a, b, ());
        }
    }

    pub fn definition(&self, id: NodeId) -> Option<&'a AstNode> {
        self.definitions.get(&id).copied()
    }

    /// Functions whose address is taken instead of being called.
    pub fn is_used_as_value(&self, id: NodeId) -> bool {
        self.used_as_value.contains(&id)
    }

    /// Direct callers of `id`, including functions that apply `id` as a modifier.
    pub fn callers(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.nodes.get(&id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Incoming)
            .map(|n| self.graph[n])
            .collect()
    }

    /// Everything that can reach `id`, including `id` itself.
    pub fn transitive_callers(&self, id: NodeId) -> HashSet<NodeId> {
        let mut out = HashSet::new();
        let Some(&idx) = self.nodes.get(&id) else {
            return out;
        };
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, idx);
        while let Some(n) = dfs.next(reversed) {
            out.insert(self.graph[n]);
        }
        out
    }

    /// Everything `id` can reach, excluding `id` unless it is part of a cycle.
    pub fn transitive_callees(&self, id: NodeId) -> HashSet<NodeId> {
        let mut out = HashSet::new();
        let Some(&idx) = self.nodes.get(&id) else {
            return out;
        };
        for start in self.graph.neighbors(idx) {
            let mut dfs = Dfs::new(&self.graph, start);
            while let Some(n) = dfs.next(&self.graph) {
                out.insert(self.graph[n]);
            }
        }
        out
    }

    /// `true` if `id` can call itself, directly or through others.
    pub fn is_recursive(&self, id: NodeId) -> bool {
        self.transitive_callees(id).contains(&id)
    }
}
