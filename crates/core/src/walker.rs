//! Generic recursive AST traversal.

use crate::ast::{AstNode, ContractDef, FunctionDef, ModifierDef, NodeKind};

/// What a visitor wants the walker to do after entering a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    SkipChildren,
}

/// The chain of ancestors of the node currently being visited.
#[derive(Debug, Default)]
pub struct WalkContext<'a> {
    ancestors: Vec<&'a AstNode>,
}

impl<'a> WalkContext<'a> {
    /// Ancestors from the root down to the direct parent.
    pub fn ancestors(&self) -> &[&'a AstNode] {
        &self.ancestors
    }

    pub fn parent(&self) -> Option<&'a AstNode> {
        self.ancestors.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    /// Nearest enclosing node matching `pred`.
    pub fn nearest(&self, pred: impl Fn(&AstNode) -> bool) -> Option<&'a AstNode> {
        self.ancestors.iter().rev().find(|n| pred(n)).copied()
    }

    pub fn contract(&self) -> Option<(&'a AstNode, &'a ContractDef)> {
        self.ancestors.iter().rev().find_map(|n| match &n.kind {
            NodeKind::Contract(c) => Some((*n, c)),
            _ => None,
        })
    }

    pub fn function(&self) -> Option<(&'a AstNode, &'a FunctionDef)> {
        self.ancestors.iter().rev().find_map(|n| match &n.kind {
            NodeKind::Function(f) => Some((*n, f)),
            _ => None,
        })
    }

    pub fn modifier(&self) -> Option<(&'a AstNode, &'a ModifierDef)> {
        self.ancestors.iter().rev().find_map(|n| match &n.kind {
            NodeKind::Modifier(m) => Some((*n, m)),
            _ => None,
        })
    }

    /// `true` if any ancestor has the given compiler node type.
    pub fn within(&self, node_type: &str) -> bool {
        self.ancestors.iter().any(|n| n.node_type() == node_type)
    }
}

/// Callbacks for [`walk`].
pub trait Visitor<'a> {
    fn enter(&mut self, node: &'a AstNode, cx: &WalkContext<'a>) -> Walk {
        let _ = (node, cx);
        Walk::Continue
    }

    fn leave(&mut self, node: &'a AstNode, cx: &WalkContext<'a>) {
        let _ = (node, cx);
    }
}

/// Walks `root` depth-first, children in source order.
pub fn walk<'a, V: Visitor<'a> + ?Sized>(root: &'a AstNode, visitor: &mut V) {
    let mut cx = WalkContext::default();
    walk_node(root, visitor, &mut cx);
}

fn walk_node<'a, V: Visitor<'a> + ?Sized>(
    node: &'a AstNode,
    visitor: &mut V,
    cx: &mut WalkContext<'a>,
) {
    if visitor.enter(node, cx) == Walk::Continue {
        cx.ancestors.push(node);
        for child in node.children() {
            walk_node(child, visitor, cx);
        }
        cx.ancestors.pop();
    }
    visitor.leave(node, cx);
}

struct Collector<'a, F> {
    pred: F,
    found: Vec<&'a AstNode>,
}

impl<'a, F> Visitor<'a> for Collector<'a, F>
where
    F: FnMut(&'a AstNode, &WalkContext<'a>) -> bool,
{
    fn enter(&mut self, node: &'a AstNode, cx: &WalkContext<'a>) -> Walk {
        if (self.pred)(node, cx) {
            self.found.push(node);
        }
        Walk::Continue
    }
}

/// Every node under `root` (inclusive) for which `pred` holds, in pre-order.
pub fn collect<'a, F>(root: &'a AstNode, pred: F) -> Vec<&'a AstNode>
where
    F: FnMut(&'a AstNode, &WalkContext<'a>) -> bool,
{
    let mut collector = Collector {
        pred,
        found: Vec::new(),
    };
    walk(root, &mut collector);
    collector.found
}
