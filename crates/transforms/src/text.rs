//! Small text and AST helpers shared by the passes.

use crate::Result;
use rand::{rngs::StdRng, Rng};
use shroud_core::ast::{AstNode, CallKind, NodeKind, VarDecl};
use shroud_core::{scan, SourceBuffer, SrcRange};
use std::collections::HashSet;

/// Text covered by an AST node.
pub fn node_text<'a>(source: &'a SourceBuffer, src: &SrcRange) -> Result<&'a str> {
    Ok(source.slice(src.start, src.end())?)
}

/// Text of a statement including its terminating semicolon.
pub fn statement_text(source: &SourceBuffer, node: &AstNode) -> Result<String> {
    let end = scan::extend_statement_end(source.as_str(), node.src.end());
    Ok(source.slice(node.src.start, end)?.to_string())
}

/// A name derived from `stem` that does not occur in `taken`. The result is added to `taken`.
pub fn fresh_name(taken: &mut HashSet<String>, stem: &str, rng: &mut StdRng) -> String {
    loop {
        let candidate = format!("{stem}_{:06x}", rng.random_range(0..0x0100_0000u32));
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}

/// Text of `start..end` with the given sub-ranges replaced. Sub-ranges outside the span
/// or overlapping an earlier one are ignored.
pub fn splice(
    source: &SourceBuffer,
    start: usize,
    end: usize,
    subs: &[(SrcRange, String)],
) -> Result<String> {
    let mut subs: Vec<&(SrcRange, String)> = subs
        .iter()
        .filter(|(r, _)| start <= r.start && r.end() <= end)
        .collect();
    subs.sort_by_key(|(r, _)| r.start);
    let mut out = String::new();
    let mut cursor = start;
    for (range, text) in subs {
        if range.start < cursor {
            continue;
        }
        out.push_str(source.slice(cursor, range.start)?);
        out.push_str(text);
        cursor = range.end();
    }
    out.push_str(source.slice(cursor, end)?);
    Ok(out)
}

/// Canonical spelling of an elementary type name (`uint` becomes `uint256`).
pub fn canonical_type(name: &str) -> &str {
    match name {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        other => other,
    }
}

/// Elementary value types that live on the stack: integers, booleans, addresses and
/// fixed-size byte arrays.
pub fn is_value_type(name: &str) -> bool {
    !matches!(name.trim(), "string" | "bytes") && zero_value(name).is_some()
}

/// Literal spelling of the zero value of an elementary type as written in `type_text`.
pub fn zero_value(type_text: &str) -> Option<String> {
    let compact: String = type_text.split_whitespace().collect::<Vec<_>>().join(" ");
    let sized = |prefix: &str| {
        compact
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit() || c == 'x'))
    };
    let value = match compact.as_str() {
        "bool" => "false".to_string(),
        "string" | "bytes" => "\"\"".to_string(),
        "address" => "address(0)".to_string(),
        "address payable" => "payable(address(0))".to_string(),
        "byte" => "bytes1(0)".to_string(),
        t if t.starts_with("bytes") && sized("bytes") => format!("{t}(0)"),
        _ if sized("uint") || sized("int") || sized("ufixed") || sized("fixed") => "0".to_string(),
        _ => return None,
    };
    Some(value)
}

/// Source text of a variable's type, with its data location when one is written.
pub fn declared_type(source: &SourceBuffer, decl: &VarDecl) -> Result<Option<String>> {
    let Some(type_name) = decl.type_name.as_deref() else {
        return Ok(None);
    };
    let mut text = node_text(source, &type_name.src)?.to_string();
    if let Some(location) = decl.storage_location.keyword() {
        text.push(' ');
        text.push_str(location);
    }
    Ok(Some(text))
}

/// Wraps `text` in parentheses unless `node` is atomic.
pub fn parenthesize(text: &str, node: &AstNode) -> String {
    match node.kind {
        NodeKind::Identifier { .. } | NodeKind::Literal { .. } => text.to_string(),
        _ => format!("({text})"),
    }
}

/// `true` if evaluating `node` twice is indistinguishable from evaluating it once.
pub fn is_side_effect_free(node: &AstNode) -> bool {
    !node.any(&mut |n| match &n.kind {
        NodeKind::Call { kind, .. } => *kind != CallKind::TypeConversion,
        NodeKind::Other {
            node_type,
            operator,
            ..
        } => match node_type.as_str() {
            "Assignment" | "NewExpression" | "FunctionCallOptions" => true,
            "UnaryOperation" => matches!(operator.as_deref(), Some("++" | "--" | "delete")),
            _ => false,
        },
        _ => false,
    })
}

pub fn contains_assembly(node: &AstNode) -> bool {
    node.any(&mut |n| n.node_type() == "InlineAssembly")
}

/// `true` if `node` is a `return`, a `revert` statement or a bare `revert(...)` call.
pub fn is_terminal(node: &AstNode) -> bool {
    match &node.kind {
        NodeKind::Return { .. } => true,
        NodeKind::Other {
            node_type,
            children,
            ..
        } => match node_type.as_str() {
            "RevertStatement" | "Throw" => true,
            "ExpressionStatement" => children.first().is_some_and(|expr| match &expr.kind {
                NodeKind::Call { expression, .. } => {
                    matches!(&expression.kind, NodeKind::Identifier { name, .. } if name == "revert")
                }
                _ => false,
            }),
            _ => false,
        },
        _ => false,
    }
}

/// Name of the identifier a call targets, for calls like `f(x)`.
pub fn callee_name(node: &AstNode) -> Option<&str> {
    match &node.kind {
        NodeKind::Call { expression, .. } => match &expression.kind {
            NodeKind::Identifier { name, .. } => Some(name),
            _ => None,
        },
        _ => None,
    }
}
