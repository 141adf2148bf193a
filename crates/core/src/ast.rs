//! Typed view of the compiler's compact JSON AST.
//!
//! Only the node kinds the passes rewrite get dedicated variants. Everything else lands in
//! [`NodeKind::Other`], which still enumerates its children, so a traversal never needs to
//! know about every node type the compiler can emit.

use crate::result::{Error, Result};
use crate::source::SourceBuffer;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// AST node id as assigned by the compiler.
pub type NodeId = i64;

/// A byte range into the buffer an AST was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SrcRange {
    pub start: usize,
    pub len: usize,
    pub file: i64,
}

impl SrcRange {
    pub fn new(start: usize, len: usize) -> Self {
        Self {
            start,
            len,
            file: 0,
        }
    }

    /// Parses the compiler's `start:length:fileIndex` form.
    pub fn parse(src: &str) -> Result<Self> {
        let mut parts = src.split(':');
        let (Some(start), Some(len), Some(file), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidSrc(src.to_string()));
        };
        let start = start
            .parse::<i64>()
            .map_err(|_| Error::InvalidSrc(src.to_string()))?;
        let len = len
            .parse::<i64>()
            .map_err(|_| Error::InvalidSrc(src.to_string()))?;
        let file = file
            .parse::<i64>()
            .map_err(|_| Error::InvalidSrc(src.to_string()))?;
        if start < 0 || len < 0 {
            return Err(Error::InvalidSrc(src.to_string()));
        }
        Ok(Self {
            start: start as usize,
            len: len as usize,
            file,
        })
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, other: &SrcRange) -> bool {
        self.start <= other.start && other.end() <= self.end()
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mutability {
    Pure,
    View,
    NonPayable,
    Payable,
}

impl Mutability {
    fn parse(value: &str) -> Self {
        match value {
            "pure" => Self::Pure,
            "view" => Self::View,
            "payable" => Self::Payable,
            _ => Self::NonPayable,
        }
    }

    /// Functions that may not write state.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Pure | Self::View)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
    Default,
}

impl Visibility {
    fn parse(value: &str) -> Self {
        match value {
            "public" => Self::Public,
            "external" => Self::External,
            "internal" => Self::Internal,
            "private" => Self::Private,
            _ => Self::Default,
        }
    }

    /// Part of the contract's external interface.
    pub fn is_exposed(&self) -> bool {
        matches!(self, Self::Public | Self::External)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Constructor,
    Fallback,
    Receive,
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocation {
    Default,
    Memory,
    Storage,
    Calldata,
}

impl StorageLocation {
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Memory => Some("memory"),
            Self::Storage => Some("storage"),
            Self::Calldata => Some("calldata"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    Bool,
    String,
    HexString,
    UnicodeString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    FunctionCall,
    TypeConversion,
    StructConstructorCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    DoWhile,
    For,
}

#[derive(Debug, Clone)]
pub struct ContractDef {
    pub name: String,
    pub name_src: Option<SrcRange>,
    pub kind: ContractKind,
    pub is_abstract: bool,
    pub bases: Vec<AstNode>,
    pub nodes: Vec<AstNode>,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub name_src: Option<SrcRange>,
    pub kind: FunctionKind,
    pub visibility: Visibility,
    pub mutability: Mutability,
    pub is_virtual: bool,
    pub overrides: bool,
    pub implemented: bool,
    pub parameters: Vec<AstNode>,
    pub return_parameters: Vec<AstNode>,
    pub modifiers: Vec<AstNode>,
    pub body: Option<Box<AstNode>>,
}

#[derive(Debug, Clone)]
pub struct ModifierDef {
    pub name: String,
    pub name_src: Option<SrcRange>,
    pub is_virtual: bool,
    pub overrides: bool,
    pub parameters: Vec<AstNode>,
    pub body: Option<Box<AstNode>>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub name_src: Option<SrcRange>,
    pub type_name: Option<Box<AstNode>>,
    /// Name of the type when it is an elementary type such as `uint256` or `address`.
    pub elementary: Option<String>,
    pub storage_location: StorageLocation,
    pub state_variable: bool,
    pub constant: bool,
    pub immutable: bool,
    pub visibility: Visibility,
    pub value: Option<Box<AstNode>>,
}

#[derive(Debug, Clone)]
pub struct LoopStmt {
    pub kind: LoopKind,
    pub init: Option<Box<AstNode>>,
    pub condition: Option<Box<AstNode>>,
    pub update: Option<Box<AstNode>>,
    pub body: Box<AstNode>,
}

/// Closed union over the node kinds passes inspect, plus a generic fallback.
#[derive(Debug, Clone)]
pub enum NodeKind {
    SourceUnit {
        nodes: Vec<AstNode>,
    },
    Contract(ContractDef),
    Function(FunctionDef),
    Modifier(ModifierDef),
    ModifierInvocation {
        modifier_name: Box<AstNode>,
        arguments: Vec<AstNode>,
    },
    Block {
        statements: Vec<AstNode>,
        unchecked: bool,
    },
    If {
        condition: Box<AstNode>,
        true_body: Box<AstNode>,
        false_body: Option<Box<AstNode>>,
    },
    Loop(LoopStmt),
    VariableDeclarationStatement {
        declarations: Vec<Option<AstNode>>,
        initial_value: Option<Box<AstNode>>,
    },
    VariableDeclaration(VarDecl),
    Return {
        expression: Option<Box<AstNode>>,
    },
    Placeholder,
    /// `Identifier` and `IdentifierPath` nodes.
    Identifier {
        name: String,
        referenced: Option<NodeId>,
    },
    Literal {
        kind: LiteralKind,
        value: Option<String>,
        subdenomination: Option<String>,
    },
    Call {
        expression: Box<AstNode>,
        arguments: Vec<AstNode>,
        names: Vec<String>,
        kind: CallKind,
    },
    Other {
        node_type: String,
        name: Option<String>,
        referenced: Option<NodeId>,
        operator: Option<String>,
        children: Vec<AstNode>,
    },
}

#[derive(Debug, Clone)]
pub struct AstNode {
    pub id: NodeId,
    pub src: SrcRange,
    pub kind: NodeKind,
}

impl AstNode {
    /// The compiler's node type name.
    pub fn node_type(&self) -> &str {
        match &self.kind {
            NodeKind::SourceUnit { .. } => "SourceUnit",
            NodeKind::Contract(_) => "ContractDefinition",
            NodeKind::Function(_) => "FunctionDefinition",
            NodeKind::Modifier(_) => "ModifierDefinition",
            NodeKind::ModifierInvocation { .. } => "ModifierInvocation",
            NodeKind::Block {
                unchecked: true, ..
            } => "UncheckedBlock",
            NodeKind::Block { .. } => "Block",
            NodeKind::If { .. } => "IfStatement",
            NodeKind::Loop(l) => match l.kind {
                LoopKind::While => "WhileStatement",
                LoopKind::DoWhile => "DoWhileStatement",
                LoopKind::For => "ForStatement",
            },
            NodeKind::VariableDeclarationStatement { .. } => "VariableDeclarationStatement",
            NodeKind::VariableDeclaration(_) => "VariableDeclaration",
            NodeKind::Return { .. } => "Return",
            NodeKind::Placeholder => "PlaceholderStatement",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::Call { .. } => "FunctionCall",
            NodeKind::Other { node_type, .. } => node_type,
        }
    }

    /// Children in source order.
    pub fn children(&self) -> Vec<&AstNode> {
        let mut out: Vec<&AstNode> = Vec::new();
        match &self.kind {
            NodeKind::SourceUnit { nodes } => out.extend(nodes),
            NodeKind::Contract(c) => {
                out.extend(&c.bases);
                out.extend(&c.nodes);
            }
            NodeKind::Function(f) => {
                out.extend(&f.parameters);
                out.extend(&f.modifiers);
                out.extend(&f.return_parameters);
                out.extend(f.body.as_deref());
            }
            NodeKind::Modifier(m) => {
                out.extend(&m.parameters);
                out.extend(m.body.as_deref());
            }
            NodeKind::ModifierInvocation {
                modifier_name,
                arguments,
            } => {
                out.push(modifier_name);
                out.extend(arguments);
            }
            NodeKind::Block { statements, .. } => out.extend(statements),
            NodeKind::If {
                condition,
                true_body,
                false_body,
            } => {
                out.push(condition);
                out.push(true_body);
                out.extend(false_body.as_deref());
            }
            NodeKind::Loop(l) => {
                out.extend(l.init.as_deref());
                out.extend(l.condition.as_deref());
                out.extend(l.update.as_deref());
                out.push(&l.body);
            }
            NodeKind::VariableDeclarationStatement {
                declarations,
                initial_value,
            } => {
                out.extend(declarations.iter().flatten());
                out.extend(initial_value.as_deref());
            }
            NodeKind::VariableDeclaration(v) => {
                out.extend(v.type_name.as_deref());
                out.extend(v.value.as_deref());
            }
            NodeKind::Return { expression } => out.extend(expression.as_deref()),
            NodeKind::Call {
                expression,
                arguments,
                ..
            } => {
                out.push(expression);
                out.extend(arguments);
            }
            NodeKind::Other { children, .. } => out.extend(children),
            NodeKind::Placeholder | NodeKind::Identifier { .. } | NodeKind::Literal { .. } => {}
        }
        out.sort_by_key(|n| n.src.start);
        out
    }

    pub fn as_contract(&self) -> Option<&ContractDef> {
        match &self.kind {
            NodeKind::Contract(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionDef> {
        match &self.kind {
            NodeKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_modifier(&self) -> Option<&ModifierDef> {
        match &self.kind {
            NodeKind::Modifier(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_var_decl(&self) -> Option<&VarDecl> {
        match &self.kind {
            NodeKind::VariableDeclaration(v) => Some(v),
            _ => None,
        }
    }

    /// Statements of a `Block`/`UncheckedBlock`, or the node itself for a lone statement.
    pub fn statements(&self) -> Vec<&AstNode> {
        match &self.kind {
            NodeKind::Block {
                statements,
                unchecked: false,
            } => statements.iter().collect(),
            _ => vec![self],
        }
    }

    /// Name this node refers to or declares, if any.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Contract(c) => Some(&c.name),
            NodeKind::Function(f) => Some(&f.name),
            NodeKind::Modifier(m) => Some(&m.name),
            NodeKind::VariableDeclaration(v) => Some(&v.name),
            NodeKind::Identifier { name, .. } => Some(name),
            NodeKind::Other { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    /// Declaration id an identifier-like node resolves to.
    pub fn referenced(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Identifier { referenced, .. } | NodeKind::Other { referenced, .. } => {
                *referenced
            }
            NodeKind::ModifierInvocation { modifier_name, .. } => modifier_name.referenced(),
            _ => None,
        }
    }

    /// `true` if this node or any descendant satisfies `pred`.
    pub fn any(&self, pred: &mut dyn FnMut(&AstNode) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.children().into_iter().any(|c| c.any(&mut *pred))
    }

    /// Visits this node and every descendant, pre-order.
    pub fn for_each<'a>(&'a self, f: &mut dyn FnMut(&'a AstNode)) {
        f(self);
        for child in self.children() {
            child.for_each(f);
        }
    }

    /// Builds a node from one object of the compiler's compact JSON output.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::MalformedAst("node is not an object".into()))?;
        let node_type = str_field(obj, "nodeType")
            .ok_or_else(|| Error::MalformedAst("node without nodeType".into()))?;
        let src = match str_field(obj, "src") {
            Some(src) => SrcRange::parse(src)?,
            None => return Err(Error::MalformedAst(format!("{node_type} without src"))),
        };
        let id = obj.get("id").and_then(Value::as_i64).unwrap_or(-1);

        let kind = match node_type {
            "SourceUnit" => NodeKind::SourceUnit {
                nodes: node_list(obj, "nodes")?,
            },
            "ContractDefinition" => NodeKind::Contract(ContractDef {
                name: str_field(obj, "name").unwrap_or_default().to_string(),
                name_src: name_location(obj)?,
                kind: match str_field(obj, "contractKind") {
                    Some("interface") => ContractKind::Interface,
                    Some("library") => ContractKind::Library,
                    _ => ContractKind::Contract,
                },
                is_abstract: bool_field(obj, "abstract"),
                bases: node_list(obj, "baseContracts")?,
                nodes: node_list(obj, "nodes")?,
            }),
            "FunctionDefinition" => NodeKind::Function(FunctionDef {
                name: str_field(obj, "name").unwrap_or_default().to_string(),
                name_src: name_location(obj)?,
                kind: match str_field(obj, "kind") {
                    Some("constructor") => FunctionKind::Constructor,
                    Some("fallback") => FunctionKind::Fallback,
                    Some("receive") => FunctionKind::Receive,
                    Some("freeFunction") => FunctionKind::Free,
                    _ => FunctionKind::Function,
                },
                visibility: Visibility::parse(str_field(obj, "visibility").unwrap_or_default()),
                mutability: Mutability::parse(
                    str_field(obj, "stateMutability").unwrap_or_default(),
                ),
                is_virtual: bool_field(obj, "virtual"),
                overrides: obj.get("overrides").is_some_and(|v| !v.is_null()),
                implemented: bool_field(obj, "implemented"),
                parameters: parameter_list(obj, "parameters")?,
                return_parameters: parameter_list(obj, "returnParameters")?,
                modifiers: node_list(obj, "modifiers")?,
                body: opt_node(obj, "body")?,
            }),
            "ModifierDefinition" => NodeKind::Modifier(ModifierDef {
                name: str_field(obj, "name").unwrap_or_default().to_string(),
                name_src: name_location(obj)?,
                is_virtual: bool_field(obj, "virtual"),
                overrides: obj.get("overrides").is_some_and(|v| !v.is_null()),
                parameters: parameter_list(obj, "parameters")?,
                body: opt_node(obj, "body")?,
            }),
            "ModifierInvocation" => NodeKind::ModifierInvocation {
                modifier_name: req_node(obj, "modifierName", node_type)?,
                arguments: node_list(obj, "arguments")?,
            },
            "Block" | "UncheckedBlock" => NodeKind::Block {
                statements: node_list(obj, "statements")?,
                unchecked: node_type == "UncheckedBlock",
            },
            "IfStatement" => NodeKind::If {
                condition: req_node(obj, "condition", node_type)?,
                true_body: req_node(obj, "trueBody", node_type)?,
                false_body: opt_node(obj, "falseBody")?,
            },
            "WhileStatement" | "DoWhileStatement" => NodeKind::Loop(LoopStmt {
                kind: if node_type == "WhileStatement" {
                    LoopKind::While
                } else {
                    LoopKind::DoWhile
                },
                init: None,
                condition: opt_node(obj, "condition")?,
                update: None,
                body: req_node(obj, "body", node_type)?,
            }),
            "ForStatement" => NodeKind::Loop(LoopStmt {
                kind: LoopKind::For,
                init: opt_node(obj, "initializationExpression")?,
                condition: opt_node(obj, "condition")?,
                update: opt_node(obj, "loopExpression")?,
                body: req_node(obj, "body", node_type)?,
            }),
            "VariableDeclarationStatement" => {
                let declarations = match obj.get("declarations") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|d| {
                            if d.is_null() {
                                Ok(None)
                            } else {
                                AstNode::from_json(d).map(Some)
                            }
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => Vec::new(),
                };
                NodeKind::VariableDeclarationStatement {
                    declarations,
                    initial_value: opt_node(obj, "initialValue")?,
                }
            }
            "VariableDeclaration" => {
                let type_name = opt_node(obj, "typeName")?;
                let elementary = type_name.as_deref().and_then(|t| match &t.kind {
                    NodeKind::Other {
                        node_type, name, ..
                    } if node_type == "ElementaryTypeName" => name.clone(),
                    _ => None,
                });
                NodeKind::VariableDeclaration(VarDecl {
                    name: str_field(obj, "name").unwrap_or_default().to_string(),
                    name_src: name_location(obj)?,
                    type_name,
                    elementary,
                    storage_location: match str_field(obj, "storageLocation") {
                        Some("memory") => StorageLocation::Memory,
                        Some("storage") => StorageLocation::Storage,
                        Some("calldata") => StorageLocation::Calldata,
                        _ => StorageLocation::Default,
                    },
                    state_variable: bool_field(obj, "stateVariable"),
                    constant: bool_field(obj, "constant")
                        || str_field(obj, "mutability") == Some("constant"),
                    immutable: str_field(obj, "mutability") == Some("immutable"),
                    visibility: Visibility::parse(
                        str_field(obj, "visibility").unwrap_or_default(),
                    ),
                    value: opt_node(obj, "value")?,
                })
            }
            "Return" => NodeKind::Return {
                expression: opt_node(obj, "expression")?,
            },
            "PlaceholderStatement" => NodeKind::Placeholder,
            "Identifier" | "IdentifierPath" => NodeKind::Identifier {
                name: str_field(obj, "name").unwrap_or_default().to_string(),
                referenced: obj.get("referencedDeclaration").and_then(Value::as_i64),
            },
            "Literal" => NodeKind::Literal {
                kind: match str_field(obj, "kind") {
                    Some("bool") => LiteralKind::Bool,
                    Some("string") => LiteralKind::String,
                    Some("hexString") => LiteralKind::HexString,
                    Some("unicodeString") => LiteralKind::UnicodeString,
                    _ => LiteralKind::Number,
                },
                value: str_field(obj, "value").map(str::to_string),
                subdenomination: str_field(obj, "subdenomination").map(str::to_string),
            },
            "FunctionCall" => NodeKind::Call {
                expression: req_node(obj, "expression", node_type)?,
                arguments: node_list(obj, "arguments")?,
                names: obj
                    .get("names")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(|n| n.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
                kind: match str_field(obj, "kind") {
                    Some("typeConversion") => CallKind::TypeConversion,
                    Some("structConstructorCall") => CallKind::StructConstructorCall,
                    _ => CallKind::FunctionCall,
                },
            },
            other => NodeKind::Other {
                node_type: other.to_string(),
                name: str_field(obj, "name")
                    .or_else(|| str_field(obj, "memberName"))
                    .map(str::to_string),
                referenced: obj.get("referencedDeclaration").and_then(Value::as_i64),
                operator: str_field(obj, "operator").map(str::to_string),
                children: generic_children(obj)?,
            },
        };

        Ok(AstNode { id, src, kind })
    }
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn is_node(value: &Value) -> bool {
    value.get("nodeType").is_some_and(Value::is_string)
}

fn name_location(obj: &Map<String, Value>) -> Result<Option<SrcRange>> {
    str_field(obj, "nameLocation")
        .map(SrcRange::parse)
        .transpose()
        .map(|loc| loc.filter(|l| l.len > 0))
}

fn opt_node(obj: &Map<String, Value>, key: &str) -> Result<Option<Box<AstNode>>> {
    match obj.get(key) {
        Some(v) if is_node(v) => Ok(Some(Box::new(AstNode::from_json(v)?))),
        _ => Ok(None),
    }
}

fn req_node(obj: &Map<String, Value>, key: &str, node_type: &str) -> Result<Box<AstNode>> {
    opt_node(obj, key)?.ok_or_else(|| Error::MalformedAst(format!("{node_type} without {key}")))
}

fn node_list(obj: &Map<String, Value>, key: &str) -> Result<Vec<AstNode>> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| is_node(v))
            .map(AstNode::from_json)
            .collect(),
        _ => Ok(Vec::new()),
    }
}

fn parameter_list(obj: &Map<String, Value>, key: &str) -> Result<Vec<AstNode>> {
    match obj.get(key).and_then(Value::as_object) {
        Some(list) => node_list(list, "parameters"),
        None => Ok(Vec::new()),
    }
}

fn generic_children(obj: &Map<String, Value>) -> Result<Vec<AstNode>> {
    let mut children = Vec::new();
    for value in obj.values() {
        match value {
            v if is_node(v) => children.push(AstNode::from_json(v)?),
            Value::Array(items) => {
                for item in items.iter().filter(|v| is_node(v)) {
                    children.push(AstNode::from_json(item)?);
                }
            }
            _ => {}
        }
    }
    children.sort_by_key(|c| c.src.start);
    Ok(children)
}

/// An AST bound to the exact buffer it was compiled from.
#[derive(Debug, Clone)]
pub struct SourceAst {
    root: AstNode,
    fingerprint: [u8; 32],
}

impl SourceAst {
    /// Wraps the `SourceUnit` JSON produced for `source`.
    pub fn from_solc_json(value: &Value, source: &SourceBuffer) -> Result<Self> {
        let root = AstNode::from_json(value)?;
        if !matches!(root.kind, NodeKind::SourceUnit { .. }) {
            return Err(Error::MalformedAst(format!(
                "expected SourceUnit, found {}",
                root.node_type()
            )));
        }
        Ok(Self {
            root,
            fingerprint: source.fingerprint(),
        })
    }

    pub fn root(&self) -> &AstNode {
        &self.root
    }

    /// Fails with [`Error::StaleAst`] unless this AST was compiled from `source`.
    pub fn check(&self, source: &SourceBuffer) -> Result<()> {
        if self.fingerprint == source.fingerprint() {
            Ok(())
        } else {
            Err(Error::StaleAst)
        }
    }

    /// Top-level contract, interface and library definitions.
    pub fn contracts(&self) -> impl Iterator<Item = &AstNode> {
        self.root
            .children()
            .into_iter()
            .filter(|n| matches!(n.kind, NodeKind::Contract(_)))
    }

    /// Every node with a non-negative id, keyed by id.
    pub fn index(&self) -> HashMap<NodeId, &AstNode> {
        let mut index = HashMap::new();
        self.root.for_each(&mut |node| {
            if node.id >= 0 {
                index.insert(node.id, node);
            }
        });
        index
    }

    /// Count of nodes per node type, for reporting.
    pub fn histogram(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        self.root.for_each(&mut |node| {
            *counts.entry(node.node_type().to_string()).or_default() += 1;
        });
        let mut out: Vec<_> = counts.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}
