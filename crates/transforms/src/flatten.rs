//! Control-flow flattening.
//!
//! A function body is partitioned into basic blocks that are re-linked through a single
//! dispatcher loop:
//!
//! ```text
//! uint256 state = 1;
//! while (state != 0) {
//!     if (state == 3) { ...; state = 4; }
//!     else if (state == 1) { ... }
//!     ...
//! }
//! ```
//!
//! Straight-line statements merge into one block. An `if` becomes a condition block that
//! selects the entry of either branch, and both branches continue to the block after the
//! `if`. Loops, nested blocks and `try` statements are copied verbatim as blocks of their
//! own. Locals are hoisted above the loop because every block is a separate scope.

use crate::text::{
    contains_assembly, declared_type, fresh_name, is_terminal, node_text, statement_text,
    zero_value,
};
use crate::{Error, Pass, PassConfig, PassOutput, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use shroud_core::ast::{AstNode, NodeId, NodeKind, StorageLocation};
use shroud_core::walker::collect;
use shroud_core::{scan, EditSet, SourceAst, SourceBuffer};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Dispatcher state that ends the loop.
pub const EXIT: usize = 0;

/// How control leaves a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Continue with the given block, or leave the loop on [`EXIT`].
    Goto(usize),
    /// Choose between two blocks.
    Branch {
        condition: String,
        on_true: usize,
        on_false: usize,
    },
    /// The block ends in `return` or `revert`.
    Terminal,
}

impl Exit {
    fn successors(&self) -> Vec<usize> {
        match self {
            Exit::Goto(next) => vec![*next],
            Exit::Branch {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Exit::Terminal => Vec::new(),
        }
    }

    fn remap(&self, map: &HashMap<usize, usize>) -> Exit {
        let id = |old: &usize| map.get(old).copied().unwrap_or(EXIT);
        match self {
            Exit::Goto(next) => Exit::Goto(id(next)),
            Exit::Branch {
                condition,
                on_true,
                on_false,
            } => Exit::Branch {
                condition: condition.clone(),
                on_true: id(on_true),
                on_false: id(on_false),
            },
            Exit::Terminal => Exit::Terminal,
        }
    }
}

/// A statement copied out of the source along with the column it started at.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub text: String,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: usize,
    pub body: Vec<Snippet>,
    pub exit: Exit,
}

/// A local moved above the dispatcher loop.
#[derive(Debug, Clone)]
pub struct Hoisted {
    pub name: String,
    pub declaration: String,
    pub decl_id: NodeId,
}

/// A lowered function body, ready to render.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pub entry: usize,
    pub blocks: Vec<BasicBlock>,
    pub hoisted: Vec<Hoisted>,
}

/// Why a function was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    NoBody,
    TooSmall,
    InlineAssembly,
    PointerLocal(String),
    DuplicateLocal(String),
    Shadowed(String),
    DanglingSuccessor(usize),
}

struct Lowering<'s> {
    source: &'s SourceBuffer,
    blocks: Vec<BasicBlock>,
    hoisted: Vec<Hoisted>,
}

enum Lowered<T> {
    Ok(T),
    Skip(Skip),
}

macro_rules! lowered {
    ($e:expr) => {
        match $e? {
            Lowered::Ok(v) => v,
            Lowered::Skip(reason) => return Ok(Lowered::Skip(reason)),
        }
    };
}

impl<'s> Lowering<'s> {
    fn push(&mut self, body: Vec<Snippet>, exit: Exit) -> usize {
        let id = self.blocks.len() + 1;
        self.blocks.push(BasicBlock { id, body, exit });
        id
    }

    fn flush(&mut self, run: &mut Vec<Snippet>, terminal: bool, next: usize) -> usize {
        if run.is_empty() {
            return next;
        }
        let body: Vec<Snippet> = run.drain(..).rev().collect();
        let exit = if terminal {
            Exit::Terminal
        } else {
            Exit::Goto(next)
        };
        self.push(body, exit)
    }

    fn snippet(&self, node: &AstNode, text: String) -> Snippet {
        Snippet {
            text,
            column: scan::column_of(self.source.as_str(), node.src.start),
        }
    }

    /// Lowers `stmts` so that control falls through to `cont`, returning the entry block.
    fn lower_seq(&mut self, stmts: &[&AstNode], cont: usize) -> Result<Lowered<usize>> {
        let mut next = cont;
        let mut run: Vec<Snippet> = Vec::new();
        let mut run_terminal = false;

        for stmt in stmts.iter().rev() {
            match &stmt.kind {
                NodeKind::If {
                    condition,
                    true_body,
                    false_body,
                } => {
                    next = self.flush(&mut run, run_terminal, next);
                    let on_true = lowered!(self.lower_seq(&true_body.statements(), next));
                    let on_false = match false_body {
                        Some(body) => lowered!(self.lower_seq(&body.statements(), next)),
                        None => next,
                    };
                    let condition = node_text(self.source, &condition.src)?.to_string();
                    next = self.push(
                        Vec::new(),
                        Exit::Branch {
                            condition,
                            on_true,
                            on_false,
                        },
                    );
                }
                NodeKind::Loop(_) => {
                    next = self.flush(&mut run, run_terminal, next);
                    let text = statement_text(self.source, stmt)?;
                    let snippet = self.snippet(stmt, text);
                    next = self.push(vec![snippet], Exit::Goto(next));
                }
                _ => {
                    let terminal = is_terminal(stmt);
                    if terminal && !run.is_empty() {
                        next = self.flush(&mut run, run_terminal, next);
                    }
                    if run.is_empty() {
                        run_terminal = terminal;
                    }
                    let snippet = lowered!(self.statement(stmt));
                    run.push(snippet);
                }
            }
        }
        Ok(Lowered::Ok(self.flush(&mut run, run_terminal, next)))
    }

    /// Copies a straight-line statement, turning declarations into assignments.
    fn statement(&mut self, stmt: &AstNode) -> Result<Lowered<Snippet>> {
        let NodeKind::VariableDeclarationStatement {
            declarations,
            initial_value,
        } = &stmt.kind
        else {
            let text = statement_text(self.source, stmt)?;
            return Ok(Lowered::Ok(self.snippet(stmt, text)));
        };

        let mut names = Vec::with_capacity(declarations.len());
        let mut resets = Vec::new();
        for decl in declarations {
            let Some(decl) = decl else {
                names.push(String::new());
                continue;
            };
            let Some(var) = decl.as_var_decl() else {
                return Err(Error::PassFailed {
                    pass: "Flatten",
                    reason: format!("declaration {} is not a variable", decl.id),
                });
            };
            if matches!(
                var.storage_location,
                StorageLocation::Storage | StorageLocation::Calldata
            ) {
                return Ok(Lowered::Skip(Skip::PointerLocal(var.name.clone())));
            }
            let Some(type_text) = declared_type(self.source, var)? else {
                return Ok(Lowered::Skip(Skip::PointerLocal(var.name.clone())));
            };
            self.hoisted.push(Hoisted {
                name: var.name.clone(),
                declaration: format!("{type_text} {};", var.name),
                decl_id: decl.id,
            });
            let bare_type = match var.type_name.as_deref() {
                Some(t) => node_text(self.source, &t.src)?,
                None => "",
            };
            resets.push(match zero_value(bare_type) {
                Some(zero) => format!("{} = {zero};", var.name),
                None => format!("delete {};", var.name),
            });
            names.push(var.name.clone());
        }

        let text = match initial_value {
            Some(value) => {
                let value = node_text(self.source, &value.src)?;
                if declarations.len() == 1 {
                    format!("{} = {value};", names[0])
                } else {
                    format!("({}) = {value};", names.join(", "))
                }
            }
            None => resets.join(" "),
        };
        Ok(Lowered::Ok(self.snippet(stmt, text)))
    }
}

/// Flattens function bodies into a dispatcher loop.
pub struct Flattener {
    min_statements: usize,
}

impl Flattener {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            min_statements: config.flatten_min_statements,
        }
    }

    /// Partitions a function into blocks, or explains why it stays as it is.
    pub fn lower(
        &self,
        source: &SourceBuffer,
        function: &AstNode,
    ) -> Result<std::result::Result<Dispatcher, Skip>> {
        let Some(f) = function.as_function() else {
            return Ok(Err(Skip::NoBody));
        };
        let Some(body) = f.body.as_deref().filter(|_| f.implemented) else {
            return Ok(Err(Skip::NoBody));
        };
        let statements = body.statements();
        let branches = statements
            .iter()
            .any(|s| matches!(s.kind, NodeKind::If { .. }));
        if statements.len() < self.min_statements && !branches {
            return Ok(Err(Skip::TooSmall));
        }
        if contains_assembly(body) {
            return Ok(Err(Skip::InlineAssembly));
        }

        let mut lowering = Lowering {
            source,
            blocks: Vec::new(),
            hoisted: Vec::new(),
        };
        let entry = match lowering.lower_seq(&statements, EXIT)? {
            Lowered::Ok(entry) => entry,
            Lowered::Skip(reason) => return Ok(Err(reason)),
        };

        // Hoisted names must be unique and must not capture another declaration.
        let mut hoisted_ids: HashMap<&str, NodeId> = HashMap::new();
        for h in &lowering.hoisted {
            if hoisted_ids.insert(&h.name, h.decl_id).is_some() {
                return Ok(Err(Skip::DuplicateLocal(h.name.clone())));
            }
        }
        for param in f.parameters.iter().chain(&f.return_parameters) {
            if let Some(name) = param.name().filter(|n| hoisted_ids.contains_key(n)) {
                return Ok(Err(Skip::Shadowed(name.to_string())));
            }
        }
        let shadowed = collect(body, |n, _| match &n.kind {
            NodeKind::Identifier { name, referenced } => hoisted_ids
                .get(name.as_str())
                .is_some_and(|id| *referenced != Some(*id)),
            _ => false,
        });
        if let Some(ident) = shadowed.first() {
            return Ok(Err(Skip::Shadowed(
                ident.name().unwrap_or_default().to_string(),
            )));
        }

        let Lowering {
            blocks, hoisted, ..
        } = lowering;
        match renumber(entry, blocks) {
            Ok((entry, blocks)) => Ok(Ok(Dispatcher {
                entry,
                blocks,
                hoisted,
            })),
            Err(missing) => Ok(Err(Skip::DanglingSuccessor(missing))),
        }
    }
}

/// Checks every successor exists, drops unreachable blocks and renumbers the rest
/// 1..=n in breadth-first order from the entry.
fn renumber(
    entry: usize,
    blocks: Vec<BasicBlock>,
) -> std::result::Result<(usize, Vec<BasicBlock>), usize> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let index: HashMap<usize, NodeIndex> = blocks
        .iter()
        .map(|b| (b.id, graph.add_node(b.id)))
        .collect();
    for block in &blocks {
        for succ in block.exit.successors() {
            if succ == EXIT {
                continue;
            }
            let Some(&to) = index.get(&succ) else {
                return Err(succ);
            };
            graph.add_edge(index[&block.id], to, ());
        }
    }
    let Some(&start) = index.get(&entry) else {
        return Err(entry);
    };

    let mut order = HashMap::new();
    let mut bfs = Bfs::new(&graph, start);
    while let Some(n) = bfs.next(&graph) {
        let next_id = order.len() + 1;
        order.insert(graph[n], next_id);
    }

    let mut out: Vec<BasicBlock> = blocks
        .into_iter()
        .filter_map(|b| {
            let id = *order.get(&b.id)?;
            Some(BasicBlock {
                id,
                exit: b.exit.remap(&order),
                body: b.body,
            })
        })
        .collect();
    out.sort_by_key(|b| b.id);
    Ok((order[&entry], out))
}

impl Dispatcher {
    /// Renders the replacement body, braces included.
    ///
    /// `indent` is the indentation of the function's own line.
    pub fn render(&self, state: &str, indent: &str, rng: &mut StdRng) -> String {
        let i1 = format!("{indent}    ");
        let i2 = format!("{indent}        ");
        let i3 = format!("{indent}            ");

        let mut arms: Vec<String> = self
            .blocks
            .iter()
            .map(|block| {
                let mut lines: Vec<String> = block
                    .body
                    .iter()
                    .map(|s| scan::reindent(&s.text, s.column, &i3))
                    .collect();
                match &block.exit {
                    Exit::Goto(next) => lines.push(format!("{i3}{state} = {next};")),
                    Exit::Branch {
                        condition,
                        on_true,
                        on_false,
                    } => lines.push(format!(
                        "{i3}if ({condition}) {{\n{i3}    {state} = {on_true};\n{i3}}} else {{\n{i3}    {state} = {on_false};\n{i3}}}"
                    )),
                    Exit::Terminal => {}
                }
                format!(
                    "if ({state} == {}) {{\n{}\n{i2}}}",
                    block.id,
                    lines.join("\n")
                )
            })
            .collect();
        arms.shuffle(rng);

        let mut out = String::from("{\n");
        for h in &self.hoisted {
            out.push_str(&format!("{i1}{}\n", h.declaration));
        }
        out.push_str(&format!("{i1}uint256 {state} = {};\n", self.entry));
        out.push_str(&format!("{i1}while ({state} != {EXIT}) {{\n"));
        out.push_str(&format!("{i2}{}\n", arms.join(" else ")));
        out.push_str(&format!("{i1}}}\n{indent}}}"));
        out
    }
}

impl Pass for Flattener {
    fn name(&self) -> &'static str {
        "Flatten"
    }

    fn apply(
        &self,
        source: &SourceBuffer,
        ast: Option<&SourceAst>,
        rng: &mut StdRng,
    ) -> Result<PassOutput> {
        let ast = ast.ok_or(Error::MissingAst(self.name()))?;
        ast.check(source)?;
        debug!("=== Flatten Transform Start ===");

        let functions = collect(ast.root(), |n, _| matches!(n.kind, NodeKind::Function(_)));
        let mut taken: HashSet<String> = scan::identifiers(source.as_str());
        let mut edits = EditSet::new();
        let mut flattened = 0usize;

        for function in functions {
            let Some(f) = function.as_function() else { continue };
            let dispatcher = match self.lower(source, function) {
                Ok(Ok(dispatcher)) => dispatcher,
                Ok(Err(skip)) => {
                    debug!("  skip {}: {:?}", f.name, skip);
                    continue;
                }
                Err(e) => {
                    debug!("  skip {}: {}", f.name, e);
                    continue;
                }
            };
            let Some(body) = f.body.as_deref() else { continue };
            let state = fresh_name(&mut taken, "__cf_state", rng);
            let indent = scan::indent_of(source.as_str(), function.src.start);
            let rendered = dispatcher.render(&state, indent, rng);
            debug!(
                "  {}: {} blocks, {} hoisted",
                f.name,
                dispatcher.blocks.len(),
                dispatcher.hoisted.len()
            );
            edits.replace(&body.src, rendered, "flatten");
            flattened += 1;
        }

        if flattened == 0 {
            return Ok(PassOutput::unchanged(source));
        }
        let (out, _) = edits.commit(source);
        debug!("=== Flatten Transform Complete: {} functions ===", flattened);
        Ok(PassOutput {
            source: out,
            changes: flattened,
        })
    }
}
