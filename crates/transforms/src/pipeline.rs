use crate::Pass;
use serde::{Deserialize, Serialize};
use shroud_core::seed::Seed;
use shroud_core::{AstProvider, SourceAst, SourceBuffer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to one pass of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    /// The pass changed the source and the result compiled.
    Applied { changes: usize },
    /// The pass found nothing to do.
    Unchanged,
    /// The pass returned an error; the previous source was kept.
    Failed(String),
    /// The pass did not run, or its output was rejected.
    Skipped(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub name: String,
    pub status: PassStatus,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Source after the last accepted pass.
    pub source: SourceBuffer,
    pub reports: Vec<PassReport>,
    /// Number of mutations that were accepted.
    pub steps: usize,
    /// Whether the input compiled.
    pub initial_ast: bool,
}

impl PipelineOutcome {
    pub fn applied(&self) -> impl Iterator<Item = &PassReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, PassStatus::Applied { .. }))
    }
}

/// Runs passes in order over one compilation unit.
///
/// Every accepted mutation is recompiled before the next pass runs, so no pass ever sees
/// offsets from an older buffer. A failing pass leaves the source as it was.
pub struct Pipeline {
    provider: Arc<dyn AstProvider>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn AstProvider>) -> Self {
        Self {
            provider,
            cancel: None,
        }
    }

    /// Stops the run before the next pass once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn compile(&self, source: &SourceBuffer) -> Option<SourceAst> {
        match self.provider.compile(source) {
            Ok(ast) => Some(ast),
            Err(e) => {
                debug!("compile failed: {}", e);
                None
            }
        }
    }

    pub fn run(&self, source: SourceBuffer, passes: &[Box<dyn Pass>], seed: &Seed) -> PipelineOutcome {
        let mut rng = seed.create_deterministic_rng();
        let mut current = source;
        let mut ast = self.compile(&current);
        let initial_ast = ast.is_some();
        if !initial_ast {
            warn!("input does not compile, AST passes will be skipped");
        }

        let mut reports = Vec::with_capacity(passes.len());
        let mut steps = 0;

        for pass in passes {
            let name = pass.name();
            let status = if self.cancelled() {
                PassStatus::Skipped("cancelled".into())
            } else {
                if ast.as_ref().is_some_and(|a| a.check(&current).is_err()) {
                    warn!("{} found a stale AST, recompiling", name);
                    ast = self.compile(&current);
                }
                if pass.requires_ast() && ast.is_none() {
                    PassStatus::Skipped("no AST available".into())
                } else {
                    match pass.apply(&current, ast.as_ref(), &mut rng) {
                        Err(e) => {
                            error!("{:>14} failed: {}", name, e);
                            PassStatus::Failed(e.to_string())
                        }
                        Ok(out) if out.changes == 0 => PassStatus::Unchanged,
                        Ok(out) => match self.compile(&out.source) {
                            Some(next) => {
                                info!("{:>14} Δ{:+}", name, out.changes);
                                current = out.source;
                                ast = Some(next);
                                steps += 1;
                                PassStatus::Applied {
                                    changes: out.changes,
                                }
                            }
                            None if !initial_ast && !pass.requires_ast() => {
                                info!("{:>14} Δ{:+} (no AST)", name, out.changes);
                                current = out.source;
                                steps += 1;
                                PassStatus::Applied {
                                    changes: out.changes,
                                }
                            }
                            None => {
                                warn!("{:>14} output does not compile, keeping previous source", name);
                                PassStatus::Skipped("output does not compile".into())
                            }
                        },
                    }
                }
            };
            reports.push(PassReport {
                name: name.to_string(),
                status,
            });
        }

        PipelineOutcome {
            source: current,
            reports,
            steps,
            initial_ast,
        }
    }
}
