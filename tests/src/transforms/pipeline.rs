//! Pipeline scheduling: recompilation, failure isolation, fallback and cancellation.

use rand::rngs::StdRng;
use shroud_core::seed::Seed;
use shroud_core::{AstProvider, SourceAst, SourceBuffer};
use shroud_transform::obfuscator::{obfuscate_source, ObfuscationConfig};
use shroud_transform::pipeline::{PassStatus, Pipeline};
use shroud_transform::{build_passes, default_passes, Error, Pass, PassConfig, PassOutput, Result};
use shroud_tests::support::{init_tracing, seed, MiniSolc, NoCompiler, VAULT};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Always errors without touching the source or the rng.
struct Failing;

impl Pass for Failing {
    fn name(&self) -> &'static str {
        "Failing"
    }

    fn apply(&self, _: &SourceBuffer, _: Option<&SourceAst>, _: &mut StdRng) -> Result<PassOutput> {
        Err(Error::PassFailed {
            pass: "Failing",
            reason: "boom".into(),
        })
    }
}

/// Emits text that no compiler accepts.
struct Garbage;

impl Pass for Garbage {
    fn name(&self) -> &'static str {
        "Garbage"
    }

    fn requires_ast(&self) -> bool {
        false
    }

    fn apply(&self, source: &SourceBuffer, _: Option<&SourceAst>, _: &mut StdRng) -> Result<PassOutput> {
        Ok(PassOutput {
            source: SourceBuffer::new(format!("{}\ncontract {{", source.as_str())),
            changes: 1,
        })
    }
}

/// Counts compilations and can hand out an AST of another source on the first call.
struct Counting {
    calls: AtomicUsize,
    stale_first: bool,
}

impl Counting {
    fn new(stale_first: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            stale_first,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AstProvider for Counting {
    fn compile(&self, source: &SourceBuffer) -> shroud_core::Result<SourceAst> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stale_first && call == 0 {
            return MiniSolc.compile(&SourceBuffer::new("contract Other {\n    uint256 y;\n}\n"));
        }
        MiniSolc.compile(source)
    }
}

fn provider() -> Arc<dyn AstProvider> {
    Arc::new(MiniSolc)
}

fn passes(list: &str) -> Vec<Box<dyn Pass>> {
    build_passes(list, &PassConfig::default()).unwrap()
}

#[test]
fn test_failed_pass_is_isolated() {
    init_tracing();
    let pipeline = Pipeline::new(provider());

    let prefix = pipeline.run(SourceBuffer::new(VAULT), &passes("comments,integer"), &seed());
    let mut trailing = passes("comments,integer");
    trailing.push(Box::new(Failing));
    let outcome = pipeline.run(SourceBuffer::new(VAULT), &trailing, &seed());

    assert_eq!(outcome.reports.len(), 3);
    assert_eq!(outcome.reports[2].name, "Failing");
    assert_eq!(outcome.reports[2].status, PassStatus::Failed("Failing failed: boom".into()));
    assert_eq!(outcome.source.as_str(), prefix.source.as_str());
    assert_ne!(outcome.source.as_str(), VAULT);
    assert_eq!(outcome.steps, prefix.steps);
    assert_eq!(outcome.steps, 2);

    let plain = pipeline.run(SourceBuffer::new(VAULT), &passes("comments,integer,rename"), &seed());
    let mut middle = passes("comments,integer,rename");
    middle.insert(1, Box::new(Failing));
    let outcome = pipeline.run(SourceBuffer::new(VAULT), &middle, &seed());

    assert_eq!(outcome.reports[1].name, "Failing");
    assert_eq!(outcome.reports[1].status, PassStatus::Failed("Failing failed: boom".into()));
    assert_eq!(outcome.source.as_str(), plain.source.as_str());
    assert_eq!(outcome.steps, plain.steps);
}

#[test]
fn test_uncompilable_output_is_rejected() {
    let pipeline = Pipeline::new(provider());
    let list: Vec<Box<dyn Pass>> = vec![Box::new(Garbage)];
    let outcome = pipeline.run(SourceBuffer::new(VAULT), &list, &seed());

    assert!(outcome.initial_ast);
    assert_eq!(
        outcome.reports[0].status,
        PassStatus::Skipped("output does not compile".into())
    );
    assert_eq!(outcome.source.as_str(), VAULT);
    assert_eq!(outcome.steps, 0);
}

#[test]
fn test_uncompilable_output_keeps_earlier_passes() {
    let pipeline = Pipeline::new(provider());
    let mut list = passes("comments");
    list.push(Box::new(Garbage));
    list.extend(passes("rename"));
    let outcome = pipeline.run(SourceBuffer::new(VAULT), &list, &seed());

    assert!(matches!(outcome.reports[0].status, PassStatus::Applied { .. }));
    assert_eq!(
        outcome.reports[1].status,
        PassStatus::Skipped("output does not compile".into())
    );
    assert!(matches!(outcome.reports[2].status, PassStatus::Applied { .. }));
    assert_eq!(outcome.steps, 2);
    assert!(!outcome.source.as_str().contains("contract {"));
    assert!(!outcome.source.as_str().contains("@title"));
    assert!(MiniSolc.compile(&outcome.source).is_ok());
}

#[test]
fn test_stale_ast_is_recompiled() {
    init_tracing();
    let list = passes("comments,rename");

    let fresh = Arc::new(Counting::new(false));
    let expected = Pipeline::new(fresh.clone()).run(SourceBuffer::new(VAULT), &list, &seed());

    let stale = Arc::new(Counting::new(true));
    let outcome = Pipeline::new(stale.clone()).run(SourceBuffer::new(VAULT), &list, &seed());

    assert!(outcome.initial_ast);
    assert_eq!(stale.calls(), fresh.calls() + 1);
    assert!(outcome.reports.iter().all(|r| matches!(r.status, PassStatus::Applied { .. })));
    assert_eq!(outcome.source.as_str(), expected.source.as_str());
    assert!(!outcome.source.as_str().contains("Other"));
}

#[test]
fn test_text_only_fallback_without_compiler() {
    init_tracing();
    let pipeline = Pipeline::new(Arc::new(NoCompiler));
    let all = default_passes(&PassConfig::default());
    let outcome = pipeline.run(SourceBuffer::new(VAULT), &all, &seed());

    assert!(!outcome.initial_ast);
    assert_eq!(outcome.reports.len(), all.len());
    for (pass, report) in all.iter().zip(&outcome.reports) {
        match report.name.as_str() {
            "IntegerDisguise" | "StripComments" | "FormatScramble" => {
                assert!(
                    matches!(report.status, PassStatus::Applied { .. }),
                    "{}: {:?}",
                    report.name,
                    report.status
                );
            }
            // No boolean literals in the fixture.
            "BooleanDisguise" => assert_eq!(report.status, PassStatus::Unchanged),
            _ => {
                assert!(pass.requires_ast());
                assert_eq!(report.status, PassStatus::Skipped("no AST available".into()));
            }
        }
    }
    assert!(!outcome.source.as_str().contains("@title"));
    assert!(outcome.source.as_str().contains("SPDX-License-Identifier"));
}

#[test]
fn test_cancelled_run_touches_nothing() {
    let flag = Arc::new(AtomicBool::new(true));
    let pipeline = Pipeline::new(provider()).with_cancel(flag);
    let outcome = pipeline.run(
        SourceBuffer::new(VAULT),
        &default_passes(&PassConfig::default()),
        &seed(),
    );

    assert!(outcome
        .reports
        .iter()
        .all(|r| r.status == PassStatus::Skipped("cancelled".into())));
    assert_eq!(outcome.source.as_str(), VAULT);
    assert_eq!(outcome.applied().count(), 0);
}

#[test]
fn test_same_seed_same_output() {
    let pipeline = Pipeline::new(provider());
    let list = passes("opaque,flatten,static_data,integer,rename");
    let first = pipeline.run(SourceBuffer::new(VAULT), &list, &seed());
    let second = pipeline.run(SourceBuffer::new(VAULT), &list, &seed());
    assert_eq!(first.source.as_str(), second.source.as_str());

    let other = Seed::from_hex(&"ab".repeat(32)).unwrap();
    let third = pipeline.run(SourceBuffer::new(VAULT), &list, &other);
    assert_ne!(first.source.as_str(), third.source.as_str());
}

#[test]
fn test_obfuscate_source_metadata() {
    let config = ObfuscationConfig::with_seed(seed()).with_passes(passes("comments,boolean,integer"));
    let result = obfuscate_source(provider(), &SourceBuffer::new(VAULT), &config);

    assert!(result.metadata.ast_available);
    assert_eq!(result.metadata.passes_applied, ["StripComments", "IntegerDisguise"]);
    assert!(result.metadata.passes_failed.is_empty());
    assert!(result.metadata.passes_skipped.is_empty());
    assert_eq!(result.metadata.seed_hash, seed().hash_hex());
    assert_eq!(result.original_size, VAULT.len());
    assert_eq!(result.obfuscated_size, result.obfuscated_source.len());
    assert_eq!(result.reports[1].status, PassStatus::Unchanged);
}
