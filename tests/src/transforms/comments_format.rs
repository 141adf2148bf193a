//! Text-only passes: comment stripping and layout scrambling.

use shroud_core::{scan, AstProvider, SourceBuffer};
use shroud_transform::comments::CommentStripper;
use shroud_transform::format::FormatScrambler;
use shroud_transform::{Pass, PassConfig};
use shroud_tests::support::{apply_compiled, init_tracing, rng, MiniSolc, VAULT};

fn code_texts(text: &str) -> Vec<String> {
    scan::code_tokens(text)
        .iter()
        .map(|t| t.text(text).to_string())
        .collect()
}

#[test]
fn test_strip_keeps_license_and_code() {
    init_tracing();
    let stripper = CommentStripper::new(&PassConfig::default());
    let (out, removed) = stripper.strip(VAULT);

    assert_eq!(removed, 3);
    assert!(out.starts_with("// SPDX-License-Identifier: MIT\n"));
    assert!(!out.contains("@title"));
    assert!(!out.contains("Fee for an amount"));
    assert!(!out.contains("guard"));
    assert_eq!(code_texts(&out), code_texts(VAULT));
    assert!(MiniSolc.compile(&SourceBuffer::new(out)).is_ok());
}

#[test]
fn test_strip_is_idempotent() {
    let stripper = CommentStripper::new(&PassConfig::default());
    let (once, _) = stripper.strip(VAULT);
    let (twice, removed) = stripper.strip(&once);
    assert_eq!(removed, 0);
    assert_eq!(once, twice);
}

#[test]
fn test_strip_license_when_asked() {
    let config = PassConfig {
        strip_keep_license: false,
        ..PassConfig::default()
    };
    let (out, removed) = CommentStripper::new(&config).strip(VAULT);
    assert_eq!(removed, 4);
    assert!(!out.contains("SPDX"));
}

#[test]
fn test_strip_leaves_strings_alone() {
    let text = "contract A {\n    string s = \"// not a comment /* nor this */\";\n}\n";
    let (out, removed) = CommentStripper::new(&PassConfig::default()).strip(text);
    assert_eq!(removed, 0);
    assert_eq!(out, text);
}

#[test]
fn test_scramble_keeps_token_stream() {
    init_tracing();
    let pass = FormatScrambler::new(&PassConfig::default());
    let out = apply_compiled(&pass, VAULT);
    let text = out.source.as_str();

    assert!(out.changes > 0);
    assert!(text.lines().count() < VAULT.lines().count());
    assert!(text.lines().any(|l| l == "pragma solidity ^0.8.20;"));
    assert_eq!(code_texts(text), code_texts(VAULT));
}

#[test]
fn test_text_passes_run_without_ast() {
    let broken = SourceBuffer::new("contract A {\n    // note\n    uint x = 5 + ;\n}\n");
    for pass in [
        Box::new(CommentStripper::new(&PassConfig::default())) as Box<dyn Pass>,
        Box::new(FormatScrambler::new(&PassConfig::default())),
    ] {
        assert!(!pass.requires_ast());
        let out = pass.apply(&broken, None, &mut rng()).unwrap();
        assert!(out.changes > 0, "{} did nothing", pass.name());
        assert_eq!(code_texts(out.source.as_str()), code_texts(broken.as_str()));
    }
}
