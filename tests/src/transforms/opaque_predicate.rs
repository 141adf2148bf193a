use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shroud_core::ast::{Mutability, NodeKind};
use shroud_core::walker::collect;
use shroud_transform::chaotic::{ChaoticPredicate, Variant, SEED_RANGE};
use shroud_transform::opaque_predicate::OpaquePredicate;
use shroud_transform::PassConfig;
use shroud_tests::support::{apply_compiled, compile, init_tracing};

const GATE: &str = r#"pragma solidity ^0.8.20;

contract Gate {
    uint256 private count;

    function bump(uint256 x) public {
        if (x > 5) {
            count += x;
        }
        uint256 i = 0;
        while (i < x) {
            i++;
        }
    }

    function check(uint256 x) public pure returns (bool) {
        if (x == 0) {
            return false;
        }
        return true;
    }
}

interface IGate {
    function bump(uint256 x) external;
}
"#;

const OVERRIDING: &str = r#"pragma solidity ^0.8.20;

contract Base {
    function g(uint256 x) public pure virtual returns (uint256) {
        return x;
    }
}

contract Child is Base {
    function g(uint256 x) public pure override returns (uint256) {
        if (x > 1) {
            return x;
        }
        return 0;
    }
}
"#;

#[test]
fn test_opaque_predicate_guards_every_condition() {
    init_tracing();
    let pass = OpaquePredicate::new(&PassConfig::default());
    let out = apply_compiled(&pass, GATE);
    assert_eq!(out.changes, 3, "two ifs and one while");

    let text = out.source.as_str();
    assert_eq!(text.matches("int256 private __cpm_state_").count(), 1);
    assert_eq!(text.matches("function __cpm_map_").count(), 1);
    assert!(text.contains("(x > 5) && (__cpm_map_"));

    // `check` now reads contract state and must be widened.
    let (_, ast) = compile(text);
    let check = collect(ast.root(), |n, _| {
        n.as_function().is_some_and(|f| f.name == "check")
    })[0];
    assert_eq!(check.as_function().unwrap().mutability, Mutability::View);

    // Interfaces are left alone.
    let interface = &text[text.find("interface IGate").unwrap()..];
    assert!(!interface.contains("__cpm"));
}

#[test]
fn test_reapplying_keeps_one_guard_per_condition() {
    let pass = OpaquePredicate::new(&PassConfig::default());
    let once = apply_compiled(&pass, GATE);
    let twice = apply_compiled(&pass, once.source.as_str());
    assert_eq!(twice.changes, 0);
    assert_eq!(twice.source, once.source);
}

#[test]
fn test_frozen_mutability_is_not_widened() {
    let pass = OpaquePredicate::new(&PassConfig::default());
    let out = apply_compiled(&pass, OVERRIDING);
    assert_eq!(out.changes, 0);
    assert_eq!(out.source.as_str(), OVERRIDING);
}

#[test]
fn test_configured_variants_are_respected() {
    let config = PassConfig {
        opaque_variants: vec![Variant::Even],
        ..PassConfig::default()
    };
    let out = apply_compiled(&OpaquePredicate::new(&config), GATE);
    assert!(out.source.as_str().contains("% int256(2) == int256(0)"));
    assert_eq!(
        collect(compile(out.source.as_str()).1.root(), |n, _| matches!(
            n.kind,
            NodeKind::Function(_)
        ))
        .len(),
        4
    );
}

#[test]
fn test_positive_variant_holds_for_a_thousand_seeds() {
    for i in 0..1000u64 {
        let mut rng = StdRng::seed_from_u64(i);
        let p = ChaoticPredicate::generate("s".into(), "h".into(), &[Variant::Positive], &mut rng);
        assert_eq!(p.variant, Variant::Positive);
        assert!(SEED_RANGE.contains(&p.seed));
        let out = p.evaluate(i128::from(p.seed));
        assert!((20..=119).contains(&out), "seed {} gave {out}", p.seed);
        assert!(p.holds(i128::from(p.seed)));
        let other: i64 = rng.random();
        assert!(p.holds(i128::from(other)));
    }
}
