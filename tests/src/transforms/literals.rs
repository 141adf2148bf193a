//! Integer and boolean disguise, and static data accessors.

use shroud_core::SourceBuffer;
use shroud_transform::booleans::BooleanDisguise;
use shroud_transform::integers::IntegerDisguise;
use shroud_transform::static_data::StaticData;
use shroud_transform::{Pass, PassConfig};
use shroud_tests::support::eval::{call, Value};
use shroud_tests::support::{apply_compiled, init_tracing, rng};

const MATH: &str = r#"pragma solidity ^0.8.20;

contract Math {
    uint256 private constant SCALE = 1000;
    bool private constant STRICT = true;
    uint256[4] private slots;

    function g(uint256 x) public pure returns (uint256) {
        uint256 y = x * 3 + 7;
        if (y > 40) {
            y = y - 40;
        }
        return y % 97 + 2;
    }

    function h(uint256 x) public pure returns (bool) {
        bool flag = true;
        if (x > 3) {
            flag = false;
        }
        return flag;
    }

    function k(uint256 x) public pure returns (uint256) {
        uint256 base = 12;
        require(x != 99, "x");
        base += 5;
        return base * x;
    }
}
"#;

fn check_same(before: &str, after: &str, function: &str, args: &[i128]) {
    for &arg in args {
        let args = [Value::Int(arg)];
        assert_eq!(
            call(before, function, &args).unwrap(),
            call(after, function, &args).unwrap(),
            "{function}({arg})\n{after}"
        );
    }
}

#[test]
fn test_integer_identities_preserve_results() {
    init_tracing();
    let pass = IntegerDisguise::new(&PassConfig::default());
    let out = apply_compiled(&pass, MATH);
    assert!(out.changes >= 8, "only {} literals disguised", out.changes);

    let text = out.source.as_str();
    assert!(text.contains("uint256[4] private slots"), "array lengths stay literal");
    assert!(text.contains("\"x\""));
    check_same(MATH, text, "g", &[0, 1, 11, 12, 40, 1_000_000]);
    check_same(MATH, text, "k", &[0, 3, 98]);
}

#[test]
fn test_integer_cap_limits_rewrites() {
    let config = PassConfig {
        integer_max_per_unit: 2,
        ..PassConfig::default()
    };
    let out = apply_compiled(&IntegerDisguise::new(&config), MATH);
    assert_eq!(out.changes, 2);
}

#[test]
fn test_integer_text_fallback_without_ast() {
    let pass = IntegerDisguise::new(&PassConfig::default());
    assert!(!pass.requires_ast());
    let source = SourceBuffer::new("contract A { function f() public { uint x = 5 + ; } }");
    let out = pass.apply(&source, None, &mut rng()).unwrap();
    assert_eq!(out.changes, 1);
    assert!(!out.source.as_str().contains(" 5 "));
}

#[test]
fn test_boolean_disguise_preserves_results() {
    let pass = BooleanDisguise::new(&PassConfig::default());
    let out = apply_compiled(&pass, MATH);
    assert_eq!(out.changes, 2, "constants keep their literal");
    let text = out.source.as_str();
    assert!(text.contains("STRICT = true"));
    check_same(MATH, text, "h", &[0, 3, 4, 100]);
}

#[test]
fn test_static_data_moves_literals_into_accessors() {
    let pass = StaticData::new();
    let out = apply_compiled(&pass, MATH);
    let text = out.source.as_str();
    assert!(text.contains("function __ints_"));
    assert!(text.contains("function __bools_"));
    assert!(text.contains("require(x != 99"), "guards keep their literals");

    check_same(MATH, text, "g", &[0, 1, 11, 12, 40, 500]);
    check_same(MATH, text, "h", &[0, 3, 4]);
    check_same(MATH, text, "k", &[0, 3, 98]);
}

#[test]
fn test_passes_compose_on_the_same_unit() {
    let ints = IntegerDisguise::new(&PassConfig::default());
    let bools = BooleanDisguise::new(&PassConfig::default());
    let first = apply_compiled(&bools, MATH);
    let second = apply_compiled(&ints, first.source.as_str());
    let text = second.source.as_str();
    check_same(MATH, text, "g", &[2, 13, 41]);
    check_same(MATH, text, "h", &[1, 9]);
}
