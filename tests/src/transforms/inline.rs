//! Modifier and single-return function inlining.

use shroud_transform::inline::Inliner;
use shroud_tests::support::eval::{call, Value};
use shroud_tests::support::{apply_compiled, init_tracing, VAULT};

const FEES: &str = r#"pragma solidity ^0.8.20;

contract Fees {
    uint256 private rate;

    modifier positive(uint256 v) {
        require(v > 0, "zero");
        _;
    }

    function scaled(uint256 x) private pure returns (uint256) {
        return x * 3 + 1;
    }

    function run(uint256 a) public returns (uint256) {
        rate = 2;
        return scaled(a) + scaled(a + rate);
    }

    function half(uint256 n) public pure positive(n) returns (uint256) {
        return n / 2;
    }
}
"#;

#[test]
fn test_vault_modifier_and_helper_are_inlined() {
    init_tracing();
    let out = apply_compiled(&Inliner::new(), VAULT);
    let text = out.source.as_str();

    assert_eq!(out.changes, 2);
    assert!(text.contains("function setPaused(bool value) public {"));
    let set_paused = &text[text.find("function setPaused").unwrap()..];
    let body = &set_paused[..set_paused.find("function score").unwrap()];
    assert!(body.contains("require(msg.sender == owner, \"not owner\");"));
    assert!(body.contains("paused = value;"));

    assert!(text.contains("uint256 net = amount - uint256(amount * fee / 100);"));
    // The definitions stay; only their uses move.
    assert!(text.contains("modifier onlyOwner()"));
    assert!(text.contains("function feeFor(uint256 amount)"));
}

#[test]
fn test_inlined_calls_compute_the_same() {
    let out = apply_compiled(&Inliner::new(), FEES);
    let text = out.source.as_str();

    assert!(text.contains("uint256(a * 3 + 1)"));
    assert!(text.contains("uint256((a + rate) * 3 + 1)"));
    for a in [0, 1, 7, 1000] {
        let args = [Value::Int(a)];
        assert_eq!(call(FEES, "run", &args).unwrap(), call(text, "run", &args).unwrap());
    }
}

#[test]
fn test_inlined_modifier_still_guards() {
    let out = apply_compiled(&Inliner::new(), FEES);
    let text = out.source.as_str();

    assert!(text.contains("function half(uint256 n) public pure returns (uint256) {"));
    assert!(text.contains("require(n > 0, \"zero\");"));
    assert_eq!(call(text, "half", &[Value::Int(9)]).unwrap(), Value::Int(4));
    assert!(call(text, "half", &[Value::Int(0)]).is_err());
}

#[test]
fn test_recursive_and_multi_statement_helpers_stay() {
    let text = r#"pragma solidity ^0.8.20;

contract Deep {
    function fact(uint256 n) internal pure returns (uint256) {
        return n == 0 ? 1 : n * fact(n - 1);
    }

    function twice(uint256 n) internal pure returns (uint256) {
        uint256 m = n * 2;
        return m;
    }

    function run(uint256 n) public pure returns (uint256) {
        return fact(n) + twice(n);
    }
}
"#;
    let out = apply_compiled(&Inliner::new(), text);
    assert_eq!(out.changes, 0);
    assert_eq!(out.source.as_str(), text);
}
