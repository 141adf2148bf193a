//! Storage-shape passes: locals promoted to state, scalars grouped into a struct.

use shroud_transform::local_state::LocalToState;
use shroud_transform::scalar_struct::{member_name, ScalarGrouping};
use shroud_tests::support::eval::{call, Value};
use shroud_tests::support::{apply_compiled, init_tracing, VAULT};

const LEDGER: &str = r#"pragma solidity ^0.8.20;

contract Ledger {
    uint256 private a;
    uint256 private b;
    bool private flag;
    uint256 public visible;
    uint256 private seeded = 7;

    function run(uint256 x) public returns (uint256) {
        a = x + 1;
        b = a * 2;
        uint256 c = a + b;
        flag = c > 10;
        if (flag) {
            return c + seeded;
        }
        return 0;
    }

    function peek(uint256 x) public view returns (uint256) {
        uint256 d = x + a;
        return d;
    }
}
"#;

fn check_run(before: &str, after: &str) {
    for x in [0, 2, 3, 100] {
        let args = [Value::Int(x)];
        assert_eq!(
            call(before, "run", &args).unwrap(),
            call(after, "run", &args).unwrap(),
            "run({x})\n{after}"
        );
    }
}

#[test]
fn test_locals_of_state_changing_functions_move_to_storage() {
    init_tracing();
    let out = apply_compiled(&LocalToState::new(), LEDGER);
    let text = out.source.as_str();

    assert_eq!(out.changes, 1);
    assert!(text.contains("uint256 private __state_c_1;"));
    assert!(text.contains("__state_c_1 = a + b;"));
    assert!(!text.contains("uint256 c ="));
    // View functions keep their locals.
    assert!(text.contains("uint256 d = x + a;"));
    check_run(LEDGER, text);
}

#[test]
fn test_vault_deposit_local_is_promoted() {
    let out = apply_compiled(&LocalToState::new(), VAULT);
    assert_eq!(out.changes, 1);
    assert!(out.source.as_str().contains("__state_net_1"));
    // `score` is pure.
    assert!(out.source.as_str().contains("uint256 b = a + 1;"));
}

#[test]
fn test_private_scalars_are_grouped() {
    init_tracing();
    let out = apply_compiled(&ScalarGrouping::new(), LEDGER);
    let text = out.source.as_str();

    assert_eq!(out.changes, 3);
    assert!(text.contains("struct ScalarGroup_"));
    assert!(text.contains("internal __scalars_"));
    for name in ["a", "b", "flag"] {
        assert!(text.contains(&member_name(name)), "{name} has no member");
    }
    assert!(!text.contains("uint256 private a;"));
    assert!(text.contains("uint256 public visible;"));
    assert!(text.contains("uint256 private seeded = 7;"));
    check_run(LEDGER, text);
}

#[test]
fn test_storage_passes_compose() {
    let promoted = apply_compiled(&LocalToState::new(), LEDGER);
    let grouped = apply_compiled(&ScalarGrouping::new(), promoted.source.as_str());
    // The promoted local is a plain private scalar too.
    assert_eq!(grouped.changes, 4);
    check_run(LEDGER, grouped.source.as_str());
}

#[test]
fn test_lone_scalar_is_left_alone() {
    let text = r#"pragma solidity ^0.8.20;

contract Single {
    uint256 private only;

    function set(uint256 v) public {
        only = v;
    }
}
"#;
    let out = apply_compiled(&ScalarGrouping::new(), text);
    assert_eq!(out.changes, 0);
    assert_eq!(out.source.as_str(), text);
}

#[test]
fn test_assembly_blocks_grouping() {
    let text = r#"pragma solidity ^0.8.20;

contract Raw {
    uint256 private x;
    uint256 private y;

    function slot() public pure returns (uint256 s) {
        assembly {
            s := 1
        }
    }
}
"#;
    let out = apply_compiled(&ScalarGrouping::new(), text);
    assert_eq!(out.changes, 0);
}
