use shroud_core::ast::NodeKind;
use shroud_core::walker::collect;
use shroud_transform::flatten::{Exit, Flattener, Skip, EXIT};
use shroud_transform::{Pass, PassConfig};
use shroud_tests::support::eval::{call, Value};
use shroud_tests::support::{apply_compiled, compile, init_tracing, VAULT};

const BRANCHY: &str = r#"pragma solidity ^0.8.20;

contract Branchy {
    function f(uint256 a) public pure returns (uint256) {
        uint256 b = a + 1;
        if (b > 10) {
            return b;
        }
        return 0;
    }

    function tiny(uint256 a) public pure returns (uint256) {
        return a;
    }

    function asm(uint256 a) public pure returns (uint256 r) {
        r = a;
        assembly { r := add(r, 1) }
    }

    function pointer(uint256[] storage xs) internal view returns (uint256) {
        uint256[] storage ys = xs;
        return ys.length;
    }
}
"#;

fn lower(name: &str) -> Result<shroud_transform::flatten::Dispatcher, Skip> {
    let (source, ast) = compile(BRANCHY);
    let function = collect(ast.root(), |n, _| {
        n.as_function().is_some_and(|f| f.name == name)
    })[0];
    Flattener::new(&PassConfig::default())
        .lower(&source, function)
        .unwrap()
}

#[test]
fn test_branch_becomes_dispatcher_arms() {
    let dispatcher = lower("f").unwrap();
    assert_eq!(dispatcher.entry, 1);
    assert_eq!(dispatcher.hoisted.len(), 1);
    assert_eq!(dispatcher.hoisted[0].declaration, "uint256 b;");

    // entry assigns b, then one branch block, then two returning blocks.
    assert_eq!(dispatcher.blocks.len(), 4);
    let ids: Vec<usize> = dispatcher.blocks.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    for block in &dispatcher.blocks {
        for succ in match &block.exit {
            Exit::Goto(n) => vec![*n],
            Exit::Branch { on_true, on_false, .. } => vec![*on_true, *on_false],
            Exit::Terminal => vec![],
        } {
            assert!(succ == EXIT || ids.contains(&succ), "dangling {succ}");
        }
    }
    assert!(matches!(dispatcher.blocks[0].exit, Exit::Goto(2)));
    assert!(matches!(dispatcher.blocks[1].exit, Exit::Branch { .. }));
    let terminals = dispatcher
        .blocks
        .iter()
        .filter(|b| b.exit == Exit::Terminal)
        .count();
    assert_eq!(terminals, 2);
}

#[test]
fn test_skip_policy() {
    assert_eq!(lower("tiny").unwrap_err(), Skip::TooSmall);
    assert_eq!(lower("asm").unwrap_err(), Skip::InlineAssembly);
    assert_eq!(lower("pointer").unwrap_err(), Skip::PointerLocal("ys".into()));
}

#[test]
fn test_flattened_function_keeps_behavior() {
    init_tracing();
    let pass = Flattener::new(&PassConfig::default());
    let out = apply_compiled(&pass, BRANCHY);
    assert_eq!(out.changes, 1);
    let text = out.source.as_str();
    assert!(text.contains("__cf_state_"));
    assert!(text.contains("while (__cf_state_"));

    for (input, expected) in [(10, 11), (1, 0), (9, 0), (100, 101)] {
        let before = call(BRANCHY, "f", &[Value::Int(input)]).unwrap();
        let after = call(text, "f", &[Value::Int(input)]).unwrap();
        assert_eq!(before, Value::Int(expected));
        assert_eq!(after, before, "f({input})");
    }
}

const ELSE_BRANCH: &str = r#"pragma solidity ^0.8.20;

contract Choice {
    function f(uint a) public pure returns (uint) {
        uint x = a + 1;
        if (x > 5) {
            return x;
        } else {
            return 0;
        }
    }
}
"#;

#[test]
fn test_else_branch_lowers_to_two_terminal_arms() {
    init_tracing();
    let (source, ast) = compile(ELSE_BRANCH);
    let function = collect(ast.root(), |n, _| n.as_function().is_some_and(|f| f.name == "f"))[0];
    let dispatcher = Flattener::new(&PassConfig::default())
        .lower(&source, function)
        .unwrap()
        .unwrap();
    assert_eq!(dispatcher.hoisted[0].declaration, "uint x;");
    assert_eq!(dispatcher.blocks.len(), 4);
    let branch = dispatcher
        .blocks
        .iter()
        .find(|b| matches!(b.exit, Exit::Branch { .. }))
        .unwrap();
    let Exit::Branch { on_true, on_false, .. } = &branch.exit else {
        unreachable!()
    };
    assert_ne!(on_true, on_false);
    for arm in [*on_true, *on_false] {
        let block = dispatcher.blocks.iter().find(|b| b.id == arm).unwrap();
        assert_eq!(block.exit, Exit::Terminal);
    }

    let out = apply_compiled(&Flattener::new(&PassConfig::default()), ELSE_BRANCH);
    assert_eq!(out.changes, 1);
    let text = out.source.as_str();
    assert!(!text.contains("uint x = a + 1;"));
    for (input, expected) in [(10, 11), (1, 0), (4, 0), (5, 6)] {
        assert_eq!(
            call(text, "f", &[Value::Int(input)]).unwrap(),
            Value::Int(expected),
            "f({input})\n{text}"
        );
    }
}

#[test]
fn test_loops_are_copied_as_blocks() {
    let pass = Flattener::new(&PassConfig::default());
    let out = apply_compiled(&pass, VAULT);
    let (_, ast) = compile(out.source.as_str());
    let score = collect(ast.root(), |n, _| {
        n.as_function().is_some_and(|f| f.name == "score")
    })[0];
    let loops = collect(score, |n, _| matches!(n.kind, NodeKind::Loop(_)));
    // The dispatcher loop plus the original `while`.
    assert_eq!(loops.len(), 2);

    for a in [0, 1, 7, 8, 50] {
        assert_eq!(
            call(VAULT, "score", &[Value::Int(a)]).unwrap(),
            call(out.source.as_str(), "score", &[Value::Int(a)]).unwrap(),
            "score({a})"
        );
    }
}

#[test]
fn test_same_seed_same_layout() {
    let pass = Flattener::new(&PassConfig::default());
    let first = apply_compiled(&pass, BRANCHY);
    let second = apply_compiled(&pass, BRANCHY);
    assert_eq!(first.source, second.source);
    assert_eq!(pass.name(), "Flatten");
}
