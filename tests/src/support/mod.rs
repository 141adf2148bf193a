
use rand::rngs::StdRng;
use shroud_core::seed::Seed;
use shroud_core::{AstProvider, SourceAst, SourceBuffer};
use shroud_transform::{Pass, PassOutput};

pub use minisolc::{MiniSolc, NoCompiler};

pub const SEED_HEX: &str = "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";

/// A small contract touching every pass: a modifier, a single-return helper, branches,
/// a loop, literals, scalars and comments.
pub const VAULT: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

/// @title Vault
contract Vault {
    address private owner;
    uint256 private total;
    uint256 private fee;
    bool private paused;

    event Deposited(address indexed from, uint256 amount);

    modifier onlyOwner() {
        require(msg.sender == owner, "not owner");
        _;
    }

    constructor() {
        owner = msg.sender;
        fee = 3;
    }

    // Fee for an amount.
    function feeFor(uint256 amount) internal view returns (uint256) {
        return amount * fee / 100;
    }

    function deposit(uint256 amount) public {
        /* guard */
        require(!paused, "paused");
        uint256 net = amount - feeFor(amount);
        if (net > 1000) {
            total += net;
        } else {
            total += net + 1;
        }
        emit Deposited(msg.sender, net);
    }

    function setPaused(bool value) public onlyOwner {
        paused = value;
    }

    function score(uint256 a) public pure returns (uint256) {
        uint256 b = a + 1;
        uint256 i = 0;
        while (i < 3) {
            b += i;
            i++;
        }
        if (b > 10) {
            return b;
        }
        return 0;
    }
}
"#;

/// Installs a test subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .with_test_writer()
        .try_init();
}

pub fn seed() -> Seed {
    Seed::from_hex(SEED_HEX).expect("fixture seed")
}

pub fn rng() -> StdRng {
    seed().create_deterministic_rng()
}

/// Compiles `text` with [`MiniSolc`], panicking with the parse error on failure.
pub fn compile(text: &str) -> (SourceBuffer, SourceAst) {
    let source = SourceBuffer::new(text);
    let ast = MiniSolc
        .compile(&source)
        .unwrap_or_else(|e| panic!("fixture does not compile: {e}\n{text}"));
    (source, ast)
}

/// Runs one pass over `text` with its AST and checks the result still compiles.
pub fn apply_compiled(pass: &dyn Pass, text: &str) -> PassOutput {
    let (source, ast) = compile(text);
    let out = pass
        .apply(&source, Some(&ast), &mut rng())
        .unwrap_or_else(|e| panic!("{} failed: {e}", pass.name()));
    if let Err(e) = MiniSolc.compile(&out.source) {
        panic!("{} output does not compile: {e}\n{}", pass.name(), out.source.as_str());
    }
    out
}
