//! Hash-based "chaotic map" generators backing opaque predicates.
//!
//! Each variant is a pure function of an `int256` seed whose output range provably satisfies
//! a fixed comparison, so the emitted predicate is a tautology that is not evident from the
//! call site.

use rand::{rngs::StdRng, seq::IndexedRandom, Rng};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Output in [20, 119]; predicate `f(x) > 10`.
    Positive,
    /// Output in [-150, -51]; predicate `f(x) < -10`.
    Negative,
    /// Output in {0, 2, ..., 98}; predicate `f(x) % 2 == 0`.
    Even,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Positive, Variant::Negative, Variant::Even];

    /// Modulus applied to the hash.
    fn modulus(&self) -> u32 {
        match self {
            Variant::Positive | Variant::Negative => 100,
            Variant::Even => 50,
        }
    }
}

/// Lowest and highest seed the generator picks for the state variable.
pub const SEED_RANGE: std::ops::RangeInclusive<i64> = 12_345..=99_999;

/// One per-contract predicate: a state variable, a helper and the variant tying them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaoticPredicate {
    pub state_var: String,
    pub helper_fn: String,
    pub variant: Variant,
    pub seed: i64,
}

impl ChaoticPredicate {
    /// Picks a variant from `variants` (all three when empty) and a seed.
    pub fn generate(
        state_var: String,
        helper_fn: String,
        variants: &[Variant],
        rng: &mut StdRng,
    ) -> Self {
        let pool = if variants.is_empty() {
            &Variant::ALL[..]
        } else {
            variants
        };
        let variant = pool.choose(rng).copied().unwrap_or(Variant::Positive);
        Self {
            state_var,
            helper_fn,
            variant,
            seed: rng.random_range(SEED_RANGE),
        }
    }

    /// State variable declaration, one line.
    pub fn state_declaration(&self) -> String {
        format!(
            "int256 private {} = int256({});",
            self.state_var, self.seed
        )
    }

    /// Helper function definition at the given indentation.
    pub fn helper_definition(&self, indent: &str) -> String {
        let hashed = "uint256(keccak256(abi.encodePacked(val)))";
        let body = match self.variant {
            Variant::Positive => format!("int256({hashed} % uint256(100)) + int256(20)"),
            Variant::Negative => format!("-int256({hashed} % uint256(100)) - int256(51)"),
            Variant::Even => format!("int256({hashed} % uint256(50)) * int256(2)"),
        };
        format!(
            "function {name}(int256 val) internal pure returns (int256) {{\n{indent}    return {body};\n{indent}}}",
            name = self.helper_fn,
        )
    }

    /// The always-true condition.
    pub fn condition(&self) -> String {
        let call = format!("{}({})", self.helper_fn, self.state_var);
        match self.variant {
            Variant::Positive => format!("({call} > int256(10))"),
            Variant::Negative => format!("({call} < -int256(10))"),
            Variant::Even => format!("({call} % int256(2) == int256(0))"),
        }
    }

    /// Off-chain evaluation of the helper for `val`, mirroring the emitted code.
    pub fn evaluate(&self, val: i128) -> i128 {
        let reduced = i128::from(keccak_mod(val, self.variant.modulus()));
        match self.variant {
            Variant::Positive => reduced + 20,
            Variant::Negative => -reduced - 51,
            Variant::Even => reduced * 2,
        }
    }

    /// Off-chain evaluation of [`Self::condition`] for `val`.
    pub fn holds(&self, val: i128) -> bool {
        let out = self.evaluate(val);
        match self.variant {
            Variant::Positive => out > 10,
            Variant::Negative => out < -10,
            Variant::Even => out % 2 == 0,
        }
    }
}

/// `uint256(keccak256(abi.encodePacked(int256(val)))) % modulus`.
fn keccak_mod(val: i128, modulus: u32) -> u32 {
    let fill = if val < 0 { 0xff } else { 0x00 };
    let mut word = [fill; 32];
    word[16..].copy_from_slice(&val.to_be_bytes());
    let digest = Keccak256::digest(word);
    digest
        .iter()
        .fold(0u64, |rem, &b| (rem * 256 + u64::from(b)) % u64::from(modulus)) as u32
}
