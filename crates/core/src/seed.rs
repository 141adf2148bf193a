use crate::result::Error;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Key that fixes every random choice a run of passes makes over a Solidity source.
///
/// Only its hash is ever reported; the raw value stays with whoever ran the tool.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    /// Raw key material.
    inner: [u8; 32],
}

impl Seed {
    /// Draws a fresh seed from the thread rng, for runs that don't pass `--seed`.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self { inner: seed }
    }

    /// Parses the 64 hex digits given to `--seed`. `0x` is optional.
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if hex.len() != 64 {
            return Err(Error::InvalidSeedLength(hex.len()));
        }

        let bytes = hex::decode(hex).map_err(|_| Error::InvalidSeedHex)?;
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Ok(Self { inner: seed })
    }

    /// Hex form accepted back by [`Seed::from_hex`].
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.inner))
    }

    /// RNG shared by the passes of one pipeline run.
    ///
    /// The same seed, source text and pass list give byte-identical output.
    pub fn create_deterministic_rng(&self) -> StdRng {
        self.derive_rng(b"SHROUD_SOURCE_OBFUSCATION")
    }

    /// RNG keyed by `label` as well as the seed, so differently labelled streams diverge.
    pub fn derive_rng(&self, label: &[u8]) -> StdRng {
        let mut hasher = Sha3_256::new();
        hasher.update(label);
        hasher.update(self.inner);
        let seed_hash = hasher.finalize();

        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&seed_hash[..8]);
        let rng_seed = u64::from_le_bytes(seed_bytes);

        StdRng::seed_from_u64(rng_seed)
    }

    /// Fingerprint written to reports in place of the seed itself.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(self.inner);
        hasher.finalize().into()
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash()))
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Seed").field(&self.hash_hex()).finish()
    }
}
