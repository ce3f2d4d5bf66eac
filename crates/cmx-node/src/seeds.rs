//! Seed sources for local runs.
//!
//! Production deployments feed seeds from an external randomness beacon;
//! the engines only ever see the resulting [`Seed`] values.

use cmx_types::Seed;

const CHAIN_DOMAIN: &str = "cmx 2024-01 seed hash chain";

pub trait SeedSource: Send {
    fn next_seed(&mut self) -> Seed;
}

/// Deterministic BLAKE3 hash chain: `s[n+1] = H(s[n])` under a fixed key
/// derivation context, starting from a genesis value.
///
/// Predictable by anyone who knows the genesis; suitable for simulation and
/// tests, not for adversarial settings.
#[derive(Debug, Clone)]
pub struct HashChainSeeds {
    current: [u8; 32],
    issued: u64,
}

impl HashChainSeeds {
    pub fn new(genesis: impl AsRef<[u8]>) -> Self {
        Self {
            current: blake3::derive_key(CHAIN_DOMAIN, genesis.as_ref()),
            issued: 0,
        }
    }

    /// Number of seeds handed out so far
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

impl SeedSource for HashChainSeeds {
    fn next_seed(&mut self) -> Seed {
        self.current = blake3::derive_key(CHAIN_DOMAIN, &self.current);
        self.issued += 1;
        Seed::from_bytes(self.current)
    }
}
