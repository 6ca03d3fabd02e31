use crate::Hash;

/// Keyed BLAKE3 mixing primitive shared by the memory-hard hash engine's
/// per-round VM mixing and the sieve engine's base-prime derivation.
///
/// Construction mirrors the write-then-finalize-with-nonce shape of a
/// classic proof-of-work hash writer: seed material goes in once at
/// construction, then `mix`/`finalize_with_nonce` can be called repeatedly
/// (once per round, once per nonce) without re-hashing the seed.
#[derive(Clone)]
pub struct MixHasher {
    keyed: blake3::Hasher,
}

impl MixHasher {
    /// `key` is 32 bytes derived from the epoch (see `hash_engine::rekey_if_needed`).
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            keyed: blake3::Hasher::new_keyed(key),
        }
    }

    /// Mixes one round's worth of state into the hasher without finalizing.
    pub fn mix(&mut self, block: &[u8]) -> &mut Self {
        self.keyed.update(block);
        self
    }

    /// Finalizes a 32-byte digest for the given nonce without consuming `self`,
    /// so the same seeded state can be reused across a nonce range.
    pub fn finalize_with_nonce(&self, nonce: u64) -> Hash {
        let mut h = self.keyed.clone();
        h.update(&nonce.to_le_bytes());
        Hash::from(*h.finalize().as_bytes())
    }

    pub fn finalize(&self) -> Hash {
        Hash::from(*self.keyed.clone().finalize().as_bytes())
    }
}
