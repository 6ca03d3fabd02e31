//! Shared 32-byte hash type and hash-writer utilities used across the
//! mining subsystem: block header digests, the memory-hard hash engine's
//! internal mixing, and the sieve engine's base-prime derivation.

pub mod hasher;
pub mod pow_hash;

pub use hasher::{double_sha256, sha256, HashWriter, Hashable};
pub use pow_hash::MixHasher;

use sha2::Digest;
use std::fmt;
use std::hash::Hash as StdHash;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

pub const HASH_SIZE: usize = 32;

/// A 32-byte hash wrapper used across the project.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Creates a hash from a 32-byte array
    pub fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Creates a zeroed hash
    pub fn zeroed() -> Self {
        Self([0u8; 32])
    }

    /// Const constructor returning a zeroed Hash. Can be used in const contexts.
    pub const fn zeroed_const() -> Self {
        Self([0u8; 32])
    }

    /// Tries to create a Hash from a slice of bytes
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, std::array::TryFromSliceError> {
        let array: [u8; 32] = slice.try_into()?;
        Ok(Self(array))
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash::from(bytes)
    }
}

impl From<Hash> for [u8; 32] {
    fn from(h: Hash) -> Self {
        h.0
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let array: [u8; 32] = slice.try_into()?;
        Ok(Self(array))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl StdHash for Hash {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let mut le = [0u8; 8];
        le.copy_from_slice(&self.0[24..32]);
        let v = u64::from_le_bytes(le);
        v.hash(state);
    }
}

impl Deref for Hash {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Hash {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl hasher::Hashable for Hash {
    fn hash_into(&self, state: &mut sha2::Sha256) {
        state.update(&self.0);
    }
}

/// Big-endian unsigned comparison of two 32-byte digests: `lhs <= rhs`.
///
/// Used by the hash engine's `meets_target` and by share/block validation —
/// both compare a hash against a 256-bit target under the same rule.
pub fn meets_target_be(lhs: &[u8; 32], rhs: &[u8; 32]) -> bool {
    lhs.as_slice() <= rhs.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meets_target_is_be_lexicographic() {
        let low = Hash::from([0u8; 32]);
        let mut high = [0u8; 32];
        high[31] = 1;
        let high = Hash::from(high);
        assert!(meets_target_be(low.as_bytes(), high.as_bytes()));
        assert!(!meets_target_be(high.as_bytes(), low.as_bytes()));
        assert!(meets_target_be(low.as_bytes(), low.as_bytes()));
    }
}
