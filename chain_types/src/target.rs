use crate::error::ChainError;

/// A 256-bit unsigned proof-of-work target, stored big-endian, compared
/// lexicographically (`meets_target` is exactly that comparison).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HashTarget([u8; 32]);

impl HashTarget {
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_be_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn max() -> Self {
        Self([0xff; 32])
    }

    /// `hash <= target`, as big-endian unsigned integers.
    pub fn meets(&self, hash_be: &[u8; 32]) -> bool {
        hash_be.as_slice() <= self.0.as_slice()
    }

    /// Decodes a Bitcoin-style compact `bits` encoding: the top byte is a
    /// base-256 exponent, the low three bytes are the mantissa.
    pub fn from_compact(bits: u32) -> Result<Self, ChainError> {
        let exponent = (bits >> 24) as i32;
        let mantissa = bits & 0x007f_ffff;
        let is_negative = bits & 0x0080_0000 != 0;
        if is_negative || mantissa == 0 {
            return Err(ChainError::InvalidBits(bits));
        }

        let mut target = [0u8; 32];
        // target = mantissa * 256^(exponent - 3), placed big-endian.
        let mantissa_bytes = mantissa.to_be_bytes();
        let mantissa_be = &mantissa_bytes[1..4]; // low 3 bytes, big-endian
        let shift = exponent - 3;
        if shift >= 0 {
            if shift as usize + 3 > 32 {
                return Err(ChainError::InvalidBits(bits));
            }
            let start = 32 - shift as usize - 3;
            target[start..start + 3].copy_from_slice(mantissa_be);
        } else {
            let drop = (-shift) as usize * 8;
            if drop >= 24 {
                return Ok(Self([0u8; 32]));
            }
            let value = u32::from_be_bytes([0, mantissa_be[0], mantissa_be[1], mantissa_be[2]]) >> drop;
            target[28..32].copy_from_slice(&value.to_be_bytes());
        }
        Ok(Self(target))
    }

    /// Encodes this target back into the Bitcoin-style compact form.
    pub fn to_compact(&self) -> u32 {
        let first_nonzero = self.0.iter().position(|&b| b != 0);
        let Some(first_nonzero) = first_nonzero else {
            return 0;
        };
        let mut size = 32 - first_nonzero;
        let mut mantissa_bytes = [0u8; 3];
        let take = |idx: usize| -> u8 {
            if idx < 32 {
                self.0[idx]
            } else {
                0
            }
        };
        // Mantissa is the first 3 significant bytes; if the MSB of the
        // mantissa would look negative (>= 0x80), shift right by one byte.
        if take(first_nonzero) & 0x80 != 0 {
            mantissa_bytes[0] = 0;
            mantissa_bytes[1] = take(first_nonzero);
            mantissa_bytes[2] = take(first_nonzero + 1);
            size += 1;
        } else {
            mantissa_bytes[0] = take(first_nonzero);
            mantissa_bytes[1] = take(first_nonzero + 1);
            mantissa_bytes[2] = take(first_nonzero + 2);
        }
        let mantissa = u32::from_be_bytes([0, mantissa_bytes[0], mantissa_bytes[1], mantissa_bytes[2]]);
        ((size as u32) << 24) | mantissa
    }
}

/// Fixed-point scale used by the merit <-> compact conversion below. Chosen
/// so merit values in the sieve engine's working range (single digits up to
/// a few tens) retain sub-percent precision.
const MERIT_SCALE: f64 = (1u64 << 24) as f64;

/// Expands a compact merit encoding into its floating-point value.
pub fn compact_to_merit(compact: u32) -> f64 {
    compact as f64 / MERIT_SCALE
}

/// Compacts a merit value for storage/transmission. Inverse of
/// `compact_to_merit` for values that round-trip through the same scale.
pub fn merit_to_compact(merit: f64) -> u32 {
    (merit * MERIT_SCALE).round() as u32
}

/// An opaque key that gates `HashContext` reuse: the hash engine must
/// rekey whenever the node's current epoch key changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochKey(Vec<u8>);

impl EpochKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ChainError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ChainError::EmptyEpochKey);
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for EpochKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_compact_bits_decode_to_expected_target() {
        // Bitcoin's classic difficulty-1 target.
        let target = HashTarget::from_compact(0x1d00ffff).unwrap();
        let mut expected = [0u8; 32];
        expected[4..7].copy_from_slice(&[0xff, 0xff, 0x00]);
        assert_eq!(target.as_be_bytes(), &expected);
    }

    #[test]
    fn compact_round_trips_for_typical_targets() {
        for bits in [0x1d00ffffu32, 0x1c00a0de, 0x207fffff] {
            let target = HashTarget::from_compact(bits).unwrap();
            assert_eq!(target.to_compact(), bits);
        }
    }

    #[test]
    fn from_compact_rejects_oversized_exponent_instead_of_panicking() {
        // exponent 34 would shift the mantissa entirely out of a 32-byte target.
        assert!(HashTarget::from_compact(0x2500_0001).is_err());
        assert!(HashTarget::from_compact(0xff00_0001).is_err());
    }

    #[test]
    fn meets_is_be_unsigned_comparison() {
        let target = HashTarget::from_compact(0x1d00ffff).unwrap();
        let low_hash = [0u8; 32];
        assert!(target.meets(&low_hash));
        let high_hash = [0xff; 32];
        assert!(!target.meets(&high_hash));
    }

    #[test]
    fn merit_compact_round_trips_over_range() {
        for x in (0..=100_000_000u32).step_by(999_983) {
            assert_eq!(merit_to_compact(compact_to_merit(x)), x);
        }
    }

    #[test]
    fn epoch_key_rejects_empty() {
        assert!(EpochKey::new(Vec::<u8>::new()).is_err());
        assert!(EpochKey::new(vec![1, 2, 3]).is_ok());
    }
}
