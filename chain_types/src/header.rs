use crate::error::{ChainError, ChainResult};
use crypto_hashes::Hash;

/// Byte offset of the `nonce` field. Fixed regardless of the variable-length
/// fields that follow it, so miners can patch the nonce in place without
/// re-serializing the whole header.
pub const NONCE_OFFSET: usize = 4 + 32 + 32 + 4 + 4;

/// Length, in bytes, of the trailing "legacy gap fields" block
/// (`shift` + `adder` + `gap_size`) that the sieve engine excludes from its
/// base-prime hash.
const GAP_FIELDS_LEN: usize = 4 + 32 + 4;

/// A block header as handed to the mining subsystem by the external node.
///
/// The byte layout is fixed and is what gets hashed: version (i32 LE),
/// prev_hash (32 B), merkle_root (32 B), time (u32 LE), bits (u32 LE),
/// nonce (u32 LE), state_root (32 B), utxo_root (32 B), prevout_stake
/// (length-prefixed), block_sig_delegation (length-prefixed), shift (u32 LE),
/// adder (32 B), gap_size (u32 LE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    pub state_root: Hash,
    pub utxo_root: Hash,
    pub prevout_stake: Vec<u8>,
    pub block_sig_delegation: Vec<u8>,
    pub shift: u32,
    pub adder: Hash,
    pub gap_size: u32,
}

impl BlockHeader {
    /// Serializes the header to its fixed wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            4 + 32 + 32 + 4 + 4 + 4 + 32 + 32
                + 4 + self.prevout_stake.len()
                + 4 + self.block_sig_delegation.len()
                + GAP_FIELDS_LEN,
        );
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.prev_hash.as_bytes());
        buf.extend_from_slice(self.merkle_root.as_bytes());
        buf.extend_from_slice(&self.time.to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(self.state_root.as_bytes());
        buf.extend_from_slice(self.utxo_root.as_bytes());
        write_var_field(&mut buf, &self.prevout_stake);
        write_var_field(&mut buf, &self.block_sig_delegation);
        buf.extend_from_slice(&self.shift.to_le_bytes());
        buf.extend_from_slice(self.adder.as_bytes());
        buf.extend_from_slice(&self.gap_size.to_le_bytes());
        debug_assert_eq!(u32::from_le_bytes(buf[NONCE_OFFSET..NONCE_OFFSET + 4].try_into().unwrap()), self.nonce);
        buf
    }

    /// Parses a header from its fixed wire layout.
    pub fn from_bytes(buf: &[u8]) -> ChainResult<Self> {
        let fixed_prefix = 4 + 32 + 32 + 4 + 4 + 4 + 32 + 32;
        if buf.len() < fixed_prefix {
            return Err(ChainError::HeaderTooShort { needed: fixed_prefix, got: buf.len() });
        }
        let mut pos = 0usize;
        let version = i32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let prev_hash = Hash::try_from_slice(&buf[pos..pos + 32]).map_err(|_| ChainError::HeaderTooShort { needed: pos + 32, got: buf.len() })?;
        pos += 32;
        let merkle_root = Hash::try_from_slice(&buf[pos..pos + 32]).unwrap();
        pos += 32;
        let time = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let bits = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let nonce = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let state_root = Hash::try_from_slice(&buf[pos..pos + 32]).unwrap();
        pos += 32;
        let utxo_root = Hash::try_from_slice(&buf[pos..pos + 32]).unwrap();
        pos += 32;

        let (prevout_stake, next) = read_var_field(buf, pos)?;
        pos = next;
        let (block_sig_delegation, next) = read_var_field(buf, pos)?;
        pos = next;

        if buf.len() < pos + GAP_FIELDS_LEN {
            return Err(ChainError::HeaderTooShort { needed: pos + GAP_FIELDS_LEN, got: buf.len() });
        }
        let shift = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let adder = Hash::try_from_slice(&buf[pos..pos + 32]).unwrap();
        pos += 32;
        let gap_size = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());

        Ok(Self {
            version,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
            state_root,
            utxo_root,
            prevout_stake,
            block_sig_delegation,
            shift,
            adder,
            gap_size,
        })
    }

    /// Serializes the header with the trailing shift/adder/gap_size fields
    /// stripped. The sieve engine's base prime is derived from this byte
    /// sequence, never from the full header.
    pub fn without_gap_fields(&self) -> Vec<u8> {
        let mut full = self.to_bytes();
        let new_len = full.len() - GAP_FIELDS_LEN;
        full.truncate(new_len);
        full
    }

    /// Returns a copy of this header with `nonce` replaced, as mining
    /// threads do when trying successive nonces against their own
    /// thread-local header copy.
    pub fn with_nonce(&self, nonce: u32) -> Self {
        Self { nonce, ..self.clone() }
    }
}

fn write_var_field(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u32).to_le_bytes());
    buf.extend_from_slice(field);
}

fn read_var_field(buf: &[u8], pos: usize) -> ChainResult<(Vec<u8>, usize)> {
    if buf.len() < pos + 4 {
        return Err(ChainError::TruncatedVarField);
    }
    let len = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
    let start = pos + 4;
    if buf.len() < start + len {
        return Err(ChainError::TruncatedVarField);
    }
    Ok((buf[start..start + len].to_vec(), start + len))
}
