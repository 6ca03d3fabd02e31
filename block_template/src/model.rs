use chain_types::BlockHeader;
use crypto_hashes::Hash;

/// A block template as handed out by the external node. The mining
/// subsystem fills in `nonce`/`shift`/`adder`/`gap_size` and hands the
/// resulting header back via `submit_solution`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    pub version: i32,
    pub prev_hash: Hash,
    pub merkle_root: Hash,
    pub time: u32,
    pub bits: u32,
    pub height: u64,
    pub coinbase_value: u64,
    pub pay_address: String,
    pub state_root: Hash,
    pub utxo_root: Hash,
    pub prevout_stake: Vec<u8>,
    pub block_sig_delegation: Vec<u8>,
}

impl BlockTemplate {
    /// Builds the header a miner works against. `nonce`, `shift`, `adder`
    /// and `gap_size` are left zeroed — the engine that finds a solution
    /// fills them in before calling back into `submit_solution`.
    pub fn to_header(&self) -> BlockHeader {
        BlockHeader {
            version: self.version,
            prev_hash: self.prev_hash,
            merkle_root: self.merkle_root,
            time: self.time,
            bits: self.bits,
            nonce: 0,
            state_root: self.state_root,
            utxo_root: self.utxo_root,
            prevout_stake: self.prevout_stake.clone(),
            block_sig_delegation: self.block_sig_delegation.clone(),
            shift: 0,
            adder: Hash::zeroed(),
            gap_size: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlockTemplate {
        BlockTemplate {
            version: 1,
            prev_hash: Hash::from([1u8; 32]),
            merkle_root: Hash::from([2u8; 32]),
            time: 1_700_000_000,
            bits: 0x1d00ffff,
            height: 12345,
            coinbase_value: 5_000_000_000,
            pay_address: "addr1example".to_string(),
            state_root: Hash::from([3u8; 32]),
            utxo_root: Hash::from([4u8; 32]),
            prevout_stake: vec![],
            block_sig_delegation: vec![],
        }
    }

    #[test]
    fn to_header_carries_template_fields_and_zeroes_gap_fields() {
        let template = sample();
        let header = template.to_header();
        assert_eq!(header.version, template.version);
        assert_eq!(header.prev_hash, template.prev_hash);
        assert_eq!(header.merkle_root, template.merkle_root);
        assert_eq!(header.bits, template.bits);
        assert_eq!(header.nonce, 0);
        assert_eq!(header.shift, 0);
        assert_eq!(header.gap_size, 0);
        assert_eq!(header.adder, Hash::zeroed());
    }
}
