use block_template::BlockTemplate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the mining payload blob handed out to stratum clients.
pub const BLOB_LEN: usize = 76;

/// Which proof-of-work path a job targets. Carried on the job so the
/// stratum layer can tag its `algo` field and `MinerDriver` knows which
/// engine to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algo {
    Hash,
    Gap,
}

impl Algo {
    pub fn tag(&self) -> &'static str {
        match self {
            Algo::Hash => "rx/0",
            Algo::Gap => "gap/0",
        }
    }
}

/// A unit of mining work handed out to clients: a payload blob, a
/// pool-facing share target, and a reference to the block template it
/// was derived from.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_id: String,
    pub height: u64,
    pub blob: [u8; BLOB_LEN],
    /// Pool share target, 4-byte little-endian — easier than the full
    /// consensus target for low-powered miners to compare against.
    pub share_target: [u8; 4],
    /// The full `bits` field, retained for submit-time consensus validation.
    pub bits: u32,
    pub seed_hash: String,
    pub algo: Algo,
    pub template: Arc<BlockTemplate>,
    pub created_at_unix: u64,
}

impl Job {
    /// Builds a job from a freshly fetched template. `counter` is the
    /// broker's monotonic job counter; `share_target` is the pool's
    /// configured share difficulty target.
    pub fn new(template: BlockTemplate, counter: u64, share_target: [u8; 4], algo: Algo) -> Self {
        let now = unix_seconds();
        let job_id = format!("{:x}{:08x}", now, counter);
        let blob = build_blob(&template);
        let seed_hash = hex::encode(template.prev_hash.as_bytes());
        Self {
            job_id,
            height: template.height,
            blob,
            share_target,
            bits: template.bits,
            seed_hash,
            algo,
            template: Arc::new(template),
            created_at_unix: now,
        }
    }

    pub fn blob_hex(&self) -> String {
        hex::encode(self.blob)
    }

    pub fn share_target_hex(&self) -> String {
        hex::encode(self.share_target)
    }
}

/// `bytes 0-31` prev_hash, `32-34` version (low 3 bytes LE), `35-38` time
/// LE, `39-42` nonce placeholder (zero), `43-74` first 32 bytes of
/// merkle_root, `75` low byte of bits.
fn build_blob(template: &BlockTemplate) -> [u8; BLOB_LEN] {
    let mut blob = [0u8; BLOB_LEN];
    blob[0..32].copy_from_slice(template.prev_hash.as_bytes());
    let version_le = template.version.to_le_bytes();
    blob[32..35].copy_from_slice(&version_le[0..3]);
    blob[35..39].copy_from_slice(&template.time.to_le_bytes());
    // 39..43 left zeroed: nonce placeholder.
    blob[43..75].copy_from_slice(template.merkle_root.as_bytes());
    blob[75] = template.bits.to_le_bytes()[0];
    blob
}

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Generates successive job counters.
#[derive(Debug, Default)]
pub(crate) struct JobCounter(AtomicU64);

impl JobCounter {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_hashes::Hash;

    fn sample_template() -> BlockTemplate {
        BlockTemplate {
            version: 1,
            prev_hash: Hash::from([0xab; 32]),
            merkle_root: Hash::from([0xcd; 32]),
            time: 1_700_000_000,
            bits: 0x1d00ffff,
            height: 100,
            coinbase_value: 5_000_000_000,
            pay_address: "addr".to_string(),
            state_root: Hash::from([0x11; 32]),
            utxo_root: Hash::from([0x22; 32]),
            prevout_stake: vec![],
            block_sig_delegation: vec![],
        }
    }

    #[test]
    fn blob_layout_matches_the_documented_offsets() {
        let template = sample_template();
        let job = Job::new(template.clone(), 7, [0, 0, 0, 1], Algo::Hash);
        assert_eq!(&job.blob[0..32], template.prev_hash.as_bytes());
        assert_eq!(&job.blob[32..35], &template.version.to_le_bytes()[0..3]);
        assert_eq!(&job.blob[35..39], &template.time.to_le_bytes());
        assert_eq!(&job.blob[39..43], &[0u8; 4]);
        assert_eq!(&job.blob[43..75], template.merkle_root.as_bytes());
        assert_eq!(job.blob[75], template.bits.to_le_bytes()[0]);
    }

    #[test]
    fn job_id_embeds_the_counter_in_its_low_hex_digits() {
        let job = Job::new(sample_template(), 0x2a, [0, 0, 0, 1], Algo::Hash);
        assert!(job.job_id.ends_with("0000002a"));
    }

    #[test]
    fn seed_hash_is_hex_of_prev_hash() {
        let template = sample_template();
        let job = Job::new(template.clone(), 1, [0, 0, 0, 1], Algo::Hash);
        assert_eq!(job.seed_hash, hex::encode(template.prev_hash.as_bytes()));
    }
}
