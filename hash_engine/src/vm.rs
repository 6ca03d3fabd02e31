use crate::cache::{Cache, Dataset, ITEM_SIZE};
use crypto_hashes::pow_hash::MixHasher;
use std::sync::Arc;

/// Number of dataset-derived items folded into each hash. A stand-in for
/// RandomX's full instruction-interpreting VM: enough indirection through
/// memory to make pure-ALU shortcuts unprofitable, without the bytecode
/// interpreter itself.
const MIX_ROUNDS: u64 = 8;

/// A per-thread execution context bound to a cache and, in FULL mode, a
/// shared dataset. `dataset_item_count` is fixed at construction from the
/// engine's configured dataset size — not from the dataset's actual
/// presence — so LIGHT and FULL walk the identical index sequence.
pub struct Vm {
    cache: Arc<Cache>,
    dataset: Option<Arc<Dataset>>,
    dataset_item_count: u64,
}

impl Vm {
    pub fn new(cache: Arc<Cache>, dataset: Option<Arc<Dataset>>, dataset_item_count: u64) -> Self {
        Self { cache, dataset, dataset_item_count: dataset_item_count.max(1) }
    }

    pub fn compute(&self, input: &[u8]) -> [u8; 32] {
        let mut mixer = MixHasher::new(self.cache.key());
        mixer.mix(input);

        let seed_bytes = crypto_hashes::double_sha256(input);
        let mut walk = u64::from_le_bytes(seed_bytes[0..8].try_into().unwrap());

        for _ in 0..MIX_ROUNDS {
            let item = self.item(walk % self.dataset_item_count);
            mixer.mix(&item);
            walk = walk.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(1);
        }

        *mixer.finalize().as_bytes()
    }

    fn item(&self, index: u64) -> [u8; ITEM_SIZE] {
        match &self.dataset {
            Some(dataset) => dataset.get(index).unwrap_or_else(|| self.cache.derive_item(index)),
            None => self.cache.derive_item(index),
        }
    }
}
