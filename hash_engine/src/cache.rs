use crate::xoshiro::Xoshiro256PlusPlus;
use crypto_hashes::pow_hash::MixHasher;

/// Size in bytes of one dataset item.
pub const ITEM_SIZE: usize = 8;

/// The shared, key-derived cache. Small enough to keep resident always;
/// also the fallback source of dataset items when no dataset is
/// materialized (LIGHT mode).
pub struct Cache {
    key: [u8; 32],
    bytes: Vec<u8>,
}

impl Cache {
    pub fn derive(key: &[u8; 32], size_bytes: usize) -> Self {
        let mut rng = Xoshiro256PlusPlus::from_seed(*key);
        let mut bytes = vec![0u8; size_bytes];
        for chunk in bytes.chunks_mut(8) {
            let word = rng.next_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        Self { key: *key, bytes }
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Derives dataset item `index` straight from the cache. In LIGHT mode
    /// every access runs this; in FULL mode it runs once per item, at
    /// dataset-build time. The two paths must agree bit-for-bit, which is
    /// exactly what `Dataset::populate` relies on.
    pub fn derive_item(&self, index: u64) -> [u8; ITEM_SIZE] {
        let window = self.bytes.len().max(1);
        let offset = (index as usize).wrapping_mul(ITEM_SIZE) % window;
        let end = (offset + 64).min(self.bytes.len());

        let mut hasher = MixHasher::new(&self.key);
        hasher.mix(&index.to_le_bytes());
        hasher.mix(&self.bytes[offset..end]);
        let digest = hasher.finalize();

        let mut item = [0u8; ITEM_SIZE];
        item.copy_from_slice(&digest.as_bytes()[..ITEM_SIZE]);
        item
    }
}

/// The large, precomputed dataset used by FULL mode. Every entry equals
/// `cache.derive_item(index)` — the dataset is a cache of that function,
/// not an independent source of entropy.
pub struct Dataset {
    items: Vec<u8>,
}

impl Dataset {
    /// Populates the dataset by partitioning item initialization across
    /// `num_threads` worker threads, each owning a disjoint index range.
    /// Returns `None` if the backing allocation cannot be made (caller
    /// should fall back to LIGHT mode).
    pub fn populate(cache: &Cache, size_bytes: usize, num_threads: usize) -> Option<Self> {
        let item_count = size_bytes / ITEM_SIZE;
        let mut items = Vec::new();
        items.try_reserve_exact(item_count * ITEM_SIZE).ok()?;
        items.resize(item_count * ITEM_SIZE, 0u8);

        let num_threads = num_threads.max(1);
        let chunk_items = div_ceil(item_count, num_threads).max(1);

        std::thread::scope(|scope| {
            for (t, chunk) in items.chunks_mut(chunk_items * ITEM_SIZE).enumerate() {
                let base = (t * chunk_items) as u64;
                let cache = &cache;
                scope.spawn(move || {
                    for (i, slot) in chunk.chunks_mut(ITEM_SIZE).enumerate() {
                        let item = cache.derive_item(base + i as u64);
                        slot.copy_from_slice(&item);
                    }
                });
            }
        });

        Some(Self { items })
    }

    pub fn get(&self, index: u64) -> Option<[u8; ITEM_SIZE]> {
        let offset = (index as usize).checked_mul(ITEM_SIZE)?;
        if offset + ITEM_SIZE > self.items.len() {
            return None;
        }
        let mut item = [0u8; ITEM_SIZE];
        item.copy_from_slice(&self.items[offset..offset + ITEM_SIZE]);
        Some(item)
    }

    pub fn len_items(&self) -> usize {
        self.items.len() / ITEM_SIZE
    }
}

fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_derivation_is_deterministic() {
        let key = [5u8; 32];
        let a = Cache::derive(&key, 1024);
        let b = Cache::derive(&key, 1024);
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn dataset_items_match_cache_derivation() {
        let key = [5u8; 32];
        let cache = Cache::derive(&key, 1024);
        let dataset = Dataset::populate(&cache, 256, 4).unwrap();
        for i in 0..dataset.len_items() as u64 {
            assert_eq!(dataset.get(i).unwrap(), cache.derive_item(i));
        }
    }

    #[test]
    fn dataset_get_out_of_range_is_none() {
        let key = [5u8; 32];
        let cache = Cache::derive(&key, 256);
        let dataset = Dataset::populate(&cache, 64, 2).unwrap();
        assert!(dataset.get(dataset.len_items() as u64).is_none());
    }
}
