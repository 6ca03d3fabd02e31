use crate::cache::{Cache, Dataset, ITEM_SIZE};
use crate::vm::Vm;
use chain_types::{BlockHeader, EpochKey, HashTarget};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashEngineError {
    #[error("cache size must be at least {min} bytes, got {got}")]
    CacheTooSmall { min: usize, got: usize },
    #[error("hash engine has not been initialized")]
    NotInitialized,
    #[error("rekey requested while mining is active")]
    RekeyWhileMining,
    #[error("mining is already active")]
    AlreadyMining,
    #[error("num_threads must be greater than zero")]
    ZeroThreads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Light,
    Full,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub cache_size_bytes: usize,
    pub dataset_size_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_size_bytes: 2 * 1024 * 1024,
            dataset_size_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

const MIN_CACHE_SIZE_BYTES: usize = 64;

struct EngineState {
    key: EpochKey,
    mode: Mode,
    safe_mode: bool,
    cache: Arc<Cache>,
    dataset: Option<Arc<Dataset>>,
    dataset_item_count: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct HashEngineStatus {
    pub initialized: bool,
    pub mode: Option<Mode>,
    pub mining_active: bool,
    pub hashrate: f64,
}

/// Component R: a memory-hard hash engine keyed by an epoch seed, with
/// light (cache-only) and full (dataset-preloaded) execution modes.
pub struct HashEngine {
    config: EngineConfig,
    state: Mutex<Option<EngineState>>,
    validation_vm: Mutex<Option<Vm>>,

    stop_requested: Arc<AtomicBool>,
    mining_active: AtomicBool,
    session_hash_count: Arc<AtomicU64>,
    session_start: Mutex<Option<Instant>>,
    last_hashrate: Mutex<f64>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl HashEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
            validation_vm: Mutex::new(None),
            stop_requested: Arc::new(AtomicBool::new(false)),
            mining_active: AtomicBool::new(false),
            session_hash_count: Arc::new(AtomicU64::new(0)),
            session_start: Mutex::new(None),
            last_hashrate: Mutex::new(0.0),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Idempotent for the same key/mode/safe_mode; tears down and
    /// reinitializes otherwise.
    pub fn init(&self, key: &EpochKey, mode: Mode, safe_mode: bool) -> Result<(), HashEngineError> {
        if self.config.cache_size_bytes < MIN_CACHE_SIZE_BYTES {
            return Err(HashEngineError::CacheTooSmall {
                min: MIN_CACHE_SIZE_BYTES,
                got: self.config.cache_size_bytes,
            });
        }

        {
            let guard = self.state.lock().unwrap();
            if let Some(existing) = guard.as_ref() {
                if existing.key == *key && existing.mode == mode && existing.safe_mode == safe_mode {
                    return Ok(());
                }
            }
        }

        let key_bytes = key_to_array(key);
        let cache = Arc::new(Cache::derive(&key_bytes, self.config.cache_size_bytes));
        let dataset_item_count = (self.config.dataset_size_bytes / ITEM_SIZE).max(1) as u64;

        let (effective_mode, dataset) = match mode {
            Mode::Light => (Mode::Light, None),
            Mode::Full => {
                let threads = num_cpus::get();
                match Dataset::populate(&cache, self.config.dataset_size_bytes, threads) {
                    Some(dataset) => (Mode::Full, Some(Arc::new(dataset))),
                    None => {
                        log::warn!("dataset allocation failed, downgrading to LIGHT mode");
                        (Mode::Light, None)
                    }
                }
            }
        };

        log::info!("hash engine initialized: mode={:?} safe_mode={}", effective_mode, safe_mode);

        let mut guard = self.state.lock().unwrap();
        *guard = Some(EngineState {
            key: key.clone(),
            mode: effective_mode,
            safe_mode,
            cache,
            dataset,
            dataset_item_count,
        });
        drop(guard);

        *self.validation_vm.lock().unwrap() = None;
        Ok(())
    }

    pub fn rekey_if_needed(&self, key: &EpochKey) -> Result<(), HashEngineError> {
        if self.mining_active.load(Ordering::SeqCst) {
            return Err(HashEngineError::RekeyWhileMining);
        }

        let (mode, safe_mode) = {
            let guard = self.state.lock().unwrap();
            let state = guard.as_ref().ok_or(HashEngineError::NotInitialized)?;
            if state.key == *key {
                return Ok(());
            }
            (state.mode, state.safe_mode)
        };

        log::info!("epoch key changed, rekeying");
        self.init(key, mode, safe_mode)
    }

    pub fn hash(&self, input: &[u8], output: &mut [u8; 32]) -> Result<(), HashEngineError> {
        let mut vm_guard = self.validation_vm.lock().unwrap();
        if vm_guard.is_none() {
            *vm_guard = Some(self.build_vm()?);
        }
        let vm = vm_guard.as_ref().unwrap();
        *output = vm.compute(input);
        Ok(())
    }

    pub fn meets_target(hash_be: &[u8; 32], target_be: &[u8; 32]) -> bool {
        crypto_hashes::meets_target_be(hash_be, target_be)
    }

    pub fn start_mining<F>(
        &self,
        header: &BlockHeader,
        target: &HashTarget,
        num_threads: usize,
        on_solution: F,
    ) -> Result<(), HashEngineError>
    where
        F: Fn(BlockHeader) + Send + 'static,
    {
        if num_threads == 0 {
            return Err(HashEngineError::ZeroThreads);
        }
        if self.mining_active.swap(true, Ordering::SeqCst) {
            return Err(HashEngineError::AlreadyMining);
        }

        let (cache, dataset, dataset_item_count) = {
            let guard = self.state.lock().unwrap();
            let state = match guard.as_ref() {
                Some(s) => s,
                None => {
                    self.mining_active.store(false, Ordering::SeqCst);
                    return Err(HashEngineError::NotInitialized);
                }
            };
            (state.cache.clone(), state.dataset.clone(), state.dataset_item_count)
        };

        self.stop_requested.store(false, Ordering::SeqCst);
        self.session_hash_count.store(0, Ordering::SeqCst);
        *self.session_start.lock().unwrap() = Some(Instant::now());

        let (solution_tx, solution_rx) = std::sync::mpsc::channel::<BlockHeader>();
        let target = *target;
        let mut handles = Vec::with_capacity(num_threads + 1);

        let span = u32::MAX / num_threads as u32;
        for t in 0..num_threads {
            let vm = Vm::new(cache.clone(), dataset.clone(), dataset_item_count);
            let start_nonce = span.wrapping_mul(t as u32);
            let end_nonce = if t + 1 == num_threads { u32::MAX } else { span.wrapping_mul((t + 1) as u32) };
            let header = header.clone();
            let stop_requested = self.stop_requested.clone();
            let session_hash_count = self.session_hash_count.clone();
            let tx = solution_tx.clone();

            handles.push(std::thread::spawn(move || {
                let mut local_count: u64 = 0;
                let mut nonce = start_nonce;
                loop {
                    if stop_requested.load(Ordering::Relaxed) {
                        break;
                    }
                    let candidate = header.with_nonce(nonce);
                    let bytes = candidate.to_bytes();
                    let digest = vm.compute(&bytes);
                    if HashEngine::meets_target(&digest, target.as_be_bytes()) {
                        let _ = tx.send(candidate);
                        break;
                    }

                    local_count += 1;
                    if local_count % 64 == 0 {
                        session_hash_count.fetch_add(64, Ordering::Relaxed);
                    }
                    if local_count % 256 == 0 {
                        std::thread::sleep(Duration::from_micros(100));
                    }

                    if nonce == end_nonce {
                        break;
                    }
                    nonce = nonce.wrapping_add(1);
                }
                session_hash_count.fetch_add(local_count % 64, Ordering::Relaxed);
            }));
        }
        drop(solution_tx);

        let stop_requested = self.stop_requested.clone();
        handles.push(std::thread::spawn(move || {
            if let Ok(solution) = solution_rx.recv() {
                stop_requested.store(true, Ordering::SeqCst);
                on_solution(solution);
            }
            // Drain remaining solutions so other workers' sends never block.
            for _ in solution_rx.iter() {}
        }));

        *self.threads.lock().unwrap() = handles;
        Ok(())
    }

    pub fn stop_mining(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        let handles = std::mem::take(&mut *self.threads.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }

        if let Some(start) = self.session_start.lock().unwrap().take() {
            let elapsed = start.elapsed().as_secs_f64();
            let count = self.session_hash_count.load(Ordering::SeqCst);
            if elapsed > 0.0 {
                *self.last_hashrate.lock().unwrap() = count as f64 / elapsed;
            }
        }
        self.session_hash_count.store(0, Ordering::SeqCst);
        self.mining_active.store(false, Ordering::SeqCst);
        log::info!("mining stopped");
    }

    pub fn hashrate(&self) -> f64 {
        if self.mining_active.load(Ordering::SeqCst) {
            if let Some(start) = *self.session_start.lock().unwrap() {
                let elapsed = start.elapsed().as_secs_f64();
                let count = self.session_hash_count.load(Ordering::SeqCst);
                if elapsed > 0.0 {
                    return count as f64 / elapsed;
                }
            }
        }
        *self.last_hashrate.lock().unwrap()
    }

    pub fn status(&self) -> HashEngineStatus {
        let guard = self.state.lock().unwrap();
        HashEngineStatus {
            initialized: guard.is_some(),
            mode: guard.as_ref().map(|s| s.mode),
            mining_active: self.mining_active.load(Ordering::SeqCst),
            hashrate: self.hashrate(),
        }
    }

    fn build_vm(&self) -> Result<Vm, HashEngineError> {
        let guard = self.state.lock().unwrap();
        let state = guard.as_ref().ok_or(HashEngineError::NotInitialized)?;
        Ok(Vm::new(state.cache.clone(), state.dataset.clone(), state.dataset_item_count))
    }
}

fn key_to_array(key: &EpochKey) -> [u8; 32] {
    let bytes = key.as_bytes();
    if bytes.len() == 32 {
        let mut arr = [0u8; 32];
        arr.copy_from_slice(bytes);
        arr
    } else {
        crypto_hashes::sha256(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn tiny_config() -> EngineConfig {
        EngineConfig { cache_size_bytes: 4096, dataset_size_bytes: 4096 }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: crypto_hashes::Hash::from([1u8; 32]),
            merkle_root: crypto_hashes::Hash::from([2u8; 32]),
            time: 1_700_000_000,
            bits: 0x207fffff,
            nonce: 0,
            state_root: crypto_hashes::Hash::from([3u8; 32]),
            utxo_root: crypto_hashes::Hash::from([4u8; 32]),
            prevout_stake: vec![],
            block_sig_delegation: vec![],
            shift: 0,
            adder: crypto_hashes::Hash::from([0u8; 32]),
            gap_size: 0,
        }
    }

    #[test]
    fn init_is_idempotent_for_same_key() {
        let engine = HashEngine::new(tiny_config());
        let key = EpochKey::from([9u8; 32]);
        engine.init(&key, Mode::Light, false).unwrap();
        engine.init(&key, Mode::Light, false).unwrap();
    }

    #[test]
    fn rekey_only_reinitializes_on_change() {
        let engine = HashEngine::new(tiny_config());
        let key_a = EpochKey::from([1u8; 32]);
        let key_b = EpochKey::from([2u8; 32]);
        engine.init(&key_a, Mode::Light, false).unwrap();

        let mut out_before = [0u8; 32];
        engine.hash(b"probe", &mut out_before).unwrap();

        engine.rekey_if_needed(&key_a).unwrap();
        let mut out_same_key = [0u8; 32];
        engine.hash(b"probe", &mut out_same_key).unwrap();
        assert_eq!(out_before, out_same_key);

        engine.rekey_if_needed(&key_b).unwrap();
        let mut out_new_key = [0u8; 32];
        engine.hash(b"probe", &mut out_new_key).unwrap();
        assert_ne!(out_before, out_new_key);
    }

    #[test]
    fn rekey_while_mining_is_rejected() {
        let engine = HashEngine::new(tiny_config());
        let key = EpochKey::from([1u8; 32]);
        engine.init(&key, Mode::Light, false).unwrap();

        let header = sample_header();
        let target = HashTarget::max();
        let (tx, rx) = mpsc::channel();
        engine
            .start_mining(&header, &target, 1, move |h| {
                let _ = tx.send(h);
            })
            .unwrap();
        let _ = rx.recv_timeout(Duration::from_secs(2));

        let other_key = EpochKey::from([2u8; 32]);
        let result = engine.rekey_if_needed(&other_key);
        engine.stop_mining();
        assert!(matches!(result, Err(HashEngineError::RekeyWhileMining)));
    }

    #[test]
    fn start_mining_with_max_target_finds_a_solution_quickly() {
        let engine = HashEngine::new(tiny_config());
        let key = EpochKey::from([7u8; 32]);
        engine.init(&key, Mode::Light, false).unwrap();

        let header = sample_header();
        let target = HashTarget::max();
        let (tx, rx) = mpsc::channel();
        engine
            .start_mining(&header, &target, 2, move |h| {
                let _ = tx.send(h);
            })
            .unwrap();

        let solution = rx.recv_timeout(Duration::from_secs(5));
        engine.stop_mining();
        assert!(solution.is_ok());
    }

    #[test]
    fn light_and_full_hash_produce_the_same_digest() {
        let key = EpochKey::from([4u8; 32]);
        let light = HashEngine::new(tiny_config());
        light.init(&key, Mode::Light, false).unwrap();
        let full = HashEngine::new(tiny_config());
        full.init(&key, Mode::Full, false).unwrap();

        let mut light_out = [0u8; 32];
        let mut full_out = [0u8; 32];
        light.hash(b"same-input", &mut light_out).unwrap();
        full.hash(b"same-input", &mut full_out).unwrap();
        assert_eq!(light_out, full_out);
    }
}
