use crate::backend::BackendRegistry;
use crate::error::SieveEngineError;
use crate::fermat::verify_gap;
use crate::gap::extract_gaps;
use crate::primes::SmallPrimeTable;
use crate::segment::{sieve_segment, SieveSegment};
use crate::wheel::Wheel;
use chain_types::BlockHeader;
use num_bigint::BigUint;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub const SHIFT_MIN: u32 = 14;
pub const SHIFT_MAX: u32 = 65536;

#[derive(Debug, Clone, Copy)]
pub struct SieveConfig {
    pub sieve_size_bytes: usize,
    pub sieve_primes: usize,
    pub wheel_modulus: u64,
    pub fermat_rounds: usize,
}

impl Default for SieveConfig {
    fn default() -> Self {
        Self {
            sieve_size_bytes: 32 * 1024 * 1024,
            sieve_primes: 900_000,
            wheel_modulus: 210,
            fermat_rounds: 5,
        }
    }
}

/// A consensus-valid (or potential) gap solution. The callback may receive
/// several of these concurrently from different threads — consumers must
/// be thread-safe and tolerate being invoked more than once for logically
/// equivalent finds.
#[derive(Debug, Clone)]
pub struct GapSolution {
    pub found: bool,
    pub shift: u32,
    pub adder: Vec<u8>,
    pub gap_size: u64,
    pub merit: f64,
}

struct MiningSession {
    stop_requested: Arc<AtomicBool>,
    best_merit_bits: Arc<AtomicU64>,
    threads: Vec<JoinHandle<()>>,
}

/// Component G: a segmented prime-gap search engine, scoring gaps by
/// merit and verifying consensus candidates with arbitrary-precision
/// Fermat tests.
pub struct SieveEngine {
    config: SieveConfig,
    wheel: Wheel,
    primes: Arc<SmallPrimeTable>,
    backends: Mutex<BackendRegistry>,
    session: Mutex<Option<MiningSession>>,
    last_best_merit: Mutex<f64>,
}

impl SieveEngine {
    pub fn new(config: SieveConfig) -> Self {
        let sieve_bits = config.sieve_size_bytes * 8;
        let limit = (sieve_bits as f64).sqrt() as u64 + 1000;
        let primes = Arc::new(SmallPrimeTable::build(limit, config.sieve_primes));
        let wheel = Wheel::new(config.wheel_modulus);
        Self {
            config,
            wheel,
            primes,
            backends: Mutex::new(BackendRegistry::new()),
            session: Mutex::new(None),
            last_best_merit: Mutex::new(0.0),
        }
    }

    pub fn register_backend(&self, backend: Box<dyn crate::backend::SieveBackend>) {
        self.backends.lock().unwrap().register(backend);
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends.lock().unwrap().names().into_iter().map(String::from).collect()
    }

    /// Starts `num_threads` CPU sieve workers against `header`. Each
    /// thread partitions the candidate space disjointly from the others
    /// and from any registered GPU backend.
    pub fn start_mining<F>(
        &self,
        header: &BlockHeader,
        shift: u32,
        target_merit: f64,
        num_threads: usize,
        on_solution: F,
    ) -> Result<(), SieveEngineError>
    where
        F: Fn(GapSolution) + Send + Sync + 'static,
    {
        if !(SHIFT_MIN..=SHIFT_MAX).contains(&shift) {
            return Err(SieveEngineError::ShiftOutOfRange(shift));
        }
        if num_threads == 0 {
            return Err(SieveEngineError::ZeroThreads);
        }
        {
            let guard = self.session.lock().unwrap();
            if guard.is_some() {
                return Err(SieveEngineError::AlreadyMining);
            }
        }

        let sieve_bits = self.config.sieve_size_bytes * 8;
        let gpu_workers = self.backends.lock().unwrap().len() as u64;
        let base_prime = base_prime_from_header(header, shift);

        let stop_requested = Arc::new(AtomicBool::new(false));
        let best_merit_bits = Arc::new(AtomicU64::new(0f64.to_bits()));
        let on_solution = Arc::new(on_solution);

        let mut threads = Vec::with_capacity(num_threads);
        for t in 0..num_threads {
            let wheel_modulus = self.config.wheel_modulus;
            let wheel = Wheel::new(wheel_modulus);
            let primes = self.primes.clone();
            let fermat_rounds = self.config.fermat_rounds;
            let base_prime = base_prime.clone();
            let stop_requested = stop_requested.clone();
            let best_merit_bits = best_merit_bits.clone();
            let on_solution = on_solution.clone();

            threads.push(std::thread::spawn(move || {
                let mut adder_base = (t as u64 + gpu_workers) * sieve_bits as u64;
                let stride = (num_threads as u64 + gpu_workers) * sieve_bits as u64;

                while !stop_requested.load(Ordering::Relaxed) {
                    let Some(mut segment) = SieveSegment::try_new(sieve_bits) else {
                        log::error!("sieve segment allocation failed, skipping cycle");
                        adder_base = adder_base.wrapping_add(stride);
                        continue;
                    };

                    sieve_segment(&wheel, primes.as_slice(), adder_base, &mut segment);
                    let candidates = extract_gaps(&segment, shift, adder_base);

                    for candidate in candidates {
                        if stop_requested.load(Ordering::Relaxed) {
                            break;
                        }
                        if candidate.approx_merit < target_merit {
                            continue;
                        }
                        let start_offset = adder_base + candidate.start_offset;
                        if let Some(merit) =
                            verify_gap(&base_prime, start_offset, candidate.gap_size, fermat_rounds, primes.as_slice())
                        {
                            if merit < target_merit {
                                continue;
                            }
                            update_best_merit(&best_merit_bits, merit);
                            let adder = (&base_prime + BigUint::from(start_offset)).to_bytes_be();
                            on_solution(GapSolution {
                                found: true,
                                shift,
                                adder,
                                gap_size: candidate.gap_size,
                                merit,
                            });
                        }
                    }

                    adder_base = adder_base.wrapping_add(stride);
                }
            }));
        }

        *self.session.lock().unwrap() = Some(MiningSession { stop_requested, best_merit_bits, threads });
        Ok(())
    }

    pub fn stop_mining(&self) {
        self.backends.lock().unwrap().request_stop_all();
        let session = self.session.lock().unwrap().take();
        if let Some(session) = session {
            session.stop_requested.store(true, Ordering::SeqCst);
            let merit = f64::from_bits(session.best_merit_bits.load(Ordering::SeqCst));
            for handle in session.threads {
                let _ = handle.join();
            }
            let mut last = self.last_best_merit.lock().unwrap();
            if merit > *last {
                *last = merit;
            }
        }
    }

    pub fn best_merit(&self) -> f64 {
        match self.session.lock().unwrap().as_ref() {
            Some(session) => f64::from_bits(session.best_merit_bits.load(Ordering::SeqCst)),
            None => *self.last_best_merit.lock().unwrap(),
        }
    }

    pub fn is_mining(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }
}

fn update_best_merit(best_merit_bits: &AtomicU64, candidate: f64) {
    let mut current = best_merit_bits.load(Ordering::SeqCst);
    loop {
        let current_value = f64::from_bits(current);
        if candidate <= current_value {
            return;
        }
        match best_merit_bits.compare_exchange_weak(current, candidate.to_bits(), Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// `P0 = SHA256(headerWithoutGapFields) * 2^shift`, as an arbitrary
/// precision integer.
fn base_prime_from_header(header: &BlockHeader, shift: u32) -> BigUint {
    let digest = crypto_hashes::sha256(&header.without_gap_fields());
    BigUint::from_bytes_be(&digest) << shift
}
