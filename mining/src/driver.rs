use crate::broker::JobBroker;
use crate::error::MiningError;
use crate::job::Algo;
use block_template::BlockTemplateProvider;
use chain_types::{EpochKey, HashTarget};
use hash_engine::{HashEngine, HashEngineError, Mode};
use sieve_engine::SieveEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Thin orchestrator: `start(threads, shift)` / `stop()`. Watches the
/// broker for fresh jobs and (re)starts whichever engine backs the
/// configured algorithm against each new job, routing solutions back
/// through the block template provider.
pub struct MinerDriver {
    broker: Arc<JobBroker>,
    provider: Arc<dyn BlockTemplateProvider>,
    hash_engine: Option<Arc<HashEngine>>,
    sieve_engine: Option<Arc<SieveEngine>>,
    algo: Algo,
    target_merit: f64,
    active: Arc<AtomicBool>,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
}

impl MinerDriver {
    pub fn new(
        broker: Arc<JobBroker>,
        provider: Arc<dyn BlockTemplateProvider>,
        hash_engine: Option<Arc<HashEngine>>,
        sieve_engine: Option<Arc<SieveEngine>>,
        algo: Algo,
        target_merit: f64,
    ) -> Self {
        Self {
            broker,
            provider,
            hash_engine,
            sieve_engine,
            algo,
            target_merit,
            active: Arc::new(AtomicBool::new(false)),
            loop_thread: Mutex::new(None),
        }
    }

    pub fn start(&self, threads: usize, shift: u32) -> Result<(), MiningError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(MiningError::AlreadyRunning);
        }

        let broker = self.broker.clone();
        let provider = self.provider.clone();
        let hash_engine = self.hash_engine.clone();
        let sieve_engine = self.sieve_engine.clone();
        let algo = self.algo;
        let target_merit = self.target_merit;
        let active = self.active.clone();

        let handle = std::thread::spawn(move || {
            let mut last_job_id: Option<String> = None;

            while active.load(Ordering::SeqCst) {
                let Some(job) = broker.current_job() else {
                    std::thread::sleep(Duration::from_millis(200));
                    continue;
                };

                if last_job_id.as_deref() != Some(job.job_id.as_str()) {
                    let header = job.template.to_header();

                    match algo {
                        Algo::Hash => {
                            if let Some(engine) = &hash_engine {
                                if engine.status().mining_active {
                                    engine.stop_mining();
                                }
                                let epoch_key = EpochKey::from(*job.template.prev_hash.as_bytes());
                                if let Err(HashEngineError::NotInitialized) = engine.rekey_if_needed(&epoch_key) {
                                    if let Err(err) = engine.init(&epoch_key, Mode::Light, false) {
                                        log::error!("failed to initialize hash engine: {}", err);
                                    }
                                }
                                let target = HashTarget::from_compact(job.bits).unwrap_or_else(|_| HashTarget::max());
                                let provider = provider.clone();
                                let broker = broker.clone();
                                let job_for_solution = job.clone();
                                let result = engine.start_mining(&header, &target, threads, move |solved| {
                                    let coinbase = job_for_solution.template.pay_address.as_bytes();
                                    match provider.submit_solution(solved.version, solved.time, solved.nonce, coinbase) {
                                        Ok(true) => {
                                            log::info!("submitted solution for job {} accepted", job_for_solution.job_id);
                                            broker.notify_new_block();
                                        }
                                        Ok(false) => {
                                            log::warn!("solution for job {} rejected as stale", job_for_solution.job_id);
                                        }
                                        Err(err) => {
                                            log::error!("failed to submit solution for job {}: {}", job_for_solution.job_id, err);
                                        }
                                    }
                                });
                                if let Err(err) = result {
                                    log::error!("failed to start hash engine mining: {}", err);
                                }
                            }
                        }
                        Algo::Gap => {
                            if let Some(engine) = &sieve_engine {
                                if engine.is_mining() {
                                    engine.stop_mining();
                                }
                                let job_id = job.job_id.clone();
                                let broker = broker.clone();
                                let result = engine.start_mining(&header, shift, target_merit, threads, move |solution| {
                                    log::info!(
                                        "gap solution for job {}: gap_size={} merit={:.3}",
                                        job_id,
                                        solution.gap_size,
                                        solution.merit
                                    );
                                    broker.notify_new_block();
                                });
                                if let Err(err) = result {
                                    log::error!("failed to start sieve engine mining: {}", err);
                                }
                            }
                        }
                    }

                    last_job_id = Some(job.job_id.clone());
                }

                std::thread::sleep(Duration::from_millis(200));
            }
        });

        *self.loop_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(engine) = &self.hash_engine {
            engine.stop_mining();
        }
        if let Some(engine) = &self.sieve_engine {
            engine.stop_mining();
        }
        if let Some(handle) = self.loop_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
