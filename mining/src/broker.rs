use crate::job::{Algo, Job, JobCounter};
use block_template::BlockTemplateProvider;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Bounded FIFO size for job history. Evicted oldest-by-insertion, not by
/// `job_id` ordering — a deliberate choice where the original design this
/// was derived from left the eviction order ambiguous.
pub const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone)]
pub struct JobBrokerConfig {
    pub job_timeout_seconds: u64,
    pub pay_address: String,
    pub share_target: [u8; 4],
    pub algo: Algo,
}

impl Default for JobBrokerConfig {
    fn default() -> Self {
        Self {
            job_timeout_seconds: 60,
            pay_address: String::new(),
            share_target: [0x00, 0x00, 0xff, 0xff],
            algo: Algo::Hash,
        }
    }
}

struct Shared {
    history: Mutex<VecDeque<Arc<Job>>>,
    wake: Condvar,
    wake_mutex: Mutex<bool>,
    running: AtomicBool,
    counter: JobCounter,
}

/// Owns the current mining job and a bounded history, regenerating it on a
/// timer, on an explicit new-block notification, or at startup.
pub struct JobBroker {
    provider: Arc<dyn BlockTemplateProvider>,
    config: JobBrokerConfig,
    shared: Arc<Shared>,
    refresh_thread: Mutex<Option<JoinHandle<()>>>,
}

impl JobBroker {
    pub fn new(provider: Arc<dyn BlockTemplateProvider>, config: JobBrokerConfig) -> Self {
        Self {
            provider,
            config,
            shared: Arc::new(Shared {
                history: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)),
                wake: Condvar::new(),
                wake_mutex: Mutex::new(false),
                running: AtomicBool::new(false),
                counter: JobCounter::default(),
            }),
            refresh_thread: Mutex::new(None),
        }
    }

    /// Creates the first job and starts the background job-refresh thread.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.create_job();

        let shared = self.shared.clone();
        let provider = self.provider.clone();
        let config = self.config.clone();
        let handle = std::thread::spawn(move || {
            while shared.running.load(Ordering::SeqCst) {
                let guard = shared.wake_mutex.lock().unwrap();
                let (_guard, _timeout) = shared
                    .wake
                    .wait_timeout_while(guard, Duration::from_secs(config.job_timeout_seconds), |woken| {
                        !*woken && shared.running.load(Ordering::SeqCst)
                    })
                    .unwrap();
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                *shared.wake_mutex.lock().unwrap() = false;
                create_job_into(&provider, &config, &shared);
            }
        });
        *self.refresh_thread.lock().unwrap() = Some(handle);
    }

    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        *self.shared.wake_mutex.lock().unwrap() = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.refresh_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    /// Forces immediate regeneration of the job, as happens after a
    /// successful share submission advances the chain tip.
    pub fn notify_new_block(&self) {
        *self.shared.wake_mutex.lock().unwrap() = true;
        self.shared.wake.notify_all();
    }

    pub fn current_job(&self) -> Option<Arc<Job>> {
        self.shared.history.lock().unwrap().back().cloned()
    }

    pub fn lookup(&self, job_id: &str) -> Option<Arc<Job>> {
        self.shared.history.lock().unwrap().iter().find(|j| j.job_id == job_id).cloned()
    }

    pub fn history_len(&self) -> usize {
        self.shared.history.lock().unwrap().len()
    }

    fn create_job(&self) {
        create_job_into(&self.provider, &self.config, &self.shared);
    }
}

fn create_job_into(provider: &Arc<dyn BlockTemplateProvider>, config: &JobBrokerConfig, shared: &Arc<Shared>) {
    match provider.create_template(&config.pay_address) {
        Ok(template) => {
            let job = Job::new(template, shared.counter.next(), config.share_target, config.algo);
            log::info!("new job {} at height {}", job.job_id, job.height);
            let mut history = shared.history.lock().unwrap();
            if history.len() >= MAX_HISTORY {
                history.pop_front();
            }
            history.push_back(Arc::new(job));
        }
        Err(err) => {
            log::warn!("failed to fetch block template: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_template::{BlockTemplate, ProviderError};
    use crypto_hashes::Hash;
    use std::sync::atomic::AtomicU64;

    struct CountingProvider {
        height: AtomicU64,
    }

    impl BlockTemplateProvider for CountingProvider {
        fn create_template(&self, pay_address: &str) -> Result<BlockTemplate, ProviderError> {
            let height = self.height.fetch_add(1, Ordering::SeqCst);
            Ok(BlockTemplate {
                version: 1,
                prev_hash: Hash::from([height as u8; 32]),
                merkle_root: Hash::from([0u8; 32]),
                time: 1_700_000_000 + height as u32,
                bits: 0x1d00ffff,
                height,
                coinbase_value: 0,
                pay_address: pay_address.to_string(),
                state_root: Hash::from([0u8; 32]),
                utxo_root: Hash::from([0u8; 32]),
                prevout_stake: vec![],
                block_sig_delegation: vec![],
            })
        }

        fn submit_solution(&self, _version: i32, _time: u32, _nonce: u32, _coinbase: &[u8]) -> Result<bool, ProviderError> {
            Ok(true)
        }
    }

    #[test]
    fn start_creates_an_initial_job() {
        let provider = Arc::new(CountingProvider { height: AtomicU64::new(0) });
        let broker = JobBroker::new(provider, JobBrokerConfig { job_timeout_seconds: 3600, ..Default::default() });
        broker.start();
        assert!(broker.current_job().is_some());
        broker.stop();
    }

    #[test]
    fn notify_new_block_produces_a_fresh_job() {
        let provider = Arc::new(CountingProvider { height: AtomicU64::new(0) });
        let broker = JobBroker::new(provider, JobBrokerConfig { job_timeout_seconds: 3600, ..Default::default() });
        broker.start();
        let first = broker.current_job().unwrap();
        broker.notify_new_block();
        std::thread::sleep(Duration::from_millis(200));
        let second = broker.current_job().unwrap();
        assert_ne!(first.job_id, second.job_id);
        broker.stop();
    }

    #[test]
    fn history_is_bounded_and_lookup_finds_recent_jobs() {
        let provider = Arc::new(CountingProvider { height: AtomicU64::new(0) });
        let broker = JobBroker::new(provider, JobBrokerConfig { job_timeout_seconds: 3600, ..Default::default() });
        broker.start();
        for _ in 0..(MAX_HISTORY + 5) {
            broker.notify_new_block();
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(broker.history_len() <= MAX_HISTORY);
        let current = broker.current_job().unwrap();
        assert!(broker.lookup(&current.job_id).is_some());
        broker.stop();
    }
}
