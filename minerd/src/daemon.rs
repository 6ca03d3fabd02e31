use crate::config::Config;
use crate::rpc_client::RpcTemplateClient;
use block_template::BlockTemplateProvider;
use hash_engine::{EngineConfig, HashEngine};
use mining::{Algo, JobBroker, JobBrokerConfig, MinerDriver};
use sieve_engine::{SieveConfig, SieveEngine};
use std::sync::Arc;
use std::time::Duration;
use stratum::{StratumConfig, StratumServer};
use tracing::info;

/// Wires the job broker, stratum server, and (optionally) a built-in
/// miner together against a single block template provider, mirroring
/// the component-initialization shape of a full node daemon scaled down
/// to this subsystem's five pieces.
pub struct Daemon {
    broker: Arc<JobBroker>,
    stratum_server: Arc<StratumServer>,
    driver: Option<MinerDriver>,
    mining_threads: usize,
    mining_shift: u32,
}

impl Daemon {
    pub fn new(config: Config) -> Result<Self, String> {
        info!("initializing components");

        let provider: Arc<dyn BlockTemplateProvider> = Arc::new(RpcTemplateClient::new(config.node.rpc_addr.clone()));

        let algo = parse_algo(&config.mining.algo)?;

        info!("initializing job broker");
        let broker = Arc::new(JobBroker::new(
            provider.clone(),
            JobBrokerConfig {
                job_timeout_seconds: config.mining.job_timeout_seconds,
                pay_address: config.node.pay_address.clone(),
                algo,
                ..Default::default()
            },
        ));

        info!("initializing hash engine");
        let hash_engine = Arc::new(HashEngine::new(EngineConfig {
            cache_size_bytes: config.hash_engine.cache_size_bytes,
            dataset_size_bytes: config.hash_engine.dataset_size_bytes,
        }));

        info!("initializing stratum server");
        let stratum_server = Arc::new(StratumServer::new(
            StratumConfig {
                bind: config.stratum.bind.clone(),
                port: config.stratum.port,
                max_clients: config.stratum.max_clients,
                recv_buffer_limit: 64 * 1024,
                idle_timeout_seconds: config.stratum.idle_timeout_seconds,
                broadcast_poll: Duration::from_millis(500),
            },
            broker.clone(),
            provider.clone(),
            hash_engine.clone(),
        ));

        let driver = if config.mining.enabled {
            info!("initializing built-in miner (algo={:?})", algo);
            let sieve_engine = match algo {
                Algo::Gap => Some(Arc::new(SieveEngine::new(SieveConfig {
                    sieve_size_bytes: config.sieve.sieve_size_bytes,
                    sieve_primes: config.sieve.sieve_primes,
                    wheel_modulus: config.sieve.wheel_modulus,
                    fermat_rounds: config.sieve.fermat_rounds,
                }))),
                Algo::Hash => None,
            };
            let hash_engine_for_driver = match algo {
                Algo::Hash => Some(hash_engine.clone()),
                Algo::Gap => None,
            };
            Some(MinerDriver::new(
                broker.clone(),
                provider.clone(),
                hash_engine_for_driver,
                sieve_engine,
                algo,
                config.mining.target_merit,
            ))
        } else {
            info!("built-in mining disabled; daemon will only serve stratum jobs");
            None
        };

        Ok(Self {
            broker,
            stratum_server,
            driver,
            mining_threads: config.mining.threads,
            mining_shift: config.mining.shift,
        })
    }

    pub fn run(self) -> Result<(), String> {
        info!("starting services");

        self.broker.start();
        self.stratum_server.start().map_err(|e| e.to_string())?;
        if let Some(driver) = &self.driver {
            driver.start(self.mining_threads, self.mining_shift).map_err(|e| e.to_string())?;
        }

        info!("minerd is now running, press Ctrl+C to stop");
        let (tx, rx) = std::sync::mpsc::channel();
        ctrlc::set_handler(move || {
            let _ = tx.send(());
        })
        .map_err(|e| format!("failed to install signal handler: {}", e))?;
        let _ = rx.recv();

        info!("shutting down");
        if let Some(driver) = &self.driver {
            driver.stop();
        }
        self.stratum_server.stop();
        self.broker.stop();
        info!("all components stopped");
        Ok(())
    }
}

fn parse_algo(value: &str) -> Result<Algo, String> {
    match value {
        "hash" => Ok(Algo::Hash),
        "gap" => Ok(Algo::Gap),
        other => Err(format!("unknown algo '{}', expected 'hash' or 'gap'", other)),
    }
}
