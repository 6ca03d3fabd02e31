use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub stratum: StratumConfig,
    pub hash_engine: HashEngineConfig,
    pub sieve: SieveConfig,
    pub mining: MiningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub rpc_addr: String,
    pub pay_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumConfig {
    pub bind: String,
    pub port: u16,
    pub max_clients: usize,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashEngineConfig {
    pub cache_size_bytes: usize,
    pub dataset_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SieveConfig {
    pub sieve_size_bytes: usize,
    pub sieve_primes: usize,
    pub wheel_modulus: u64,
    pub fermat_rounds: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    pub enabled: bool,
    pub algo: String,
    pub threads: usize,
    pub shift: u32,
    pub target_merit: f64,
    pub job_timeout_seconds: u64,
}

impl Config {
    /// Loads configuration from `path` if it exists, falling back to
    /// defaults otherwise.
    pub fn load(path: &Path) -> Result<Self, String> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| format!("failed to read config file: {}", e))?;
            toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
        } else {
            Ok(Config::default())
        }
    }

    /// Overrides config fields with any CLI flags the user actually passed.
    pub fn apply_cli_overrides(&mut self, args: &crate::cli::Args) {
        if let Some(node_addr) = &args.node_addr {
            self.node.rpc_addr = node_addr.clone();
        }
        if let Some(pay_address) = &args.pay_address {
            self.node.pay_address = pay_address.clone();
        }
        if let Some(bind) = &args.bind {
            self.stratum.bind = bind.clone();
        }
        if let Some(port) = args.port {
            self.stratum.port = port;
        }
        if let Some(algo) = &args.algo {
            self.mining.algo = algo.clone();
        }
        if let Some(threads) = args.threads {
            self.mining.threads = threads;
        }
        if let Some(shift) = args.shift {
            self.mining.shift = shift;
        }
        if let Some(target_merit) = args.target_merit {
            self.mining.target_merit = target_merit;
        }
        if args.enable_mining {
            self.mining.enabled = true;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                rpc_addr: "127.0.0.1:9090".to_string(),
                pay_address: String::new(),
            },
            stratum: StratumConfig {
                bind: "0.0.0.0".to_string(),
                port: 3335,
                max_clients: 1024,
                idle_timeout_seconds: 600,
            },
            hash_engine: HashEngineConfig {
                cache_size_bytes: 2 * 1024 * 1024,
                dataset_size_bytes: 2 * 1024 * 1024 * 1024,
            },
            sieve: SieveConfig {
                sieve_size_bytes: 32 * 1024 * 1024,
                sieve_primes: 900_000,
                wheel_modulus: 210,
                fermat_rounds: 5,
            },
            mining: MiningConfig {
                enabled: false,
                algo: "hash".to_string(),
                threads: num_cpus::get(),
                shift: 256,
                target_merit: 10.0,
                job_timeout_seconds: 60,
            },
        }
    }
}
