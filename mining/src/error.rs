use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiningError {
    #[error("miner driver is already running")]
    AlreadyRunning,

    #[error("miner driver is not running")]
    NotRunning,

    #[error("no mining job is available yet")]
    NoJob,

    #[error("block template provider error: {0}")]
    Provider(#[from] block_template::ProviderError),

    #[error("hash engine error: {0}")]
    HashEngine(#[from] hash_engine::HashEngineError),

    #[error("sieve engine error: {0}")]
    SieveEngine(#[from] sieve_engine::SieveEngineError),
}
