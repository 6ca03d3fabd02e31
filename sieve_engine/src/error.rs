use thiserror::Error;

#[derive(Error, Debug)]
pub enum SieveEngineError {
    #[error("shift must be in [14, 65536], got {0}")]
    ShiftOutOfRange(u32),
    #[error("num_threads must be greater than zero")]
    ZeroThreads,
    #[error("sieve engine is already mining")]
    AlreadyMining,
}
