use thiserror::Error;

#[derive(Debug, Error)]
pub enum StratumError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
}
