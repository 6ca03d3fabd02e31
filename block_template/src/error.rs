use thiserror::Error;

/// Errors a `BlockTemplateProvider` implementation may return. Mirrors the
/// network/internal/rejected split external RPC collaborators use, so a
/// caller can tell "try again" apart from "this input was bad."
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error talking to block template provider: {0}")]
    Network(String),

    #[error("internal provider error: {0}")]
    Internal(String),

    #[error("template provider rejected the request: {0}")]
    Rejected(String),
}
