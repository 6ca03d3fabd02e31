use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("header buffer too short: need at least {needed} bytes, got {got}")]
    HeaderTooShort { needed: usize, got: usize },

    #[error("variable-length field length prefix exceeds remaining buffer")]
    TruncatedVarField,

    #[error("invalid compact bits encoding: {0:#010x}")]
    InvalidBits(u32),

    #[error("epoch key must be non-empty")]
    EmptyEpochKey,
}

pub type ChainResult<T> = Result<T, ChainError>;
