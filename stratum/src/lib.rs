//! Component S: the pool-facing stratum job server. Speaks a line-delimited
//! JSON-RPC dialect (Standard subscribe/authorize/submit, or Monero-style
//! login/getjob/submit) to connected miners, broadcasts jobs as the broker
//! rotates them, and validates submitted shares against the current
//! consensus target before handing accepted solutions to the block template
//! provider.

mod client;
mod error;
mod protocol;
mod server;

pub use client::{ClientState, generate_session_id};
pub use error::StratumError;
pub use protocol::{error_codes, job_payload, split_wallet_worker};
pub use server::{StratumConfig, StratumServer, StratumStats};
