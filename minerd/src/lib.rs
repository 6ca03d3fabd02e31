//! minerd - standalone mining daemon
//!
//! Wires the `JobBroker`, `StratumServer`, and `MinerDriver` together
//! against a block template provider reached over a small JSON-RPC client.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod rpc_client;

pub use config::Config;
pub use daemon::Daemon;
pub use cli::Args;
