use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minerd")]
#[command(about = "Mining daemon: stratum job server plus hash/gap miner", long_about = None)]
pub struct Args {
    /// Path to configuration file (optional, uses defaults if not provided)
    #[arg(short, long)]
    pub config_path: Option<PathBuf>,

    /// Address of the external node's template RPC endpoint
    #[arg(long)]
    pub node_addr: Option<String>,

    /// Address to reward mined blocks to
    #[arg(long)]
    pub pay_address: Option<String>,

    /// Stratum bind address
    #[arg(long)]
    pub bind: Option<String>,

    /// Stratum listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// Mining algorithm: hash or gap
    #[arg(long)]
    pub algo: Option<String>,

    /// Number of mining threads to use when built-in mining is enabled
    #[arg(long)]
    pub threads: Option<usize>,

    /// Sieve shift (bit length of the base prime) for gap mining
    #[arg(long)]
    pub shift: Option<u32>,

    /// Minimum merit a gap solution must reach to be reported
    #[arg(long)]
    pub target_merit: Option<f64>,

    /// Enable built-in mining against the stratum server's own job broker
    #[arg(long)]
    pub enable_mining: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

pub fn parse_args() -> Args {
    Args::parse()
}
