use minerd::{cli, Config, Daemon};
use std::process;
use tracing::{error, info};

fn main() {
    let args = cli::parse_args();
    init_logging(&args);

    let mut config = if let Some(config_path) = &args.config_path {
        Config::load(config_path).unwrap_or_else(|e| {
            error!("failed to load config, using defaults: {}", e);
            Config::default()
        })
    } else {
        Config::default()
    };
    config.apply_cli_overrides(&args);

    info!("starting minerd on {}:{}", config.stratum.bind, config.stratum.port);

    let daemon = match Daemon::new(config) {
        Ok(d) => d,
        Err(e) => {
            error!("failed to initialize daemon: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = daemon.run() {
        error!("daemon error: {}", e);
        process::exit(1);
    }

    info!("minerd stopped gracefully");
}

fn init_logging(args: &cli::Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt().with_env_filter(filter).with_target(true).with_thread_ids(true).init();
}
