use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber used by every binary. `RUST_LOG` wins over the default.
pub fn init_logging(verbose: bool) {
    let default = if verbose {
        "debug,atp_matchup=trace"
    } else {
        "info,atp_matchup=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
