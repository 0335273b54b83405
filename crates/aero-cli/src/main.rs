use std::process::ExitCode;

use aero_cli::{run, Cli};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.log_level().into())
                .from_env_lossy(),
        )
        .try_init();

    #[cfg(feature = "prometheus")]
    if let Some(addr) = cli.metrics_listen {
        if let Err(e) = aero_metrics::install_prometheus(addr) {
            eprintln!("error: failed to start metrics exporter: {}", e);
            return ExitCode::FAILURE;
        }
    }
    aero_metrics::describe_metrics();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
