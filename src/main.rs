use std::path::PathBuf;
use std::process::ExitCode;

use sim8086_console::config::ConsoleConfig;
use sim8086_console::server::run_server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Optional config file path as the only argument
    let path = std::env::args_os().nth(1).map(PathBuf::from);

    let config = match ConsoleConfig::load(path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = run_server(config).await {
        tracing::error!(error = %err, "console failed to start");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
