use std::process::ExitCode;
use clap::Parser;
use wishgate_server::cli::Args;
use wishgate_server::{Config, Server};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let args = Args::parse();
    let cfg = Config::resolve(&args)?;

    let server = match Server::new(cfg) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Could not create server");
            return Ok(ExitCode::FAILURE);
        }
    };

    match server.start().await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "server exited with an error");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wishgate_server=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
