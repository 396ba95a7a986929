mod cli;
mod commands;

use clap::Parser;
use cli::Validate;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = cli::Args::parse();
    tracing::debug!(args = ?args, "parsed command-line arguments");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted");
                cancel.cancel();
            }
        });
    }

    let res = match args.validate() {
        Ok(()) => commands::run(args, cancel).await,
        Err(err) => Err(err),
    };
    match res {
        Ok(code) => code,
        Err(err) => {
            if err.downcast_ref::<commands::SilentError>().is_none() {
                eprintln!("Error: {:#}", err);
            }
            ExitCode::FAILURE
        }
    }
}
