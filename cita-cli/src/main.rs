mod cli;
mod commands;
mod logger;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cita_client::{ApiGateway, ClientConfig, FileSessionStore, Session};

use crate::cli::Cli;
use crate::commands::AppContext;

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = logger::init_logger(&cli.log, cli.json) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("{}", commands::describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }
    if let Some(policy) = cli.buckets {
        config = config.with_bucket_policy(policy.into());
    }

    let store = Arc::new(FileSessionStore::new(&cli.session_file));
    let session = Session::restore(store, config.login_path.clone())?;
    tracing::debug!(
        api = %config.api_root(),
        session_file = %cli.session_file.display(),
        authenticated = session.is_authenticated(),
        "Client ready"
    );

    let gateway = ApiGateway::network(&config, session)?;
    let ctx = AppContext { config, gateway };
    commands::run(&ctx, cli.command).await
}
