use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tabhyper_core::config::load_or_get_config;
use tabhyper_core::hyper::HyperdEngine;
use tabhyper_core::runner::{self, RunOutcome};
use tabhyper_core::scripts::{ScriptArgs, ScriptName, ScriptRegistry};
use tabhyper_core::session::TableauConnector;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build Tableau .hyper extracts and publish them", long_about = None)]
struct Cli {
    /// Which script to run
    #[arg(long, value_enum)]
    script: ScriptName,

    #[command(flatten)]
    args: ScriptArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(err) = &result {
        error!(error = %err, "run failed");
        eprintln!("Error: {err:#}");
    }
    ExitCode::from(runner::exit_code_for(&result))
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    let registry = ScriptRegistry::standard(Arc::new(HyperdEngine));
    debug!(registered = ?registry.registered().collect::<Vec<_>>(), "script registry ready");
    let connector = TableauConnector::new()?;

    runner::run(load_or_get_config, &connector, &registry, cli.script, &cli.args).await
}
