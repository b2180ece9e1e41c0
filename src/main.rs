//! askdb - natural-language questions answered as safe, read-only SQL.

mod cli;

use std::sync::Arc;

use askdb::agent::AgentOrchestrator;
use askdb::config::Config;
use askdb::db::{self, DatabaseClient};
use askdb::error::{AskdbError, Result};
use askdb::llm::ProviderSelector;
use askdb::logging;
use cli::Cli;
use tracing::error;

#[tokio::main]
async fn main() {
    // Provider credentials may live in a local .env file.
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!(code = e.code(), "{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let question = cli.question().ok_or_else(|| {
        AskdbError::config("no question provided. Usage: askdb \"How many customers are there?\"")
    })?;

    let mut config = Config::from_env()?;
    if let Some(database) = &cli.database {
        config = config.with_database_url(database);
    }
    if let Some(provider) = cli.provider {
        config = config.with_provider(provider);
    }

    let db: Arc<dyn DatabaseClient> = Arc::from(db::connect(&config).await?);
    let selector = match config.provider_override {
        Some(provider) => ProviderSelector::pinned(provider),
        None => ProviderSelector::with_default_priority(),
    };

    let orchestrator = AgentOrchestrator::new(Arc::clone(&db), selector, &config);
    let answer = orchestrator.answer(&question).await?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&answer)
    } else {
        serde_json::to_string(&answer)
    }
    .map_err(|e| AskdbError::internal(format!("failed to serialize answer: {e}")))?;

    println!("{output}");

    db.close().await?;
    Ok(())
}
