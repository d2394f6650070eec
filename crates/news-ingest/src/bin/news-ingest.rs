//! `news-ingest` CLI — one advisory-locked ingestion pass per invocation.
//! §6 Ingestion CLI.

use clap::Parser;
use news_ingest::{FinnhubClient, RunOptions, RunOutcome};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "news-ingest", about = "Finnhub news ingestion worker")]
struct Cli {
    /// Ticker symbols to fetch (defaults to all tickers in the DB)
    #[arg(long, num_args = 0..)]
    tickers: Option<Vec<String>>,

    /// Minutes back from now to include in the ingestion window
    #[arg(long, default_value_t = 60)]
    minutes_back: i64,

    /// Max raw items to process per run
    #[arg(long, default_value_t = 200)]
    process_limit: i64,

    /// Skip fetching and only process existing raw_news_items
    #[arg(long, default_value_t = false)]
    replay_only: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();
    news_config::load_dotenv_local();

    let cli = Cli::parse();

    let config = match news_config::NewsConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("misconfigured: {e}");
            return std::process::ExitCode::from(2);
        }
    };

    if !cli.replay_only {
        if let Err(e) = config.ingest.require_finnhub_token() {
            error!("misconfigured: {e}");
            return std::process::ExitCode::from(2);
        }
    }

    if cli.tickers.is_some() && cli.replay_only {
        info!("tickers_ignored_replay_only");
    }

    let database_url = config.db.connection_url();
    let pool = match news_db::connect(&database_url).await {
        Ok(p) => p,
        Err(e) => {
            error!("misconfigured: {e}");
            return std::process::ExitCode::from(2);
        }
    };
    if let Err(e) = news_db::migrate(&pool).await {
        error!("misconfigured: {e}");
        return std::process::ExitCode::from(2);
    }

    let options = RunOptions {
        tickers: cli.tickers,
        minutes_back: cli.minutes_back,
        process_limit: cli.process_limit,
        replay_only: cli.replay_only,
    };

    let outcome = if cli.replay_only {
        // No upstream token required: the fetch source is never called.
        let source = news_ingest::FakeCompanyNewsSource::new(Default::default());
        news_ingest::run(&pool, &database_url, &source, &config.ingest, options).await
    } else {
        let client = match FinnhubClient::new(config.ingest.finnhub_token.clone().expect("checked above")) {
            Ok(c) => c,
            Err(e) => {
                error!("misconfigured: {e}");
                return std::process::ExitCode::from(2);
            }
        };
        news_ingest::run(&pool, &database_url, &client, &config.ingest, options).await
    };

    match outcome {
        Ok(RunOutcome::LockNotAcquired) => {
            info!("ingestion_lock_not_acquired");
            std::process::ExitCode::SUCCESS
        }
        Ok(RunOutcome::Succeeded { run_id }) => {
            info!(run_id, "finnhub_run_summary");
            std::process::ExitCode::SUCCESS
        }
        Ok(RunOutcome::Failed { run_id, error }) => {
            error!(run_id, error = %error, "finnhub_run_failed");
            std::process::ExitCode::FAILURE
        }
        Err(e) => {
            error!("finnhub_run_failed: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
