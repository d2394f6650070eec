//! `news-worker` CLI — long-running (or `--once`) LLM analysis job consumer.
//! §6 Worker CLI.

use clap::Parser;
use news_worker::WorkerOptions;
use tracing::error;

#[derive(Parser)]
#[command(name = "news-worker", about = "News analysis job queue worker")]
struct Cli {
    /// Seconds to sleep between empty poll cycles
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Max jobs claimed per poll cycle
    #[arg(long, default_value_t = 1)]
    batch_size: i64,

    /// Process one poll cycle then exit, instead of looping forever
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Identity recorded on `locked_by`; defaults to "{hostname}:{pid}"
    #[arg(long)]
    worker_id: Option<String>,
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

    let options = WorkerOptions {
        poll_seconds: cli.poll_interval.unwrap_or(config.worker.poll_seconds),
        batch_size: cli.batch_size,
        max_attempts: config.worker.max_attempts,
        visibility_timeout_seconds: config.worker.visibility_timeout_seconds,
        worker_id: cli.worker_id.unwrap_or_else(default_worker_id),
        once: cli.once,
    };

    match news_worker::run(&pool, options).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("worker_failed: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn default_worker_id() -> String {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string());
    format!("{hostname}:{}", std::process::id())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
}
