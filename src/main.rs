use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pendant_gateway::api::{self, AppState};
use pendant_gateway::completion::{HttpCompletionService, Invoker};
use pendant_gateway::jobs::{JobExecutor, JobQueue};
use pendant_gateway::{db, Config};

/// Pendant - companion backend for wearable voice assistants
#[derive(Parser)]
#[command(name = "pendant", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PENDANT_PORT")]
    port: Option<u16>,

    /// Data directory (database lives here)
    #[arg(long, env = "PENDANT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,pendant_gateway=info",
        1 => "info,pendant_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    tracing::info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        "starting pendant gateway"
    );

    std::fs::create_dir_all(&config.data_dir)?;
    let pool = db::init(config.data_dir.join("pendant.db"))?;

    let service = Arc::new(HttpCompletionService::new(
        config.completion.base_url.clone(),
        config.completion.api_key.clone(),
    ));
    let invoker = Invoker::new(service, config.invoker.clone());

    let executor = Arc::new(JobExecutor::new(&pool));
    let queue = JobQueue::new(executor, config.queue.clone());
    let drain = queue.spawn_drain_loop();

    let state = Arc::new(AppState::new(
        pool,
        invoker,
        queue,
        config.response_deadline,
    ));

    tracing::info!("pendant gateway ready");
    let result = api::serve(state, config.port).await;

    drain.abort();
    result?;
    Ok(())
}
