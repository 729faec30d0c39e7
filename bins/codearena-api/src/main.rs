use anyhow::Context;
use codearena_api::{routes, AppState};
use codearena_common::config::AppConfig;
use codearena_common::redis::RedisStore;
use codearena_common::store::{load_problems_file, InMemoryStore, ProblemStore, SubmissionStore};
use codearena_judge::{Judge0Client, PollPolicy, SubmissionPipeline};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Builds the problem and submission stores: Redis when configured, otherwise in-process.
async fn build_stores(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn ProblemStore>, Arc<dyn SubmissionStore>)> {
    let seed = match &config.problems_file {
        Some(path) => {
            let problems = load_problems_file(path)
                .with_context(|| format!("Failed to load problems from {}", path.display()))?;
            info!(count = problems.len(), path = %path.display(), "Loaded problem seed file");
            problems
        }
        None => Vec::new(),
    };

    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            for problem in &seed {
                store.put_problem(problem).await?;
            }
            info!("Connected to Redis: {}", url);
            let problems: Arc<dyn ProblemStore> = Arc::new(store.clone());
            let submissions: Arc<dyn SubmissionStore> = Arc::new(store);
            Ok((problems, submissions))
        }
        None => {
            if seed.is_empty() {
                warn!("No REDIS_URL or PROBLEMS_FILE configured; every problem lookup will miss");
            }
            let store = Arc::new(InMemoryStore::with_problems(seed));
            let problems: Arc<dyn ProblemStore> = store.clone();
            let submissions: Arc<dyn SubmissionStore> = store;
            Ok((problems, submissions))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("CodeArena API booting...");

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let (problems, submissions) = build_stores(&config).await?;

    let judge = Judge0Client::new(&config.judge).context("Failed to build judge client")?;
    info!(
        judge_url = judge.base_url(),
        poll_interval_ms = config.judge.poll_interval.as_millis() as u64,
        poll_timeout_secs = config.judge.poll_timeout.as_secs(),
        "Judge client ready"
    );

    let pipeline = SubmissionPipeline::new(problems, Arc::new(judge), PollPolicy::from(&config.judge));

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        pipeline,
        submissions,
        access_token_secret: config.access_token_secret.clone(),
        shutdown: shutdown.clone(),
    });

    let app = routes::routes(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
            warn!("Received shutdown signal, cancelling in-flight submissions...");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    info!("API shutdown complete");
    Ok(())
}
