use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use code_indexer::embedding::{EmbeddingClient, EmbeddingHttpConfig};
use pr_reviewer::{workers::dispatch_job, ForgeFactory, ReviewDeps, ReviewEnv};
use repo_store::RepoStore;
use scheduler::{spawn_workers, QueueSet, TriggerConfig};
use stage_runner::{CommandRunnerConfig, StageRunner};
use store::Store;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env for local runs; real deployments set the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let project_root = PathBuf::from(env_or("PROJECT_ROOT", "."));
    let store = Store::open(project_root.join("var").join("grepiku.db"))
        .context("opening the database")?;

    let embedder = match std::env::var("EMBEDDING_ENDPOINT") {
        Ok(endpoint) => EmbeddingClient::http(EmbeddingHttpConfig {
            endpoint,
            model: env_or("EMBEDDING_MODEL", "nomic-embed-text"),
        })
        .context("building the embedding client")?,
        Err(_) => EmbeddingClient::Hash,
    };

    let stage_runner = StageRunner::Command(CommandRunnerConfig::new(env_or(
        "STAGE_RUNNER_BIN",
        "codex-stage",
    )));

    let (queues, review_rx, reply_rx, index_rx, analytics_rx) = QueueSet::new();
    let deps = ReviewDeps {
        store: store.clone(),
        repo_store: RepoStore::new(&project_root),
        stage_runner,
        embedder,
        queues: queues.clone(),
        forge: ForgeFactory::Github {
            base_api: env_or("FORGE_API_BASE", "https://api.github.com"),
        },
        env: ReviewEnv {
            project_root: project_root.clone(),
            bot_login: env_or("BOT_LOGIN", "grepiku"),
            clone_host: env_or("FORGE_CLONE_HOST", "github.com"),
            forge_token: env_or("FORGE_TOKEN", ""),
            clone_source_override: None,
        },
    };

    let concurrency = |key: &str, default: usize| -> usize {
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
            .max(1)
    };
    let worker = |queue: scheduler::JobQueue, rx, n: usize| {
        let deps = deps.clone();
        spawn_workers(queue, rx, n, move |job| {
            let deps = deps.clone();
            async move { dispatch_job(deps, job).await }
        })
    };
    worker(queues.review.clone(), review_rx, concurrency("REVIEW_CONCURRENCY", 2));
    worker(queues.comment_reply.clone(), reply_rx, concurrency("REPLY_CONCURRENCY", 2));
    worker(queues.index.clone(), index_rx, concurrency("INDEX_CONCURRENCY", 1));
    worker(queues.analytics.clone(), analytics_rx, concurrency("ANALYTICS_CONCURRENCY", 1));

    let state = Arc::new(api::AppState {
        store,
        queues,
        triggers: TriggerConfig::default(),
        bot_login: env_or("BOT_LOGIN", "grepiku"),
        webhook_secret: env_or("WEBHOOK_SECRET", ""),
    });
    api::serve(state, &env_or("BIND_ADDR", "0.0.0.0:8080"))
        .await
        .context("serving the webhook receiver")?;
    Ok(())
}
