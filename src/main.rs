use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use prn_sync::auth::{ClientCredentials, TokenCache};
use prn_sync::config::{Config, UpstreamConfig};
use prn_sync::http::{build_http_client, rate_limiter, ApiClient};
use prn_sync::jobs::{self, Upstreams};
use prn_sync::store::{MemoryCursorStore, PgCursorStore};
use prn_sync::sync::{self, BatchLimits, CursorStore, JobRegistry, JobRunner, SyncCursor};
use prn_sync::{api, AppState, SharedState};

/// One API client per upstream, each with its own token cache.
fn upstream_client(name: &str, upstream: &UpstreamConfig, http: &reqwest::Client) -> ApiClient {
    let source = ClientCredentials::new(name, upstream, http.clone());
    let tokens = Arc::new(TokenCache::new(Arc::new(source)));
    ApiClient::new(name, upstream.base_url.clone(), http.clone()).with_tokens(tokens)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prn_sync=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("prn-sync v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    // Cursor store
    let store: Arc<dyn CursorStore> = match &config.database_url {
        Some(url) => {
            let store = PgCursorStore::new(url).await?;
            store.migrate().await?;
            info!("Cursor store connected and migrated ✓");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, cursors are kept in memory only");
            Arc::new(MemoryCursorStore::new())
        }
    };
    let cursor = SyncCursor::new(store, config.default_start_date);

    // Upstream clients
    let http = build_http_client(config.http_timeout_secs)?;
    let npwd_limiter = Arc::new(rate_limiter(config.npwd_requests_per_second));
    let upstreams = Upstreams {
        npwd: Arc::new(upstream_client("npwd", &config.npwd, &http).with_rate_limiter(npwd_limiter)),
        rrepw: Arc::new(upstream_client("rrepw", &config.rrepw, &http)),
        organisations: Arc::new(upstream_client("organisations", &config.organisations, &http)),
    };

    let limits = BatchLimits::new(config.npwd_max_parallelism, config.npwd_requests_per_second);
    let mut registry = JobRegistry::new();
    jobs::register_defaults(&mut registry, &upstreams, limits);
    info!("Registered {} sync jobs", registry.count());

    let mut runner = JobRunner::new(cursor);
    if config.run_timeout_secs > 0 {
        runner = runner.with_run_timeout(Duration::from_secs(config.run_timeout_secs));
    }

    // Build shared state
    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        runner,
        registry,
    });

    // Start sync daemon
    let shutdown = CancellationToken::new();
    let daemon = tokio::spawn(sync::sync_daemon(state.clone(), shutdown.clone()));

    // Build router
    let app = api::router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            server_shutdown.cancel();
        })
        .await?;

    daemon.await?;
    Ok(())
}
