use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use strikebook::pricing::{HttpPriceSource, MockPriceSource, PriceSource};
use strikebook::{api, config::Config, db::init_db, LifecycleManager, MarginLedger, Repository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = Config::from_env().context("configuration error")?;
    let port = config.port;

    // Initialize database and dependencies
    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;

    let repo = Arc::new(Repository::new(pool));
    let ledger = Arc::new(MarginLedger::new(repo.clone(), config.close_retry_limit));
    let lifecycle = Arc::new(LifecycleManager::new(
        repo.clone(),
        ledger.clone(),
        config.close_retry_limit,
    ));
    let pricing: Arc<dyn PriceSource> = match &config.pricing_api_url {
        Some(url) => Arc::new(HttpPriceSource::new(url.clone())),
        // Without a configured quote API, positions render without a
        // display price.
        None => Arc::new(MockPriceSource::new()),
    };

    // Create router
    let app = api::create_router(api::AppState::new(
        repo,
        lifecycle,
        ledger,
        pricing,
        config,
    ));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
