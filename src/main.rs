use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cinescope::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, CacheStore, MemoryCache, PgMetadataStore},
    routes::{create_router, AppState},
    services::{
        providers::{DisabledLlmClient, FlatIndex, HttpEmbedder, HttpLlmClient, LlmClient},
        SearchContext, SearchPipeline,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cinescope=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.pipeline_settings()?;

    // 1. Metadata store
    let pool = create_pool(&config.database_url).await?;
    let metadata = Arc::new(PgMetadataStore::new(pool));

    // 2. Cache (Redis when enabled, in-process otherwise)
    let (cache, cache_writer): (Arc<dyn CacheStore>, _) = if config.cache_enabled {
        let client = create_redis_client(&config.redis_url)?;
        let (cache, handle) = Cache::new(client).await;
        (Arc::new(cache) as Arc<dyn CacheStore>, Some(handle))
    } else {
        tracing::info!("Redis disabled, using in-process cache");
        (Arc::new(MemoryCache::new()) as Arc<dyn CacheStore>, None)
    };

    // 3. Vector index and embedder
    let index = Arc::new(FlatIndex::load(&config.index_path)?);
    let embedder = Arc::new(HttpEmbedder::new(
        config.embedding_api_url.clone(),
        config.embedding_api_key.clone(),
        config.embedding_model.clone(),
        config.embedding_dimension,
        Duration::from_millis(config.embedding_timeout_ms),
        cache.clone(),
        config.embedding_cache_ttl_secs,
    )?
    .with_requested_dimensions(config.embedding_request_dimensions));

    // 4. LLM for re-ranking
    let llm: Arc<dyn LlmClient> = if config.rerank_enabled && !config.llm_api_key.is_empty() {
        Arc::new(HttpLlmClient::new(
            config.llm_api_url.clone(),
            config.llm_api_key.clone(),
            config.llm_model.clone(),
        )?)
    } else {
        tracing::warn!("No LLM configured, results keep their fused order");
        Arc::new(DisabledLlmClient)
    };

    let pipeline = SearchPipeline::new(
        SearchContext {
            metadata,
            index,
            embedder,
            llm,
            cache,
        },
        settings,
    )?;

    let app = create_router(AppState::new(pipeline));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
