use std::sync::Arc;
use stock_stream_api::api::{create_router, AppState};
use stock_stream_api::database::{PredictionRepository, SqlitePredictionRepository};
use stock_stream_api::market_data::{
    QuoteCache, QuoteSource, StreamConfig, StreamScheduler, SubscriptionRegistry,
};
use stock_stream_api::metrics::LatencyTracker;
use stock_stream_api::prediction::{PredictionConfig, PredictionGenerator, PredictionService};
use stock_stream_api::providers::{
    CompletionProvider, NewsClient, NewsProvider, OpenAiClient, QuoteProvider, YahooFinanceClient,
};
use stock_stream_api::websocket::{Broadcaster, WsState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_stream_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Upstream providers
    let quotes: Arc<dyn QuoteProvider> = Arc::new(YahooFinanceClient::with_env_config());
    let completions: Arc<dyn CompletionProvider> = Arc::new(OpenAiClient::with_env_config());
    let news: Arc<dyn NewsProvider> = Arc::new(NewsClient::with_env_config());

    if std::env::var("OPENAI_API_KEY").unwrap_or_default().is_empty() {
        tracing::warn!("⚠️ OPENAI_API_KEY not set; prediction generation will fail until configured");
    }

    // Market data pipeline
    let cache = Arc::new(QuoteCache::with_env_config());
    let source = Arc::new(QuoteSource::new(quotes.clone()));
    let broadcaster = Broadcaster::new();
    let latency = Arc::new(LatencyTracker::new());

    let scheduler = Arc::new(StreamScheduler::new(
        source,
        cache.clone(),
        quotes.clone(),
        broadcaster.clone(),
        latency.clone(),
        StreamConfig::with_env_config(),
    ));
    let registry = Arc::new(SubscriptionRegistry::new(scheduler.clone()));

    // Prediction stack
    let db_path =
        std::env::var("PREDICTIONS_DB_PATH").unwrap_or_else(|_| "predictions.db".to_string());
    let store: Arc<dyn PredictionRepository> = Arc::new(
        SqlitePredictionRepository::open(&db_path).expect("Failed to open prediction store"),
    );
    let generator = Arc::new(PredictionGenerator::new(
        quotes,
        completions,
        news,
        store.clone(),
    ));
    let predictions = Arc::new(PredictionService::new(
        generator,
        store,
        PredictionConfig::with_env_config(),
    ));

    // Create WebSocket state
    let ws_state = Arc::new(WsState {
        broadcaster,
        registry: registry.clone(),
    });

    let state = AppState {
        cache,
        scheduler,
        registry,
        latency,
        predictions,
    };

    let app = create_router(state, ws_state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    tracing::info!("🚀 Stock Stream API server running on http://{}", addr);
    tracing::info!("📊 Health check: http://{}/health", addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", addr);
    tracing::info!("🔌 WebSocket: ws://{}/ws", addr);
    tracing::info!("");
    tracing::info!("📡 WebSocket subscription example:");
    tracing::info!(r#"   {{"action":"subscribe","channel":"stocks"}}"#);

    // Start the server
    axum::serve(listener, app).await.unwrap();
}
