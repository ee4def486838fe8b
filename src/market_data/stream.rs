use chrono::Utc;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::market_data::calendar;
use crate::market_data::quote_cache::QuoteCache;
use crate::market_data::source::QuoteSource;
use crate::metrics::LatencyTracker;
use crate::models::{QuotePoint, StockUpdate};
use crate::providers::{DailyCandle, QuoteProvider};
use crate::websocket::broadcaster::{topics, Broadcaster};
use crate::websocket::messages::WsMessage;

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Stopped,
    Running,
}

/// Stream scheduler configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Symbols produced every tick
    pub symbols: Vec<String>,
    pub tick_interval: Duration,
    /// Delay before the first tick so the transport finishes wiring
    pub start_grace: Duration,
    /// Days of daily candles seeded into each cache on first activation
    pub history_seed_days: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            symbols: vec![
                "AAPL".to_string(),
                "GOOGL".to_string(),
                "MSFT".to_string(),
                "AMZN".to_string(),
                "TSLA".to_string(),
            ],
            tick_interval: Duration::from_millis(1000),
            start_grace: Duration::from_millis(500),
            history_seed_days: 30,
        }
    }
}

impl StreamConfig {
    /// Build configuration from the environment, falling back to defaults
    pub fn with_env_config() -> Self {
        let defaults = Self::default();

        let symbols = std::env::var("TRACKED_SYMBOLS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|symbols| !symbols.is_empty())
            .unwrap_or(defaults.symbols);

        let tick_interval = std::env::var("STREAM_TICK_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);

        let start_grace = std::env::var("STREAM_START_GRACE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.start_grace);

        let history_seed_days = std::env::var("HISTORY_SEED_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.history_seed_days);

        info!(
            "⚙️  Stream config: symbols={:?}, tick={:?}, grace={:?}",
            symbols, tick_interval, start_grace
        );

        Self {
            symbols,
            tick_interval,
            start_grace,
            history_seed_days,
        }
    }
}

/// Scheduler state for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StreamStatus {
    pub state: StreamState,
    pub tracked_symbols: Vec<String>,
    pub tick_interval_ms: u64,
    pub ticks_completed: u64,
}

/// Periodic market data producer
///
/// While running, every tick consults the market calendar, produces one
/// QuotePoint per tracked symbol (live fetches during the session, synthesis
/// otherwise), appends them to the quote cache and publishes one batched
/// update on the bus. Ticks that produce nothing publish nothing.
///
/// `start` is idempotent; `stop` signals shutdown over a watch channel so
/// the next tick is cancelled while an in-flight tick completes.
pub struct StreamScheduler {
    source: Arc<QuoteSource>,
    cache: Arc<QuoteCache>,
    provider: Arc<dyn QuoteProvider>,
    broadcaster: Broadcaster,
    latency: Arc<LatencyTracker>,
    config: StreamConfig,
    state: Arc<RwLock<StreamState>>,
    shutdown_tx: Arc<Mutex<Option<watch::Sender<bool>>>>,
    /// Historical seeding runs once, on the first activation
    seeded: Arc<AtomicBool>,
    ticks_completed: Arc<AtomicU64>,
}

impl StreamScheduler {
    pub fn new(
        source: Arc<QuoteSource>,
        cache: Arc<QuoteCache>,
        provider: Arc<dyn QuoteProvider>,
        broadcaster: Broadcaster,
        latency: Arc<LatencyTracker>,
        config: StreamConfig,
    ) -> Self {
        Self {
            source,
            cache,
            provider,
            broadcaster,
            latency,
            config,
            state: Arc::new(RwLock::new(StreamState::Stopped)),
            shutdown_tx: Arc::new(Mutex::new(None)),
            seeded: Arc::new(AtomicBool::new(false)),
            ticks_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == StreamState::Running
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            state: self.state(),
            tracked_symbols: self.config.symbols.clone(),
            tick_interval_ms: self.config.tick_interval.as_millis() as u64,
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
        }
    }

    /// Start the tick loop; a no-op when already running
    pub fn start(&self) {
        {
            let mut state = self.state.write();
            if *state == StreamState::Running {
                debug!("Stream scheduler already running");
                return;
            }
            *state = StreamState::Running;
        }

        let (tx, rx) = watch::channel(false);
        *self.shutdown_tx.lock() = Some(tx);

        if !self.seeded.swap(true, Ordering::SeqCst) {
            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.seed_history().await });
        }

        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run_loop(rx).await });

        info!("🚀 Stream scheduler started");
    }

    /// Signal the loop to stop after any in-flight tick; a no-op when stopped
    pub fn stop(&self) {
        {
            let mut state = self.state.write();
            if *state == StreamState::Stopped {
                debug!("Stream scheduler already stopped");
                return;
            }
            *state = StreamState::Stopped;
        }

        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }

        info!("🛑 Stream scheduler stopping");
    }

    async fn run_loop(self, mut shutdown_rx: watch::Receiver<bool>) {
        if !self.config.start_grace.is_zero() {
            tokio::time::sleep(self.config.start_grace).await;
        }

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "📡 Stream loop running: {} symbols every {:?}",
            self.config.symbols.len(),
            self.config.tick_interval
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let session_open = calendar::is_session_open(Utc::now());
                    self.run_tick(session_open).await;
                }
                result = shutdown_rx.changed() => {
                    // sender sent true or was dropped; either way we are done
                    if result.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("📡 Stream loop exited");
    }

    /// Produce, cache and broadcast one tick's worth of points
    async fn run_tick(&self, session_open: bool) {
        let tick_start = Instant::now();

        let fetch_start = Instant::now();
        let points = self.collect_points(session_open).await;
        self.latency.record_fetch(fetch_start);

        if points.is_empty() {
            debug!("Tick produced no points; skipping broadcast");
            self.latency.record_total_tick(tick_start);
            self.ticks_completed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut update = StockUpdate::new();
        for point in points {
            self.cache.append(&point.symbol, point.clone());
            update.insert(point);
        }
        let produced = update.len();

        let broadcast_start = Instant::now();
        self.broadcaster
            .publish(topics::stocks(), WsMessage::from(update));
        self.latency.record_broadcast(broadcast_start);

        self.latency.record_total_tick(tick_start);
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);

        debug!(
            "📊 Tick complete: {} symbols updated, session_open={}",
            produced, session_open
        );
    }

    /// One point per symbol; failures inside the selector never affect
    /// the other symbols
    async fn collect_points(&self, session_open: bool) -> Vec<QuotePoint> {
        if session_open {
            let fetches = self
                .config
                .symbols
                .iter()
                .map(|symbol| self.source.next_quote(symbol));
            join_all(fetches).await.into_iter().flatten().collect()
        } else {
            self.config
                .symbols
                .iter()
                .filter_map(|symbol| self.source.simulated_quote(symbol))
                .collect()
        }
    }

    /// Seed each symbol cache with recent daily history; failures leave that
    /// symbol empty and never block the stream
    async fn seed_history(&self) {
        info!(
            "📥 Seeding {}-day history for {} symbols",
            self.config.history_seed_days,
            self.config.symbols.len()
        );

        for symbol in &self.config.symbols {
            match self
                .provider
                .historical(symbol, self.config.history_seed_days)
                .await
            {
                Ok(candles) if !candles.is_empty() => {
                    if let Some(last) = candles.last() {
                        self.source.seed_price(symbol, last.close);
                    }
                    let points = candles
                        .into_iter()
                        .map(|candle| candle_to_point(symbol, candle))
                        .collect();
                    self.cache.seed(symbol, points);
                }
                Ok(_) => debug!("No history returned for {}", symbol),
                Err(e) => warn!("⚠️  History seed failed for {}: {}", symbol, e),
            }
        }
    }
}

impl Clone for StreamScheduler {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
            provider: Arc::clone(&self.provider),
            broadcaster: self.broadcaster.clone(),
            latency: Arc::clone(&self.latency),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
            seeded: Arc::clone(&self.seeded),
            ticks_completed: Arc::clone(&self.ticks_completed),
        }
    }
}

/// Map a seeded daily candle onto the stream's point shape
fn candle_to_point(symbol: &str, candle: DailyCandle) -> QuotePoint {
    let change = candle.close - candle.open;
    let change_percent = if candle.open.is_zero() {
        Decimal::ZERO
    } else {
        (change / candle.open * Decimal::ONE_HUNDRED).round_dp(4)
    };

    QuotePoint {
        symbol: symbol.to_string(),
        timestamp: candle.timestamp,
        price: candle.close,
        change,
        change_percent,
        volume: candle.volume,
        day_high: candle.high,
        day_low: candle.low,
        bid: candle.close - Decimal::new(1, 2),
        ask: candle.close + Decimal::new(1, 2),
        market_cap: None,
        currency: "USD".to_string(),
    }
}
