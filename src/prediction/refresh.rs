//! Staggered background refresh queue
//!
//! A single scheduler task owns a min-heap of due times fed over an mpsc
//! channel. Due jobs run inline on that task, so regenerations against the
//! rate-limited completion upstream are naturally serialized. Each symbol
//! appears at most once: `schedule` refuses while a refresh is pending or
//! running, and `cancel` is lazy (the heap entry is skipped when it pops).

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

type RefreshWorker = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

struct Scheduled {
    symbol: String,
    due: Instant,
    generation: u64,
}

pub struct RefreshQueue {
    tx: mpsc::UnboundedSender<Scheduled>,
    // symbol -> generation of its live schedule; entries persist while the job runs
    pending: Arc<DashMap<String, u64>>,
    generation: AtomicU64,
}

impl RefreshQueue {
    /// Spawn the scheduler task; `worker` runs once per due symbol
    pub fn new<F, Fut>(worker: F) -> Arc<Self>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job: RefreshWorker = Arc::new(move |symbol: String| -> BoxFuture<'static, ()> {
            Box::pin(worker(symbol))
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(DashMap::new());

        tokio::spawn(run_scheduler(rx, pending.clone(), job));

        Arc::new(Self {
            tx,
            pending,
            generation: AtomicU64::new(0),
        })
    }

    /// Queue a refresh for `symbol` after `delay`
    ///
    /// Returns false when a refresh for the symbol is already pending or
    /// running; the caller treats that as already handled.
    pub fn schedule(&self, symbol: &str, delay: Duration) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        match self.pending.entry(symbol.to_string()) {
            Entry::Occupied(_) => {
                debug!("Refresh already pending for {}; not scheduling another", symbol);
                return false;
            }
            Entry::Vacant(entry) => {
                entry.insert(generation);
            }
        }

        let scheduled = Scheduled {
            symbol: symbol.to_string(),
            due: Instant::now() + delay,
            generation,
        };
        if self.tx.send(scheduled).is_err() {
            // scheduler task is gone; leave no orphan marker behind
            self.pending.remove(symbol);
            return false;
        }

        debug!("⏳ Refresh for {} scheduled in {:?}", symbol, delay);
        true
    }

    /// Drop a pending refresh; returns whether one existed
    ///
    /// A job that already started cannot be cancelled; this only unmarks it
    /// so a later `schedule` succeeds.
    pub fn cancel(&self, symbol: &str) -> bool {
        let removed = self.pending.remove(symbol).is_some();
        if removed {
            debug!("Cancelled pending refresh for {}", symbol);
        }
        removed
    }

    /// Number of symbols with a refresh pending or running
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

async fn run_scheduler(
    mut rx: mpsc::UnboundedReceiver<Scheduled>,
    pending: Arc<DashMap<String, u64>>,
    worker: RefreshWorker,
) {
    let mut heap: BinaryHeap<Reverse<(Instant, u64, String)>> = BinaryHeap::new();

    loop {
        let next_due = heap.peek().map(|Reverse((due, _, _))| *due);

        tokio::select! {
            cmd = rx.recv() => {
                match cmd {
                    Some(item) => heap.push(Reverse((item.due, item.generation, item.symbol))),
                    None => break,
                }
            }
            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                if let Some(Reverse((_, generation, symbol))) = heap.pop() {
                    // a cancel (or cancel-then-reschedule) makes this entry stale
                    let live = pending
                        .get(&symbol)
                        .map(|current| *current == generation)
                        .unwrap_or(false);
                    if !live {
                        debug!("Skipping stale refresh entry for {}", symbol);
                        continue;
                    }

                    debug!("🔄 Running scheduled refresh for {}", symbol);
                    worker(symbol.clone()).await;
                    pending.remove_if(&symbol, |_, current| *current == generation);
                }
            }
        }
    }
}
