use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::stream::StreamScheduler;

/// Process-wide count of active stream subscribers
///
/// The stream runs only while someone is listening: the first join starts
/// the scheduler, the last leave stops it. A disconnect without an explicit
/// unsubscribe goes through `forced_leave`, which decrements exactly like
/// `leave`. The count never drops below zero; an unmatched leave logs a
/// warning instead of wrapping.
pub struct SubscriptionRegistry {
    scheduler: Arc<StreamScheduler>,
    count: Mutex<usize>,
}

impl SubscriptionRegistry {
    pub fn new(scheduler: Arc<StreamScheduler>) -> Self {
        Self {
            scheduler,
            count: Mutex::new(0),
        }
    }

    /// Register a subscriber; the 0→1 transition starts the stream
    pub fn join(&self) -> usize {
        let mut count = self.count.lock();
        *count += 1;
        if *count == 1 {
            info!("👥 First subscriber joined; starting stream");
            self.scheduler.start();
        } else {
            debug!("👥 Subscriber joined; {} active", *count);
        }
        *count
    }

    /// Remove a subscriber; the 1→0 transition stops the stream
    pub fn leave(&self) -> usize {
        self.decrement("left")
    }

    /// Disconnect hook; identical semantics to [`leave`](Self::leave)
    pub fn forced_leave(&self) -> usize {
        self.decrement("disconnected")
    }

    pub fn active(&self) -> usize {
        *self.count.lock()
    }

    fn decrement(&self, verb: &str) -> usize {
        let mut count = self.count.lock();
        if *count == 0 {
            warn!("👥 Subscriber {} with no active subscriptions; count stays at zero", verb);
            return 0;
        }
        *count -= 1;
        if *count == 0 {
            info!("👥 Last subscriber {}; stopping stream", verb);
            self.scheduler.stop();
        } else {
            debug!("👥 Subscriber {}; {} active", verb, *count);
        }
        *count
    }
}
