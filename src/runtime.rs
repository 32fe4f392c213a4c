//! Background workers: the quote poller and the valuation timer.
//!
//! Both run as plain threads on their own intervals, fully decoupled from the
//! trade path: a slow or failing feed poll never blocks or fails a trade, and
//! stopping a worker never touches an in-flight store transaction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::quote_cache::QuoteCache;
use crate::engine::ValuationService;
use crate::ports::quote_feed_port::QuoteFeedPort;

pub type SharedQuoteFeed = Arc<dyn QuoteFeedPort + Send + Sync>;

/// Handle to a running background worker. `stop()` requests shutdown and
/// joins the thread; dropping the handle requests shutdown without waiting.
pub struct WorkerHandle {
    name: &'static str,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Sleep up to `duration`, waking early when `stop` is raised.
fn sleep_interruptibly(stop: &AtomicBool, duration: Duration) {
    const SLICE: Duration = Duration::from_millis(50);
    let mut remaining = duration;
    while !stop.load(Ordering::Relaxed) && remaining > Duration::ZERO {
        let nap = remaining.min(SLICE);
        thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}

/// Poll the quote feed on `interval`, replacing the cache with each accepted
/// snapshot. Fetch failures are logged and the previous snapshot stands.
pub fn spawn_quote_poller(
    feed: SharedQuoteFeed,
    cache: Arc<QuoteCache>,
    interval: Duration,
) -> WorkerHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        while !stop_flag.load(Ordering::Relaxed) {
            match feed.fetch_quotes() {
                Ok(quotes) => {
                    debug!(count = quotes.len(), "quote snapshot accepted");
                    cache.replace(quotes);
                }
                Err(e) => warn!(error = %e, "quote fetch failed; keeping last snapshot"),
            }
            sleep_interruptibly(&stop_flag, interval);
        }
    });

    WorkerHandle {
        name: "quote-poller",
        stop,
        handle: Some(handle),
    }
}

/// Record a valuation snapshot every `interval`, independent of the
/// trade-triggered snapshots.
pub fn spawn_valuation_timer(valuation: ValuationService, interval: Duration) -> WorkerHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        loop {
            sleep_interruptibly(&stop_flag, interval);
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            if let Err(e) = valuation.snapshot() {
                warn!(error = %e, "scheduled valuation snapshot failed");
            }
        }
    });

    WorkerHandle {
        name: "valuation-timer",
        stop,
        handle: Some(handle),
    }
}
