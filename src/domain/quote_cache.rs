//! Last-write-wins cache of the latest observed quote per symbol.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::quote::Quote;

#[derive(Debug, Default)]
struct CacheState {
    quotes: HashMap<String, Quote>,
    updated_at: Option<DateTime<Utc>>,
}

/// Shared quote cache refreshed by the feed poller on its own schedule.
///
/// `replace` applies a full feed snapshot under one write lock: every symbol
/// in the delivery overwrites its previous quote, and symbols missing from
/// the delivery keep their last-known quote rather than being evicted.
/// Readers never observe a partially applied snapshot.
#[derive(Debug, Default)]
pub struct QuoteCache {
    state: RwLock<CacheState>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, quotes: Vec<Quote>) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for quote in quotes {
            state.quotes.insert(quote.symbol.clone(), quote);
        }
        state.updated_at = Some(Utc::now());
    }

    pub fn lookup(&self, symbol: &str) -> Option<Quote> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .quotes
            .get(symbol)
            .cloned()
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .quotes
            .get(symbol)
            .map(|q| q.last_price)
    }

    /// All cached quotes, sorted by symbol for stable display.
    pub fn quotes(&self) -> Vec<Quote> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut quotes: Vec<Quote> = state.quotes.values().cloned().collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        quotes
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .quotes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the cache last accepted a snapshot; `None` until the first one.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_at
    }

    /// Age of the latest snapshot, for staleness reporting.
    pub fn age(&self) -> Option<TimeDelta> {
        self.updated_at().map(|at| Utc::now() - at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, last_price: f64) -> Quote {
        Quote {
            symbol: symbol.into(),
            last_price,
            high: last_price,
            low: last_price,
            average: last_price,
            percent_change: 0.0,
            volume_lot: 0.0,
            turnover: 0.0,
        }
    }

    #[test]
    fn starts_empty() {
        let cache = QuoteCache::new();
        assert!(cache.is_empty());
        assert!(cache.lookup("THYAO").is_none());
        assert!(cache.updated_at().is_none());
    }

    #[test]
    fn replace_overwrites_by_symbol() {
        let cache = QuoteCache::new();
        cache.replace(vec![quote("THYAO", 100.0), quote("GARAN", 50.0)]);
        cache.replace(vec![quote("THYAO", 110.0)]);

        assert_eq!(cache.last_price("THYAO"), Some(110.0));
    }

    #[test]
    fn symbols_missing_from_snapshot_are_retained() {
        let cache = QuoteCache::new();
        cache.replace(vec![quote("THYAO", 100.0), quote("GARAN", 50.0)]);
        cache.replace(vec![quote("THYAO", 110.0)]);

        // GARAN was absent from the second snapshot: last-known price stands.
        assert_eq!(cache.last_price("GARAN"), Some(50.0));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replace_stamps_update_time() {
        let cache = QuoteCache::new();
        cache.replace(vec![quote("THYAO", 100.0)]);
        assert!(cache.updated_at().is_some());
        let age = cache.age().unwrap();
        assert!(age >= TimeDelta::zero());
    }

    #[test]
    fn quotes_sorted_by_symbol() {
        let cache = QuoteCache::new();
        cache.replace(vec![quote("THYAO", 1.0), quote("ASELS", 2.0), quote("GARAN", 3.0)]);
        let symbols: Vec<String> = cache.quotes().into_iter().map(|q| q.symbol).collect();
        assert_eq!(symbols, vec!["ASELS", "GARAN", "THYAO"]);
    }
}
