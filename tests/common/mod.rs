#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use papertrader::adapters::sqlite_store::SqliteStore;
use papertrader::domain::error::PapertraderError;
use papertrader::domain::quote::Quote;
use papertrader::domain::quote_cache::QuoteCache;
use papertrader::domain::settings::GameSettings;
use papertrader::engine::TradingEngine;
use papertrader::ports::quote_feed_port::QuoteFeedPort;

pub fn make_quote(symbol: &str, last_price: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        last_price,
        high: last_price * 1.02,
        low: last_price * 0.98,
        average: last_price,
        percent_change: 0.0,
        volume_lot: 1_000_000.0,
        turnover: last_price * 1_000_000.0,
    }
}

pub fn new_game(starting_cash: f64) -> TradingEngine {
    new_game_with(GameSettings::default(), starting_cash).0
}

pub fn new_game_with_store(starting_cash: f64) -> (TradingEngine, Arc<SqliteStore>) {
    let (engine, store) = new_game_with(GameSettings::default(), starting_cash);
    (engine, store)
}

pub fn new_game_with(
    settings: GameSettings,
    starting_cash: f64,
) -> (TradingEngine, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.initialize_schema(starting_cash).unwrap();
    let engine = TradingEngine::new(store.clone(), Arc::new(QuoteCache::new()), &settings);
    (engine, store)
}

pub struct MockQuoteFeed {
    quotes: Mutex<Vec<Quote>>,
    error: Option<String>,
}

impl MockQuoteFeed {
    pub fn new() -> Self {
        Self {
            quotes: Mutex::new(Vec::new()),
            error: None,
        }
    }

    pub fn with_quotes(self, quotes: Vec<Quote>) -> Self {
        *self.quotes.lock().unwrap() = quotes;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    pub fn set_quotes(&self, quotes: Vec<Quote>) {
        *self.quotes.lock().unwrap() = quotes;
    }
}

impl QuoteFeedPort for MockQuoteFeed {
    fn fetch_quotes(&self) -> Result<Vec<Quote>, PapertraderError> {
        if let Some(reason) = &self.error {
            return Err(PapertraderError::QuoteFeed {
                reason: reason.clone(),
            });
        }
        Ok(self.quotes.lock().unwrap().clone())
    }
}
