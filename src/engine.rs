//! Trading and valuation services: the command/query surface of the game.
//!
//! The presentation layer talks only to [`TradingEngine`] and
//! [`ValuationService`]; it never touches the store directly.

use chrono::{TimeDelta, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::domain::error::{PapertraderError, TradeRejection};
use crate::domain::portfolio::{Account, Portfolio, ValuationPoint};
use crate::domain::position::Position;
use crate::domain::quote::Quote;
use crate::domain::quote_cache::QuoteCache;
use crate::domain::settings::GameSettings;
use crate::domain::trade::{commission_for, plan_buy, plan_sell};
use crate::ports::store_port::StorePort;

pub type SharedStore = Arc<dyn StorePort + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Confirmation of a committed trade, rendered directly to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub side: TradeSide,
    pub symbol: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub commission: f64,
    /// Cash delta magnitude: total cost for buys, net proceeds for sells.
    pub total: f64,
    pub cash_after: f64,
    /// Sells only; computed against the position's basis, never persisted.
    pub realized_pnl: Option<f64>,
}

impl fmt::Display for TradeReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            TradeSide::Buy => write!(
                f,
                "bought {} {} at {:.2} (commission {:.2}, total {:.2}), cash {:.2}",
                self.quantity,
                self.symbol,
                self.unit_price,
                self.commission,
                self.total,
                self.cash_after
            ),
            TradeSide::Sell => {
                let pnl = self.realized_pnl.unwrap_or(0.0);
                write!(
                    f,
                    "sold {} {} at {:.2} (commission {:.2}, proceeds {:.2}), realized {}{:.2}, cash {:.2}",
                    self.quantity,
                    self.symbol,
                    self.unit_price,
                    self.commission,
                    self.total,
                    if pnl >= 0.0 { "+" } else { "" },
                    pnl,
                    self.cash_after
                )
            }
        }
    }
}

/// Computes net-worth snapshots and serves the equity curve.
///
/// Cloning is cheap; clones share the same store and quote cache.
#[derive(Clone)]
pub struct ValuationService {
    store: SharedStore,
    quotes: Arc<QuoteCache>,
    stale_after_secs: i64,
}

impl ValuationService {
    pub fn new(store: SharedStore, quotes: Arc<QuoteCache>, stale_after_secs: i64) -> Self {
        Self {
            store,
            quotes,
            stale_after_secs,
        }
    }

    /// Compute total net worth (cash + mark-to-market positions) from one
    /// consistent store read and append it to the valuation history.
    ///
    /// Positions without a cached quote are valued at their own average cost;
    /// a stale last-known price is a better estimate than zero.
    pub fn snapshot(&self) -> Result<ValuationPoint, PapertraderError> {
        let portfolio = self.store.portfolio()?;

        if !portfolio.positions.is_empty() {
            match self.quotes.age() {
                None => warn!("quote cache empty; valuing positions at cost basis"),
                Some(age) if age > TimeDelta::seconds(self.stale_after_secs) => {
                    warn!(age_secs = age.num_seconds(), "quote cache is stale")
                }
                _ => {}
            }
        }

        let total_value = portfolio.total_value(|symbol| self.quotes.last_price(symbol));
        let point = self.store.append_valuation(Utc::now(), total_value)?;
        debug!(total_value = point.total_value, "valuation snapshot recorded");
        Ok(point)
    }

    /// The full equity curve, ascending by time.
    pub fn history(&self) -> Result<Vec<ValuationPoint>, PapertraderError> {
        self.store.history()
    }
}

/// Applies buy/sell commands to the store and serves read queries.
pub struct TradingEngine {
    store: SharedStore,
    quotes: Arc<QuoteCache>,
    valuation: ValuationService,
    commission_rate: f64,
    /// Serializes each trade's full read-modify-write; two concurrent trades
    /// on the account must not interleave between plan and commit.
    trade_lock: Mutex<()>,
}

impl TradingEngine {
    pub fn new(store: SharedStore, quotes: Arc<QuoteCache>, settings: &GameSettings) -> Self {
        let valuation =
            ValuationService::new(store.clone(), quotes.clone(), settings.stale_after_secs);
        TradingEngine {
            store,
            quotes,
            valuation,
            commission_rate: settings.commission_rate,
            trade_lock: Mutex::new(()),
        }
    }

    pub fn valuation(&self) -> ValuationService {
        self.valuation.clone()
    }

    pub fn quote_cache(&self) -> Arc<QuoteCache> {
        self.quotes.clone()
    }

    pub fn account(&self) -> Result<Account, PapertraderError> {
        self.store.account()
    }

    pub fn positions(&self) -> Result<Vec<Position>, PapertraderError> {
        self.store.positions()
    }

    /// Cash and positions read in one consistent unit, for display.
    pub fn portfolio(&self) -> Result<Portfolio, PapertraderError> {
        self.store.portfolio()
    }

    pub fn history(&self) -> Result<Vec<ValuationPoint>, PapertraderError> {
        self.store.history()
    }

    /// Feed a quote snapshot into the cache.
    pub fn update_quotes(&self, quotes: Vec<Quote>) {
        self.quotes.replace(quotes);
    }

    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.lookup(symbol)
    }

    /// All cached quotes, sorted by symbol.
    pub fn market(&self) -> Vec<Quote> {
        self.quotes.quotes()
    }

    /// Buy `quantity` units at the latest cached price.
    pub fn buy(&self, symbol: &str, quantity: i64) -> Result<TradeReceipt, PapertraderError> {
        let (unit_price, commission) = self.price_trade(symbol, quantity)?;

        let _guard = self
            .trade_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let portfolio = self.store.portfolio()?;
        let fill = plan_buy(
            portfolio.cash,
            portfolio.position(symbol),
            quantity,
            unit_price,
            commission,
        )
        .inspect_err(|rejection| debug!(%rejection, symbol, "buy rejected"))?;

        self.store
            .commit_trade(fill.cash_after, &fill.position_change(symbol))?;
        info!(
            symbol,
            quantity,
            unit_price,
            commission,
            cash_after = fill.cash_after,
            "buy committed"
        );

        self.snapshot_after_trade();

        Ok(TradeReceipt {
            side: TradeSide::Buy,
            symbol: symbol.to_string(),
            quantity,
            unit_price,
            commission,
            total: fill.total_cost,
            cash_after: fill.cash_after,
            realized_pnl: None,
        })
    }

    /// Sell `quantity` units at the latest cached price.
    pub fn sell(&self, symbol: &str, quantity: i64) -> Result<TradeReceipt, PapertraderError> {
        let (unit_price, commission) = self.price_trade(symbol, quantity)?;

        let _guard = self
            .trade_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let portfolio = self.store.portfolio()?;
        let fill = plan_sell(
            portfolio.cash,
            portfolio.position(symbol),
            symbol,
            quantity,
            unit_price,
            commission,
        )
        .inspect_err(|rejection| debug!(%rejection, symbol, "sell rejected"))?;

        self.store
            .commit_trade(fill.cash_after, &fill.position_change(symbol))?;
        info!(
            symbol,
            quantity,
            unit_price,
            commission,
            realized_pnl = fill.realized_pnl,
            cash_after = fill.cash_after,
            "sell committed"
        );

        self.snapshot_after_trade();

        Ok(TradeReceipt {
            side: TradeSide::Sell,
            symbol: symbol.to_string(),
            quantity,
            unit_price,
            commission,
            total: fill.revenue,
            cash_after: fill.cash_after,
            realized_pnl: Some(fill.realized_pnl),
        })
    }

    /// Resolve the unit price and commission for a trade request. Quantity is
    /// validated first so `buy(sym, 0)` on an unquoted symbol still reports
    /// `InvalidQuantity`.
    fn price_trade(
        &self,
        symbol: &str,
        quantity: i64,
    ) -> Result<(f64, f64), PapertraderError> {
        if quantity <= 0 {
            return Err(TradeRejection::InvalidQuantity { quantity }.into());
        }
        let quote =
            self.quotes
                .lookup(symbol)
                .ok_or_else(|| TradeRejection::QuoteUnavailable {
                    symbol: symbol.to_string(),
                })?;
        let unit_price = quote.last_price;
        Ok((unit_price, commission_for(unit_price, self.commission_rate)))
    }

    /// A snapshot after a committed trade is best-effort bookkeeping: failure
    /// is logged, never propagated into the already-committed trade's result.
    fn snapshot_after_trade(&self) {
        if let Err(e) = self.valuation.snapshot() {
            warn!(error = %e, "post-trade valuation snapshot failed");
        }
    }
}
