//! Durable state access port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{Account, Portfolio, ValuationPoint};
use crate::domain::position::Position;
use crate::domain::trade::PositionChange;

/// Durable state behind the trading engine: one account, its positions, and
/// an append-only valuation history.
///
/// Contract: every mutating operation is atomic against the durable state.
/// `commit_trade` applies a trade's cash update and position upsert/delete as
/// one transaction — all of it takes effect or none of it does, with rollback
/// on every failure path. `portfolio` reads cash and positions in a single
/// consistent unit so a concurrent trade can never be observed half-applied.
pub trait StorePort {
    fn account(&self) -> Result<Account, PapertraderError>;

    /// Cash plus all positions, read in one transaction.
    fn portfolio(&self) -> Result<Portfolio, PapertraderError>;

    fn positions(&self) -> Result<Vec<Position>, PapertraderError>;

    fn position(&self, symbol: &str) -> Result<Option<Position>, PapertraderError>;

    fn set_cash(&self, amount: f64) -> Result<(), PapertraderError>;

    fn upsert_position(
        &self,
        symbol: &str,
        quantity: i64,
        average_cost: f64,
    ) -> Result<(), PapertraderError>;

    fn delete_position(&self, symbol: &str) -> Result<(), PapertraderError>;

    /// Atomically apply a committed trade: set cash and upsert/delete the
    /// traded position in one transaction.
    fn commit_trade(
        &self,
        cash_after: f64,
        change: &PositionChange,
    ) -> Result<(), PapertraderError>;

    /// Append one valuation point. The stored timestamp is clamped to the
    /// latest recorded one so history timestamps never decrease, even when
    /// the wall clock steps backwards.
    fn append_valuation(
        &self,
        timestamp: DateTime<Utc>,
        total_value: f64,
    ) -> Result<ValuationPoint, PapertraderError>;

    /// All valuation points in ascending time order.
    fn history(&self) -> Result<Vec<ValuationPoint>, PapertraderError>;
}
