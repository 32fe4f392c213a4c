//! Account, consistent portfolio view, and the valuation history point.

use chrono::{DateTime, Utc};

use super::position::Position;

/// The single player's cash balance record.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub cash: f64,
}

/// One point of the equity curve. Immutable once appended; timestamps are
/// non-decreasing per account (the store clamps a stepped-back clock).
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationPoint {
    pub account_id: i64,
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
}

/// Cash plus positions read from the store in one consistent unit.
///
/// Valuation must mark this view to market as a whole; reading cash and
/// positions through two separate store calls could observe a torn state
/// between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub positions: Vec<Position>,
}

impl Portfolio {
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Total net worth: cash plus mark-to-market value of every position.
    ///
    /// `price_for` returns the latest known price for a symbol, or `None`
    /// when no quote has ever been observed; an unquoted position is valued
    /// at its own average cost rather than zero.
    pub fn total_value<F>(&self, price_for: F) -> f64
    where
        F: Fn(&str) -> Option<f64>,
    {
        let position_value: f64 = self
            .positions
            .iter()
            .map(|pos| pos.market_value(price_for(&pos.symbol).unwrap_or(pos.average_cost)))
            .sum();
        self.cash + position_value
    }
}
