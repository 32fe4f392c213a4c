//! Held positions and their valuation helpers.

/// A held quantity of one instrument plus its weighted-average acquisition
/// cost. Quantity is always positive: a position that reaches zero is deleted
/// from the store, never kept as an empty row.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    /// Total acquisition cost of the held units at the current basis.
    pub fn cost_value(&self) -> f64 {
        self.quantity as f64 * self.average_cost
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.cost_value()
    }
}
