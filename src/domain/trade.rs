//! Trade planning: the pure arithmetic of buys and sells.
//!
//! Planning functions compute the full effect of a trade against a snapshot of
//! the book without touching any state; the engine commits the resulting fill
//! through the store in one transaction. A rejection means nothing changed.

use super::error::TradeRejection;
use super::position::Position;

/// Commission charged on a trade.
///
/// Deliberately a function of unit price alone, not of trade notional: buying
/// 1 share and 1000 shares at the same price pay the same commission. This
/// asymmetry is part of the game's economics, not a bug to correct.
pub fn commission_for(unit_price: f64, rate: f64) -> f64 {
    unit_price * rate
}

/// Store-side effect of a committed trade on the position row.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionChange {
    Upsert {
        symbol: String,
        quantity: i64,
        average_cost: f64,
    },
    Delete {
        symbol: String,
    },
}

/// Computed effect of an accepted buy.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    pub total_cost: f64,
    pub cash_after: f64,
    pub quantity_after: i64,
    pub average_cost_after: f64,
}

/// Computed effect of an accepted sell.
#[derive(Debug, Clone, PartialEq)]
pub struct SellFill {
    /// May be negative when commission exceeds proceeds; that is permitted.
    pub revenue: f64,
    pub cash_after: f64,
    pub quantity_after: i64,
    pub average_cost: f64,
    /// `revenue - quantity * average_cost`. Reported, never persisted.
    pub realized_pnl: f64,
}

/// Plan a buy of `quantity` units at `unit_price`.
///
/// The new cost basis is the weighted average of the existing holding and the
/// purchase: `(old_qty * old_avg + qty * price) / (old_qty + qty)`. Commission
/// is a pure cash expense and never enters the basis.
pub fn plan_buy(
    cash: f64,
    held: Option<&Position>,
    quantity: i64,
    unit_price: f64,
    commission: f64,
) -> Result<BuyFill, TradeRejection> {
    if quantity <= 0 {
        return Err(TradeRejection::InvalidQuantity { quantity });
    }

    let total_cost = unit_price * quantity as f64 + commission;
    if cash < total_cost {
        return Err(TradeRejection::InsufficientFunds {
            required: total_cost,
            available: cash,
        });
    }

    let (quantity_after, average_cost_after) = match held {
        Some(pos) => {
            let combined_quantity = pos.quantity + quantity;
            let combined_cost = pos.cost_value() + quantity as f64 * unit_price;
            (combined_quantity, combined_cost / combined_quantity as f64)
        }
        None => (quantity, unit_price),
    };

    Ok(BuyFill {
        total_cost,
        cash_after: cash - total_cost,
        quantity_after,
        average_cost_after,
    })
}

/// Plan a sell of `quantity` units at `unit_price`.
///
/// A partial sell leaves `average_cost` untouched; a sell that exhausts the
/// position deletes its row (`quantity_after == 0`).
pub fn plan_sell(
    cash: f64,
    held: Option<&Position>,
    symbol: &str,
    quantity: i64,
    unit_price: f64,
    commission: f64,
) -> Result<SellFill, TradeRejection> {
    if quantity <= 0 {
        return Err(TradeRejection::InvalidQuantity { quantity });
    }

    let pos = match held {
        Some(pos) if pos.quantity >= quantity => pos,
        other => {
            return Err(TradeRejection::InsufficientHoldings {
                symbol: symbol.to_string(),
                requested: quantity,
                held: other.map_or(0, |p| p.quantity),
            });
        }
    };

    let revenue = unit_price * quantity as f64 - commission;

    Ok(SellFill {
        revenue,
        cash_after: cash + revenue,
        quantity_after: pos.quantity - quantity,
        average_cost: pos.average_cost,
        realized_pnl: revenue - quantity as f64 * pos.average_cost,
    })
}

impl SellFill {
    /// The position row effect implied by this fill.
    pub fn position_change(&self, symbol: &str) -> PositionChange {
        if self.quantity_after == 0 {
            PositionChange::Delete {
                symbol: symbol.to_string(),
            }
        } else {
            PositionChange::Upsert {
                symbol: symbol.to_string(),
                quantity: self.quantity_after,
                average_cost: self.average_cost,
            }
        }
    }
}

impl BuyFill {
    pub fn position_change(&self, symbol: &str) -> PositionChange {
        PositionChange::Upsert {
            symbol: symbol.to_string(),
            quantity: self.quantity_after,
            average_cost: self.average_cost_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn held(quantity: i64, average_cost: f64) -> Position {
        Position {
            symbol: "THYAO".into(),
            quantity,
            average_cost,
        }
    }

    #[test]
    fn first_buy_sets_basis_to_unit_price() {
        let fill = plan_buy(1000.0, None, 10, 50.0, 0.1).unwrap();
        assert!((fill.total_cost - 500.1).abs() < EPS);
        assert!((fill.cash_after - 499.9).abs() < EPS);
        assert_eq!(fill.quantity_after, 10);
        assert!((fill.average_cost_after - 50.0).abs() < EPS);
    }

    #[test]
    fn repeat_buy_recomputes_weighted_average() {
        let pos = held(10, 50.0);
        let fill = plan_buy(10_000.0, Some(&pos), 10, 60.0, 0.12).unwrap();
        assert_eq!(fill.quantity_after, 20);
        // (10*50 + 10*60) / 20 = 55
        assert!((fill.average_cost_after - 55.0).abs() < EPS);
    }

    #[test]
    fn commission_excluded_from_basis() {
        let pos = held(10, 50.0);
        let with_fee = plan_buy(10_000.0, Some(&pos), 10, 60.0, 99.0).unwrap();
        let without_fee = plan_buy(10_000.0, Some(&pos), 10, 60.0, 0.0).unwrap();
        assert!((with_fee.average_cost_after - without_fee.average_cost_after).abs() < EPS);
    }

    #[test]
    fn buy_rejected_when_funds_short() {
        let result = plan_buy(499.9, None, 10, 60.0, 0.12);
        match result {
            Err(TradeRejection::InsufficientFunds {
                required,
                available,
            }) => {
                assert!((required - 600.12).abs() < EPS);
                assert!((available - 499.9).abs() < EPS);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn buy_rejects_non_positive_quantity() {
        assert_eq!(
            plan_buy(1000.0, None, 0, 50.0, 0.1),
            Err(TradeRejection::InvalidQuantity { quantity: 0 })
        );
        assert_eq!(
            plan_buy(1000.0, None, -5, 50.0, 0.1),
            Err(TradeRejection::InvalidQuantity { quantity: -5 })
        );
    }

    #[test]
    fn buy_exactly_affordable_is_accepted() {
        let fill = plan_buy(500.1, None, 10, 50.0, 0.1).unwrap();
        assert!(fill.cash_after.abs() < EPS);
    }

    #[test]
    fn partial_sell_keeps_basis() {
        let pos = held(10, 50.0);
        let fill = plan_sell(100.0, Some(&pos), "THYAO", 4, 55.0, 0.11).unwrap();
        assert_eq!(fill.quantity_after, 6);
        assert!((fill.average_cost - 50.0).abs() < EPS);
        assert!((fill.revenue - 219.89).abs() < EPS);
        assert!((fill.cash_after - 319.89).abs() < EPS);
        assert!(matches!(
            fill.position_change("THYAO"),
            PositionChange::Upsert { quantity: 6, .. }
        ));
    }

    #[test]
    fn full_sell_deletes_position() {
        let pos = held(10, 50.0);
        let fill = plan_sell(0.0, Some(&pos), "THYAO", 10, 55.0, 0.11).unwrap();
        assert_eq!(fill.quantity_after, 0);
        assert_eq!(
            fill.position_change("THYAO"),
            PositionChange::Delete {
                symbol: "THYAO".into()
            }
        );
    }

    #[test]
    fn sell_reports_realized_pnl() {
        let pos = held(10, 50.0);
        let fill = plan_sell(0.0, Some(&pos), "THYAO", 10, 55.0, 0.11).unwrap();
        // revenue 549.89, basis 500 -> +49.89
        assert!((fill.realized_pnl - 49.89).abs() < EPS);
    }

    #[test]
    fn sell_revenue_may_go_negative() {
        let pos = held(1, 50.0);
        let fill = plan_sell(10.0, Some(&pos), "THYAO", 1, 0.05, 0.2).unwrap();
        assert!(fill.revenue < 0.0);
        assert!((fill.cash_after - 9.85).abs() < EPS);
    }

    #[test]
    fn sell_rejected_beyond_holdings() {
        let pos = held(10, 50.0);
        let result = plan_sell(0.0, Some(&pos), "THYAO", 15, 55.0, 0.11);
        assert_eq!(
            result,
            Err(TradeRejection::InsufficientHoldings {
                symbol: "THYAO".into(),
                requested: 15,
                held: 10,
            })
        );
    }

    #[test]
    fn sell_rejected_when_nothing_held() {
        let result = plan_sell(0.0, None, "THYAO", 1, 55.0, 0.11);
        assert_eq!(
            result,
            Err(TradeRejection::InsufficientHoldings {
                symbol: "THYAO".into(),
                requested: 1,
                held: 0,
            })
        );
    }

    #[test]
    fn sell_rejects_non_positive_quantity() {
        let pos = held(10, 50.0);
        assert_eq!(
            plan_sell(0.0, Some(&pos), "THYAO", 0, 55.0, 0.11),
            Err(TradeRejection::InvalidQuantity { quantity: 0 })
        );
    }

    #[test]
    fn commission_scales_with_price_not_quantity() {
        // Pinned on purpose: the fee depends on unit price alone, so any two
        // trade sizes at the same price pay the same commission.
        let rate = 0.002;
        assert!((commission_for(50.0, rate) - 0.1).abs() < EPS);
        assert!((commission_for(60.0, rate) - 0.12).abs() < EPS);

        let small = plan_buy(100_000.0, None, 1, 50.0, commission_for(50.0, rate)).unwrap();
        let large = plan_buy(100_000.0, None, 1000, 50.0, commission_for(50.0, rate)).unwrap();
        let small_fee = small.total_cost - 1.0 * 50.0;
        let large_fee = large.total_cost - 1000.0 * 50.0;
        assert!((small_fee - large_fee).abs() < EPS);
    }
}
