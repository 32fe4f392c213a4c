//! Property tests for money conservation and cost-basis arithmetic.

mod common;

use approx::abs_diff_eq;
use common::*;
use papertrader::domain::error::PapertraderError;
use papertrader::domain::settings::DEFAULT_COMMISSION_RATE;
use proptest::prelude::*;

const SYMBOLS: [&str; 3] = ["THYAO", "GARAN", "ASELS"];

#[derive(Debug, Clone)]
struct Order {
    is_buy: bool,
    symbol_idx: usize,
    quantity: i64,
    price: f64,
}

fn order_strategy() -> impl Strategy<Value = Order> {
    (any::<bool>(), 0..SYMBOLS.len(), 1..50i64, 1.0..500.0f64).prop_map(
        |(is_buy, symbol_idx, quantity, price)| Order {
            is_buy,
            symbol_idx,
            quantity,
            price,
        },
    )
}

proptest! {
    /// For any sequence of buys and sells, cash moves by exactly
    /// `price * quantity ± commission` per accepted trade and not at all for
    /// rejected ones.
    #[test]
    fn money_is_conserved_across_trade_sequences(
        orders in prop::collection::vec(order_strategy(), 1..40)
    ) {
        let engine = new_game(10_000.0);
        let mut expected_cash = 10_000.0;
        let mut expected_quantity = [0i64; 3];

        for order in orders {
            let symbol = SYMBOLS[order.symbol_idx];
            engine.update_quotes(vec![make_quote(symbol, order.price)]);
            let commission = order.price * DEFAULT_COMMISSION_RATE;

            let result = if order.is_buy {
                engine.buy(symbol, order.quantity)
            } else {
                engine.sell(symbol, order.quantity)
            };

            match result {
                Ok(_) => {
                    if order.is_buy {
                        expected_cash -= order.price * order.quantity as f64 + commission;
                        expected_quantity[order.symbol_idx] += order.quantity;
                    } else {
                        expected_cash += order.price * order.quantity as f64 - commission;
                        expected_quantity[order.symbol_idx] -= order.quantity;
                    }
                }
                Err(PapertraderError::Trade(_)) => {} // rejected: no state change
                Err(e) => return Err(TestCaseError::fail(format!("store error: {e}"))),
            }
        }

        let account = engine.account().unwrap();
        prop_assert!(abs_diff_eq!(account.cash, expected_cash, epsilon = 1e-6));
        prop_assert!(account.cash >= -1e-9, "cash went negative: {}", account.cash);

        for (idx, symbol) in SYMBOLS.iter().enumerate() {
            let held = engine
                .positions()
                .unwrap()
                .into_iter()
                .find(|p| p.symbol == *symbol)
                .map_or(0, |p| p.quantity);
            prop_assert_eq!(held, expected_quantity[idx]);
            prop_assert!(held >= 0);
        }
    }

    /// The basis after any sequence of buys is the quantity-weighted average
    /// of the purchase prices, regardless of commissions.
    #[test]
    fn basis_is_quantity_weighted_average_of_buys(
        buys in prop::collection::vec((1..20i64, 1.0..100.0f64), 1..15)
    ) {
        // Enough cash that every buy is accepted.
        let engine = new_game(1_000_000.0);

        let mut total_quantity = 0i64;
        let mut total_cost = 0.0f64;

        for (quantity, price) in buys {
            engine.update_quotes(vec![make_quote("THYAO", price)]);
            engine.buy("THYAO", quantity).unwrap();
            total_quantity += quantity;
            total_cost += quantity as f64 * price;
        }

        let position = engine
            .positions()
            .unwrap()
            .into_iter()
            .find(|p| p.symbol == "THYAO")
            .unwrap();

        prop_assert_eq!(position.quantity, total_quantity);
        let expected_basis = total_cost / total_quantity as f64;
        prop_assert!(abs_diff_eq!(position.average_cost, expected_basis, epsilon = 1e-6));
    }
}
