//! Market quote representation.

/// A single market price observation delivered by the quote feed.
///
/// Only `last_price` participates in trading and valuation; the remaining
/// fields are carried for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub last_price: f64,
    pub high: f64,
    pub low: f64,
    pub average: f64,
    pub percent_change: f64,
    pub volume_lot: f64,
    pub turnover: f64,
}
