//! Market-data feed port trait.

use crate::domain::error::PapertraderError;
use crate::domain::quote::Quote;

/// External producer of market quotes.
///
/// Each successful fetch yields a full snapshot of current quotes. Failures
/// are reported to the caller as an error event; they never reach the trading
/// path, which keeps pricing off the last accepted snapshot.
pub trait QuoteFeedPort {
    fn fetch_quotes(&self) -> Result<Vec<Quote>, PapertraderError>;
}
