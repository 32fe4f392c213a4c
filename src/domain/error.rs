//! Domain error types.

/// A trade request refused before any state change.
///
/// Every variant renders a reason string suitable for direct display; the
/// caller's book is untouched whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TradeRejection {
    #[error("quantity must be positive, got {quantity}")]
    InvalidQuantity { quantity: i64 },

    #[error("insufficient funds: need {required:.2}, have {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("not enough {symbol} to sell: requested {requested}, holding {held}")]
    InsufficientHoldings {
        symbol: String,
        requested: i64,
        held: i64,
    },

    #[error("no quote available for {symbol}")]
    QuoteUnavailable { symbol: String },
}

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PapertraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("quote feed error: {reason}")]
    QuoteFeed { reason: String },

    #[error(transparent)]
    Trade(#[from] TradeRejection),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PapertraderError> for std::process::ExitCode {
    fn from(err: &PapertraderError) -> Self {
        let code: u8 = match err {
            PapertraderError::Io(_) => 1,
            PapertraderError::ConfigParse { .. }
            | PapertraderError::ConfigMissing { .. }
            | PapertraderError::ConfigInvalid { .. } => 2,
            PapertraderError::Database { .. } | PapertraderError::DatabaseQuery { .. } => 3,
            PapertraderError::Trade(_) => 4,
            PapertraderError::QuoteFeed { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_are_display_ready() {
        let err = TradeRejection::InsufficientFunds {
            required: 600.12,
            available: 499.9,
        };
        assert_eq!(err.to_string(), "insufficient funds: need 600.12, have 499.90");

        let err = TradeRejection::InsufficientHoldings {
            symbol: "THYAO".into(),
            requested: 15,
            held: 10,
        };
        assert_eq!(
            err.to_string(),
            "not enough THYAO to sell: requested 15, holding 10"
        );
    }

    #[test]
    fn rejection_converts_to_top_level_error() {
        let err: PapertraderError = TradeRejection::InvalidQuantity { quantity: -5 }.into();
        assert!(matches!(err, PapertraderError::Trade(_)));
        assert_eq!(err.to_string(), "quantity must be positive, got -5");
    }
}
