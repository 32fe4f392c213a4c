//! CSV file quote feed adapter.
//!
//! Reads a full market snapshot from a CSV file on every poll. The file is
//! expected to be rewritten by an external process between polls; this adapter
//! only consumes it. Expected header:
//! `symbol,last,high,low,average,change_pct,volume_lot,turnover`.

use std::fs;
use std::path::PathBuf;

use crate::domain::error::PapertraderError;
use crate::domain::quote::Quote;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_feed_port::QuoteFeedPort;

pub struct CsvQuoteFeed {
    path: PathBuf,
}

fn feed_err(reason: String) -> PapertraderError {
    PapertraderError::QuoteFeed { reason }
}

impl CsvQuoteFeed {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let path = config
            .get_string("feed", "path")
            .ok_or_else(|| PapertraderError::ConfigMissing {
                section: "feed".into(),
                key: "path".into(),
            })?;
        Ok(Self::new(PathBuf::from(path)))
    }

    fn field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, PapertraderError> {
        record
            .get(index)
            .ok_or_else(|| feed_err(format!("missing {name} column")))?
            .trim()
            .parse()
            .map_err(|e| feed_err(format!("invalid {name} value: {e}")))
    }
}

impl QuoteFeedPort for CsvQuoteFeed {
    fn fetch_quotes(&self) -> Result<Vec<Quote>, PapertraderError> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| feed_err(format!("failed to read {}: {}", self.path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut quotes = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| feed_err(format!("CSV parse error: {e}")))?;

            let symbol = record
                .get(0)
                .ok_or_else(|| feed_err("missing symbol column".into()))?
                .trim();
            if symbol.is_empty() {
                continue;
            }

            quotes.push(Quote {
                symbol: symbol.to_string(),
                last_price: Self::field(&record, 1, "last")?,
                high: Self::field(&record, 2, "high")?,
                low: Self::field(&record, 3, "low")?,
                average: Self::field(&record, 4, "average")?,
                percent_change: Self::field(&record, 5, "change_pct")?,
                volume_lot: Self::field(&record, 6, "volume_lot")?,
                turnover: Self::field(&record, 7, "turnover")?,
            });
        }

        Ok(quotes)
    }
}
