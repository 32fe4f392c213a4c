//! Game settings resolved from configuration.

use crate::domain::error::PapertraderError;
use crate::ports::config_port::ConfigPort;

/// Commission as a fraction of unit price: the game charges
/// `price * 2 / 1000` per trade regardless of quantity.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.002;
pub const DEFAULT_STARTING_CASH: f64 = 1000.0;
pub const DEFAULT_FEED_INTERVAL_SECS: i64 = 3;
pub const DEFAULT_VALUATION_INTERVAL_SECS: i64 = 60;
pub const DEFAULT_STALE_AFTER_SECS: i64 = 30;

/// Validated game parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    pub starting_cash: f64,
    pub commission_rate: f64,
    pub feed_interval_secs: i64,
    pub valuation_interval_secs: i64,
    pub stale_after_secs: i64,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            starting_cash: DEFAULT_STARTING_CASH,
            commission_rate: DEFAULT_COMMISSION_RATE,
            feed_interval_secs: DEFAULT_FEED_INTERVAL_SECS,
            valuation_interval_secs: DEFAULT_VALUATION_INTERVAL_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
        }
    }
}

impl GameSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let settings = GameSettings {
            starting_cash: config.get_double("game", "starting_cash", DEFAULT_STARTING_CASH),
            commission_rate: config.get_double(
                "trading",
                "commission_rate",
                DEFAULT_COMMISSION_RATE,
            ),
            feed_interval_secs: config.get_int(
                "feed",
                "interval_secs",
                DEFAULT_FEED_INTERVAL_SECS,
            ),
            valuation_interval_secs: config.get_int(
                "valuation",
                "interval_secs",
                DEFAULT_VALUATION_INTERVAL_SECS,
            ),
            stale_after_secs: config.get_int("feed", "stale_after_secs", DEFAULT_STALE_AFTER_SECS),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), PapertraderError> {
        if self.starting_cash < 0.0 {
            return Err(invalid("game", "starting_cash", "must be non-negative"));
        }
        if self.commission_rate < 0.0 {
            return Err(invalid("trading", "commission_rate", "must be non-negative"));
        }
        if self.feed_interval_secs < 1 {
            return Err(invalid("feed", "interval_secs", "must be at least 1"));
        }
        if self.valuation_interval_secs < 1 {
            return Err(invalid("valuation", "interval_secs", "must be at least 1"));
        }
        if self.stale_after_secs < 1 {
            return Err(invalid("feed", "stale_after_secs", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> PapertraderError {
    PapertraderError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MapConfig {
        entries: Vec<(&'static str, &'static str, &'static str)>,
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.entries
                .iter()
                .find(|(s, k, _)| *s == section && *k == key)
                .map(|(_, _, v)| v.to_string())
        }

        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
    }

    #[test]
    fn defaults_when_config_empty() {
        let config = MapConfig { entries: vec![] };
        let settings = GameSettings::from_config(&config).unwrap();
        assert_eq!(settings, GameSettings::default());
    }

    #[test]
    fn reads_configured_values() {
        let config = MapConfig {
            entries: vec![
                ("game", "starting_cash", "5000.0"),
                ("trading", "commission_rate", "0.001"),
                ("feed", "interval_secs", "10"),
            ],
        };
        let settings = GameSettings::from_config(&config).unwrap();
        assert!((settings.starting_cash - 5000.0).abs() < f64::EPSILON);
        assert!((settings.commission_rate - 0.001).abs() < f64::EPSILON);
        assert_eq!(settings.feed_interval_secs, 10);
    }

    #[test]
    fn rejects_negative_commission_rate() {
        let config = MapConfig {
            entries: vec![("trading", "commission_rate", "-0.5")],
        };
        match GameSettings::from_config(&config) {
            Err(PapertraderError::ConfigInvalid { section, key, .. }) => {
                assert_eq!(section, "trading");
                assert_eq!(key, "commission_rate");
            }
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_interval() {
        let config = MapConfig {
            entries: vec![("valuation", "interval_secs", "0")],
        };
        assert!(GameSettings::from_config(&config).is_err());
    }
}
