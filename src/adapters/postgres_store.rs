//! PostgreSQL store adapter.

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls};
use std::sync::{Mutex, PoisonError};

use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{Account, Portfolio, ValuationPoint};
use crate::domain::position::Position;
use crate::domain::trade::PositionChange;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

const ACCOUNT_ID: i64 = 1;

pub struct PostgresStore {
    client: Mutex<Client>,
}

fn query_err(e: postgres::Error) -> PapertraderError {
    PapertraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl PostgresStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| PapertraderError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let client =
            Client::connect(&connection_string, NoTls).map_err(|e| PapertraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client: Mutex::new(client),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Client> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn initialize_schema(&self, starting_cash: f64) -> Result<(), PapertraderError> {
        let mut client = self.lock();

        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS account (
                    id BIGINT PRIMARY KEY,
                    cash DOUBLE PRECISION NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL
                );
                CREATE TABLE IF NOT EXISTS position (
                    account_id BIGINT NOT NULL REFERENCES account(id),
                    symbol TEXT NOT NULL,
                    quantity BIGINT NOT NULL,
                    average_cost DOUBLE PRECISION NOT NULL,
                    PRIMARY KEY (account_id, symbol)
                );
                CREATE TABLE IF NOT EXISTS valuation_history (
                    id BIGSERIAL PRIMARY KEY,
                    account_id BIGINT NOT NULL REFERENCES account(id),
                    timestamp TIMESTAMPTZ NOT NULL,
                    total_value DOUBLE PRECISION NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_valuation_history_account_time
                    ON valuation_history(account_id, timestamp);",
            )
            .map_err(query_err)?;

        let row = client
            .query_one("SELECT COUNT(*) FROM account", &[])
            .map_err(query_err)?;
        let existing: i64 = row.get(0);

        if existing == 0 {
            client
                .execute(
                    "INSERT INTO account (id, cash, created_at) VALUES ($1, $2, $3)",
                    &[&ACCOUNT_ID, &starting_cash, &Utc::now()],
                )
                .map_err(query_err)?;
        }

        Ok(())
    }
}

impl StorePort for PostgresStore {
    fn account(&self) -> Result<Account, PapertraderError> {
        let mut client = self.lock();
        let row = client
            .query_opt("SELECT cash FROM account WHERE id = $1", &[&ACCOUNT_ID])
            .map_err(query_err)?
            .ok_or_else(|| PapertraderError::Database {
                reason: "account not initialized; run `papertrader init` first".into(),
            })?;

        Ok(Account {
            id: ACCOUNT_ID,
            cash: row.get(0),
        })
    }

    fn portfolio(&self) -> Result<Portfolio, PapertraderError> {
        let mut client = self.lock();
        let mut tx = client.transaction().map_err(query_err)?;

        let cash: f64 = tx
            .query_opt("SELECT cash FROM account WHERE id = $1", &[&ACCOUNT_ID])
            .map_err(query_err)?
            .ok_or_else(|| PapertraderError::Database {
                reason: "account not initialized; run `papertrader init` first".into(),
            })?
            .get(0);

        let rows = tx
            .query(
                "SELECT symbol, quantity, average_cost FROM position
                 WHERE account_id = $1 ORDER BY symbol",
                &[&ACCOUNT_ID],
            )
            .map_err(query_err)?;

        tx.commit().map_err(query_err)?;

        let positions = rows
            .into_iter()
            .map(|row| Position {
                symbol: row.get(0),
                quantity: row.get(1),
                average_cost: row.get(2),
            })
            .collect();

        Ok(Portfolio { cash, positions })
    }

    fn positions(&self) -> Result<Vec<Position>, PapertraderError> {
        let mut client = self.lock();
        let rows = client
            .query(
                "SELECT symbol, quantity, average_cost FROM position
                 WHERE account_id = $1 ORDER BY symbol",
                &[&ACCOUNT_ID],
            )
            .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| Position {
                symbol: row.get(0),
                quantity: row.get(1),
                average_cost: row.get(2),
            })
            .collect())
    }

    fn position(&self, symbol: &str) -> Result<Option<Position>, PapertraderError> {
        let mut client = self.lock();
        let row = client
            .query_opt(
                "SELECT symbol, quantity, average_cost FROM position
                 WHERE account_id = $1 AND symbol = $2",
                &[&ACCOUNT_ID, &symbol],
            )
            .map_err(query_err)?;

        Ok(row.map(|row| Position {
            symbol: row.get(0),
            quantity: row.get(1),
            average_cost: row.get(2),
        }))
    }

    fn set_cash(&self, amount: f64) -> Result<(), PapertraderError> {
        let mut client = self.lock();
        client
            .execute(
                "UPDATE account SET cash = $1 WHERE id = $2",
                &[&amount, &ACCOUNT_ID],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn upsert_position(
        &self,
        symbol: &str,
        quantity: i64,
        average_cost: f64,
    ) -> Result<(), PapertraderError> {
        let mut client = self.lock();
        client
            .execute(
                "INSERT INTO position (account_id, symbol, quantity, average_cost)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (account_id, symbol)
                 DO UPDATE SET quantity = $3, average_cost = $4",
                &[&ACCOUNT_ID, &symbol, &quantity, &average_cost],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn delete_position(&self, symbol: &str) -> Result<(), PapertraderError> {
        let mut client = self.lock();
        client
            .execute(
                "DELETE FROM position WHERE account_id = $1 AND symbol = $2",
                &[&ACCOUNT_ID, &symbol],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn commit_trade(
        &self,
        cash_after: f64,
        change: &PositionChange,
    ) -> Result<(), PapertraderError> {
        let mut client = self.lock();
        let mut tx = client.transaction().map_err(query_err)?;

        tx.execute(
            "UPDATE account SET cash = $1 WHERE id = $2",
            &[&cash_after, &ACCOUNT_ID],
        )
        .map_err(query_err)?;

        match change {
            PositionChange::Upsert {
                symbol,
                quantity,
                average_cost,
            } => {
                tx.execute(
                    "INSERT INTO position (account_id, symbol, quantity, average_cost)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (account_id, symbol)
                     DO UPDATE SET quantity = $3, average_cost = $4",
                    &[&ACCOUNT_ID, symbol, quantity, average_cost],
                )
                .map_err(query_err)?;
            }
            PositionChange::Delete { symbol } => {
                tx.execute(
                    "DELETE FROM position WHERE account_id = $1 AND symbol = $2",
                    &[&ACCOUNT_ID, symbol],
                )
                .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)
    }

    fn append_valuation(
        &self,
        timestamp: DateTime<Utc>,
        total_value: f64,
    ) -> Result<ValuationPoint, PapertraderError> {
        let mut client = self.lock();
        let mut tx = client.transaction().map_err(query_err)?;

        let row = tx
            .query_one(
                "SELECT MAX(timestamp) FROM valuation_history WHERE account_id = $1",
                &[&ACCOUNT_ID],
            )
            .map_err(query_err)?;
        let latest: Option<DateTime<Utc>> = row.get(0);

        let effective = match latest {
            Some(last) if last > timestamp => last,
            _ => timestamp,
        };

        tx.execute(
            "INSERT INTO valuation_history (account_id, timestamp, total_value)
             VALUES ($1, $2, $3)",
            &[&ACCOUNT_ID, &effective, &total_value],
        )
        .map_err(query_err)?;

        tx.commit().map_err(query_err)?;

        Ok(ValuationPoint {
            account_id: ACCOUNT_ID,
            timestamp: effective,
            total_value,
        })
    }

    fn history(&self) -> Result<Vec<ValuationPoint>, PapertraderError> {
        let mut client = self.lock();
        let rows = client
            .query(
                "SELECT timestamp, total_value FROM valuation_history
                 WHERE account_id = $1 ORDER BY timestamp ASC, id ASC",
                &[&ACCOUNT_ID],
            )
            .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| ValuationPoint {
                account_id: ACCOUNT_ID,
                timestamp: row.get(0),
                total_value: row.get(1),
            })
            .collect())
    }
}
