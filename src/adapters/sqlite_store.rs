//! SQLite store adapter.

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

use crate::domain::error::PapertraderError;
use crate::domain::portfolio::{Account, Portfolio, ValuationPoint};
use crate::domain::position::Position;
use crate::domain::trade::PositionChange;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

/// Single-player game: one fixed account row.
const ACCOUNT_ID: i64 = 1;

#[derive(Debug)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> PapertraderError {
    PapertraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PapertraderError {
    PapertraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    // Fixed-width UTC encoding: lexicographic order matches time order, so
    // MAX(timestamp) and ORDER BY timestamp work on the text column.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PapertraderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PapertraderError::Database {
            reason: format!("invalid timestamp {raw:?}: {e}"),
        })
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PapertraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// In-memory store for tests. Pool size is pinned to 1 because every
    /// pooled connection would otherwise open its own empty `:memory:` db.
    pub fn in_memory() -> Result<Self, PapertraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// Create tables and seed the player account with `starting_cash` if no
    /// account exists yet. Safe to call repeatedly; an existing account is
    /// never reseeded.
    pub fn initialize_schema(&self, starting_cash: f64) -> Result<(), PapertraderError> {
        let conn = self.pool.get().map_err(pool_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS account (
                id INTEGER PRIMARY KEY,
                cash REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS position (
                account_id INTEGER NOT NULL REFERENCES account(id),
                symbol TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                average_cost REAL NOT NULL,
                PRIMARY KEY (account_id, symbol)
            );
            CREATE TABLE IF NOT EXISTS valuation_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL REFERENCES account(id),
                timestamp TEXT NOT NULL,
                total_value REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_valuation_history_account_time
                ON valuation_history(account_id, timestamp);",
        )
        .map_err(query_err)?;

        let existing: i64 = conn
            .query_row("SELECT COUNT(*) FROM account", [], |row| row.get(0))
            .map_err(query_err)?;

        if existing == 0 {
            conn.execute(
                "INSERT INTO account (id, cash, created_at) VALUES (?1, ?2, ?3)",
                params![ACCOUNT_ID, starting_cash, format_timestamp(Utc::now())],
            )
            .map_err(query_err)?;
        }

        Ok(())
    }

    fn read_cash(conn: &rusqlite::Connection) -> Result<f64, PapertraderError> {
        conn.query_row(
            "SELECT cash FROM account WHERE id = ?1",
            params![ACCOUNT_ID],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_err)?
        .ok_or_else(|| PapertraderError::Database {
            reason: "account not initialized; run `papertrader init` first".into(),
        })
    }

    fn read_positions(conn: &rusqlite::Connection) -> Result<Vec<Position>, PapertraderError> {
        let mut stmt = conn
            .prepare(
                "SELECT symbol, quantity, average_cost FROM position
                 WHERE account_id = ?1 ORDER BY symbol",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![ACCOUNT_ID], |row| {
                Ok(Position {
                    symbol: row.get(0)?,
                    quantity: row.get(1)?,
                    average_cost: row.get(2)?,
                })
            })
            .map_err(query_err)?;

        let mut positions = Vec::new();
        for row in rows {
            positions.push(row.map_err(query_err)?);
        }
        Ok(positions)
    }

    fn apply_position_change(
        tx: &rusqlite::Transaction<'_>,
        change: &PositionChange,
    ) -> Result<(), PapertraderError> {
        match change {
            PositionChange::Upsert {
                symbol,
                quantity,
                average_cost,
            } => {
                tx.execute(
                    "INSERT OR REPLACE INTO position (account_id, symbol, quantity, average_cost)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![ACCOUNT_ID, symbol, quantity, average_cost],
                )
                .map_err(query_err)?;
            }
            PositionChange::Delete { symbol } => {
                tx.execute(
                    "DELETE FROM position WHERE account_id = ?1 AND symbol = ?2",
                    params![ACCOUNT_ID, symbol],
                )
                .map_err(query_err)?;
            }
        }
        Ok(())
    }
}

impl StorePort for SqliteStore {
    fn account(&self) -> Result<Account, PapertraderError> {
        let conn = self.pool.get().map_err(pool_err)?;
        let cash = Self::read_cash(&conn)?;
        Ok(Account {
            id: ACCOUNT_ID,
            cash,
        })
    }

    fn portfolio(&self) -> Result<Portfolio, PapertraderError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        let cash = Self::read_cash(&tx)?;
        let positions = Self::read_positions(&tx)?;

        tx.commit().map_err(query_err)?;
        Ok(Portfolio { cash, positions })
    }

    fn positions(&self) -> Result<Vec<Position>, PapertraderError> {
        let conn = self.pool.get().map_err(pool_err)?;
        Self::read_positions(&conn)
    }

    fn position(&self, symbol: &str) -> Result<Option<Position>, PapertraderError> {
        let conn = self.pool.get().map_err(pool_err)?;
        conn.query_row(
            "SELECT symbol, quantity, average_cost FROM position
             WHERE account_id = ?1 AND symbol = ?2",
            params![ACCOUNT_ID, symbol],
            |row| {
                Ok(Position {
                    symbol: row.get(0)?,
                    quantity: row.get(1)?,
                    average_cost: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(query_err)
    }

    fn set_cash(&self, amount: f64) -> Result<(), PapertraderError> {
        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute(
            "UPDATE account SET cash = ?1 WHERE id = ?2",
            params![amount, ACCOUNT_ID],
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
        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute(
            "INSERT OR REPLACE INTO position (account_id, symbol, quantity, average_cost)
             VALUES (?1, ?2, ?3, ?4)",
            params![ACCOUNT_ID, symbol, quantity, average_cost],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn delete_position(&self, symbol: &str) -> Result<(), PapertraderError> {
        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute(
            "DELETE FROM position WHERE account_id = ?1 AND symbol = ?2",
            params![ACCOUNT_ID, symbol],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn commit_trade(
        &self,
        cash_after: f64,
        change: &PositionChange,
    ) -> Result<(), PapertraderError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute(
            "UPDATE account SET cash = ?1 WHERE id = ?2",
            params![cash_after, ACCOUNT_ID],
        )
        .map_err(query_err)?;

        Self::apply_position_change(&tx, change)?;

        tx.commit().map_err(query_err)
    }

    fn append_valuation(
        &self,
        timestamp: DateTime<Utc>,
        total_value: f64,
    ) -> Result<ValuationPoint, PapertraderError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(query_err)?;

        let latest: Option<String> = tx
            .query_row(
                "SELECT MAX(timestamp) FROM valuation_history WHERE account_id = ?1",
                params![ACCOUNT_ID],
                |row| row.get(0),
            )
            .map_err(query_err)?;

        let mut effective = timestamp;
        if let Some(raw) = latest {
            let last = parse_timestamp(&raw)?;
            if last > effective {
                effective = last;
            }
        }

        tx.execute(
            "INSERT INTO valuation_history (account_id, timestamp, total_value)
             VALUES (?1, ?2, ?3)",
            params![ACCOUNT_ID, format_timestamp(effective), total_value],
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
        let conn = self.pool.get().map_err(pool_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, total_value FROM valuation_history
                 WHERE account_id = ?1 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![ACCOUNT_ID], |row| {
                let raw: String = row.get(0)?;
                let total_value: f64 = row.get(1)?;
                Ok((raw, total_value))
            })
            .map_err(query_err)?;

        let mut points = Vec::new();
        for row in rows {
            let (raw, total_value) = row.map_err(query_err)?;
            points.push(ValuationPoint {
                account_id: ACCOUNT_ID,
                timestamp: parse_timestamp(&raw)?,
                total_value,
            });
        }
        Ok(points)
    }
}
