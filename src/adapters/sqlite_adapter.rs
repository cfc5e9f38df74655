//! SQLite price and macro indicator adapter.
//!
//! Two tables: `prices (symbol, date, close)` for market series and
//! `macro_indices (symbol, date, value)` for macro indicators. Dates are
//! stored as `YYYY-MM-DD` text so lexical order is date order.

use crate::domain::error::RebalancerError;
use crate::domain::series::PricePoint;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

/// Which table a series lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesTable {
    Prices,
    MacroIndices,
}

impl SeriesTable {
    fn name(self) -> &'static str {
        match self {
            SeriesTable::Prices => "prices",
            SeriesTable::MacroIndices => "macro_indices",
        }
    }

    fn value_column(self) -> &'static str {
        match self {
            SeriesTable::Prices => "close",
            SeriesTable::MacroIndices => "value",
        }
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RebalancerError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| RebalancerError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| RebalancerError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, RebalancerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| RebalancerError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), RebalancerError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| RebalancerError::Database {
                reason: e.to_string(),
            })?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS macro_indices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );",
        )
        .map_err(|e: rusqlite::Error| RebalancerError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Upserts `points` for `symbol` in one transaction.
    pub fn insert_series(
        &self,
        table: SeriesTable,
        symbol: &str,
        points: &[PricePoint],
    ) -> Result<(), RebalancerError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| RebalancerError::Database {
                reason: e.to_string(),
            })?;

        let tx =
            conn.transaction()
                .map_err(|e: rusqlite::Error| RebalancerError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

        let sql = format!(
            "INSERT OR REPLACE INTO {} (symbol, date, {}) VALUES (?1, ?2, ?3)",
            table.name(),
            table.value_column()
        );
        for point in points {
            tx.execute(
                &sql,
                params![symbol, point.date.format("%Y-%m-%d").to_string(), point.value],
            )
            .map_err(|e: rusqlite::Error| RebalancerError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| RebalancerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn fetch_series(
        &self,
        table: SeriesTable,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        let conn = self
            .pool
            .get()
            .map_err(|e: r2d2::Error| RebalancerError::Database {
                reason: e.to_string(),
            })?;

        let start_str = start_date.format("%Y-%m-%d").to_string();
        let end_str = end_date.format("%Y-%m-%d").to_string();

        let query = format!(
            "SELECT date, {} FROM {}
             WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
            table.value_column(),
            table.name()
        );

        let mut stmt =
            conn.prepare(&query)
                .map_err(|e: rusqlite::Error| RebalancerError::DatabaseQuery {
                    reason: e.to_string(),
                })?;

        let rows = stmt
            .query_map(params![symbol, start_str, end_str], |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        date_str.len(),
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(PricePoint::new(date, row.get(1)?))
            })
            .map_err(|e: rusqlite::Error| RebalancerError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut points = Vec::new();
        for row in rows {
            points.push(
                row.map_err(|e: rusqlite::Error| RebalancerError::DatabaseQuery {
                    reason: e.to_string(),
                })?,
            );
        }

        Ok(points)
    }
}

impl PricePort for SqliteAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        self.fetch_series(SeriesTable::Prices, symbol, start, end)
    }

    fn fetch_indicator(
        &self,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, RebalancerError> {
        self.fetch_series(SeriesTable::MacroIndices, name, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
        fn keys(&self, _section: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn from_config_missing_path() {
        let config = EmptyConfig;
        let result = SqliteAdapter::from_config(&config);
        match result {
            Err(RebalancerError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn in_memory_initialization() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn sqlite_fetch_prices_in_range() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();

        let points = vec![
            PricePoint::new(d(2024, 1, 2), 101.5),
            PricePoint::new(d(2024, 1, 1), 100.5),
            PricePoint::new(d(2024, 1, 3), 102.5),
        ];
        adapter
            .insert_series(SeriesTable::Prices, "SPY", &points)
            .unwrap();

        let fetched = adapter.fetch_prices("SPY", d(2024, 1, 1), d(2024, 1, 2)).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].date, d(2024, 1, 1));
        assert_eq!(fetched[1].value, 101.5);
    }

    #[test]
    fn sqlite_prices_and_macro_are_separate() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();

        adapter
            .insert_series(SeriesTable::MacroIndices, "CPIAUCSL", &[PricePoint::new(d(2024, 1, 1), 308.4)])
            .unwrap();

        let macro_rows = adapter.fetch_indicator("CPIAUCSL", d(2024, 1, 1), d(2024, 12, 31)).unwrap();
        assert_eq!(macro_rows.len(), 1);
        assert_eq!(macro_rows[0].value, 308.4);
        let prices = adapter.fetch_prices("CPIAUCSL", d(2024, 1, 1), d(2024, 12, 31)).unwrap();
        assert!(prices.is_empty());
    }

    #[test]
    fn sqlite_insert_replaces_existing_date() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();

        adapter
            .insert_series(SeriesTable::Prices, "QQQ", &[PricePoint::new(d(2024, 1, 1), 1.0)])
            .unwrap();
        adapter
            .insert_series(SeriesTable::Prices, "QQQ", &[PricePoint::new(d(2024, 1, 1), 2.0)])
            .unwrap();

        let fetched = adapter.fetch_prices("QQQ", d(2024, 1, 1), d(2024, 1, 1)).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].value, 2.0);
    }
}
