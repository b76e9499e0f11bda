use crate::entry::BankEntry;
use crate::error::RepositoryError;
use crate::repository::BankDataRepository;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// One finished file load (audit trail)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRecord {
    pub format: String,
    pub path: String,
    pub sha256: Option<String>,
    pub entries: usize,
    pub absent: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Entry count per country
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryStat {
    pub country_code: String,
    pub bank_count: i64,
}

/// SQLite-backed repository.
///
/// The connection sits behind a mutex, so one store can serve concurrent
/// loads and lookups; every call is a single statement (or one short
/// transaction) and is atomic on its own.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RepositoryError> {
        self.conn.lock().map_err(|_| RepositoryError::Poisoned)
    }

    pub fn record_load(&self, load: &LoadRecord) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO loads (format, path, sha256, entries, absent, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                load.format,
                load.path,
                load.sha256,
                load.entries as i64,
                load.absent,
                load.started_at.to_rfc3339(),
                load.finished_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent loads first
    pub fn recent_loads(&self, limit: usize) -> Result<Vec<LoadRecord>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT format, path, sha256, entries, absent, started_at, finished_at
             FROM loads
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let loads = stmt
            .query_map(params![limit as i64], |row| {
                let entries: i64 = row.get(3)?;
                let started_at: String = row.get(5)?;
                let finished_at: String = row.get(6)?;

                Ok(LoadRecord {
                    format: row.get(0)?,
                    path: row.get(1)?,
                    sha256: row.get(2)?,
                    entries: entries.max(0) as usize,
                    absent: row.get(4)?,
                    started_at: parse_timestamp(5, &started_at)?,
                    finished_at: parse_timestamp(6, &finished_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(loads)
    }

    /// Entry counts grouped by country
    pub fn country_stats(&self) -> Result<Vec<CountryStat>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT country, COUNT(*) FROM bank_data GROUP BY country ORDER BY country",
        )?;

        let stats = stmt
            .query_map([], |row| {
                Ok(CountryStat {
                    country_code: row.get(0)?,
                    bank_count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }
}

impl BankDataRepository for SqliteStore {
    fn find(&self, country_code: &str, bank_code: &str) -> Result<Option<BankEntry>, RepositoryError> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                "SELECT bankcode, name, zip, city, bic, country
                 FROM bank_data
                 WHERE bankcode = ?1 AND country = ?2",
                params![bank_code, country_code],
                |row| {
                    Ok(BankEntry {
                        bank_code: row.get(0)?,
                        name: row.get(1)?,
                        zip: row.get(2)?,
                        city: row.get(3)?,
                        bic: row.get(4)?,
                        country_code: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn upsert(&self, entry: &BankEntry) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        upsert_entry(&conn, entry, &Utc::now().to_rfc3339())
    }

    /// One transaction for the whole batch
    fn upsert_many(&self, entries: &[BankEntry]) -> Result<usize, RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let loaded_at = Utc::now().to_rfc3339();
        for entry in entries {
            upsert_entry(&tx, entry, &loaded_at)?;
        }
        tx.commit()?;
        Ok(entries.len())
    }

    fn count(&self, country_code: Option<&str>) -> Result<usize, RepositoryError> {
        let conn = self.conn()?;
        let count: i64 = match country_code {
            Some(country) => conn.query_row(
                "SELECT COUNT(*) FROM bank_data WHERE country = ?1",
                params![country],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM bank_data", [], |row| row.get(0))?,
        };
        Ok(count.max(0) as usize)
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), RepositoryError> {
    // WAL for concurrent readers; in-memory databases ignore it
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // bankcode is TEXT: "001" and "1" are different keys
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_data (
            country TEXT NOT NULL,
            bankcode TEXT NOT NULL,
            name TEXT NOT NULL,
            zip TEXT NOT NULL,
            city TEXT NOT NULL,
            bic TEXT NOT NULL,
            loaded_at TEXT NOT NULL,
            PRIMARY KEY (country, bankcode)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS loads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            format TEXT NOT NULL,
            path TEXT NOT NULL,
            sha256 TEXT,
            entries INTEGER NOT NULL,
            absent INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bank_data_bic ON bank_data(bic)",
        [],
    )?;

    Ok(())
}

fn upsert_entry(conn: &Connection, entry: &BankEntry, loaded_at: &str) -> Result<(), RepositoryError> {
    conn.execute(
        "INSERT INTO bank_data (country, bankcode, name, zip, city, bic, loaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(country, bankcode) DO UPDATE SET
            name = excluded.name,
            zip = excluded.zip,
            city = excluded.city,
            bic = excluded.bic,
            loaded_at = excluded.loaded_at",
        params![
            entry.country_code,
            entry.bank_code,
            entry.name,
            entry.zip,
            entry.city,
            entry.bic,
            loaded_at,
        ],
    )?;
    Ok(())
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e)))
}
