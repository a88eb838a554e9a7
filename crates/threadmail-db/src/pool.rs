//! Connection pool configuration and initialization
//!
//! Uses `r2d2` with `r2d2_sqlite` for connection management. Every write
//! that touches more than one row runs inside [`DbPool::write_tx`], an
//! `IMMEDIATE` transaction that takes the `SQLite` write lock up front, so
//! read-then-write sequences (position assignment, thread resolution plus
//! bulk update) are serialized against each other.

use std::path::PathBuf;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, TransactionBehavior};
use threadmail_core::config::{
    Config, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DATABASE_URL, DEFAULT_POOL_SIZE,
    DEFAULT_POOL_TIMEOUT_MS,
};
use threadmail_core::PropagationMode;

use crate::error::{DbError, DbResult};
use crate::schema;

pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPoolConfig {
    /// Database URL (`sqlite:///path/to/db.sqlite3` or `sqlite::memory:`)
    pub database_url: String,
    /// Maximum connections (forced to 1 for in-memory databases)
    pub max_connections: u32,
    /// Timeout for acquiring a connection (ms)
    pub acquire_timeout_ms: u64,
    /// `SQLite` busy handler timeout (ms)
    pub busy_timeout_ms: u64,
    /// Create tables on init
    pub run_migrations: bool,
    /// How bulk thread actions treat reply records
    pub thread_propagation: PropagationMode,
}

impl Default for DbPoolConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_POOL_SIZE,
            acquire_timeout_ms: DEFAULT_POOL_TIMEOUT_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            run_migrations: true,
            thread_propagation: PropagationMode::default(),
        }
    }
}

impl DbPoolConfig {
    /// Derive pool settings from the application config.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            database_url: config.database_url.clone(),
            max_connections: config.database_pool_size,
            acquire_timeout_ms: config.database_pool_timeout_ms,
            busy_timeout_ms: config.database_busy_timeout_ms,
            run_migrations: true,
            thread_propagation: config.thread_propagation,
        }
    }

    /// Create config from environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_config(&Config::from_env())
    }

    /// Pool config for a single-connection in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Self::default()
        }
    }
}

/// Where a database URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

/// Parse a `sqlite` database URL.
///
/// Accepts `sqlite:///path`, `sqlite://path`, `sqlite:path`, bare paths, and
/// `sqlite::memory:` / `:memory:`.
pub fn parse_database_url(url: &str) -> DbResult<DatabaseLocation> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(DbError::invalid("database_url", "empty database URL"));
    }
    if matches!(trimmed, "sqlite::memory:" | ":memory:" | "sqlite://:memory:") {
        return Ok(DatabaseLocation::Memory);
    }
    let path = trimmed
        .strip_prefix("sqlite:///")
        .or_else(|| trimmed.strip_prefix("sqlite://"))
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    if path.is_empty() {
        return Err(DbError::invalid("database_url", format!("no path in {url:?}")));
    }
    if trimmed.contains("://") && !trimmed.starts_with("sqlite:") {
        return Err(DbError::invalid(
            "database_url",
            format!("unsupported scheme in {url:?}"),
        ));
    }
    Ok(DatabaseLocation::File(PathBuf::from(path)))
}

/// Pooled `SQLite` store.
#[derive(Clone)]
pub struct DbPool {
    pool: Pool<SqliteConnectionManager>,
    location: DatabaseLocation,
    thread_propagation: PropagationMode,
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbPool")
            .field("location", &self.location)
            .field("thread_propagation", &self.thread_propagation)
            .field("state", &self.pool.state())
            .finish()
    }
}

impl DbPool {
    /// Open the pool and, when configured, create the schema.
    pub fn new(config: &DbPoolConfig) -> DbResult<Self> {
        let location = parse_database_url(&config.database_url)?;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

        let (manager, max_size) = match &location {
            DatabaseLocation::Memory => (SqliteConnectionManager::memory(), 1),
            DatabaseLocation::File(path) => (
                SqliteConnectionManager::file(path),
                config.max_connections.max(1),
            ),
        };
        let is_file = matches!(location, DatabaseLocation::File(_));
        let manager = manager.with_init(move |conn: &mut Connection| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            if is_file {
                conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(Duration::from_millis(config.acquire_timeout_ms.max(1)))
            .build(manager)?;

        if config.run_migrations {
            let conn = pool.get()?;
            schema::init_schema(&conn)?;
        }

        tracing::debug!(
            database_url = %config.database_url,
            max_size,
            propagation = config.thread_propagation.as_str(),
            "database pool ready"
        );

        Ok(Self {
            pool,
            location,
            thread_propagation: config.thread_propagation,
        })
    }

    /// Acquire a pooled connection.
    pub fn get(&self) -> DbResult<DbConn> {
        Ok(self.pool.get()?)
    }

    #[must_use]
    pub const fn thread_propagation(&self) -> PropagationMode {
        self.thread_propagation
    }

    /// Run `f` on a pooled connection without an explicit transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let conn = self.get()?;
        f(&conn)
    }

    /// Run `f` inside an `IMMEDIATE` transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls everything back.
    pub fn write_tx<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let mut conn = self.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_urls() {
        assert_eq!(
            parse_database_url("sqlite:///./threadmail.sqlite3").unwrap(),
            DatabaseLocation::File(PathBuf::from("./threadmail.sqlite3"))
        );
        assert_eq!(
            parse_database_url("sqlite:////tmp/a.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/tmp/a.db"))
        );
        assert_eq!(
            parse_database_url("/var/lib/mail.db").unwrap(),
            DatabaseLocation::File(PathBuf::from("/var/lib/mail.db"))
        );
    }

    #[test]
    fn parse_memory_urls() {
        assert_eq!(
            parse_database_url("sqlite::memory:").unwrap(),
            DatabaseLocation::Memory
        );
        assert_eq!(
            parse_database_url(":memory:").unwrap(),
            DatabaseLocation::Memory
        );
    }

    #[test]
    fn parse_rejects_bad_urls() {
        assert!(parse_database_url("").is_err());
        assert!(parse_database_url("sqlite:///").is_err());
        assert!(parse_database_url("postgres://localhost/db").is_err());
    }

    #[test]
    fn in_memory_pool_has_schema() {
        let pool = DbPool::new(&DbPoolConfig::in_memory()).expect("pool");
        let count: i64 = pool
            .read(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('messages', 'message_recipients')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .expect("query");
        assert_eq!(count, 2);
    }

    #[test]
    fn failed_write_tx_rolls_back() {
        let pool = DbPool::new(&DbPoolConfig::in_memory()).expect("pool");
        let res: DbResult<()> = pool.write_tx(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_type, sender_id, created_ts, updated_ts) VALUES ('User', 1, 0, 0)",
                [],
            )?;
            Err(DbError::Internal("abort".into()))
        });
        assert!(res.is_err());
        let count: i64 = pool
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn from_config_carries_propagation_mode() {
        let config = Config {
            thread_propagation: PropagationMode::ReplyArchives,
            ..Config::default()
        };
        let pool_config = DbPoolConfig::from_config(&config);
        assert_eq!(pool_config.thread_propagation, PropagationMode::ReplyArchives);
        assert_eq!(pool_config.max_connections, DEFAULT_POOL_SIZE);
    }
}
