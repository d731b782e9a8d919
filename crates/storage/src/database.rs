//! SQLite connection pool and schema versioning
//!
//! [`SqliteDatabase`] owns the pool. Schema changes are shipped as numbered
//! [`Migration`]s; each applied migration is recorded in `schema_history`
//! together with an MD5 of its SQL so that an edited migration is caught on
//! the next start instead of silently diverging.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Database error types
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Query or connection failure
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The on-disk schema does not match the shipped migrations
    #[error("Migration error: {0}")]
    Migration(String),

    /// Unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored row could not be mapped back to an entity
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Result type for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// How often SQLite syncs to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynchronousMode {
    /// Leave syncing to the OS
    Off,
    /// Sync at checkpoints; safe with WAL
    #[default]
    Normal,
    /// Sync on every commit
    Full,
}

impl From<SynchronousMode> for SqliteSynchronous {
    fn from(mode: SynchronousMode) -> Self {
        match mode {
            SynchronousMode::Off => SqliteSynchronous::Off,
            SynchronousMode::Normal => SqliteSynchronous::Normal,
            SynchronousMode::Full => SqliteSynchronous::Full,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file
    pub path: PathBuf,
    /// Pool size
    pub max_connections: u32,
    /// How long to wait for a pooled connection
    pub connect_timeout: Duration,
    /// Use the write-ahead log
    pub wal_mode: bool,
    /// Sync policy
    pub synchronous: SynchronousMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("corpus.db"),
            max_connections: 4,
            connect_timeout: Duration::from_secs(10),
            wal_mode: true,
            synchronous: SynchronousMode::Normal,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set the pool size
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the acquire timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Toggle the write-ahead log
    pub fn wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Set the sync policy
    pub fn synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        if self.max_connections == 0 {
            return Err(DatabaseError::Config("max_connections must be at least 1".to_string()));
        }

        let journal = if self.wal_mode { SqliteJournalMode::Wal } else { SqliteJournalMode::Delete };
        Ok(SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .journal_mode(journal)
            .synchronous(self.synchronous.into()))
    }
}

/// A numbered schema change
#[derive(Debug, Clone)]
pub struct Migration {
    /// Position in the migration sequence, starting at 1
    pub version: i64,
    /// Human-readable summary
    pub description: String,
    /// One or more statements separated by `;`
    pub sql: String,
    checksum: String,
}

impl Migration {
    /// Define a migration; its checksum is derived from `sql`
    pub fn new(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = format!("{:x}", md5::compute(sql.as_bytes()));
        Self { version, description: description.into(), sql, checksum }
    }

    /// MD5 of the SQL, hex encoded
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    fn statements(&self) -> impl Iterator<Item = &str> {
        self.sql.split(';').map(str::trim).filter(|s| !s.is_empty())
    }
}

/// SQLite database handle
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if missing) the database described by `config`
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let options = config.connect_options()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await?;

        tracing::debug!("Opened database at {}", config.path.display());
        Ok(Self { pool })
    }

    /// A private in-memory database
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that never expires.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    /// The connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to the last of `migrations`
    ///
    /// Already-applied migrations must be unchanged and known. Each pending
    /// migration runs in its own transaction together with its history row.
    pub async fn migrate(&self, migrations: &[Migration]) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_history (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                checksum TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        let history: Vec<(i64, String)> =
            sqlx::query_as("SELECT version, checksum FROM schema_history ORDER BY version")
                .fetch_all(&self.pool)
                .await?;

        for (version, checksum) in &history {
            let known = migrations.iter().find(|m| m.version == *version).ok_or_else(|| {
                DatabaseError::Migration(format!(
                    "database is at version {} which this build does not know",
                    version
                ))
            })?;
            if known.checksum != *checksum {
                return Err(DatabaseError::Migration(format!(
                    "migration {} was edited after it was applied",
                    version
                )));
            }
        }

        let current = history.last().map_or(0, |(version, _)| *version);
        for migration in migrations.iter().filter(|m| m.version > current) {
            self.apply(migration).await?;
        }

        Ok(())
    }

    async fn apply(&self, migration: &Migration) -> Result<()> {
        tracing::info!("Migrating schema to v{}: {}", migration.version, migration.description);

        let mut tx = self.pool.begin().await?;
        for statement in migration.statements() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_history (version, description, checksum) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(&migration.description)
            .bind(&migration.checksum)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Highest applied migration, 0 for a fresh database
    pub async fn current_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(version.unwrap_or(0))
    }

    /// Round-trip a trivial query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<Migration> {
        vec![
            Migration::new(
                1,
                "chapters",
                "CREATE TABLE chapters (number INTEGER PRIMARY KEY, name TEXT NOT NULL);
                 CREATE INDEX idx_chapters_name ON chapters (name)",
            ),
            Migration::new(2, "revelation place", "ALTER TABLE chapters ADD COLUMN place TEXT"),
        ]
    }

    #[tokio::test]
    async fn test_fresh_database_is_version_zero() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.health_check().await.unwrap();
        db.migrate(&[]).await.unwrap();
        assert_eq!(db.current_version().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_applies_every_statement() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.migrate(&schema()).await.unwrap();
        assert_eq!(db.current_version().await.unwrap(), 2);

        let index: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_chapters_name'",
        )
        .fetch_optional(db.pool())
        .await
        .unwrap();
        assert!(index.is_some());

        sqlx::query("INSERT INTO chapters (number, name, place) VALUES (1, 'Al-Fatihah', 'mecca')")
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let migrations = schema();
        db.migrate(&migrations[..1]).await.unwrap();
        db.migrate(&migrations).await.unwrap();
        db.migrate(&migrations).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_history")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn test_edited_migration_is_rejected() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.migrate(&schema()[..1]).await.unwrap();

        let edited = [Migration::new(1, "chapters", "CREATE TABLE other (id INTEGER)")];
        let result = db.migrate(&edited).await;
        assert!(matches!(result, Err(DatabaseError::Migration(_))));
    }

    #[tokio::test]
    async fn test_unknown_applied_version_is_rejected() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.migrate(&schema()).await.unwrap();

        let result = db.migrate(&schema()[..1]).await;
        assert!(matches!(result, Err(DatabaseError::Migration(_))));
    }

    #[tokio::test]
    async fn test_file_database_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::new(dir.path().join("corpus.db"))
            .max_connections(2)
            .synchronous(SynchronousMode::Full);
        let db = SqliteDatabase::open(&config).await.unwrap();

        db.health_check().await.unwrap();
        assert!(dir.path().join("corpus.db").exists());

        db.close().await;
        assert!(db.is_closed());
    }

    #[tokio::test]
    async fn test_zero_connections_rejected() {
        let config = DatabaseConfig::new("unused.db").max_connections(0);
        let result = SqliteDatabase::open(&config).await;
        assert!(matches!(result, Err(DatabaseError::Config(_))));
    }

    #[test]
    fn test_checksum_tracks_sql() {
        let a = Migration::new(1, "a", "CREATE TABLE t (id INTEGER)");
        let b = Migration::new(1, "b", "CREATE TABLE t (id INTEGER)");
        let c = Migration::new(1, "a", "CREATE TABLE u (id INTEGER)");
        assert_eq!(a.checksum(), b.checksum());
        assert_ne!(a.checksum(), c.checksum());
        assert_eq!(a.checksum().len(), 32);
    }
}
