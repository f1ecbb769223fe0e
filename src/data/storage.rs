use {
    crate::{domain::OhlcRecord, logging::LogSink},
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    sqlx::{
        ConnectOptions, Pool, QueryBuilder, Row, Sqlite,
        sqlite::{
            SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
            SqliteSynchronous,
        },
    },
    std::{error::Error, fmt, str::FromStr, time::Duration},
    strum_macros::{Display, EnumIter},
};

#[cfg(debug_assertions)]
use crate::config::DF;

/// Rows per INSERT statement; 7 binds per row keeps us under SQLite's 32k parameter limit.
const APPEND_CHUNK_ROWS: usize = 3000;

/// How the store reads a whole feature group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ReadMode {
    /// Primary path: forced through the timestamp index.
    #[strum(to_string = "indexed")]
    Indexed,
    /// Degraded path: table scan, sorted in memory.
    #[strum(to_string = "full-scan")]
    FullScan,
}

impl ReadMode {
    pub const PRIMARY: ReadMode = ReadMode::Indexed;
    pub const FALLBACK: ReadMode = ReadMode::FullScan;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadError {
    /// The read path itself is unusable (e.g. its index is missing).
    PathUnavailable { mode: ReadMode, reason: String },
    Query { mode: ReadMode, reason: String },
    Decode { mode: ReadMode, reason: String },
}

impl ReadError {
    pub fn mode(&self) -> ReadMode {
        match self {
            ReadError::PathUnavailable { mode, .. }
            | ReadError::Query { mode, .. }
            | ReadError::Decode { mode, .. } => *mode,
        }
    }

    fn from_sqlx(mode: ReadMode, err: sqlx::Error) -> Self {
        let reason = err.to_string();
        match &err {
            sqlx::Error::Database(db) if db.message().contains("no such index") => {
                ReadError::PathUnavailable { mode, reason }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                ReadError::Decode { mode, reason }
            }
            _ => ReadError::Query { mode, reason },
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            ReadError::PathUnavailable { mode, reason } => {
                write!(f, "{} read path unavailable: {}", mode, reason)
            }
            ReadError::Query { mode, reason } => write!(f, "{} read failed: {}", mode, reason),
            ReadError::Decode { mode, reason } => {
                write!(f, "{} read returned undecodable rows: {}", mode, reason)
            }
        }
    }
}

impl Error for ReadError {}

/// A named, versioned table of OHLC records in the feature store.
#[async_trait]
pub trait FeatureGroup: Send + Sync {
    fn name(&self) -> &str;

    /// Inserts the whole batch or nothing. Rows whose primary key already exists are replaced.
    async fn append(&self, batch: &[OhlcRecord]) -> Result<u64>;

    /// Every record in the group, ordered by (timestamp, symbol).
    async fn read_all(&self, mode: ReadMode) -> std::result::Result<Vec<OhlcRecord>, ReadError>;
}

/// Parameters for [`SqliteFeatureStore::get_or_create_group`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGroupSpec {
    pub name: String,
    pub description: String,
    pub version: u32,
    pub primary_key: Vec<String>,
}

impl FeatureGroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn table_name(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }

    fn validate(&self) -> Result<()> {
        let is_identifier = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !is_identifier {
            bail!("feature group name {:?} must be [A-Za-z0-9_]+", self.name);
        }
        if self.primary_key.is_empty() {
            bail!("feature group {} needs at least one primary key column", self.name);
        }
        if let Some(bad) = self
            .primary_key
            .iter()
            .find(|c| !OhlcRecord::COLUMNS.contains(&c.as_str()))
        {
            bail!("primary key column {:?} is not a record column", bad);
        }
        Ok(())
    }
}

impl Default for FeatureGroupSpec {
    fn default() -> Self {
        use crate::config::PERSISTENCE;
        Self {
            name: PERSISTENCE.group.name.to_string(),
            description: PERSISTENCE.group.description.to_string(),
            version: PERSISTENCE.group.version,
            primary_key: vec!["timestamp".to_string()],
        }
    }
}

pub struct SqliteFeatureStore {
    pool: Pool<Sqlite>,
    log: LogSink,
}

impl SqliteFeatureStore {
    pub async fn new(db_path: &str, log: LogSink) -> Result<Self> {
        let connection_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(60))
            .synchronous(SqliteSynchronous::Normal)
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connection_options)
            .await
            .with_context(|| format!("Failed to open feature store at {}", db_path))?;

        Self::with_pool(pool, log).await
    }

    /// Private in-memory database. One connection that never expires, so the data lives as long as the store.
    pub async fn in_memory(log: LogSink) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        Self::with_pool(pool, log).await
    }

    async fn with_pool(pool: Pool<Sqlite>, log: LogSink) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feature_groups (
                name TEXT NOT NULL,
                version INTEGER NOT NULL,
                description TEXT NOT NULL,
                primary_key TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (name, version)
            );
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create feature_groups catalog")?;

        Ok(Self { pool, log })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Returns the group described by `spec`, creating its table on first use.
    ///
    /// An existing group keeps the primary key it was created with.
    pub async fn get_or_create_group(&self, spec: &FeatureGroupSpec) -> Result<SqliteFeatureGroup> {
        spec.validate()?;

        let existing = sqlx::query(
            "SELECT primary_key FROM feature_groups WHERE name = ? AND version = ?",
        )
        .bind(&spec.name)
        .bind(spec.version)
        .fetch_optional(&self.pool)
        .await?;

        let primary_key: Vec<String> = match existing {
            Some(row) => {
                let stored: String = row.try_get("primary_key")?;
                log::info!(
                    target: self.log.target(),
                    "Feature group '{}' v{} retrieved successfully.",
                    spec.name,
                    spec.version
                );
                stored.split(',').map(str::to_string).collect()
            }
            None => {
                log::info!(
                    target: self.log.target(),
                    "Feature group '{}' v{} not found. Creating new one.",
                    spec.name,
                    spec.version
                );
                spec.primary_key.clone()
            }
        };

        let group = SqliteFeatureGroup {
            pool: self.pool.clone(),
            name: spec.name.clone(),
            table: spec.table_name(),
            index: format!("idx_{}_timestamp", spec.table_name()),
            primary_key,
            log: self.log.clone(),
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                timestamp TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume REAL,
                symbol TEXT NOT NULL,
                PRIMARY KEY ({primary_key})
            );
            "#,
            table = group.table,
            primary_key = group.primary_key.join(", ")
        ))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create table {}", group.table))?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (timestamp);",
            group.index, group.table
        ))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create index {}", group.index))?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO feature_groups (name, version, description, primary_key, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&spec.name)
        .bind(spec.version)
        .bind(&spec.description)
        .bind(group.primary_key.join(","))
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(group)
    }
}

pub struct SqliteFeatureGroup {
    pool: Pool<Sqlite>,
    name: String,
    table: String,
    index: String,
    primary_key: Vec<String>,
    log: LogSink,
}

impl SqliteFeatureGroup {
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    fn decode_row(mode: ReadMode, row: &SqliteRow) -> std::result::Result<OhlcRecord, ReadError> {
        let decode = |e: sqlx::Error| ReadError::from_sqlx(mode, e);
        // NULL prices come back as NaN; the store does not validate values
        let price = |column: &str| -> std::result::Result<f64, ReadError> {
            Ok(row
                .try_get::<Option<f64>, _>(column)
                .map_err(decode)?
                .unwrap_or(f64::NAN))
        };
        Ok(OhlcRecord::new(
            row.try_get::<String, _>("symbol").map_err(decode)?,
            row.try_get::<String, _>("timestamp").map_err(decode)?,
            price("open")?,
            price("high")?,
            price("low")?,
            price("close")?,
            price("volume")?,
        ))
    }
}

#[async_trait]
impl FeatureGroup for SqliteFeatureGroup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn append(&self, batch: &[OhlcRecord]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for chunk in batch.chunks(APPEND_CHUNK_ROWS) {
            let mut query_builder = QueryBuilder::new(format!(
                "INSERT OR REPLACE INTO {} (timestamp, open, high, low, close, volume, symbol) ",
                self.table
            ));

            query_builder.push_values(chunk, |mut b, r| {
                b.push_bind(r.timestamp())
                    .push_bind(r.open())
                    .push_bind(r.high())
                    .push_bind(r.low())
                    .push_bind(r.close())
                    .push_bind(r.volume())
                    .push_bind(r.symbol());
            });

            query_builder
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to append to {}", self.table))?;
        }
        tx.commit()
            .await
            .with_context(|| format!("Failed to commit append to {}", self.table))?;

        log::info!(
            target: self.log.target(),
            "Stored {} records in feature group '{}'.",
            batch.len(),
            self.name
        );
        Ok(batch.len() as u64)
    }

    async fn read_all(&self, mode: ReadMode) -> std::result::Result<Vec<OhlcRecord>, ReadError> {
        let columns = OhlcRecord::COLUMNS.join(", ");
        let sql = match mode {
            // The range predicate keeps the index usable for INDEXED BY
            ReadMode::Indexed => format!(
                "SELECT {} FROM {} INDEXED BY {} WHERE timestamp >= '' ORDER BY timestamp, symbol",
                columns, self.table, self.index
            ),
            ReadMode::FullScan => format!("SELECT {} FROM {} NOT INDEXED", columns, self.table),
        };

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReadError::from_sqlx(mode, e))?;

        let mut records = rows
            .iter()
            .map(|row| Self::decode_row(mode, row))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if mode == ReadMode::FullScan {
            records.sort_by(|a, b| {
                a.timestamp()
                    .cmp(b.timestamp())
                    .then_with(|| a.symbol().cmp(b.symbol()))
            });
        }

        #[cfg(debug_assertions)]
        if DF.log_store_reads {
            log::debug!(
                target: self.log.target(),
                "{} read of '{}' returned {} rows",
                mode,
                self.name,
                records.len()
            );
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::utils::{TimeUtils, day_bounds_ms, epoch_ms_to_record_time},
        chrono::NaiveDate,
        strum::IntoEnumIterator,
    };

    fn record(symbol: &str, timestamp: &str, close: f64) -> OhlcRecord {
        OhlcRecord::new(symbol, timestamp, 1.0, 2.0, 0.5, close, 10.0)
    }

    async fn store() -> SqliteFeatureStore {
        SqliteFeatureStore::in_memory(LogSink::new("FeatureStore"))
            .await
            .unwrap()
    }

    /// `count` consecutive one-minute records starting at 2024-04-09 00:00:00 UTC.
    fn minute_series(symbol: &str, count: i64) -> Vec<OhlcRecord> {
        let (start, _) = day_bounds_ms(NaiveDate::from_ymd_opt(2024, 4, 9).unwrap()).unwrap();
        (0..count)
            .map(|m| {
                let ts = epoch_ms_to_record_time(start + m * TimeUtils::MS_IN_MIN).unwrap();
                record(symbol, &ts, m as f64)
            })
            .collect()
    }

    fn two_symbol_spec() -> FeatureGroupSpec {
        FeatureGroupSpec::new("crypto_prices_test").with_primary_key(&["symbol", "timestamp"])
    }

    #[tokio::test]
    async fn append_then_read_in_every_mode() {
        let store = store().await;
        let group = store.get_or_create_group(&two_symbol_spec()).await.unwrap();
        let batch = vec![
            record("ETHUSDT", "2024-04-10 00:01:00", 3.0),
            record("BTCUSDT", "2024-04-10 00:00:00", 1.0),
            record("ETHUSDT", "2024-04-10 00:00:00", 2.0),
        ];

        assert_eq!(group.append(&batch).await.unwrap(), 3);

        for mode in ReadMode::iter() {
            let records = group.read_all(mode).await.unwrap();
            let keys: Vec<_> = records.iter().map(|r| (r.timestamp(), r.symbol())).collect();
            assert_eq!(
                keys,
                vec![
                    ("2024-04-10 00:00:00", "BTCUSDT"),
                    ("2024-04-10 00:00:00", "ETHUSDT"),
                    ("2024-04-10 00:01:00", "ETHUSDT"),
                ],
                "mode {}",
                mode
            );
        }
    }

    #[tokio::test]
    async fn append_replaces_rows_with_same_primary_key() {
        let store = store().await;
        let group = store.get_or_create_group(&two_symbol_spec()).await.unwrap();

        group
            .append(&[record("BTCUSDT", "2024-04-10 00:00:00", 1.0)])
            .await
            .unwrap();
        group
            .append(&[record("BTCUSDT", "2024-04-10 00:00:00", 5.0)])
            .await
            .unwrap();

        let records = group.read_all(ReadMode::PRIMARY).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].close(), 5.0);
    }

    #[tokio::test]
    async fn append_larger_than_one_chunk_stores_every_row() {
        let store = store().await;
        let group = store.get_or_create_group(&two_symbol_spec()).await.unwrap();
        let batch = minute_series("BTCUSDT", 3 * TimeUtils::MINUTES_IN_D);
        assert!(batch.len() > APPEND_CHUNK_ROWS);

        assert_eq!(group.append(&batch).await.unwrap(), 4320);

        let records = group.read_all(ReadMode::PRIMARY).await.unwrap();
        assert_eq!(records.len(), 4320);
        assert_eq!(records[0].timestamp(), "2024-04-09 00:00:00");
        assert_eq!(records[4319].timestamp(), "2024-04-11 23:59:00");
        assert_eq!(records[APPEND_CHUNK_ROWS].close(), APPEND_CHUNK_ROWS as f64);
    }

    #[tokio::test]
    async fn failure_in_a_later_chunk_rolls_back_the_whole_append() {
        let store = store().await;
        let group = store.get_or_create_group(&two_symbol_spec()).await.unwrap();
        let batch = minute_series("BTCUSDT", 3 * TimeUtils::MINUTES_IN_D);
        let rejected = batch[APPEND_CHUNK_ROWS + 100].timestamp().to_string();

        sqlx::query(&format!(
            "CREATE TRIGGER reject_row BEFORE INSERT ON {} WHEN NEW.timestamp = '{}' \
             BEGIN SELECT RAISE(ABORT, 'row rejected'); END;",
            group.table, rejected
        ))
        .execute(&store.pool)
        .await
        .unwrap();

        let err = group.append(&batch).await.unwrap_err();
        assert!(format!("{:#}", err).contains("row rejected"));

        for mode in ReadMode::iter() {
            assert!(group.read_all(mode).await.unwrap().is_empty(), "mode {}", mode);
        }
    }

    #[tokio::test]
    async fn empty_append_is_a_no_op() {
        let store = store().await;
        let group = store
            .get_or_create_group(&FeatureGroupSpec::default())
            .await
            .unwrap();
        assert_eq!(group.append(&[]).await.unwrap(), 0);
        assert!(group.read_all(ReadMode::PRIMARY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_and_keeps_original_key() {
        let store = store().await;
        let first = store.get_or_create_group(&two_symbol_spec()).await.unwrap();
        first
            .append(&[record("BTCUSDT", "2024-04-10 00:00:00", 1.0)])
            .await
            .unwrap();

        let again = store
            .get_or_create_group(&FeatureGroupSpec::new("crypto_prices_test"))
            .await
            .unwrap();

        assert_eq!(again.primary_key(), ["symbol", "timestamp"]);
        assert_eq!(again.read_all(ReadMode::PRIMARY).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn default_spec_keys_on_timestamp_only() {
        let store = store().await;
        let group = store
            .get_or_create_group(&FeatureGroupSpec::default())
            .await
            .unwrap();
        assert_eq!(group.primary_key(), ["timestamp"]);
        assert_eq!(group.name(), "crypto_prices");
    }

    #[tokio::test]
    async fn invalid_specs_are_rejected() {
        let store = store().await;
        assert!(
            store
                .get_or_create_group(&FeatureGroupSpec::new("prices; DROP TABLE x"))
                .await
                .is_err()
        );
        assert!(
            store
                .get_or_create_group(&FeatureGroupSpec::new("prices").with_primary_key(&["id"]))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn missing_index_breaks_only_the_indexed_path() {
        let store = store().await;
        let group = store.get_or_create_group(&two_symbol_spec()).await.unwrap();
        group
            .append(&[record("BTCUSDT", "2024-04-10 00:00:00", 1.0)])
            .await
            .unwrap();

        sqlx::query(&format!("DROP INDEX {}", group.index))
            .execute(&store.pool)
            .await
            .unwrap();

        let err = group.read_all(ReadMode::Indexed).await.unwrap_err();
        assert!(matches!(err, ReadError::PathUnavailable { mode: ReadMode::Indexed, .. }));
        assert_eq!(group.read_all(ReadMode::FullScan).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_table_fails_both_paths() {
        let store = store().await;
        let group = store.get_or_create_group(&two_symbol_spec()).await.unwrap();

        sqlx::query(&format!("DROP TABLE {}", group.table))
            .execute(&store.pool)
            .await
            .unwrap();

        for mode in ReadMode::iter() {
            let err = group.read_all(mode).await.unwrap_err();
            assert_eq!(err.mode(), mode);
        }
    }
}
