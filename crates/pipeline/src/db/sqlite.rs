use anyhow::{anyhow, Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    QueryBuilder,
};
use std::{path::Path, str::FromStr, time::Duration};
use wx_pipeline_core::ensure_dir_exists;

use crate::Observation;

/// Rows per INSERT statement; 10 bound values per row keeps each chunk
/// well under SQLite's default host-parameter limit.
const INSERT_CHUNK_SIZE: usize = 80;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the file-backed store.
    pub async fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !ensure_dir_exists(&parent.to_string_lossy()) {
                return Err(anyhow!("Failed to create database directory: {parent:?}"));
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
            .create_if_missing(true)
            .pragma("journal_mode", "WAL")
            .pragma("synchronous", "NORMAL")
            .pragma("busy_timeout", "5000");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        Ok(Self { pool })
    }

    /// In-memory store; a single connection so every query sees the same
    /// database. Used by the integration tests.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Guarded table creation; idempotent and safe to call on every run.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS weather_data (
                station_id TEXT,
                station_name TEXT,
                timezone TEXT,
                latitude REAL,
                longitude REAL,
                observed_at TEXT,
                temperature REAL,
                wind_speed REAL,
                humidity REAL,
                dedup_key TEXT PRIMARY KEY
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create weather_data table")?;
        Ok(())
    }

    /// Idempotent batch insert: a record whose dedup_key already exists is
    /// ignored, never overwritten, and never reported as an error. All
    /// chunks run inside one transaction. Returns the number of rows
    /// actually inserted.
    pub async fn upsert_batch(&self, records: &[Observation]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0u64;
        let mut transaction = self.pool.begin().await?;

        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let mut qb = QueryBuilder::new(
                "INSERT OR IGNORE INTO weather_data \
                 (station_id, station_name, timezone, latitude, longitude, \
                  observed_at, temperature, wind_speed, humidity, dedup_key) ",
            );
            qb.push_values(chunk, |mut row, record| {
                row.push_bind(&record.station_id)
                    .push_bind(&record.station_name)
                    .push_bind(&record.timezone)
                    .push_bind(record.latitude)
                    .push_bind(record.longitude)
                    .push_bind(&record.observed_at)
                    .push_bind(record.temperature)
                    .push_bind(record.wind_speed)
                    .push_bind(record.humidity)
                    .push_bind(&record.dedup_key);
            });

            let result = qb.build().execute(&mut *transaction).await?;
            inserted += result.rows_affected();
        }

        transaction.commit().await?;
        Ok(inserted)
    }

    /// Per-station row counts, printed as the ingest run summary.
    pub async fn station_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as(
            "SELECT station_id, COUNT(*) FROM weather_data \
             GROUP BY station_id ORDER BY station_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
