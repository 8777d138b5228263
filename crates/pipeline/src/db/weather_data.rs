use sqlx::{sqlite::SqlitePool, FromRow};
use time::{macros::format_description, Date, Duration, OffsetDateTime};

use crate::Database;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to query sqlite: {0}")]
    Query(#[from] sqlx::Error),
    #[error("Failed to format time value: {0}")]
    TimeFormat(#[from] time::error::Format),
}

/// Mean temperature per station over the most recently completed
/// Monday-Sunday week.
#[derive(Debug, FromRow)]
pub struct WeeklyMeanTemperature {
    pub station_name: String,
    pub mean_temperature: f64,
}

/// Largest absolute wind-speed change between consecutive observations.
#[derive(Debug, FromRow)]
pub struct MaxWindDelta {
    pub station_name: String,
    pub max_delta: f64,
}

/// Humidity extrema for one (day, station) pair.
#[derive(Debug, FromRow)]
pub struct HumidityExtrema {
    pub date: String,
    pub station_name: String,
    pub min_humidity: f64,
    pub max_humidity: f64,
}

/// Change of a day's mean temperature/humidity versus the previous day.
#[derive(Debug, FromRow)]
pub struct DailyVariation {
    pub station_name: String,
    pub date: String,
    pub temp_delta: Option<f64>,
    pub humidity_delta: Option<f64>,
}

#[derive(Debug, FromRow)]
pub struct StationMeanTemperature {
    pub station_id: String,
    pub mean_temperature: f64,
}

/// Stateless read-only view over the ingestion store. Holds no state of
/// its own; every method recomputes from `weather_data` on each call.
pub struct WeatherAccess {
    pool: SqlitePool,
}

impl WeatherAccess {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Mean temperature per station for the last completed Monday-Sunday
    /// week relative to `today`; the current partial week never
    /// contributes. Null temperatures are excluded from the average
    /// entirely.
    pub async fn weekly_mean_temperature(
        &self,
        today: Date,
    ) -> Result<Vec<WeeklyMeanTemperature>, Error> {
        let date_format = format_description!("[year]-[month]-[day]");
        let monday = today - Duration::days(i64::from(today.weekday().number_days_from_monday()));
        let week_start = (monday - Duration::days(7)).format(date_format)?;
        let week_end = (monday - Duration::days(1)).format(date_format)?;

        let rows = sqlx::query_as::<_, WeeklyMeanTemperature>(
            "SELECT
                station_name,
                ROUND(AVG(temperature), 2) AS mean_temperature
             FROM weather_data
             WHERE DATE(observed_at) BETWEEN ?1 AND ?2
               AND temperature IS NOT NULL
             GROUP BY station_name",
        )
        .bind(week_start)
        .bind(week_end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Maximum absolute wind-speed change between consecutive observations
    /// per station over the trailing 7 days from `now`. The first
    /// observation in the window has no predecessor, so a station needs at
    /// least two observations to produce a row.
    pub async fn max_wind_speed_delta(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<MaxWindDelta>, Error> {
        let since_format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
        let since = (now - Duration::days(7)).format(since_format)?;

        let rows = sqlx::query_as::<_, MaxWindDelta>(
            "WITH deltas AS (
                SELECT
                    station_name,
                    ABS(wind_speed - LAG(wind_speed) OVER (
                        PARTITION BY station_id ORDER BY DATETIME(observed_at)
                    )) AS wind_delta
                FROM weather_data
                WHERE DATETIME(observed_at) >= DATETIME(?1)
                  AND wind_speed IS NOT NULL
             )
             SELECT
                station_name,
                ROUND(MAX(wind_delta), 2) AS max_delta
             FROM deltas
             WHERE wind_delta IS NOT NULL
             GROUP BY station_name",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Minimum and maximum humidity per calendar day and station, most
    /// recent day first, capped to the 10 first (day, station) rows as
    /// returned by the ordering.
    pub async fn daily_humidity_extrema(&self) -> Result<Vec<HumidityExtrema>, Error> {
        let rows = sqlx::query_as::<_, HumidityExtrema>(
            "SELECT
                DATE(observed_at) AS date,
                station_name,
                MIN(humidity) AS min_humidity,
                MAX(humidity) AS max_humidity
             FROM weather_data
             WHERE humidity IS NOT NULL
             GROUP BY DATE(observed_at), station_name
             ORDER BY date DESC
             LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Day-over-day change of each station's daily mean temperature and
    /// humidity. Days with no previous day are excluded; capped to 10 rows
    /// after ordering by station then date descending.
    pub async fn day_over_day_variation(&self) -> Result<Vec<DailyVariation>, Error> {
        let rows = sqlx::query_as::<_, DailyVariation>(
            "WITH daily_means AS (
                SELECT
                    station_id,
                    station_name,
                    DATE(observed_at) AS date,
                    AVG(temperature) AS mean_temp,
                    AVG(humidity) AS mean_humidity
                FROM weather_data
                GROUP BY station_id, DATE(observed_at)
             ),
             variations AS (
                SELECT
                    station_name,
                    date,
                    ROUND(mean_temp - LAG(mean_temp) OVER (
                        PARTITION BY station_id ORDER BY date
                    ), 2) AS temp_delta,
                    ROUND(mean_humidity - LAG(mean_humidity) OVER (
                        PARTITION BY station_id ORDER BY date
                    ), 2) AS humidity_delta
                FROM daily_means
             )
             SELECT station_name, date, temp_delta, humidity_delta
             FROM variations
             WHERE temp_delta IS NOT NULL OR humidity_delta IS NOT NULL
             ORDER BY station_name, date DESC
             LIMIT 10",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Validation query: mean temperature per station over the trailing 7
    /// days, warmest first.
    pub async fn trailing_mean_temperature(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<StationMeanTemperature>, Error> {
        let since_format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
        let since = (now - Duration::days(7)).format(since_format)?;

        let rows = sqlx::query_as::<_, StationMeanTemperature>(
            "SELECT
                station_id,
                ROUND(AVG(temperature), 2) AS mean_temperature
             FROM weather_data
             WHERE DATETIME(observed_at) >= DATETIME(?1)
               AND temperature IS NOT NULL
             GROUP BY station_id
             ORDER BY mean_temperature DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Validation query: total stored observation count.
    pub async fn total_rows(&self) -> Result<i64, Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weather_data")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// Validation query: most recent observation timestamp, if any.
    pub async fn latest_observation(&self) -> Result<Option<String>, Error> {
        let latest: Option<String> = sqlx::query_scalar("SELECT MAX(observed_at) FROM weather_data")
            .fetch_one(&self.pool)
            .await?;
        Ok(latest)
    }
}
