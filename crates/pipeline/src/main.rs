use anyhow::Error;
use pipeline::{
    get_config_info, load_stations, setup_logger, Cli, Command, Database,
    Error as QueryError, JsonFetcher, ObservationService, StationService, StationsCommand,
    WeatherAccess,
};
use slog::{error, info, warn, Logger};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use wx_pipeline_core::{path_exists, STATION_SAMPLE_FILE};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = get_config_info();
    let logger = setup_logger(&cli);

    match cli.command.clone().unwrap_or(Command::Run) {
        Command::Run => {
            println!("===========================================");
            println!("           WEATHER PIPELINE RUN            ");
            println!("===========================================\n");

            // Each phase degrades to skip-and-continue; a failed phase is
            // logged, never fatal to the process.
            if let Err(err) = run_ingest(&cli, &logger).await {
                error!(logger, "error running ingestion: {}", err);
            }
            if let Err(err) = run_report(&cli, &logger).await {
                error!(logger, "error running report: {}", err);
            }

            println!("\nProcess completed.");
        }
        Command::Ingest => {
            if let Err(err) = run_ingest(&cli, &logger).await {
                error!(logger, "error running ingestion: {}", err);
            }
        }
        Command::Report => {
            if let Err(err) = run_report(&cli, &logger).await {
                error!(logger, "error running report: {}", err);
            }
        }
        Command::Stations { action } => {
            let fetcher = Arc::new(JsonFetcher::new(
                logger.clone(),
                cli.user_agent(),
                cli.timeout_secs(),
                cli.max_retries(),
            ));
            let service = StationService::new(logger.clone(), fetcher, cli.base_url());
            match action {
                StationsCommand::Fetch { limit } => {
                    let stations = service.fetch_catalog(limit, STATION_SAMPLE_FILE).await?;
                    println!("{} stations saved to {}.", stations.len(), STATION_SAMPLE_FILE);
                }
                StationsCommand::Select { count, seed } => {
                    let selected = service.select_stations(
                        STATION_SAMPLE_FILE,
                        &cli.stations_file(),
                        count,
                        seed,
                    )?;
                    println!("Selected stations (seed {}):", seed);
                    for station in &selected {
                        println!("   - {}  {}", station.station_id, station.name);
                    }
                    println!("Station list written to {}.", cli.stations_file());
                }
            }
        }
    }

    Ok(())
}

/// ETL phase: fetch the observation window for every configured station,
/// normalize, and store idempotently. A failing station contributes
/// nothing and the loop moves on.
async fn run_ingest(cli: &Cli, logger: &Logger) -> Result<(), Error> {
    println!("--- Ingestion ---");

    let stations_file = cli.stations_file();
    let stations = if path_exists(&stations_file) {
        load_stations(&stations_file)?
    } else {
        warn!(
            logger,
            "stations file {} not found; running with no stations", stations_file
        );
        Vec::new()
    };
    if stations.is_empty() {
        println!("No stations configured, nothing to ingest.");
        return Ok(());
    }

    info!(
        logger,
        "ingesting {} stations into {}",
        stations.len(),
        cli.db_path()
    );
    let fetcher = Arc::new(JsonFetcher::new(
        logger.clone(),
        cli.user_agent(),
        cli.timeout_secs(),
        cli.max_retries(),
    ));
    let service = ObservationService::new(logger.clone(), fetcher, cli.base_url());
    let since = OffsetDateTime::now_utc() - Duration::days(cli.lookback_days());

    let mut records = Vec::new();
    for station in &stations {
        info!(logger, "fetching observations for {}", station.station_id);
        match service.fetch_station(station, since).await {
            Ok(mut station_records) => records.append(&mut station_records),
            Err(err) => error!(
                logger,
                "error fetching station {}: {}", station.station_id, err
            ),
        }
    }
    if records.is_empty() {
        println!("No valid observations fetched.");
        return Ok(());
    }

    let db = Database::open(&cli.db_path()).await?;
    db.ensure_schema().await?;
    let inserted = db.upsert_batch(&records).await?;
    println!(
        "{} records fetched, {} new rows stored in {}.",
        records.len(),
        inserted,
        cli.db_path()
    );

    println!("\nObservations per station:");
    for (station_id, count) in db.station_counts().await? {
        println!("   - {}: {} records", station_id, count);
    }
    Ok(())
}

/// Read-only phase: basic validations followed by the analytics queries.
async fn run_report(cli: &Cli, logger: &Logger) -> Result<(), Error> {
    let db = Database::open(&cli.db_path()).await?;
    let weather = WeatherAccess::new(&db);

    println!("\n--- Basic validations ---");
    if let Err(err) = run_validations(&weather).await {
        error!(logger, "error running validations: {}", err);
    }

    println!("\n--- Analytics ---");
    // A failed query ends the analytics phase early without taking the
    // process down.
    if let Err(err) = run_analytics(&weather).await {
        error!(logger, "error running analytics queries: {}", err);
    }
    Ok(())
}

async fn run_validations(weather: &WeatherAccess) -> Result<(), QueryError> {
    let now = OffsetDateTime::now_utc();

    println!("1. Mean temperature per station (trailing 7 days):");
    let rows = weather.trailing_mean_temperature(now).await?;
    if rows.is_empty() {
        println!("   No recent temperature records.");
    }
    for row in rows {
        println!("   - {}: {} °C", row.station_id, row.mean_temperature);
    }

    println!("\n2. Total stored records: {}", weather.total_rows().await?);

    match weather.latest_observation().await? {
        Some(latest) => println!("\n3. Most recent observation: {}", latest),
        None => println!("\n3. Most recent observation: none recorded"),
    }
    Ok(())
}

async fn run_analytics(weather: &WeatherAccess) -> Result<(), QueryError> {
    let now = OffsetDateTime::now_utc();

    println!("1. Weekly mean temperature (last full Monday-Sunday week):");
    for row in weather.weekly_mean_temperature(now.date()).await? {
        println!("   - {}: {} °C", row.station_name, row.mean_temperature);
    }

    println!("\n2. Maximum wind-speed change (trailing 7 days):");
    for row in weather.max_wind_speed_delta(now).await? {
        println!("   - {}: {} m/s", row.station_name, row.max_delta);
    }

    println!("\n3. Daily humidity extrema (10 most recent day/station pairs):");
    for row in weather.daily_humidity_extrema().await? {
        println!(
            "   - {} | {}: min {} %, max {} %",
            row.date, row.station_name, row.min_humidity, row.max_humidity
        );
    }

    println!("\n4. Day-over-day variation:");
    for row in weather.day_over_day_variation().await? {
        println!(
            "   - {} ({}): temp {} °C | humidity {} %",
            row.station_name,
            row.date,
            format_delta(row.temp_delta),
            format_delta(row.humidity_delta)
        );
    }
    Ok(())
}

fn format_delta(delta: Option<f64>) -> String {
    delta
        .map(|value| format!("{:+}", value))
        .unwrap_or_else(|| "n/a".to_string())
}
