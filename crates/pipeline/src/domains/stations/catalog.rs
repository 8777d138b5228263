use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A fixed weather-reporting location. Sourced from the selection CSV;
/// the pipeline core never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: String,
    pub elevation_m: Option<f64>,
}

/// Read the station list the pipeline should ingest.
pub fn load_stations(path: &str) -> Result<Vec<Station>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open stations file: {}", path))?;

    let mut stations = Vec::new();
    for record in reader.deserialize() {
        let station: Station =
            record.with_context(|| format!("malformed station row in {}", path))?;
        stations.push(station);
    }
    Ok(stations)
}

pub fn save_stations(path: &str, stations: &[Station]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create stations file: {}", path))?;
    for station in stations {
        writer.serialize(station)?;
    }
    writer.flush()?;
    Ok(())
}
