use anyhow::{anyhow, Error};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Deserialize;
use slog::{info, Logger};
use std::sync::Arc;

use super::catalog::{load_stations, save_stations, Station};
use crate::{Geometry, JsonFetcher, QuantitativeValue};

#[derive(Deserialize, Debug)]
pub struct StationsResponse {
    pub features: Vec<StationFeature>,
}

#[derive(Deserialize, Debug)]
pub struct StationFeature {
    pub properties: StationProperties,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Deserialize, Debug)]
pub struct StationProperties {
    #[serde(rename = "stationIdentifier")]
    pub station_identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "timeZone", default)]
    pub time_zone: String,
    #[serde(default)]
    pub elevation: QuantitativeValue,
}

/// Catalog utilities: download a station sample from the NWS listing and
/// reproducibly pick the stations the pipeline will ingest.
pub struct StationService {
    pub logger: Logger,
    pub fetcher: Arc<JsonFetcher>,
    base_url: String,
}

impl StationService {
    pub fn new(logger: Logger, fetcher: Arc<JsonFetcher>, base_url: String) -> Self {
        StationService {
            logger,
            fetcher,
            base_url,
        }
    }

    /// Fetches up to `limit` stations from the NWS listing endpoint and
    /// writes them to `output_path`.
    pub async fn fetch_catalog(&self, limit: usize, output_path: &str) -> Result<Vec<Station>, Error> {
        let url = format!("{}/stations?limit={}", self.base_url, limit);
        info!(self.logger, "fetching station listing from {}", url);
        let response: StationsResponse = self.fetcher.fetch_json(&url).await?;

        let stations: Vec<Station> = response
            .features
            .into_iter()
            .take(limit)
            .map(|feature| {
                let (longitude, latitude) = match &feature.geometry {
                    Some(geometry) => (
                        geometry.coordinates.first().copied(),
                        geometry.coordinates.get(1).copied(),
                    ),
                    None => (None, None),
                };
                Station {
                    station_id: feature.properties.station_identifier,
                    name: feature.properties.name,
                    latitude,
                    longitude,
                    timezone: feature.properties.time_zone,
                    elevation_m: feature.properties.elevation.value,
                }
            })
            .collect();

        save_stations(output_path, &stations)?;
        info!(
            self.logger,
            "{} stations saved to {}",
            stations.len(),
            output_path
        );
        Ok(stations)
    }

    /// Picks `count` stations from the downloaded sample with a seeded RNG,
    /// so re-running the selection always yields the same set.
    pub fn select_stations(
        &self,
        sample_path: &str,
        output_path: &str,
        count: usize,
        seed: u64,
    ) -> Result<Vec<Station>, Error> {
        let catalog = load_stations(sample_path)?;
        if catalog.len() < count {
            return Err(anyhow!(
                "station sample {} has {} stations, need {}",
                sample_path,
                catalog.len(),
                count
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let selected: Vec<Station> = catalog.choose_multiple(&mut rng, count).cloned().collect();

        save_stations(output_path, &selected)?;
        info!(
            self.logger,
            "{} stations selected (seed {}) into {}",
            selected.len(),
            seed,
            output_path
        );
        Ok(selected)
    }
}
