use anyhow::{anyhow, Error};
use serde::Deserialize;
use slog::{debug, Logger};
use std::sync::Arc;
use time::{macros::format_description, OffsetDateTime};

use crate::{normalize_feature, JsonFetcher, Observation, Station};

/// One page of the NWS observations endpoint. A body without a `features`
/// key fails deserialization and is treated as a malformed-payload fetch
/// failure for that station.
#[derive(Deserialize, Debug)]
pub struct ObservationResponse {
    pub features: Vec<ObservationFeature>,
}

#[derive(Deserialize, Debug)]
pub struct ObservationFeature {
    pub properties: ObservationProperties,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ObservationProperties {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub temperature: QuantitativeValue,
    #[serde(rename = "windSpeed", default)]
    pub wind_speed: QuantitativeValue,
    #[serde(rename = "relativeHumidity", default)]
    pub relative_humidity: QuantitativeValue,
}

/// NWS wraps every measurement in a `{ "value": ..., "unitCode": ... }`
/// object; only the value is used here.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct QuantitativeValue {
    #[serde(default)]
    pub value: Option<f64>,
}

/// GeoJSON point, coordinates ordered [longitude, latitude].
#[derive(Deserialize, Debug, Default)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

pub struct ObservationService {
    pub logger: Logger,
    pub fetcher: Arc<JsonFetcher>,
    base_url: String,
}

impl ObservationService {
    pub fn new(logger: Logger, fetcher: Arc<JsonFetcher>, base_url: String) -> Self {
        ObservationService {
            logger,
            fetcher,
            base_url,
        }
    }

    /// Fetches the observation window for one station and returns the
    /// normalized records. Features without a usable timestamp are skipped
    /// silently; any fetch or decode problem is a per-station failure the
    /// caller logs and moves past.
    pub async fn fetch_station(
        &self,
        station: &Station,
        since: OffsetDateTime,
    ) -> Result<Vec<Observation>, Error> {
        let start_format =
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
        let start = since
            .format(start_format)
            .map_err(|e| anyhow!("error formatting window start: {}", e))?;
        let url = format!(
            "{}/stations/{}/observations?start={}",
            self.base_url, station.station_id, start
        );

        let response: ObservationResponse = self.fetcher.fetch_json(&url).await?;
        let records: Vec<Observation> = response
            .features
            .iter()
            .filter_map(|feature| normalize_feature(station, feature))
            .collect();

        debug!(
            self.logger,
            "station {}: normalized {} of {} features",
            station.station_id,
            records.len(),
            response.features.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_observations_body() {
        let body = r#"{
            "features": [
                {
                    "geometry": { "type": "Point", "coordinates": [-70.06, 41.25] },
                    "properties": {
                        "timestamp": "2024-01-01T00:00:00+00:00",
                        "temperature": { "unitCode": "wmoUnit:degC", "value": 21.7 },
                        "windSpeed": { "unitCode": "wmoUnit:km_h-1", "value": null },
                        "relativeHumidity": { "unitCode": "wmoUnit:percent", "value": 82.19 }
                    }
                }
            ]
        }"#;

        let response: ObservationResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.features.len(), 1);

        let properties = &response.features[0].properties;
        assert_eq!(
            properties.timestamp.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert_eq!(properties.temperature.value, Some(21.7));
        assert_eq!(properties.wind_speed.value, None);
        assert_eq!(
            response.features[0].geometry.as_ref().unwrap().coordinates,
            vec![-70.06, 41.25]
        );
    }

    #[test]
    fn body_without_features_is_malformed() {
        let body = r#"{ "title": "Not Found", "status": 404 }"#;
        assert!(serde_json::from_str::<ObservationResponse>(body).is_err());
    }

    #[test]
    fn absent_measurement_groups_default_to_empty() {
        let body = r#"{
            "features": [
                { "properties": { "timestamp": "2024-01-01T00:00:00+00:00" } }
            ]
        }"#;
        let response: ObservationResponse = serde_json::from_str(body).unwrap();
        let properties = &response.features[0].properties;
        assert_eq!(properties.temperature.value, None);
        assert_eq!(properties.relative_humidity.value, None);
        assert!(response.features[0].geometry.is_none());
    }
}
