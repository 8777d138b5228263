use crate::{ObservationFeature, Station};

/// One weather reading at one station at one instant, shaped for the
/// `weather_data` table. Created once by the normalizer and never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub station_id: String,
    pub station_name: String,
    pub timezone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Raw ISO 8601 timestamp as sent by the API (UTC)
    pub observed_at: String,
    /// °C, 0.0 when the reading is absent from the payload
    pub temperature: f64,
    /// m/s, 0.0 when absent
    pub wind_speed: f64,
    /// %, 0.0 when absent
    pub humidity: f64,
    /// station_id + "_" + observed_at; primary key in the store
    pub dedup_key: String,
}

/// Pure transform from one raw API feature to a storable record.
///
/// Returns `None` when the feature carries no usable timestamp; the feed
/// occasionally emits incomplete entries and the pipeline favors
/// completeness over strictness. Absent measurements become 0.0 rather
/// than null, matching the stored output of prior runs (so downstream
/// queries cannot distinguish a placeholder from a true zero reading).
pub fn normalize_feature(station: &Station, feature: &ObservationFeature) -> Option<Observation> {
    let timestamp = feature.properties.timestamp.as_deref()?;
    if timestamp.is_empty() {
        return None;
    }

    let (longitude, latitude) = match &feature.geometry {
        Some(geometry) => (
            geometry.coordinates.first().copied(),
            geometry.coordinates.get(1).copied(),
        ),
        None => (None, None),
    };

    Some(Observation {
        station_id: station.station_id.clone(),
        station_name: station.name.clone(),
        timezone: station.timezone.clone(),
        latitude,
        longitude,
        observed_at: timestamp.to_string(),
        temperature: round2(feature.properties.temperature.value.unwrap_or(0.0)),
        wind_speed: round2(feature.properties.wind_speed.value.unwrap_or(0.0)),
        humidity: round2(feature.properties.relative_humidity.value.unwrap_or(0.0)),
        dedup_key: format!("{}_{}", station.station_id, timestamp),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Geometry, ObservationProperties, QuantitativeValue};

    fn station() -> Station {
        Station {
            station_id: "KACK".to_string(),
            name: "Nantucket Memorial Airport".to_string(),
            latitude: Some(41.25),
            longitude: Some(-70.06),
            timezone: "America/New_York".to_string(),
            elevation_m: Some(9.1),
        }
    }

    fn feature(timestamp: Option<&str>) -> ObservationFeature {
        ObservationFeature {
            properties: ObservationProperties {
                timestamp: timestamp.map(str::to_string),
                temperature: QuantitativeValue { value: Some(21.666) },
                wind_speed: QuantitativeValue { value: Some(5.144) },
                relative_humidity: QuantitativeValue { value: Some(82.191) },
            },
            geometry: Some(Geometry {
                coordinates: vec![-70.06, 41.25],
            }),
        }
    }

    #[test]
    fn missing_timestamp_yields_no_record() {
        assert!(normalize_feature(&station(), &feature(None)).is_none());

        let empty = feature(Some(""));
        assert!(normalize_feature(&station(), &empty).is_none());
    }

    #[test]
    fn values_are_rounded_to_two_decimals() {
        let record = normalize_feature(&station(), &feature(Some("2024-01-01T00:00:00+00:00")))
            .expect("record");
        assert_eq!(record.temperature, 21.67);
        assert_eq!(record.wind_speed, 5.14);
        assert_eq!(record.humidity, 82.19);
    }

    #[test]
    fn absent_measurements_default_to_zero() {
        let mut raw = feature(Some("2024-01-01T00:00:00+00:00"));
        raw.properties.temperature = QuantitativeValue { value: None };
        raw.properties.wind_speed = QuantitativeValue { value: None };

        let record = normalize_feature(&station(), &raw).expect("record");
        assert_eq!(record.temperature, 0.0);
        assert_eq!(record.wind_speed, 0.0);
        assert_eq!(record.humidity, 82.19);
    }

    #[test]
    fn dedup_key_combines_station_and_timestamp() {
        let a = normalize_feature(&station(), &feature(Some("2024-01-01T00:00:00+00:00")))
            .expect("record");
        let b = normalize_feature(&station(), &feature(Some("2024-01-01T01:00:00+00:00")))
            .expect("record");
        assert_eq!(a.dedup_key, "KACK_2024-01-01T00:00:00+00:00");
        assert_ne!(a.dedup_key, b.dedup_key);
    }

    #[test]
    fn coordinates_come_from_geometry() {
        let mut raw = feature(Some("2024-01-01T00:00:00+00:00"));
        raw.geometry = None;

        let record = normalize_feature(&station(), &raw).expect("record");
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);

        let record = normalize_feature(&station(), &feature(Some("2024-01-01T00:00:00+00:00")))
            .expect("record");
        assert_eq!(record.latitude, Some(41.25));
        assert_eq!(record.longitude, Some(-70.06));
    }

    #[test]
    fn repeated_normalization_is_identical() {
        let raw = feature(Some("2024-01-01T00:00:00+00:00"));
        let first = normalize_feature(&station(), &raw);
        let second = normalize_feature(&station(), &raw);
        assert_eq!(first, second);
    }
}
