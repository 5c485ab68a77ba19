use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::collect::global_variables::{
    CLOUD_COVER_PROPERTY, INSTRUMENT_MODE_IW, INSTRUMENT_MODE_PROPERTY, NIR_BAND,
    POLARISATION_PROPERTY, RED_BAND, S1_COLLECTION, S2_COLLECTION, VH_BAND,
};
use crate::commons::basic_functions::date_from_millis;
use crate::geo_core::{AnalysisWindow, ParcelGeometry};
use crate::query::{ImageExpr, PropertyFilter, SceneQuery};

/// Imagery source a growth analysis can be based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sensor {
    #[serde(rename = "Sentinel-1")]
    Sentinel1,
    #[serde(rename = "Sentinel-2")]
    Sentinel2,
}

impl Sensor {
    pub fn name(&self) -> &'static str {
        match self {
            Sensor::Sentinel1 => "Sentinel-1",
            Sensor::Sentinel2 => "Sentinel-2",
        }
    }

    /// Human readable signal description stored with the result
    pub fn data_source(&self) -> &'static str {
        match self {
            Sensor::Sentinel1 => "Sentinel-1 VH",
            Sensor::Sentinel2 => "Sentinel-2 NDVI",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            Sensor::Sentinel1 => S1_COLLECTION,
            Sensor::Sentinel2 => S2_COLLECTION,
        }
    }

    /// Scenes of this sensor usable over `parcel` during `window`, latest first.
    ///
    /// `max_cloud_cover` only applies to optical scenes.
    pub fn candidates(
        &self,
        parcel: &ParcelGeometry,
        window: AnalysisWindow,
        max_cloud_cover: f64,
    ) -> SceneQuery {
        let query = SceneQuery::catalog(self.collection())
            .filter_bounds(parcel)
            .filter_date(window);

        match self {
            Sensor::Sentinel2 => query
                .filter(PropertyFilter::less_than(CLOUD_COVER_PROPERTY, max_cloud_cover))
                .latest_first(),
            Sensor::Sentinel1 => query
                .filter(PropertyFilter::equals(INSTRUMENT_MODE_PROPERTY, INSTRUMENT_MODE_IW))
                .filter(PropertyFilter::list_contains(POLARISATION_PROPERTY, VH_BAND))
                .select(&[VH_BAND])
                .latest_first(),
        }
    }

    /// Single-band signal of the latest candidate, clipped to the parcel:
    /// NDVI for optical scenes, VH backscatter (dB) for radar scenes
    pub fn signal(&self, candidates: &SceneQuery, parcel: &ParcelGeometry) -> ImageExpr {
        let latest = ImageExpr::first(candidates.clone());
        match self {
            Sensor::Sentinel2 => latest.normalized_difference(NIR_BAND, RED_BAND).clip(parcel),
            Sensor::Sentinel1 => latest.select(&[VH_BAND]).clip(parcel),
        }
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Latest usable scene of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneCandidate {
    pub sensor: Sensor,
    /// Capture time, epoch milliseconds
    pub time_start: i64,
}

impl SceneCandidate {
    pub fn new(sensor: Sensor, time_start: i64) -> Self {
        SceneCandidate { sensor, time_start }
    }

    /// Capture date (UTC)
    pub fn date(&self) -> Option<NaiveDate> {
        date_from_millis(self.time_start)
    }
}

/// Pick the scene to analyse.
///
/// Optical wins unless radar is strictly more recent; a single candidate is
/// used as is.
pub fn select_sensor(
    optical: Option<SceneCandidate>,
    radar: Option<SceneCandidate>,
) -> Option<SceneCandidate> {
    match (optical, radar) {
        (Some(s2), Some(s1)) => Some(if s2.time_start >= s1.time_start { s2 } else { s1 }),
        (Some(s2), None) => Some(s2),
        (None, Some(s1)) => Some(s1),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::global_variables::TIME_START;

    fn at(date: &str) -> i64 {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn test_optical_more_recent() {
        let chosen = select_sensor(
            Some(SceneCandidate::new(Sensor::Sentinel2, at("2025-06-10"))),
            Some(SceneCandidate::new(Sensor::Sentinel1, at("2025-06-09"))),
        )
        .unwrap();
        assert_eq!(chosen.sensor, Sensor::Sentinel2);
    }

    #[test]
    fn test_radar_more_recent() {
        let chosen = select_sensor(
            Some(SceneCandidate::new(Sensor::Sentinel2, at("2025-06-09"))),
            Some(SceneCandidate::new(Sensor::Sentinel1, at("2025-06-10"))),
        )
        .unwrap();
        assert_eq!(chosen.sensor, Sensor::Sentinel1);
        assert_eq!(chosen.date(), NaiveDate::from_ymd_opt(2025, 6, 10));
    }

    #[test]
    fn test_tie_prefers_optical() {
        let t = at("2025-06-10");
        let chosen = select_sensor(
            Some(SceneCandidate::new(Sensor::Sentinel2, t)),
            Some(SceneCandidate::new(Sensor::Sentinel1, t)),
        )
        .unwrap();
        assert_eq!(chosen.sensor, Sensor::Sentinel2);
    }

    #[test]
    fn test_single_or_no_candidate() {
        let s1 = SceneCandidate::new(Sensor::Sentinel1, at("2025-06-01"));
        assert_eq!(select_sensor(None, Some(s1)), Some(s1));
        assert_eq!(select_sensor(None, None), None);
    }

    #[test]
    fn test_candidate_queries() {
        let parcel = ParcelGeometry::rectangle(0.0, 0.0, 0.01, 0.01).unwrap();
        let window = AnalysisWindow::parse("2024-06-01", "2024-06-30").unwrap();

        let optical = Sensor::Sentinel2.candidates(&parcel, window, 60.0);
        assert_eq!(optical.collection, "COPERNICUS/S2_SR");
        assert_eq!(
            optical.filters,
            vec![PropertyFilter::less_than("CLOUDY_PIXEL_PERCENTAGE", 60.0)]
        );
        let sort = optical.sort.as_ref().unwrap();
        assert_eq!(sort.property, TIME_START);
        assert!(!sort.ascending);

        let radar = Sensor::Sentinel1.candidates(&parcel, window, 60.0);
        assert_eq!(radar.collection, "COPERNICUS/S1_GRD");
        assert_eq!(radar.filters.len(), 2);
        assert_eq!(radar.bands, Some(vec!["VH".to_string()]));
    }

    #[test]
    fn test_sensor_names() {
        assert_eq!(
            serde_json::to_value(Sensor::Sentinel1).unwrap(),
            serde_json::json!("Sentinel-1")
        );
        assert_eq!(Sensor::Sentinel2.to_string(), "Sentinel-2");
        assert_eq!(Sensor::Sentinel2.data_source(), "Sentinel-2 NDVI");
        assert_eq!(Sensor::Sentinel1.data_source(), "Sentinel-1 VH");
    }
}
