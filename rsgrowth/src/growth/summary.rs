use chrono::NaiveDate;
use geojson::{Feature, Geometry, JsonObject};
use serde::Serialize;
use serde_json::json;

use crate::commons::basic_functions::{percentage, round_to};
use crate::geo_core::AnalysisWindow;
use crate::growth::classification::ConditionClass;
use crate::growth::selection::Sensor;

/// Classified pixel counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub healthy: u64,
    pub moderate: u64,
    pub weak: u64,
    pub stress: u64,
}

impl ClassCounts {
    pub fn set(&mut self, class: ConditionClass, count: u64) {
        match class {
            ConditionClass::Healthy => self.healthy = count,
            ConditionClass::Moderate => self.moderate = count,
            ConditionClass::Weak => self.weak = count,
            ConditionClass::Stress => self.stress = count,
        }
    }

    /// Sum of the four classes; unclassified pixels are not counted
    pub fn total(&self) -> u64 {
        self.healthy + self.moderate + self.weak + self.stress
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelSummary {
    pub total_pixel_count: u64,
    pub healthy_pixel_count: u64,
    pub moderate_pixel_count: u64,
    pub weak_pixel_count: u64,
    pub stress_pixel_count: u64,
    pub healthy_pixel_percentage: f64,
    pub moderate_pixel_percentage: f64,
    pub weak_pixel_percentage: f64,
    pub stress_pixel_percentage: f64,
    pub analysis_start_date: NaiveDate,
    pub analysis_end_date: NaiveDate,
    pub latest_image_date: NaiveDate,
}

impl PixelSummary {
    pub fn from_counts(counts: ClassCounts, window: AnalysisWindow, latest_image_date: NaiveDate) -> Self {
        let total = counts.total();
        PixelSummary {
            total_pixel_count: total,
            healthy_pixel_count: counts.healthy,
            moderate_pixel_count: counts.moderate,
            weak_pixel_count: counts.weak,
            stress_pixel_count: counts.stress,
            healthy_pixel_percentage: percentage(counts.healthy, total),
            moderate_pixel_percentage: percentage(counts.moderate, total),
            weak_pixel_percentage: percentage(counts.weak, total),
            stress_pixel_percentage: percentage(counts.stress, total),
            analysis_start_date: window.start,
            analysis_end_date: window.end,
            latest_image_date,
        }
    }
}

/// Descriptive properties of the analysed plot
#[derive(Debug, Clone, PartialEq)]
pub struct PlotProperties {
    pub plot_name: Option<String>,
    pub area_hectares: f64,
    pub sensor: Sensor,
    pub latest_image_date: NaiveDate,
    pub last_updated: String,
}

impl PlotProperties {
    fn into_json(self) -> JsonObject {
        let mut properties = JsonObject::new();
        properties.insert("plot_name".to_string(), json!(self.plot_name));
        properties.insert("area_hectares".to_string(), json!(round_to(self.area_hectares, 2)));
        properties.insert("data_source".to_string(), json!(self.sensor.data_source()));
        properties.insert(
            "latest_image_date".to_string(),
            json!(self.latest_image_date.format("%Y-%m-%d").to_string()),
        );
        properties.insert("last_updated".to_string(), json!(self.last_updated));
        properties
    }
}

/// GeoJSON feature collection of the analysed plot plus its pixel summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    pub pixel_summary: PixelSummary,
}

impl GrowthReport {
    pub fn new(geometry: Geometry, properties: PlotProperties, pixel_summary: PixelSummary) -> Self {
        let feature = Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: Some(properties.into_json()),
            foreign_members: None,
        };
        GrowthReport {
            kind: "FeatureCollection".to_string(),
            features: vec![feature],
            pixel_summary,
        }
    }

    /// Property of the plot feature
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.features.first().and_then(|f| f.property(name))
    }
}

/// Outcome of one growth analysis, handed over to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub analysis_date: NaiveDate,
    pub sensor: Sensor,
    pub tile_url: String,
    pub response_json: GrowthReport,
}
