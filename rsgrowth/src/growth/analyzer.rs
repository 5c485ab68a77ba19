use chrono::Utc;
use geojson::Geometry;
use serde::Deserialize;
use tracing::{debug, info};

use crate::collect::backend::{Evaluation, ImageryBackend};
use crate::collect::global_variables::SQUARE_METERS_PER_HECTARE;
use crate::commons::basic_functions::utc_timestamp_iso;
use crate::error::{AnalysisError, BackendError, Result};
use crate::geo_core::{AnalysisWindow, ParcelGeometry};
use crate::growth::classification::{ClassMasks, ConditionClass};
use crate::growth::selection::{select_sensor, SceneCandidate, Sensor};
use crate::growth::summary::{
    AnalysisResult, ClassCounts, GrowthReport, PixelSummary, PlotProperties,
};
use crate::growth::visualization::growth_overlay;
use crate::query::ValueExpr;

/// Tunables of a growth analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Optical scenes at or above this cloud percentage are discarded
    pub max_cloud_cover: f64,
    /// Reduction scale of the pixel counts, metres
    pub scale_m: f64,
    /// Radius of the overlay mean filter, metres
    pub smoothing_radius_m: f64,
    /// Let the backend coarsen the scale of oversized reductions
    pub best_effort: bool,
    /// Area error margin in metres; `None` keeps the backend default
    pub area_max_error_m: Option<f64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            max_cloud_cover: 60.0,
            scale_m: 10.0,
            smoothing_radius_m: 10.0,
            best_effort: true,
            area_max_error_m: None,
        }
    }
}

/// Plot as handed over by the registry.
///
/// Deserializes from `{geometry, properties: {plot_name}}`; a flat
/// `plot_name` next to the geometry is accepted as well.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "PlotInputRepr")]
pub struct PlotInput {
    pub geometry: Option<Geometry>,
    pub plot_name: Option<String>,
}

#[derive(Deserialize)]
struct PlotInputRepr {
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    plot_name: Option<String>,
    #[serde(default)]
    properties: Option<PlotInputProperties>,
}

#[derive(Deserialize)]
struct PlotInputProperties {
    #[serde(default)]
    plot_name: Option<String>,
}

impl From<PlotInputRepr> for PlotInput {
    fn from(repr: PlotInputRepr) -> Self {
        let nested = repr.properties.and_then(|p| p.plot_name);
        PlotInput {
            geometry: repr.geometry,
            plot_name: nested.or(repr.plot_name),
        }
    }
}

impl PlotInput {
    pub fn new(geometry: Geometry, plot_name: Option<&str>) -> Self {
        PlotInput {
            geometry: Some(geometry),
            plot_name: plot_name.map(str::to_string),
        }
    }
}

/// Growth analyzer bound to an imagery backend.
///
/// Holds no state between calls: every `analyze` opens its own evaluation
/// session, so values fetched for one plot are never reused for another.
pub struct GrowthAnalyzer<'a, B: ImageryBackend + ?Sized> {
    backend: &'a B,
    options: AnalysisOptions,
}

impl<'a, B: ImageryBackend + ?Sized> GrowthAnalyzer<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self::with_options(backend, AnalysisOptions::default())
    }

    pub fn with_options(backend: &'a B, options: AnalysisOptions) -> Self {
        GrowthAnalyzer { backend, options }
    }

    /// Analyse one plot over `[start_date, end_date)` (ISO `YYYY-MM-DD`)
    pub fn analyze(&self, plot: &PlotInput, start_date: &str, end_date: &str) -> Result<AnalysisResult> {
        let geometry = plot
            .geometry
            .clone()
            .ok_or_else(|| AnalysisError::Input("plot is missing a geometry".to_string()))?;
        let parcel = ParcelGeometry::from_geojson(geometry)?;
        let window = AnalysisWindow::parse(start_date, end_date)?;
        self.analyze_parcel(&parcel, window, plot.plot_name.as_deref())
    }

    /// Analyse an already validated parcel
    pub fn analyze_parcel(
        &self,
        parcel: &ParcelGeometry,
        window: AnalysisWindow,
        plot_name: Option<&str>,
    ) -> Result<AnalysisResult> {
        let session = Evaluation::new(self.backend);

        let area_m2 = session
            .number(&ValueExpr::Area {
                geometry: parcel.clone(),
                max_error_m: self.options.area_max_error_m,
            })?
            .ok_or_else(|| BackendError::Decode("parcel area is null".to_string()))?;
        let area_hectares = area_m2 / SQUARE_METERS_PER_HECTARE;
        debug!(area_hectares, "parcel area");

        let optical = self.latest_scene(&session, Sensor::Sentinel2, parcel, window)?;
        let radar = self.latest_scene(&session, Sensor::Sentinel1, parcel, window)?;
        let chosen = select_sensor(optical, radar).ok_or(AnalysisError::NoImagery {
            start: window.start,
            end: window.end,
        })?;
        let sensor = chosen.sensor;
        let latest_image_date = chosen.date().ok_or_else(|| {
            BackendError::Decode(format!("scene timestamp {} out of range", chosen.time_start))
        })?;
        info!(sensor = %sensor, date = %latest_image_date, "selected scene");

        let candidates = sensor.candidates(parcel, window, self.options.max_cloud_cover);
        let signal = sensor.signal(&candidates, parcel);
        let masks = ClassMasks::new(sensor, &signal);

        let overlay = growth_overlay(&masks, parcel, self.options.smoothing_radius_m);
        let tile_url = session.tile_url(&overlay)?;

        let mut counts = ClassCounts::default();
        for class in [
            ConditionClass::Healthy,
            ConditionClass::Moderate,
            ConditionClass::Weak,
            ConditionClass::Stress,
        ] {
            let count = session
                .count(&ValueExpr::MaskedCount {
                    mask: masks.get(class).clone(),
                    geometry: parcel.clone(),
                    scale_m: self.options.scale_m,
                    best_effort: self.options.best_effort,
                })?
                .unwrap_or(0);
            counts.set(class, count);
        }
        debug!(?counts, round_trips = session.round_trips(), "pixel counts");

        let pixel_summary = PixelSummary::from_counts(counts, window, latest_image_date);
        let properties = PlotProperties {
            plot_name: plot_name.map(str::to_string),
            area_hectares,
            sensor,
            latest_image_date,
            last_updated: utc_timestamp_iso(Utc::now()),
        };

        Ok(AnalysisResult {
            analysis_date: latest_image_date,
            sensor,
            tile_url,
            response_json: GrowthReport::new(
                parcel.as_geojson().clone(),
                properties,
                pixel_summary,
            ),
        })
    }

    /// Most recent usable scene of `sensor`, if any
    fn latest_scene(
        &self,
        session: &Evaluation<'_, B>,
        sensor: Sensor,
        parcel: &ParcelGeometry,
        window: AnalysisWindow,
    ) -> Result<Option<SceneCandidate>> {
        let candidates = sensor.candidates(parcel, window, self.options.max_cloud_cover);
        let size = session
            .count(&ValueExpr::Size {
                collection: candidates.clone(),
            })?
            .unwrap_or(0);
        debug!(sensor = %sensor, scenes = size, "candidate scenes");
        if size == 0 {
            return Ok(None);
        }

        let time_start = session
            .number(&ValueExpr::TimeStart {
                collection: candidates,
            })?
            .ok_or_else(|| BackendError::Decode(format!("{} scene has no time_start", sensor)))?;
        Ok(Some(SceneCandidate::new(sensor, time_start as i64)))
    }
}
