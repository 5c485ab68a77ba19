use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use geo::{Contains, GeodesicArea, Intersects, Point, Polygon};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::collect::backend::ImageryBackend;
use crate::collect::global_variables::{
    CLOUD_COVER_PROPERTY, CONSTANT_BAND, INSTRUMENT_MODE_IW, INSTRUMENT_MODE_PROPERTY, MAX_PIXELS,
    NIR_BAND, POLARISATION_PROPERTY, RED_BAND, S1_COLLECTION, S2_COLLECTION, VH_BAND,
};
use crate::error::BackendError;
use crate::geo_core::{meters_per_degree_lon, ParcelGeometry, METERS_PER_DEGREE_LAT};
use crate::query::{CatalogScene, ImageExpr, SceneQuery, ValueExpr, Visualization};

/// Scale used to check a rendering before handing out its tile URL
const RENDER_SCALE_M: f64 = 10.0;

/// Per-pixel values of one band
#[derive(Debug, Clone, PartialEq)]
pub enum BandSource {
    /// Same value everywhere
    Constant(f64),
    /// Values repeated in pixel order; an empty pattern is fully masked
    Pattern(Vec<f64>),
}

impl BandSource {
    fn sample(&self, index: usize) -> Option<f64> {
        match self {
            BandSource::Constant(v) => Some(*v),
            BandSource::Pattern(values) if values.is_empty() => None,
            BandSource::Pattern(values) => Some(values[index % values.len()]),
        }
    }
}

/// One scene of the in-memory catalog
#[derive(Debug, Clone)]
pub struct SceneRecord {
    pub id: String,
    pub time_start: DateTime<Utc>,
    /// Scene extent; `None` covers the whole world
    pub footprint: Option<Polygon<f64>>,
    pub properties: Map<String, Value>,
    pub bands: BTreeMap<String, BandSource>,
}

impl SceneRecord {
    pub fn new(id: &str, time_start: DateTime<Utc>) -> Self {
        SceneRecord {
            id: id.to_string(),
            time_start,
            footprint: None,
            properties: Map::new(),
            bands: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_band(mut self, name: &str, source: BandSource) -> Self {
        self.bands.insert(name.to_string(), source);
        self
    }

    pub fn with_footprint(mut self, footprint: Polygon<f64>) -> Self {
        self.footprint = Some(footprint);
        self
    }

    /// Optical scene acquired mid-morning UTC on `date`
    pub fn sentinel2(id: &str, date: NaiveDate, cloud_cover: f64, nir: BandSource, red: BandSource) -> Self {
        SceneRecord::new(id, acquisition_time(date))
            .with_property(CLOUD_COVER_PROPERTY, cloud_cover)
            .with_band(NIR_BAND, nir)
            .with_band(RED_BAND, red)
    }

    /// IW dual-polarisation radar scene acquired on `date`
    pub fn sentinel1(id: &str, date: NaiveDate, vh: BandSource) -> Self {
        SceneRecord::new(id, acquisition_time(date))
            .with_property(INSTRUMENT_MODE_PROPERTY, INSTRUMENT_MODE_IW)
            .with_property(POLARISATION_PROPERTY, json!(["VV", "VH"]))
            .with_band("VV", BandSource::Constant(-8.0))
            .with_band(VH_BAND, vh)
    }
}

fn acquisition_time(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(10, 30, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

impl CatalogScene for SceneRecord {
    fn time_start_millis(&self) -> i64 {
        self.time_start.timestamp_millis()
    }

    fn intersects(&self, parcel: &ParcelGeometry) -> bool {
        match &self.footprint {
            Some(footprint) => footprint.intersects(parcel.shape()),
            None => true,
        }
    }

    fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

/// Imagery backend evaluating queries against scenes held in memory.
///
/// Rasters are sampled on a metre-scaled lon/lat grid over the region of
/// interest; a pixel belongs to a region when its centre does.
pub struct MemoryCatalog {
    collections: HashMap<String, Vec<SceneRecord>>,
    max_pixels: u64,
    requests: Cell<usize>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    pub fn new() -> Self {
        MemoryCatalog {
            collections: HashMap::new(),
            max_pixels: MAX_PIXELS,
            requests: Cell::new(0),
        }
    }

    /// Pixel budget of a single reduction; at least one pixel
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels.max(1);
        self
    }

    pub fn add_scene(&mut self, collection: &str, scene: SceneRecord) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(scene);
    }

    pub fn add_sentinel2(&mut self, scene: SceneRecord) {
        self.add_scene(S2_COLLECTION, scene);
    }

    pub fn add_sentinel1(&mut self, scene: SceneRecord) {
        self.add_scene(S1_COLLECTION, scene);
    }

    /// Requests served so far (materializations and renderings)
    pub fn requests(&self) -> usize {
        self.requests.get()
    }

    fn scenes(&self, collection: &str) -> &[SceneRecord] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn first_scene(&self, query: &SceneQuery) -> Result<&SceneRecord, BackendError> {
        query.first(self.scenes(&query.collection)).ok_or_else(|| {
            BackendError::Evaluation(format!(
                "collection {} is empty after filtering",
                query.collection
            ))
        })
    }

    fn masked_count(
        &self,
        mask: &ImageExpr,
        geometry: &ParcelGeometry,
        scale_m: f64,
        best_effort: bool,
    ) -> Result<Value, BackendError> {
        let mut scale = scale_m;
        let mut grid = PixelGrid::over(geometry, scale);
        while grid.len() as u64 > self.max_pixels {
            if !best_effort {
                return Err(BackendError::Evaluation(format!(
                    "too many pixels in the region ({} > {})",
                    grid.len(),
                    self.max_pixels
                )));
            }
            scale *= 2.0;
            grid = PixelGrid::over(geometry, scale);
        }
        if scale != scale_m {
            debug!(scale_m, coarsened_to = scale, "best-effort reduction");
        }

        let counted = ImageExpr::constant(1.0).update_mask(mask);
        let raster = self.evaluate(&counted, &grid)?;
        let count = (0..grid.len())
            .filter(|&i| raster.values[i].is_some())
            .filter(|&i| {
                let (lon, lat) = grid.center(i);
                geometry.contains(lon, lat)
            })
            .count();
        Ok(json!(count))
    }

    fn evaluate(&self, expr: &ImageExpr, grid: &PixelGrid) -> Result<Raster, BackendError> {
        match expr {
            ImageExpr::First { collection } => {
                let scene = self.first_scene(collection)?;
                let bands: Vec<String> = match &collection.bands {
                    Some(bands) => bands.clone(),
                    None => scene.bands.keys().cloned().collect(),
                };
                let sources = bands
                    .iter()
                    .map(|b| {
                        scene.bands.get(b).ok_or_else(|| {
                            BackendError::Evaluation(format!(
                                "band {} not found in scene {}",
                                b, scene.id
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let values = (0..grid.len())
                    .map(|i| {
                        if let Some(footprint) = &scene.footprint {
                            let (lon, lat) = grid.center(i);
                            if !footprint.contains(&Point::new(lon, lat)) {
                                return None;
                            }
                        }
                        sources.iter().map(|s| s.sample(i)).collect::<Option<Vec<f64>>>()
                    })
                    .collect();
                Ok(Raster { bands, values })
            }
            ImageExpr::Constant { value } => Ok(Raster {
                bands: vec![CONSTANT_BAND.to_string()],
                values: vec![Some(vec![*value]); grid.len()],
            }),
            ImageExpr::Select { input, bands } => {
                let raster = self.evaluate(input, grid)?;
                let indices = bands
                    .iter()
                    .map(|b| raster.band_index(b))
                    .collect::<Result<Vec<_>, _>>()?;
                let values = raster
                    .values
                    .into_iter()
                    .map(|px| px.map(|v| indices.iter().map(|&i| v[i]).collect()))
                    .collect();
                Ok(Raster {
                    bands: bands.clone(),
                    values,
                })
            }
            ImageExpr::NormalizedDifference { input, bands } => {
                let raster = self.evaluate(input, grid)?;
                let a = raster.band_index(&bands[0])?;
                let b = raster.band_index(&bands[1])?;
                let values = raster
                    .values
                    .into_iter()
                    .map(|px| {
                        px.and_then(|v| {
                            let sum = v[a] + v[b];
                            if sum == 0.0 {
                                None
                            } else {
                                Some(vec![(v[a] - v[b]) / sum])
                            }
                        })
                    })
                    .collect();
                Ok(Raster {
                    bands: vec!["nd".to_string()],
                    values,
                })
            }
            ImageExpr::Compare { input, cmp, value } => {
                let raster = self.evaluate(input, grid)?;
                Ok(raster.map_first(|v| Some(if cmp.apply(v, *value) { 1.0 } else { 0.0 })))
            }
            ImageExpr::And { left, right } => {
                let left = self.evaluate(left, grid)?;
                let right = self.evaluate(right, grid)?;
                let values = left
                    .values
                    .iter()
                    .zip(right.values.iter())
                    .map(|(l, r)| match (l, r) {
                        (Some(l), Some(r)) => {
                            Some(vec![if l[0] != 0.0 && r[0] != 0.0 { 1.0 } else { 0.0 }])
                        }
                        _ => None,
                    })
                    .collect();
                Ok(Raster {
                    bands: left.bands[..1].to_vec(),
                    values,
                })
            }
            ImageExpr::Where { input, test, value } => {
                let input = self.evaluate(input, grid)?;
                let test = self.evaluate(test, grid)?;
                let values = input
                    .values
                    .into_iter()
                    .zip(test.values)
                    .map(|(px, t)| match t {
                        Some(t) if t[0] != 0.0 => Some(vec![*value]),
                        _ => px.map(|v| vec![v[0]]),
                    })
                    .collect();
                Ok(Raster {
                    bands: input.bands[..1].to_vec(),
                    values,
                })
            }
            ImageExpr::Clip { input, geometry } => {
                let mut raster = self.evaluate(input, grid)?;
                for (i, px) in raster.values.iter_mut().enumerate() {
                    let (lon, lat) = grid.center(i);
                    if !geometry.contains(lon, lat) {
                        *px = None;
                    }
                }
                Ok(raster)
            }
            ImageExpr::FocalMean { input, radius_m } => {
                let raster = self.evaluate(input, grid)?;
                Ok(focal_mean(&raster, grid, *radius_m))
            }
            ImageExpr::UpdateMask { input, mask } => {
                let mut raster = self.evaluate(input, grid)?;
                let mask = self.evaluate(mask, grid)?;
                for (px, m) in raster.values.iter_mut().zip(mask.values) {
                    let keep = matches!(m, Some(m) if m[0] != 0.0);
                    if !keep {
                        *px = None;
                    }
                }
                Ok(raster)
            }
        }
    }
}

impl ImageryBackend for MemoryCatalog {
    fn compute(&self, expr: &ValueExpr) -> Result<Value, BackendError> {
        self.requests.set(self.requests.get() + 1);
        match expr {
            ValueExpr::Area { geometry, .. } => Ok(json!(geometry.shape().geodesic_area_unsigned())),
            ValueExpr::Size { collection } => {
                Ok(json!(collection.rank(self.scenes(&collection.collection)).len()))
            }
            ValueExpr::TimeStart { collection } => {
                let scene = self.first_scene(collection)?;
                Ok(json!(scene.time_start_millis()))
            }
            ValueExpr::MaskedCount {
                mask,
                geometry,
                scale_m,
                best_effort,
            } => self.masked_count(mask, geometry, *scale_m, *best_effort),
        }
    }

    fn tile_url(&self, visualization: &Visualization) -> Result<String, BackendError> {
        self.requests.set(self.requests.get() + 1);
        if visualization.palette.is_empty() || visualization.max <= visualization.min {
            return Err(BackendError::Evaluation(
                "invalid visualization parameters".to_string(),
            ));
        }

        match clip_geometry(&visualization.image) {
            Some(geometry) => {
                let grid = PixelGrid::over(geometry, RENDER_SCALE_M);
                self.evaluate(&visualization.image, &grid)?;
            }
            None => {
                let mut queries = Vec::new();
                scene_queries(&visualization.image, &mut queries);
                for query in queries {
                    self.first_scene(query)?;
                }
            }
        }

        let body = serde_json::to_string(visualization)
            .map_err(|e| BackendError::Evaluation(e.to_string()))?;
        let mut hasher = DefaultHasher::new();
        body.hash(&mut hasher);
        Ok(format!(
            "memory://maps/{:016x}/tiles/{{z}}/{{x}}/{{y}}",
            hasher.finish()
        ))
    }
}

fn clip_geometry(expr: &ImageExpr) -> Option<&ParcelGeometry> {
    match expr {
        ImageExpr::Clip { geometry, .. } => Some(geometry),
        ImageExpr::First { .. } | ImageExpr::Constant { .. } => None,
        ImageExpr::Select { input, .. }
        | ImageExpr::NormalizedDifference { input, .. }
        | ImageExpr::Compare { input, .. }
        | ImageExpr::FocalMean { input, .. } => clip_geometry(input),
        ImageExpr::And { left, right } => clip_geometry(left).or_else(|| clip_geometry(right)),
        ImageExpr::Where { input, test, .. } | ImageExpr::UpdateMask { input, mask: test } => {
            clip_geometry(input).or_else(|| clip_geometry(test))
        }
    }
}

fn scene_queries<'a>(expr: &'a ImageExpr, out: &mut Vec<&'a SceneQuery>) {
    match expr {
        ImageExpr::First { collection } => out.push(collection),
        ImageExpr::Constant { .. } => {}
        ImageExpr::Select { input, .. }
        | ImageExpr::NormalizedDifference { input, .. }
        | ImageExpr::Compare { input, .. }
        | ImageExpr::Clip { input, .. }
        | ImageExpr::FocalMean { input, .. } => scene_queries(input, out),
        ImageExpr::And { left, right } => {
            scene_queries(left, out);
            scene_queries(right, out);
        }
        ImageExpr::Where { input, test, .. } | ImageExpr::UpdateMask { input, mask: test } => {
            scene_queries(input, out);
            scene_queries(test, out);
        }
    }
}

/// Row-major lon/lat grid with square cells of `scale_m` metres
#[derive(Debug, Clone)]
struct PixelGrid {
    origin_x: f64,
    origin_y: f64,
    step_x: f64,
    step_y: f64,
    cols: usize,
    rows: usize,
    scale_m: f64,
}

impl PixelGrid {
    fn over(region: &ParcelGeometry, scale_m: f64) -> Self {
        let bbox = region.bbox();
        let lat_center = bbox.center().y;
        let (width_m, height_m) = bbox.size_m();
        let cells = |extent_m: f64| ((extent_m / scale_m) - 1e-9).ceil().max(1.0) as usize;
        PixelGrid {
            origin_x: bbox.min_x,
            origin_y: bbox.max_y,
            step_x: scale_m / meters_per_degree_lon(lat_center),
            step_y: scale_m / METERS_PER_DEGREE_LAT,
            cols: cells(width_m),
            rows: cells(height_m),
            scale_m,
        }
    }

    fn len(&self) -> usize {
        self.cols * self.rows
    }

    fn center(&self, index: usize) -> (f64, f64) {
        let col = index % self.cols;
        let row = index / self.cols;
        (
            self.origin_x + (col as f64 + 0.5) * self.step_x,
            self.origin_y - (row as f64 + 0.5) * self.step_y,
        )
    }
}

/// Evaluated raster: one optional value vector per grid cell
#[derive(Debug, Clone)]
struct Raster {
    bands: Vec<String>,
    values: Vec<Option<Vec<f64>>>,
}

impl Raster {
    fn band_index(&self, band: &str) -> Result<usize, BackendError> {
        self.bands.iter().position(|b| b == band).ok_or_else(|| {
            BackendError::Evaluation(format!(
                "band {} not found, available: {:?}",
                band, self.bands
            ))
        })
    }

    fn map_first(self, f: impl Fn(f64) -> Option<f64>) -> Raster {
        let values = self
            .values
            .into_iter()
            .map(|px| px.and_then(|v| f(v[0]).map(|out| vec![out])))
            .collect();
        Raster {
            bands: self.bands[..1].to_vec(),
            values,
        }
    }
}

fn focal_mean(raster: &Raster, grid: &PixelGrid, radius_m: f64) -> Raster {
    let radius_px = (radius_m / grid.scale_m).max(0.0);
    let reach = radius_px.floor() as isize;
    let band_count = raster.bands.len();

    let values = (0..grid.len())
        .map(|i| {
            let col = (i % grid.cols) as isize;
            let row = (i / grid.cols) as isize;
            let mut sums = vec![0.0; band_count];
            let mut n = 0usize;
            for dr in -reach..=reach {
                for dc in -reach..=reach {
                    if ((dr * dr + dc * dc) as f64) > radius_px * radius_px {
                        continue;
                    }
                    let (r, c) = (row + dr, col + dc);
                    if r < 0 || c < 0 || r >= grid.rows as isize || c >= grid.cols as isize {
                        continue;
                    }
                    if let Some(v) = &raster.values[r as usize * grid.cols + c as usize] {
                        for (sum, x) in sums.iter_mut().zip(v) {
                            *sum += x;
                        }
                        n += 1;
                    }
                }
            }
            if n == 0 {
                None
            } else {
                Some(sums.into_iter().map(|s| s / n as f64).collect())
            }
        })
        .collect();

    Raster {
        bands: raster.bands.clone(),
        values,
    }
}
