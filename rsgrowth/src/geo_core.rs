use chrono::NaiveDate;
use geo::{BoundingRect, Contains, Coord, Geometry as GeoGeometry, MultiPolygon, Point};
use geojson::{Geometry, Value};
use serde::{Serialize, Serializer};

use crate::error::AnalysisError;

/// Metres per degree of latitude (spherical approximation)
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Metres per degree of longitude at the given latitude
pub fn meters_per_degree_lon(lat: f64) -> f64 {
    40_075_000.0 * lat.to_radians().cos() / 360.0
}

/// Parcel boundary, validated once and shared read-only.
///
/// Keeps the caller's GeoJSON geometry untouched (it is echoed back in the
/// result) next to a `geo` multipolygon used for local spatial predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelGeometry {
    geojson: Geometry,
    shape: MultiPolygon<f64>,
}

impl ParcelGeometry {
    /// Validate a GeoJSON geometry: only Polygon and MultiPolygon with at least
    /// one non-degenerate ring are accepted
    pub fn from_geojson(geometry: Geometry) -> Result<Self, AnalysisError> {
        // geo closes open rings on conversion, so check the positions as given
        match &geometry.value {
            Value::Polygon(rings) => check_polygon(rings)?,
            Value::MultiPolygon(polygons) => {
                for rings in polygons {
                    check_polygon(rings)?;
                }
            }
            _ => {}
        }

        let converted = GeoGeometry::<f64>::try_from(geometry.clone())
            .map_err(|e| AnalysisError::Input(format!("malformed geometry: {}", e)))?;

        let shape = match converted {
            GeoGeometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            GeoGeometry::MultiPolygon(multi) => multi,
            other => {
                return Err(AnalysisError::Input(format!(
                    "expected Polygon or MultiPolygon, got {}",
                    geometry_kind(&other)
                )))
            }
        };

        if shape.0.is_empty() {
            return Err(AnalysisError::Input("multipolygon has no polygons".to_string()));
        }

        Ok(ParcelGeometry {
            geojson: geometry,
            shape,
        })
    }

    /// Axis-aligned rectangle in lon/lat, handy for tests and fixtures
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, AnalysisError> {
        let ring = vec![
            vec![min_x, min_y],
            vec![max_x, min_y],
            vec![max_x, max_y],
            vec![min_x, max_y],
            vec![min_x, min_y],
        ];
        Self::from_geojson(Geometry::new(Value::Polygon(vec![ring])))
    }

    pub fn as_geojson(&self) -> &Geometry {
        &self.geojson
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn bbox(&self) -> BoundingBox {
        // Validated shapes always have at least one ring
        match self.shape.bounding_rect() {
            Some(rect) => BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y),
            None => BoundingBox::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    /// True when the point (lon, lat) is strictly inside the parcel
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.shape.contains(&Point::new(lon, lat))
    }
}

impl Serialize for ParcelGeometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.geojson.serialize(serializer)
    }
}

/// Every ring of a polygon needs 4 or more positions and must end where it starts
fn check_polygon(rings: &[Vec<Vec<f64>>]) -> Result<(), AnalysisError> {
    if rings.is_empty() {
        return Err(AnalysisError::Input("polygon has no exterior ring".to_string()));
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(AnalysisError::Input(
                "polygon ring needs at least 4 positions".to_string(),
            ));
        }
        if ring.first() != ring.last() {
            return Err(AnalysisError::Input("polygon ring is not closed".to_string()));
        }
    }
    Ok(())
}

fn geometry_kind(geometry: &GeoGeometry<f64>) -> &'static str {
    match geometry {
        GeoGeometry::Point(_) => "Point",
        GeoGeometry::Line(_) => "Line",
        GeoGeometry::LineString(_) => "LineString",
        GeoGeometry::Polygon(_) => "Polygon",
        GeoGeometry::MultiPoint(_) => "MultiPoint",
        GeoGeometry::MultiLineString(_) => "MultiLineString",
        GeoGeometry::MultiPolygon(_) => "MultiPolygon",
        GeoGeometry::GeometryCollection(_) => "GeometryCollection",
        GeoGeometry::Rect(_) => "Rect",
        GeoGeometry::Triangle(_) => "Triangle",
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn center(&self) -> Coord<f64> {
        Coord {
            x: (self.min_x + self.max_x) / 2.0,
            y: (self.min_y + self.max_y) / 2.0,
        }
    }

    /// Approximate width and height in metres (deg → m at the centre latitude)
    pub fn size_m(&self) -> (f64, f64) {
        let lat_center = self.center().y;
        let width_m = (self.max_x - self.min_x) * meters_per_degree_lon(lat_center);
        let height_m = (self.max_y - self.min_y) * METERS_PER_DEGREE_LAT;
        (width_m, height_m)
    }
}

/// Calendar date interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AnalysisError> {
        if start > end {
            return Err(AnalysisError::Input(format!(
                "analysis window start {} is after end {}",
                start, end
            )));
        }
        Ok(AnalysisWindow { start, end })
    }

    /// Parse two ISO `YYYY-MM-DD` dates
    pub fn parse(start: &str, end: &str) -> Result<Self, AnalysisError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| AnalysisError::Input(format!("invalid date {:?}: {}", s, e)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Window start as epoch milliseconds (UTC midnight)
    pub fn start_millis(&self) -> i64 {
        date_millis(self.start)
    }

    /// Window end as epoch milliseconds (UTC midnight, exclusive)
    pub fn end_millis(&self) -> i64 {
        date_millis(self.end)
    }
}

fn date_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<ParcelGeometry, AnalysisError> {
        ParcelGeometry::from_geojson(Geometry::from_json_value(value).unwrap())
    }

    #[test]
    fn test_rectangle_parcel() {
        let parcel = ParcelGeometry::rectangle(2.0, 48.0, 2.01, 48.01).unwrap();
        let bbox = parcel.bbox();
        assert_eq!(bbox.min_x, 2.0);
        assert_eq!(bbox.max_y, 48.01);
        assert!(parcel.contains(2.005, 48.005));
        assert!(!parcel.contains(2.02, 48.005));
    }

    #[test]
    fn test_multipolygon_accepted() {
        let value = json!({
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 2.0]]]
            ]
        });
        let parcel = parse(value).unwrap();
        assert_eq!(parcel.shape().0.len(), 2);
    }

    #[test]
    fn test_short_or_open_rings_rejected() {
        let triangle = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]
        });
        assert!(matches!(parse(triangle), Err(AnalysisError::Input(_))));

        let open = json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]
        });
        assert!(matches!(parse(open), Err(AnalysisError::Input(_))));

        let open_hole = json!({
            "type": "MultiPolygon",
            "coordinates": [[
                [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
                [[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0]]
            ]]
        });
        assert!(matches!(parse(open_hole), Err(AnalysisError::Input(_))));
    }

    #[test]
    fn test_point_rejected() {
        let value = json!({ "type": "Point", "coordinates": [1.0, 2.0] });
        let err = parse(value).unwrap_err();
        assert!(matches!(err, AnalysisError::Input(_)));
    }

    #[test]
    fn test_geometry_echo_serialization() {
        let parcel = ParcelGeometry::rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        let value = serde_json::to_value(&parcel).unwrap();
        assert_eq!(value["type"], "Polygon");
        assert_eq!(value["coordinates"][0][2], json!([1.0, 1.0]));
    }

    #[test]
    fn test_bbox_size_m() {
        let bbox = BoundingBox::new(0.0, 0.0, 0.001, 0.001);
        let (w, h) = bbox.size_m();
        assert!((w - 111.3).abs() < 0.5);
        assert!((h - 111.32).abs() < 1e-6);
    }

    #[test]
    fn test_window_parse() {
        let window = AnalysisWindow::parse("2024-06-01", "2024-06-30").unwrap();
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(window.start_millis() < window.end_millis());
        assert_eq!(window.start_millis(), 1_717_200_000_000);
    }

    #[test]
    fn test_window_rejects_reversed_and_garbage() {
        assert!(matches!(
            AnalysisWindow::parse("2024-06-30", "2024-06-01"),
            Err(AnalysisError::Input(_))
        ));
        assert!(matches!(
            AnalysisWindow::parse("June 1st", "2024-06-01"),
            Err(AnalysisError::Input(_))
        ));
        assert!(AnalysisWindow::parse("2024-06-01", "2024-06-01").is_ok());
    }
}
