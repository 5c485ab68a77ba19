use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

use crate::collect::global_variables::TIME_START;
use crate::geo_core::{AnalysisWindow, ParcelGeometry};

/// Attribute filter applied to scene metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyFilter {
    /// Numeric property strictly below `value`
    LessThan { property: String, value: f64 },
    /// Property equal to `value`
    Equals { property: String, value: Value },
    /// List property containing `value`
    ListContains { property: String, value: Value },
}

impl PropertyFilter {
    pub fn less_than(property: &str, value: f64) -> Self {
        PropertyFilter::LessThan {
            property: property.to_string(),
            value,
        }
    }

    pub fn equals(property: &str, value: impl Into<Value>) -> Self {
        PropertyFilter::Equals {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub fn list_contains(property: &str, value: impl Into<Value>) -> Self {
        PropertyFilter::ListContains {
            property: property.to_string(),
            value: value.into(),
        }
    }

    pub fn property(&self) -> &str {
        match self {
            PropertyFilter::LessThan { property, .. }
            | PropertyFilter::Equals { property, .. }
            | PropertyFilter::ListContains { property, .. } => property,
        }
    }

    /// Scenes lacking the property never match
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            PropertyFilter::LessThan { value, .. } => {
                actual.as_f64().map(|v| v < *value).unwrap_or(false)
            }
            PropertyFilter::Equals { value, .. } => actual == value,
            PropertyFilter::ListContains { value, .. } => actual
                .as_array()
                .map(|items| items.contains(value))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortKey {
    pub property: String,
    pub ascending: bool,
}

/// Capabilities a catalog entry needs so a [`SceneQuery`] can rank it
pub trait CatalogScene {
    /// Acquisition start, epoch milliseconds
    fn time_start_millis(&self) -> i64;
    fn intersects(&self, parcel: &ParcelGeometry) -> bool;
    fn property(&self, name: &str) -> Option<&Value>;
}

/// Lazy description of "filter a scene catalog, then rank it".
///
/// Nothing is evaluated while the query is built; a backend resolves it when
/// a value depending on it is materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneQuery {
    pub collection: String,
    pub bounds: Option<ParcelGeometry>,
    pub window: Option<AnalysisWindow>,
    pub filters: Vec<PropertyFilter>,
    pub bands: Option<Vec<String>>,
    pub sort: Option<SortKey>,
}

impl SceneQuery {
    pub fn catalog(collection: &str) -> Self {
        SceneQuery {
            collection: collection.to_string(),
            bounds: None,
            window: None,
            filters: Vec::new(),
            bands: None,
            sort: None,
        }
    }

    pub fn filter_bounds(mut self, parcel: &ParcelGeometry) -> Self {
        self.bounds = Some(parcel.clone());
        self
    }

    pub fn filter_date(mut self, window: AnalysisWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn filter(mut self, filter: PropertyFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn select(mut self, bands: &[&str]) -> Self {
        self.bands = Some(bands.iter().map(|b| b.to_string()).collect());
        self
    }

    pub fn sort(mut self, property: &str, ascending: bool) -> Self {
        self.sort = Some(SortKey {
            property: property.to_string(),
            ascending,
        });
        self
    }

    /// Most recent first
    pub fn latest_first(self) -> Self {
        self.sort(TIME_START, false)
    }

    /// Whether a single scene survives every filter of the query
    pub fn accepts<S: CatalogScene>(&self, scene: &S) -> bool {
        if let Some(parcel) = &self.bounds {
            if !scene.intersects(parcel) {
                return false;
            }
        }
        if let Some(window) = &self.window {
            let t = scene.time_start_millis();
            if t < window.start_millis() || t >= window.end_millis() {
                return false;
            }
        }
        self.filters
            .iter()
            .all(|f| f.matches(scene.property(f.property())))
    }

    /// Apply filters then the sort key; ties keep catalog order
    pub fn rank<'a, S: CatalogScene>(&self, scenes: &'a [S]) -> Vec<&'a S> {
        let mut ranked: Vec<&S> = scenes.iter().filter(|s| self.accepts(*s)).collect();
        if let Some(key) = &self.sort {
            ranked.sort_by(|a, b| {
                let ord = compare_optional(sort_value(*a, key), sort_value(*b, key));
                if key.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        ranked
    }

    /// First scene of the ranked collection
    pub fn first<'a, S: CatalogScene>(&self, scenes: &'a [S]) -> Option<&'a S> {
        self.rank(scenes).into_iter().next()
    }
}

fn sort_value<S: CatalogScene>(scene: &S, key: &SortKey) -> Option<f64> {
    if key.property == TIME_START {
        return Some(scene.time_start_millis() as f64);
    }
    scene.property(&key.property).and_then(Value::as_f64)
}

// Missing sort values rank below any present value
fn compare_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FakeScene {
        t: i64,
        inside: bool,
        props: serde_json::Map<String, Value>,
    }

    impl CatalogScene for FakeScene {
        fn time_start_millis(&self) -> i64 {
            self.t
        }
        fn intersects(&self, _parcel: &ParcelGeometry) -> bool {
            self.inside
        }
        fn property(&self, name: &str) -> Option<&Value> {
            self.props.get(name)
        }
    }

    fn scene(t: i64, inside: bool, cloud: f64) -> FakeScene {
        let mut props = serde_json::Map::new();
        props.insert("CLOUDY_PIXEL_PERCENTAGE".to_string(), json!(cloud));
        FakeScene { t, inside, props }
    }

    fn june() -> AnalysisWindow {
        AnalysisWindow::parse("2024-06-01", "2024-06-30").unwrap()
    }

    const DAY: i64 = 86_400_000;

    #[test]
    fn test_latest_surviving_scene_wins() {
        let parcel = ParcelGeometry::rectangle(0.0, 0.0, 1.0, 1.0).unwrap();
        let start = june().start_millis();
        let scenes = vec![
            scene(start + DAY, true, 5.0),
            scene(start + 10 * DAY, true, 80.0), // too cloudy
            scene(start + 5 * DAY, true, 20.0),
            scene(start + 12 * DAY, false, 0.0), // elsewhere
            scene(start + 40 * DAY, true, 0.0),  // after window
        ];
        let query = SceneQuery::catalog("S2")
            .filter_bounds(&parcel)
            .filter_date(june())
            .filter(PropertyFilter::less_than("CLOUDY_PIXEL_PERCENTAGE", 60.0))
            .latest_first();

        let ranked = query.rank(&scenes);
        assert_eq!(ranked.len(), 2);
        assert_eq!(query.first(&scenes).unwrap().t, start + 5 * DAY);
    }

    #[test]
    fn test_window_end_is_exclusive() {
        let window = june();
        let scenes = vec![scene(window.end_millis(), true, 0.0)];
        let query = SceneQuery::catalog("S2").filter_date(window).latest_first();
        assert!(query.first(&scenes).is_none());
    }

    #[test]
    fn test_cloud_threshold_is_strict() {
        let filter = PropertyFilter::less_than("CLOUDY_PIXEL_PERCENTAGE", 60.0);
        assert!(filter.matches(Some(&json!(59.99))));
        assert!(!filter.matches(Some(&json!(60.0))));
        assert!(!filter.matches(None));
    }

    #[test]
    fn test_list_contains_and_equals() {
        let pol = PropertyFilter::list_contains("transmitterReceiverPolarisation", "VH");
        assert!(pol.matches(Some(&json!(["VV", "VH"]))));
        assert!(!pol.matches(Some(&json!(["HH"]))));
        assert!(!pol.matches(Some(&json!("VH"))));

        let mode = PropertyFilter::equals("instrumentMode", "IW");
        assert!(mode.matches(Some(&json!("IW"))));
        assert!(!mode.matches(Some(&json!("EW"))));
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let scenes = vec![scene(10, true, 1.0), scene(10, true, 2.0)];
        let query = SceneQuery::catalog("S2").latest_first();
        let first = query.first(&scenes).unwrap();
        assert_eq!(first.props["CLOUDY_PIXEL_PERCENTAGE"], json!(1.0));
    }
}
