use serde::Serialize;

use crate::geo_core::ParcelGeometry;
use crate::query::scene::SceneQuery;

/// Pixel-wise comparison against a scalar threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
        }
    }
}

/// Raster expression evaluated lazily by an imagery backend.
///
/// Masked pixels propagate through every operation except `Where`, which
/// keeps its input where the test is masked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ImageExpr {
    /// First scene of a ranked collection
    First { collection: SceneQuery },
    /// Single band named `constant`
    Constant { value: f64 },
    Select {
        input: Box<ImageExpr>,
        bands: Vec<String>,
    },
    /// (a - b) / (a + b)
    NormalizedDifference {
        input: Box<ImageExpr>,
        bands: [String; 2],
    },
    /// 1 where `input cmp value`, else 0
    Compare {
        input: Box<ImageExpr>,
        cmp: CompareOp,
        value: f64,
    },
    And {
        left: Box<ImageExpr>,
        right: Box<ImageExpr>,
    },
    /// Replace `input` by `value` where `test` is non-zero
    Where {
        input: Box<ImageExpr>,
        test: Box<ImageExpr>,
        value: f64,
    },
    Clip {
        input: Box<ImageExpr>,
        geometry: ParcelGeometry,
    },
    /// Circular mean filter, radius in metres
    FocalMean {
        input: Box<ImageExpr>,
        radius_m: f64,
    },
    /// Mask `input` wherever `mask` is zero or masked
    UpdateMask {
        input: Box<ImageExpr>,
        mask: Box<ImageExpr>,
    },
}

impl ImageExpr {
    pub fn first(collection: SceneQuery) -> Self {
        ImageExpr::First { collection }
    }

    pub fn constant(value: f64) -> Self {
        ImageExpr::Constant { value }
    }

    pub fn select(self, bands: &[&str]) -> Self {
        ImageExpr::Select {
            input: Box::new(self),
            bands: bands.iter().map(|b| b.to_string()).collect(),
        }
    }

    pub fn normalized_difference(self, band_a: &str, band_b: &str) -> Self {
        ImageExpr::NormalizedDifference {
            input: Box::new(self),
            bands: [band_a.to_string(), band_b.to_string()],
        }
    }

    pub fn compare(&self, cmp: CompareOp, value: f64) -> Self {
        ImageExpr::Compare {
            input: Box::new(self.clone()),
            cmp,
            value,
        }
    }

    pub fn gt(&self, value: f64) -> Self {
        self.compare(CompareOp::Gt, value)
    }

    pub fn gte(&self, value: f64) -> Self {
        self.compare(CompareOp::Gte, value)
    }

    pub fn lt(&self, value: f64) -> Self {
        self.compare(CompareOp::Lt, value)
    }

    pub fn lte(&self, value: f64) -> Self {
        self.compare(CompareOp::Lte, value)
    }

    pub fn and(self, other: ImageExpr) -> Self {
        ImageExpr::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    pub fn where_(self, test: &ImageExpr, value: f64) -> Self {
        ImageExpr::Where {
            input: Box::new(self),
            test: Box::new(test.clone()),
            value,
        }
    }

    pub fn clip(self, geometry: &ParcelGeometry) -> Self {
        ImageExpr::Clip {
            input: Box::new(self),
            geometry: geometry.clone(),
        }
    }

    pub fn focal_mean(self, radius_m: f64) -> Self {
        ImageExpr::FocalMean {
            input: Box::new(self),
            radius_m,
        }
    }

    pub fn update_mask(self, mask: &ImageExpr) -> Self {
        ImageExpr::UpdateMask {
            input: Box::new(self),
            mask: Box::new(mask.clone()),
        }
    }
}

/// Scalar read from the backend; each one is a round-trip
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ValueExpr {
    /// Geodesic area in square metres
    Area {
        geometry: ParcelGeometry,
        max_error_m: Option<f64>,
    },
    /// Number of scenes surviving the query filters
    Size { collection: SceneQuery },
    /// `system:time_start` of the first ranked scene
    TimeStart { collection: SceneQuery },
    /// Unmasked pixels of `constant(1).updateMask(mask)` inside `geometry`
    MaskedCount {
        mask: ImageExpr,
        geometry: ParcelGeometry,
        scale_m: f64,
        best_effort: bool,
    },
}

/// Rendering request for the backend's map endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visualization {
    pub image: ImageExpr,
    pub min: f64,
    pub max: f64,
    pub palette: Vec<String>,
}
