use std::ops::Bound::{self, Excluded, Included, Unbounded};
use std::ops::RangeBounds;

use serde::Serialize;

use crate::growth::selection::Sensor;
use crate::query::ImageExpr;

/// Per-pixel vegetation condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionClass {
    Weak,
    Stress,
    Moderate,
    Healthy,
}

impl ConditionClass {
    /// Painting order of the overlay; later classes win
    pub const ALL: [ConditionClass; 4] = [
        ConditionClass::Weak,
        ConditionClass::Stress,
        ConditionClass::Moderate,
        ConditionClass::Healthy,
    ];

    /// Value of the class in the categorical overlay (0 is background)
    pub fn code(&self) -> u8 {
        match self {
            ConditionClass::Weak => 1,
            ConditionClass::Stress => 2,
            ConditionClass::Moderate => 3,
            ConditionClass::Healthy => 4,
        }
    }
}

/// Signal interval mapped to one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassRule {
    pub class: ConditionClass,
    pub lower: Bound<f64>,
    pub upper: Bound<f64>,
}

impl ClassRule {
    const fn new(class: ConditionClass, lower: Bound<f64>, upper: Bound<f64>) -> Self {
        ClassRule {
            class,
            lower,
            upper,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower, self.upper).contains(&value)
    }

    /// 1 where the signal falls in the interval, 0 elsewhere
    pub fn mask(&self, signal: &ImageExpr) -> ImageExpr {
        let lower = match self.lower {
            Bound::Included(v) => Some(signal.gte(v)),
            Bound::Excluded(v) => Some(signal.gt(v)),
            Bound::Unbounded => None,
        };
        let upper = match self.upper {
            Bound::Included(v) => Some(signal.lte(v)),
            Bound::Excluded(v) => Some(signal.lt(v)),
            Bound::Unbounded => None,
        };
        match (lower, upper) {
            (Some(lower), Some(upper)) => lower.and(upper),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => signal.gte(f64::MIN),
        }
    }
}

/// NDVI intervals, lower-inclusive; negative NDVI stays unclassified
const OPTICAL_RULES: [ClassRule; 4] = [
    ClassRule::new(ConditionClass::Weak, Included(0.2), Excluded(0.4)),
    ClassRule::new(ConditionClass::Stress, Included(0.0), Excluded(0.2)),
    ClassRule::new(ConditionClass::Moderate, Included(0.4), Excluded(0.6)),
    ClassRule::new(ConditionClass::Healthy, Included(0.6), Unbounded),
];

/// VH backscatter intervals in dB; lower backscatter reads as healthier
const RADAR_RULES: [ClassRule; 4] = [
    ClassRule::new(ConditionClass::Weak, Included(-11.0), Unbounded),
    ClassRule::new(ConditionClass::Stress, Excluded(-13.0), Excluded(-11.0)),
    ClassRule::new(ConditionClass::Moderate, Excluded(-15.0), Included(-13.0)),
    ClassRule::new(ConditionClass::Healthy, Unbounded, Included(-15.0)),
];

/// Classification rules of a sensor, in [`ConditionClass::ALL`] order
pub fn rules(sensor: Sensor) -> &'static [ClassRule; 4] {
    match sensor {
        Sensor::Sentinel2 => &OPTICAL_RULES,
        Sensor::Sentinel1 => &RADAR_RULES,
    }
}

/// Class of a single signal value, if any
pub fn classify(sensor: Sensor, value: f64) -> Option<ConditionClass> {
    rules(sensor)
        .iter()
        .find(|rule| rule.contains(value))
        .map(|rule| rule.class)
}

/// One boolean raster per class; the masks never overlap
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMasks {
    pub weak: ImageExpr,
    pub stress: ImageExpr,
    pub moderate: ImageExpr,
    pub healthy: ImageExpr,
}

impl ClassMasks {
    pub fn new(sensor: Sensor, signal: &ImageExpr) -> Self {
        let [weak, stress, moderate, healthy] = (*rules(sensor)).map(|rule| rule.mask(signal));
        ClassMasks {
            weak,
            stress,
            moderate,
            healthy,
        }
    }

    pub fn get(&self, class: ConditionClass) -> &ImageExpr {
        match class {
            ConditionClass::Weak => &self.weak,
            ConditionClass::Stress => &self.stress,
            ConditionClass::Moderate => &self.moderate,
            ConditionClass::Healthy => &self.healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::CompareOp;

    #[test]
    fn test_optical_boundaries() {
        let s2 = Sensor::Sentinel2;
        assert_eq!(classify(s2, -0.01), None);
        assert_eq!(classify(s2, 0.0), Some(ConditionClass::Stress));
        assert_eq!(classify(s2, 0.19), Some(ConditionClass::Stress));
        assert_eq!(classify(s2, 0.2), Some(ConditionClass::Weak));
        assert_eq!(classify(s2, 0.4), Some(ConditionClass::Moderate));
        assert_eq!(classify(s2, 0.6), Some(ConditionClass::Healthy));
        assert_eq!(classify(s2, 1.0), Some(ConditionClass::Healthy));
    }

    #[test]
    fn test_radar_boundaries() {
        let s1 = Sensor::Sentinel1;
        assert_eq!(classify(s1, -20.0), Some(ConditionClass::Healthy));
        assert_eq!(classify(s1, -15.0), Some(ConditionClass::Healthy));
        assert_eq!(classify(s1, -14.9), Some(ConditionClass::Moderate));
        assert_eq!(classify(s1, -13.0), Some(ConditionClass::Moderate));
        assert_eq!(classify(s1, -12.0), Some(ConditionClass::Stress));
        assert_eq!(classify(s1, -11.0), Some(ConditionClass::Weak));
        assert_eq!(classify(s1, -5.0), Some(ConditionClass::Weak));
    }

    #[test]
    fn test_rules_are_disjoint() {
        for sensor in [Sensor::Sentinel1, Sensor::Sentinel2] {
            let mut v = -30.0;
            while v <= 2.0 {
                let hits = rules(sensor).iter().filter(|r| r.contains(v)).count();
                assert!(hits <= 1, "{:?} value {} matched {} classes", sensor, v, hits);
                v += 0.005;
            }
            for edge in [-15.0, -13.0, -11.0, 0.0, 0.2, 0.4, 0.6] {
                let hits = rules(sensor).iter().filter(|r| r.contains(edge)).count();
                assert!(hits <= 1);
            }
        }
    }

    #[test]
    fn test_masks_follow_rule_bounds() {
        let signal = ImageExpr::constant(0.5);
        let masks = ClassMasks::new(Sensor::Sentinel2, &signal);
        assert_eq!(masks.get(ConditionClass::Weak), &signal.gte(0.2).and(signal.lt(0.4)));
        assert_eq!(masks.healthy, signal.gte(0.6));

        let masks = ClassMasks::new(Sensor::Sentinel1, &signal);
        assert_eq!(masks.healthy, signal.lte(-15.0));
        match &masks.stress {
            ImageExpr::And { left, right } => {
                assert!(matches!(**left, ImageExpr::Compare { cmp: CompareOp::Gt, .. }));
                assert!(matches!(**right, ImageExpr::Compare { cmp: CompareOp::Lt, .. }));
            }
            other => panic!("unexpected mask {:?}", other),
        }
    }

    #[test]
    fn test_class_codes() {
        let codes: Vec<u8> = ConditionClass::ALL.iter().map(ConditionClass::code).collect();
        assert_eq!(codes, vec![1, 2, 3, 4]);
    }
}
