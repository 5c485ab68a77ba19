use crate::collect::global_variables::GROWTH_PALETTE;
use crate::geo_core::ParcelGeometry;
use crate::growth::classification::{ClassMasks, ConditionClass};
use crate::query::{ImageExpr, Visualization};

/// Categorical overlay: 0 background, then each class painted with its code
pub fn classification_image(masks: &ClassMasks, parcel: &ParcelGeometry) -> ImageExpr {
    ConditionClass::ALL
        .iter()
        .fold(ImageExpr::constant(0.0), |image, class| {
            image.where_(masks.get(*class), f64::from(class.code()))
        })
        .clip(parcel)
}

/// Smoothed overlay rendered with the growth palette over the class codes
pub fn growth_overlay(masks: &ClassMasks, parcel: &ParcelGeometry, radius_m: f64) -> Visualization {
    Visualization {
        image: classification_image(masks, parcel).focal_mean(radius_m),
        min: 0.0,
        max: f64::from(ConditionClass::Healthy.code()),
        palette: GROWTH_PALETTE.iter().map(|c| c.to_string()).collect(),
    }
}
