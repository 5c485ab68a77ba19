//! Encoding of query descriptions into the Earth Engine expression graph.
//!
//! Every node is written inline (`functionInvocationValue` holding nested
//! nodes), so a whole expression is a single value named `"0"`.

use geojson::Value as GeoValue;
use serde_json::{json, Map, Value};

use crate::collect::global_variables::CONSTANT_BAND;
use crate::geo_core::ParcelGeometry;
use crate::query::{CompareOp, ImageExpr, PropertyFilter, SceneQuery, ValueExpr, Visualization};

/// Wrap a root node as an `Expression` message
pub fn expression(root: Value) -> Value {
    json!({
        "result": "0",
        "values": { "0": root }
    })
}

pub fn encode_value(expr: &ValueExpr) -> Value {
    expression(value_node(expr))
}

pub fn encode_visualization(vis: &Visualization) -> Value {
    expression(invoke(
        "Image.visualize",
        vec![
            ("image", image_node(&vis.image)),
            ("min", constant(vis.min)),
            ("max", constant(vis.max)),
            ("palette", constant(&vis.palette)),
        ],
    ))
}

fn constant(value: impl serde::Serialize) -> Value {
    json!({ "constantValue": value })
}

fn invoke(function: &str, arguments: Vec<(&str, Value)>) -> Value {
    let arguments: Map<String, Value> = arguments
        .into_iter()
        .map(|(name, node)| (name.to_string(), node))
        .collect();
    json!({
        "functionInvocationValue": {
            "functionName": function,
            "arguments": arguments
        }
    })
}

fn value_node(expr: &ValueExpr) -> Value {
    match expr {
        ValueExpr::Area {
            geometry,
            max_error_m,
        } => {
            let mut args = vec![("geometry", geometry_node(geometry))];
            if let Some(max_error) = max_error_m {
                args.push(("maxError", invoke("ErrorMargin", vec![("value", constant(max_error))])));
            }
            invoke("Geometry.area", args)
        }
        ValueExpr::Size { collection } => invoke(
            "Collection.size",
            vec![("collection", collection_node(collection))],
        ),
        ValueExpr::TimeStart { collection } => invoke(
            "Element.get",
            vec![
                (
                    "object",
                    invoke("Collection.first", vec![("collection", collection_node(collection))]),
                ),
                ("property", constant("system:time_start")),
            ],
        ),
        ValueExpr::MaskedCount {
            mask,
            geometry,
            scale_m,
            best_effort,
        } => {
            let counted = ImageExpr::constant(1.0).update_mask(mask);
            let reduced = invoke(
                "Image.reduceRegion",
                vec![
                    ("image", image_node(&counted)),
                    ("reducer", invoke("Reducer.count", vec![])),
                    ("geometry", geometry_node(geometry)),
                    ("scale", constant(scale_m)),
                    ("bestEffort", constant(best_effort)),
                ],
            );
            invoke(
                "Dictionary.get",
                vec![("dictionary", reduced), ("key", constant(CONSTANT_BAND))],
            )
        }
    }
}

fn collection_node(query: &SceneQuery) -> Value {
    let mut node = invoke(
        "ImageCollection.load",
        vec![("id", constant(&query.collection))],
    );

    let mut filters = Vec::new();
    if let Some(parcel) = &query.bounds {
        filters.push(invoke(
            "Filter.intersects",
            vec![
                ("leftField", constant(".all")),
                ("rightValue", geometry_node(parcel)),
            ],
        ));
    }
    if let Some(window) = &query.window {
        let date = |d: chrono::NaiveDate| {
            invoke("Date", vec![("value", constant(d.format("%Y-%m-%d").to_string()))])
        };
        filters.push(invoke(
            "Filter.dateRangeContains",
            vec![
                (
                    "leftValue",
                    invoke(
                        "DateRange",
                        vec![("start", date(window.start)), ("end", date(window.end))],
                    ),
                ),
                ("rightField", constant("system:time_start")),
            ],
        ));
    }
    filters.extend(query.filters.iter().map(filter_node));

    for filter in filters {
        node = invoke(
            "Collection.filter",
            vec![("collection", node), ("filter", filter)],
        );
    }

    if let Some(sort) = &query.sort {
        node = invoke(
            "Collection.limit",
            vec![
                ("collection", node),
                ("key", constant(&sort.property)),
                ("ascending", constant(sort.ascending)),
            ],
        );
    }
    node
}

fn filter_node(filter: &PropertyFilter) -> Value {
    let (function, property, value) = match filter {
        PropertyFilter::LessThan { property, value } => ("Filter.lessThan", property, json!(value)),
        PropertyFilter::Equals { property, value } => ("Filter.equals", property, value.clone()),
        PropertyFilter::ListContains { property, value } => {
            ("Filter.listContains", property, value.clone())
        }
    };
    invoke(
        function,
        vec![("leftField", constant(property)), ("rightValue", constant(value))],
    )
}

fn image_node(expr: &ImageExpr) -> Value {
    match expr {
        ImageExpr::First { collection } => {
            let first = invoke(
                "Collection.first",
                vec![("collection", collection_node(collection))],
            );
            match &collection.bands {
                Some(bands) => invoke(
                    "Image.select",
                    vec![("input", first), ("bandSelectors", constant(bands))],
                ),
                None => first,
            }
        }
        ImageExpr::Constant { value } => invoke("Image.constant", vec![("value", constant(value))]),
        ImageExpr::Select { input, bands } => invoke(
            "Image.select",
            vec![("input", image_node(input)), ("bandSelectors", constant(bands))],
        ),
        ImageExpr::NormalizedDifference { input, bands } => invoke(
            "Image.normalizedDifference",
            vec![("input", image_node(input)), ("bandNames", constant(bands))],
        ),
        ImageExpr::Compare { input, cmp, value } => {
            let function = match cmp {
                CompareOp::Gt => "Image.gt",
                CompareOp::Gte => "Image.gte",
                CompareOp::Lt => "Image.lt",
                CompareOp::Lte => "Image.lte",
            };
            invoke(
                function,
                vec![
                    ("image1", image_node(input)),
                    ("image2", image_node(&ImageExpr::constant(*value))),
                ],
            )
        }
        ImageExpr::And { left, right } => invoke(
            "Image.and",
            vec![("image1", image_node(left)), ("image2", image_node(right))],
        ),
        ImageExpr::Where { input, test, value } => invoke(
            "Image.where",
            vec![
                ("input", image_node(input)),
                ("test", image_node(test)),
                ("value", image_node(&ImageExpr::constant(*value))),
            ],
        ),
        ImageExpr::Clip { input, geometry } => invoke(
            "Image.clip",
            vec![("input", image_node(input)), ("geometry", geometry_node(geometry))],
        ),
        ImageExpr::FocalMean { input, radius_m } => invoke(
            "Image.focal_mean",
            vec![
                ("image", image_node(input)),
                ("radius", constant(radius_m)),
                ("kernelType", constant("circle")),
                ("units", constant("meters")),
            ],
        ),
        ImageExpr::UpdateMask { input, mask } => invoke(
            "Image.updateMask",
            vec![("image", image_node(input)), ("mask", image_node(mask))],
        ),
    }
}

fn geometry_node(parcel: &ParcelGeometry) -> Value {
    let (constructor, coordinates) = match &parcel.as_geojson().value {
        GeoValue::MultiPolygon(coordinates) => ("GeometryConstructors.MultiPolygon", json!(coordinates)),
        GeoValue::Polygon(coordinates) => ("GeometryConstructors.Polygon", json!(coordinates)),
        // Validated parcels are always (multi)polygons
        _ => ("GeometryConstructors.Polygon", Value::Null),
    };
    invoke(
        constructor,
        vec![
            ("coordinates", constant(coordinates)),
            ("evenOdd", constant(true)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::global_variables::{CLOUD_COVER_PROPERTY, S2_COLLECTION};
    use crate::geo_core::AnalysisWindow;

    fn parcel() -> ParcelGeometry {
        ParcelGeometry::rectangle(0.0, 0.0, 0.001, 0.001).unwrap()
    }

    fn function_name(node: &Value) -> &str {
        node["functionInvocationValue"]["functionName"]
            .as_str()
            .unwrap()
    }

    fn argument<'a>(node: &'a Value, name: &str) -> &'a Value {
        &node["functionInvocationValue"]["arguments"][name]
    }

    #[test]
    fn test_size_encodes_filter_chain() {
        let query = SceneQuery::catalog(S2_COLLECTION)
            .filter_bounds(&parcel())
            .filter_date(AnalysisWindow::parse("2024-06-01", "2024-06-30").unwrap())
            .filter(PropertyFilter::less_than(CLOUD_COVER_PROPERTY, 60.0))
            .latest_first();
        let encoded = encode_value(&ValueExpr::Size { collection: query });
        assert_eq!(encoded["result"], "0");

        let root = &encoded["values"]["0"];
        assert_eq!(function_name(root), "Collection.size");

        let limited = argument(root, "collection");
        assert_eq!(function_name(limited), "Collection.limit");
        assert_eq!(argument(limited, "ascending")["constantValue"], false);

        // the last filter wraps the others
        let cloud = argument(limited, "collection");
        assert_eq!(function_name(cloud), "Collection.filter");
        let filter = argument(cloud, "filter");
        assert_eq!(function_name(filter), "Filter.lessThan");
        assert_eq!(argument(filter, "rightValue")["constantValue"], 60.0);

        let dates = argument(cloud, "collection");
        assert_eq!(
            function_name(argument(dates, "filter")),
            "Filter.dateRangeContains"
        );
    }

    #[test]
    fn test_masked_count_reads_constant_band() {
        let encoded = encode_value(&ValueExpr::MaskedCount {
            mask: ImageExpr::constant(1.0),
            geometry: parcel(),
            scale_m: 10.0,
            best_effort: true,
        });
        let root = &encoded["values"]["0"];
        assert_eq!(function_name(root), "Dictionary.get");
        assert_eq!(argument(root, "key")["constantValue"], "constant");

        let reduce = argument(root, "dictionary");
        assert_eq!(function_name(reduce), "Image.reduceRegion");
        assert_eq!(argument(reduce, "bestEffort")["constantValue"], true);
        assert_eq!(function_name(argument(reduce, "image")), "Image.updateMask");
    }

    #[test]
    fn test_geometry_uses_polygon_constructor() {
        let node = geometry_node(&parcel());
        assert_eq!(function_name(&node), "GeometryConstructors.Polygon");
        assert_eq!(
            argument(&node, "coordinates")["constantValue"][0][0],
            json!([0.0, 0.0])
        );
    }

    #[test]
    fn test_visualization_palette() {
        let vis = Visualization {
            image: ImageExpr::constant(0.0).focal_mean(10.0),
            min: 0.0,
            max: 4.0,
            palette: vec!["#ffffff".to_string(), "#000000".to_string()],
        };
        let root = &encode_visualization(&vis)["values"]["0"];
        assert_eq!(function_name(root), "Image.visualize");
        assert_eq!(argument(root, "palette")["constantValue"][1], "#000000");
        assert_eq!(function_name(argument(root, "image")), "Image.focal_mean");
    }
}
