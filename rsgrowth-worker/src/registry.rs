use std::fmt;

use anyhow::{Context, Result};
use geojson::Geometry;
use rsgrowth::PlotInput;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::supabase::SupabaseClient;

/// Primary key of a plot; integer or text depending on the table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlotId {
    Int(i64),
    Text(String),
}

impl fmt::Display for PlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotId::Int(id) => write!(f, "{}", id),
            PlotId::Text(id) => f.write_str(id),
        }
    }
}

/// One row of the plots table.
///
/// The geometry is kept as raw JSON so a single malformed plot cannot fail
/// the whole listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlotRecord {
    pub id: PlotId,
    #[serde(default)]
    pub plot_name: Option<String>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

impl PlotRecord {
    pub fn has_geometry(&self) -> bool {
        !matches!(self.geometry, None | Some(Value::Null))
    }

    /// Analyzer input; fails when the stored geometry is not GeoJSON
    pub fn to_input(&self) -> Result<PlotInput> {
        let geometry = match &self.geometry {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                Geometry::from_json_value(value.clone())
                    .with_context(|| format!("Plot {} has a malformed geometry", self.id))?,
            ),
        };
        Ok(PlotInput {
            geometry,
            plot_name: self.plot_name.clone(),
        })
    }

    pub fn label(&self) -> &str {
        self.plot_name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Source of the plots to analyse
pub trait PlotRegistry {
    fn fetch_plots(&self) -> Result<Vec<PlotRecord>>;
}

/// Plots table of a Supabase project
pub struct SupabasePlots<'a> {
    client: &'a SupabaseClient,
    table: String,
}

impl<'a> SupabasePlots<'a> {
    pub fn new(client: &'a SupabaseClient, table: &str) -> Self {
        SupabasePlots {
            client,
            table: table.to_string(),
        }
    }
}

impl PlotRegistry for SupabasePlots<'_> {
    fn fetch_plots(&self) -> Result<Vec<PlotRecord>> {
        let rows = self
            .client
            .select(&self.table, "select=id,plot_name,geometry")?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).context("Unexpected plot row"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plot_rows() {
        let rows = json!([
            {
                "id": 7,
                "plot_name": "North",
                "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}
            },
            {"id": "c0ffee", "plot_name": null, "geometry": null}
        ]);
        let plots: Vec<PlotRecord> = serde_json::from_value(rows).unwrap();

        assert_eq!(plots[0].id, PlotId::Int(7));
        assert!(plots[0].has_geometry());
        let input = plots[0].to_input().unwrap();
        assert!(input.geometry.is_some());
        assert_eq!(input.plot_name.as_deref(), Some("North"));

        assert_eq!(plots[1].id.to_string(), "c0ffee");
        assert!(!plots[1].has_geometry());
        assert_eq!(plots[1].label(), "<unnamed>");
        assert!(plots[1].to_input().unwrap().geometry.is_none());
    }

    #[test]
    fn test_malformed_geometry() {
        let plot = PlotRecord {
            id: PlotId::Int(1),
            plot_name: None,
            geometry: Some(json!({"type": "Polygon"})),
        };
        assert!(plot.has_geometry());
        assert!(plot.to_input().is_err());
    }
}
