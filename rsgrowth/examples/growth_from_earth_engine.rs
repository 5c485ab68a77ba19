use anyhow::{Context, Result};
use rsgrowth::collect::earth_engine::EarthEngine;
use rsgrowth::geo_core::ParcelGeometry;
use rsgrowth::{GrowthAnalyzer, PlotInput};

/// Example: growth analysis through the Earth Engine REST API
///
/// Needs EE_PROJECT and EE_ACCESS_TOKEN (e.g. `gcloud auth print-access-token`)
fn main() -> Result<()> {
    println!("=== Example: Growth analysis from Earth Engine ===\n");

    let project = std::env::var("EE_PROJECT").context("EE_PROJECT is not set")?;
    let token = std::env::var("EE_ACCESS_TOKEN").context("EE_ACCESS_TOKEN is not set")?;
    let earth_engine = EarthEngine::new(&project, &token)?;

    let parcel = ParcelGeometry::rectangle(-1.1527, 46.1816, -1.1499, 46.1835)?;
    let plot = PlotInput::new(parcel.as_geojson().clone(), Some("La Rochelle demo"));

    println!("Running analysis for June 2024...");
    let result = GrowthAnalyzer::new(&earth_engine).analyze(&plot, "2024-06-01", "2024-06-30")?;

    println!("Sensor: {}", result.sensor);
    println!("Scene date: {}", result.analysis_date);
    println!("Tiles: {}", result.tile_url);
    println!(
        "\n{}",
        serde_json::to_string_pretty(&result.response_json.pixel_summary)?
    );
    Ok(())
}
