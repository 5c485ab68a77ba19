use anyhow::Result;
use chrono::NaiveDate;
use rsgrowth::collect::memory::{BandSource, MemoryCatalog, SceneRecord};
use rsgrowth::geo_core::ParcelGeometry;
use rsgrowth::{GrowthAnalyzer, PlotInput};

/// Example: growth analysis of a small plot against an in-memory catalog
fn main() -> Result<()> {
    println!("=== Example: Growth analysis (offline catalog) ===\n");

    let mut catalog = MemoryCatalog::new();
    let june = |day| NaiveDate::from_ymd_opt(2024, 6, day).unwrap_or_default();

    // Two optical scenes, the latest one too cloudy to be used
    catalog.add_sentinel2(SceneRecord::sentinel2(
        "S2_20240612",
        june(12),
        12.0,
        BandSource::Pattern(vec![3300.0, 2400.0, 1400.0]),
        BandSource::Pattern(vec![700.0, 800.0, 600.0]),
    ));
    catalog.add_sentinel2(SceneRecord::sentinel2(
        "S2_20240617",
        june(17),
        82.0,
        BandSource::Constant(3000.0),
        BandSource::Constant(900.0),
    ));
    catalog.add_sentinel1(SceneRecord::sentinel1(
        "S1_20240609",
        june(9),
        BandSource::Constant(-14.2),
    ));

    // Plot near La Rochelle, France
    let parcel = ParcelGeometry::rectangle(-1.1527, 46.1816, -1.1499, 46.1835)?;
    let plot = PlotInput::new(parcel.as_geojson().clone(), Some("La Rochelle demo"));

    let analyzer = GrowthAnalyzer::new(&catalog);
    let result = analyzer.analyze(&plot, "2024-06-01", "2024-06-30")?;

    let summary = &result.response_json.pixel_summary;
    println!("Sensor: {}", result.sensor);
    println!("Scene date: {}", result.analysis_date);
    println!("Tiles: {}", result.tile_url);
    println!("  - total pixels: {}", summary.total_pixel_count);
    println!("  - healthy: {:.1}%", summary.healthy_pixel_percentage);
    println!("  - moderate: {:.1}%", summary.moderate_pixel_percentage);
    println!("  - weak: {:.1}%", summary.weak_pixel_percentage);
    println!("  - stress: {:.1}%", summary.stress_pixel_percentage);

    println!("\n{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
