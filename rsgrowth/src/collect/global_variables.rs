/// Sentinel-2 surface reflectance collection
pub const S2_COLLECTION: &str = "COPERNICUS/S2_SR";
/// Sentinel-1 ground range detected collection
pub const S1_COLLECTION: &str = "COPERNICUS/S1_GRD";

pub const TIME_START: &str = "system:time_start";
pub const CLOUD_COVER_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";
pub const INSTRUMENT_MODE_PROPERTY: &str = "instrumentMode";
pub const POLARISATION_PROPERTY: &str = "transmitterReceiverPolarisation";

/// Interferometric wide swath
pub const INSTRUMENT_MODE_IW: &str = "IW";

pub const NIR_BAND: &str = "B8";
pub const RED_BAND: &str = "B4";
pub const VH_BAND: &str = "VH";
/// Band name produced by a constant image
pub const CONSTANT_BAND: &str = "constant";

pub const EARTH_ENGINE_API_URL: &str = "https://earthengine.googleapis.com";

/// Pixel budget of a reduction before best-effort coarsens the scale
pub const MAX_PIXELS: u64 = 10_000_000;

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Growth overlay colours for class codes 0 (background) to 4 (healthy)
pub const GROWTH_PALETTE: [&str; 5] = ["#ffffff", "#bc1e29", "#58cf54", "#28ae31", "#056c3e"];

/// Analysis type under which growth results are stored
pub const GROWTH_ANALYSIS_TYPE: &str = "growth";
