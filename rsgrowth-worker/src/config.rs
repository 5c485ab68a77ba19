use chrono::{Days, NaiveDate};
use clap::Parser;
use rsgrowth::collect::global_variables::EARTH_ENGINE_API_URL;
use rsgrowth::geo_core::AnalysisWindow;

/// Daily worker configuration, read from flags or the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "rsgrowth-worker")]
#[command(about = "Analyse crop growth of every registered plot and store the results")]
#[command(after_long_help = "\
ENVIRONMENT:
  Every option can also be set through the variable shown next to it.
  A .env file in the working directory is loaded first.
  RUST_LOG=debug  Enable debug logging")]
pub struct WorkerConfig {
    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: String,

    /// Supabase service role key
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub supabase_service_role_key: String,

    /// Google Cloud project registered for Earth Engine
    #[arg(long, env = "EE_PROJECT")]
    pub ee_project: String,

    /// OAuth2 bearer token for the Earth Engine API
    #[arg(long, env = "EE_ACCESS_TOKEN", hide_env_values = true)]
    pub ee_access_token: String,

    /// Earth Engine API root
    #[arg(long, env = "EE_API_URL", default_value = EARTH_ENGINE_API_URL)]
    pub ee_api_url: String,

    /// Table listing the plots (id, plot_name, geometry)
    #[arg(long, env = "PLOTS_TABLE", default_value = "plots")]
    pub plots_table: String,

    /// Table receiving one row per plot and analysis date
    #[arg(long, env = "RESULTS_TABLE", default_value = "plot_analyses")]
    pub results_table: String,

    /// Days covered by the default analysis window, ending today
    #[arg(long, env = "LOOKBACK_DAYS", default_value_t = 30)]
    pub lookback_days: u32,

    /// First day of the analysis window (YYYY-MM-DD)
    #[arg(long, requires = "end_date")]
    pub start_date: Option<NaiveDate>,

    /// Day after the analysis window (YYYY-MM-DD, exclusive)
    #[arg(long, requires = "start_date")]
    pub end_date: Option<NaiveDate>,

    /// Analyse without writing results
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid analysis window: {0}")]
    Window(String),
}

impl WorkerConfig {
    /// Explicit window when both dates are given, else the lookback period
    /// ending `today`
    pub fn window(&self, today: NaiveDate) -> Result<AnalysisWindow, ConfigError> {
        let (start, end) = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                let start = today
                    .checked_sub_days(Days::new(u64::from(self.lookback_days)))
                    .ok_or_else(|| ConfigError::Window("lookback out of range".to_string()))?;
                (start, today)
            }
        };
        AnalysisWindow::new(start, end).map_err(|e| ConfigError::Window(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "rsgrowth-worker",
        "--supabase-url",
        "https://db.example.com",
        "--supabase-service-role-key",
        "service-key",
        "--ee-project",
        "growth-project",
        "--ee-access-token",
        "token",
    ];

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_lookback_window() {
        let config = WorkerConfig::try_parse_from(REQUIRED).unwrap();
        assert_eq!(config.plots_table, "plots");
        assert_eq!(config.results_table, "plot_analyses");
        assert_eq!(config.ee_api_url, "https://earthengine.googleapis.com");
        assert!(!config.dry_run);

        let window = config.window(date("2024-06-30")).unwrap();
        assert_eq!(window.start, date("2024-05-31"));
        assert_eq!(window.end, date("2024-06-30"));
    }

    #[test]
    fn test_explicit_window() {
        let args = REQUIRED.iter().copied().chain([
            "--start-date",
            "2024-06-01",
            "--end-date",
            "2024-06-30",
            "--dry-run",
        ]);
        let config = WorkerConfig::try_parse_from(args).unwrap();
        assert!(config.dry_run);
        let window = config.window(date("2025-01-01")).unwrap();
        assert_eq!(window.start, date("2024-06-01"));
        assert_eq!(window.end, date("2024-06-30"));
    }

    #[test]
    fn test_half_window_rejected() {
        let args = REQUIRED.iter().copied().chain(["--start-date", "2024-06-01"]);
        assert!(WorkerConfig::try_parse_from(args).is_err());
    }

    #[test]
    fn test_reversed_window() {
        let args = REQUIRED.iter().copied().chain([
            "--start-date",
            "2024-06-30",
            "--end-date",
            "2024-06-01",
        ]);
        let config = WorkerConfig::try_parse_from(args).unwrap();
        assert!(config.window(date("2025-01-01")).is_err());
    }
}
