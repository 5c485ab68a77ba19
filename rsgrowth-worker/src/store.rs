use anyhow::{Context, Result};
use chrono::NaiveDate;
use rsgrowth::AnalysisResult;
use serde::Serialize;
use serde_json::Value;

use crate::registry::{PlotId, PlotRecord};
use crate::supabase::SupabaseClient;

/// Row stored for one plot, analysis type and scene date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub plot_id: PlotId,
    pub plot_name: Option<String>,
    pub analysis_type: String,
    pub analysis_date: NaiveDate,
    pub sensor: String,
    pub tile_url: String,
    pub response_json: Value,
}

impl AnalysisRecord {
    pub fn new(plot: &PlotRecord, analysis_type: &str, result: &AnalysisResult) -> Result<Self> {
        let response_json = serde_json::to_value(&result.response_json)
            .context("Failed to serialize growth report")?;
        Ok(AnalysisRecord {
            plot_id: plot.id.clone(),
            plot_name: plot.plot_name.clone(),
            analysis_type: analysis_type.to_string(),
            analysis_date: result.analysis_date,
            sensor: result.sensor.name().to_string(),
            tile_url: result.tile_url.clone(),
            response_json,
        })
    }
}

/// Results keyed by (plot, analysis type, analysis date)
pub trait ResultStore {
    fn exists(&self, plot_id: &PlotId, analysis_type: &str, analysis_date: NaiveDate) -> Result<bool>;
    fn insert(&mut self, record: AnalysisRecord) -> Result<()>;
}

/// Results table of a Supabase project
pub struct SupabaseResults<'a> {
    client: &'a SupabaseClient,
    table: String,
}

impl<'a> SupabaseResults<'a> {
    pub fn new(client: &'a SupabaseClient, table: &str) -> Self {
        SupabaseResults {
            client,
            table: table.to_string(),
        }
    }
}

/// PostgREST filter selecting the row of one (plot, type, date) key
fn key_query(plot_id: &PlotId, analysis_type: &str, analysis_date: NaiveDate) -> String {
    format!(
        "select=plot_id&plot_id=eq.{}&analysis_type=eq.{}&analysis_date=eq.{}&limit=1",
        urlencoding::encode(&plot_id.to_string()),
        urlencoding::encode(analysis_type),
        analysis_date.format("%Y-%m-%d")
    )
}

impl ResultStore for SupabaseResults<'_> {
    fn exists(&self, plot_id: &PlotId, analysis_type: &str, analysis_date: NaiveDate) -> Result<bool> {
        let rows = self
            .client
            .select(&self.table, &key_query(plot_id, analysis_type, analysis_date))?;
        Ok(!rows.is_empty())
    }

    fn insert(&mut self, record: AnalysisRecord) -> Result<()> {
        self.client.insert(&self.table, &record)
    }
}

/// In-process store, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryResults {
    records: Vec<AnalysisRecord>,
}

impl MemoryResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }
}

impl ResultStore for MemoryResults {
    fn exists(&self, plot_id: &PlotId, analysis_type: &str, analysis_date: NaiveDate) -> Result<bool> {
        Ok(self.records.iter().any(|r| {
            &r.plot_id == plot_id
                && r.analysis_type == analysis_type
                && r.analysis_date == analysis_date
        }))
    }

    fn insert(&mut self, record: AnalysisRecord) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(id: i64, day: &str) -> AnalysisRecord {
        AnalysisRecord {
            plot_id: PlotId::Int(id),
            plot_name: None,
            analysis_type: "growth".to_string(),
            analysis_date: date(day),
            sensor: "Sentinel-2".to_string(),
            tile_url: "memory://maps/0/tiles/{z}/{x}/{y}".to_string(),
            response_json: json!({}),
        }
    }

    #[test]
    fn test_memory_store_key() {
        let mut store = MemoryResults::new();
        store.insert(record(1, "2024-06-15")).unwrap();

        assert!(store.exists(&PlotId::Int(1), "growth", date("2024-06-15")).unwrap());
        assert!(!store.exists(&PlotId::Int(1), "growth", date("2024-06-16")).unwrap());
        assert!(!store.exists(&PlotId::Int(2), "growth", date("2024-06-15")).unwrap());
        assert!(!store.exists(&PlotId::Int(1), "moisture", date("2024-06-15")).unwrap());
    }

    #[test]
    fn test_key_query_encodes_values() {
        let query = key_query(&PlotId::Text("a b&c".to_string()), "growth", date("2024-06-15"));
        assert_eq!(
            query,
            "select=plot_id&plot_id=eq.a%20b%26c&analysis_type=eq.growth&analysis_date=eq.2024-06-15&limit=1"
        );
    }

    #[test]
    fn test_record_serialization() {
        let value = serde_json::to_value(record(3, "2024-06-15")).unwrap();
        assert_eq!(value["plot_id"], 3);
        assert_eq!(value["analysis_date"], "2024-06-15");
        assert_eq!(value["analysis_type"], "growth");
    }
}
