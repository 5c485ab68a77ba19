use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Minimal PostgREST client for a Supabase project
pub struct SupabaseClient {
    client: Client,
    rest_url: Url,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(project_url: &str, service_key: &str) -> Result<Self> {
        let base = Url::parse(project_url)
            .with_context(|| format!("Invalid Supabase URL: {}", project_url))?;
        let rest_url = base
            .join("rest/v1/")
            .context("Failed to build Supabase REST URL")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(SupabaseClient {
            client,
            rest_url,
            service_key: service_key.to_string(),
        })
    }

    /// `{project}/rest/v1/{table}?{query}`; filter values must already be
    /// percent-encoded
    pub fn table_url(&self, table: &str, query: &str) -> Result<Url> {
        let mut url = self
            .rest_url
            .join(table)
            .with_context(|| format!("Invalid table name: {}", table))?;
        if !query.is_empty() {
            url.set_query(Some(query));
        }
        Ok(url)
    }

    /// GET rows of `table`
    pub fn select(&self, table: &str, query: &str) -> Result<Vec<Value>> {
        let url = self.table_url(table, query)?;
        debug!(%url, "Supabase select");
        let response = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .with_context(|| format!("Failed to query table {}", table))?;

        check_status(response, table)?
            .json()
            .with_context(|| format!("Failed to decode rows of {}", table))
    }

    /// POST a single row into `table`
    pub fn insert<T: Serialize>(&self, table: &str, row: &T) -> Result<()> {
        let url = self.table_url(table, "")?;
        debug!(%url, "Supabase insert");
        let response = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .with_context(|| format!("Failed to insert into {}", table))?;

        check_status(response, table)?;
        Ok(())
    }
}

fn check_status(response: Response, table: &str) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        bail!("Supabase request on {} failed with {}: {}", table, status, body);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url() {
        let client = SupabaseClient::new("https://abc.supabase.co", "key").unwrap();
        assert_eq!(
            client.table_url("plots", "select=id").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/plots?select=id"
        );
        assert_eq!(
            client.table_url("plot_analyses", "").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/plot_analyses"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(SupabaseClient::new("abc.supabase.co", "key").is_err());
    }
}
