use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::collect::backend::ImageryBackend;
use crate::collect::earth_engine::expression::{encode_value, encode_visualization};
use crate::collect::global_variables::EARTH_ENGINE_API_URL;
use crate::error::BackendError;
use crate::query::{ValueExpr, Visualization};

/// Default per-request timeout; large reductions can take minutes
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Response of `value:compute`
#[derive(Debug, Deserialize)]
struct ComputeValueResponse {
    #[serde(default)]
    result: Value,
}

/// Response of `maps` (only the resource name is needed)
#[derive(Debug, Deserialize)]
struct MapResponse {
    name: String,
}

/// Earth Engine REST session.
///
/// Owned by the caller and passed to the analyzer; the bearer token is taken
/// as given and never refreshed here.
pub struct EarthEngine {
    client: Client,
    api_url: Url,
    project: String,
    access_token: String,
}

impl EarthEngine {
    pub fn new(project: &str, access_token: &str) -> Result<Self> {
        Self::with_api_url(project, access_token, EARTH_ENGINE_API_URL)
    }

    pub fn with_api_url(project: &str, access_token: &str, api_url: &str) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .with_context(|| format!("Invalid Earth Engine API URL: {}", api_url))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(EarthEngine {
            client,
            api_url,
            project: project.to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// `{api}/v1/projects/{project}/{method}`
    fn endpoint(&self, method: &str) -> Result<Url, BackendError> {
        self.api_url
            .join(&format!("v1/projects/{}/{}", self.project, method))
            .map_err(|e| BackendError::Evaluation(format!("invalid endpoint {}: {}", method, e)))
    }

    fn post(&self, url: Url, body: &Value) -> Result<reqwest::blocking::Response, BackendError> {
        debug!(%url, "Earth Engine request");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        Ok(response)
    }

    /// Build the tile template for a map resource name
    pub fn tile_template(&self, map_name: &str) -> String {
        format!(
            "{}/v1/{}/tiles/{{z}}/{{x}}/{{y}}",
            self.api_url.as_str().trim_end_matches('/'),
            map_name
        )
    }
}

impl ImageryBackend for EarthEngine {
    fn compute(&self, expr: &ValueExpr) -> Result<Value, BackendError> {
        let url = self.endpoint("value:compute")?;
        let body = json!({ "expression": encode_value(expr) });
        let response: ComputeValueResponse = self
            .post(url, &body)?
            .json()
            .map_err(|e| BackendError::Decode(format!("value:compute response: {}", e)))?;
        Ok(response.result)
    }

    fn tile_url(&self, visualization: &Visualization) -> Result<String, BackendError> {
        let url = self.endpoint("maps")?;
        let body = json!({
            "expression": encode_visualization(visualization),
            "fileFormat": "AUTO_JPEG_PNG"
        });
        let response: MapResponse = self
            .post(url, &body)?
            .json()
            .map_err(|e| BackendError::Decode(format!("maps response: {}", e)))?;
        Ok(self.tile_template(&response.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_layout() {
        let ee = EarthEngine::new("my-project", "token").unwrap();
        assert_eq!(ee.project(), "my-project");
        assert_eq!(
            ee.endpoint("value:compute").unwrap().as_str(),
            "https://earthengine.googleapis.com/v1/projects/my-project/value:compute"
        );
    }

    #[test]
    fn test_tile_template() {
        let ee = EarthEngine::with_api_url("p", "t", "https://ee.example.com/").unwrap();
        assert_eq!(
            ee.tile_template("projects/p/maps/abc"),
            "https://ee.example.com/v1/projects/p/maps/abc/tiles/{z}/{x}/{y}"
        );
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(EarthEngine::with_api_url("p", "t", "not a url").is_err());
    }
}
