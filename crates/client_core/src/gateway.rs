use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{AreaEstimate, GeoPoint, Location, ReportFormat, Scenario, SimulationResult},
    error::ServiceErrorBody,
    protocol::{GeocodeRequest, ReportRequest, RooftopEstimateRequest, SimulationRequest},
};
use tracing::{debug, warn};
use url::Url;

use crate::error::GatewayError;

/// Rendered report as returned by the document service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub format: ReportFormat,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Request/response boundary to the remote computation service.
///
/// Implementations own no retry policy. The wizard treats every operation as a
/// pure function of its inputs.
#[async_trait]
pub trait ComputationGateway: Send + Sync {
    async fn resolve_address(&self, address: &str) -> Result<Location, GatewayError>;

    async fn estimate_roof_area(&self, point: GeoPoint) -> Result<AreaEstimate, GatewayError>;

    async fn compute_scenario(
        &self,
        roof_area_m2: f64,
        scenario: &Scenario,
        baseline_surface_temp_c: Option<f64>,
    ) -> Result<SimulationResult, GatewayError>;

    async fn render_report(
        &self,
        format: ReportFormat,
        result: &SimulationResult,
    ) -> Result<ReportDocument, GatewayError>;
}

pub struct HttpGateway {
    http: Client,
    base_url: Url,
}

impl HttpGateway {
    /// `base_url` is the API root, e.g. `http://127.0.0.1:8000/api/v1`.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid gateway url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("gateway url '{base_url}' cannot be used as a base"));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build gateway http client")?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, String> {
        self.base_url
            .join(path)
            .map_err(|e| format!("invalid endpoint '{path}': {e}"))
    }

    async fn post(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> std::result::Result<Response, String> {
        let url = self.endpoint(path)?;
        debug!(%url, "gateway request");
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request to {path} failed: {e}"))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ServiceErrorBody>(&body)
            .map(|parsed| parsed.message())
            .unwrap_or(body);
        warn!(path, %status, detail = %detail, "gateway returned an error status");
        if detail.trim().is_empty() {
            Err(format!("{path} returned {status}"))
        } else {
            Err(format!("{path} returned {status}: {}", detail.trim()))
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, String>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.post(path, body)
            .await?
            .json::<R>()
            .await
            .map_err(|e| format!("invalid response from {path}: {e}"))
    }
}

#[async_trait]
impl ComputationGateway for HttpGateway {
    async fn resolve_address(&self, address: &str) -> Result<Location, GatewayError> {
        self.post_json(
            "geocode",
            &GeocodeRequest {
                address: address.to_string(),
            },
        )
        .await
        .map_err(GatewayError::Resolution)
    }

    async fn estimate_roof_area(&self, point: GeoPoint) -> Result<AreaEstimate, GatewayError> {
        self.post_json(
            "buildings/estimate",
            &RooftopEstimateRequest {
                lat: point.lat,
                lon: point.lon,
            },
        )
        .await
        .map_err(GatewayError::Estimation)
    }

    async fn compute_scenario(
        &self,
        roof_area_m2: f64,
        scenario: &Scenario,
        baseline_surface_temp_c: Option<f64>,
    ) -> Result<SimulationResult, GatewayError> {
        self.post_json(
            "simulation",
            &SimulationRequest {
                roof_area_m2,
                scenario: scenario.clone(),
                baseline_surface_temp_c,
            },
        )
        .await
        .map_err(GatewayError::Computation)
    }

    async fn render_report(
        &self,
        format: ReportFormat,
        result: &SimulationResult,
    ) -> Result<ReportDocument, GatewayError> {
        let path = match format {
            ReportFormat::Pdf => "reports/pdf",
            ReportFormat::Excel => "reports/excel",
        };
        let response = self
            .post(
                path,
                &ReportRequest {
                    result: result.clone(),
                },
            )
            .await
            .map_err(GatewayError::Report)?;

        let headers = response.headers();
        let filename = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| format.default_filename().to_string());
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format.content_type().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Report(format!("failed to read {path} body: {e}")))?;
        if bytes.is_empty() {
            return Err(GatewayError::Report(format!("{path} returned an empty document")));
        }

        Ok(ReportDocument {
            format,
            filename,
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

fn filename_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
