use std::time::Duration;
use serde::{Deserialize, Serialize};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use log::*;

use crate::analysis_request::AnalyzeRequest;
use crate::config_manager::ApiConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    /// Non-2xx response. `message` is the body's `detail` when the server sent
    /// one.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Transport(format!("Request timed out: {}", e))
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthStatus {
    pub api_key_required: bool,
}

/// Response of `POST /analyze`: a single markdown report plus run metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub business_goal: String,
    pub report: String,
    #[serde(default)]
    pub memory_updated: bool,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Older flat response with pre-split lists and fractional scores.
/// Still accepted, but converted on arrival.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LegacyAnalyzeResponse {
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub report: Vec<String>,
    pub confidence_score: Option<f64>,
    pub data_completeness: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Markdown(AnalyzeResponse),
    Legacy(LegacyAnalyzeResponse),
}

/// Text shown to the user for a failed response: the body's `detail` string
/// if present, otherwise the status code.
pub fn error_message_from_body(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .filter(|detail| !detail.trim().is_empty())
        .unwrap_or_else(|| format!("API Error: {}", status.as_u16()))
}

pub struct AnalysisApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl AnalysisApi {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.base_url, config.api_key(), Duration::from_millis(config.timeout_ms))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let url = self.endpoint("health");
        let response = self.client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn auth_status(&self) -> Result<AuthStatus, ApiError> {
        let url = self.endpoint("auth-status");
        let response = self.client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Posts the request once. There is no retry.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResponse, ApiError> {
        let url = self.endpoint("analyze");
        info!(
            "POST {} (mode={}, goal={}, scope={})",
            url, request.brief.mode, request.brief.business_goal, request.brief.scope.value
        );

        let mut builder = self.client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let response = builder.send().await?;
        let parsed: AnalysisResponse = Self::read_json(response).await?;
        if let AnalysisResponse::Legacy(_) = &parsed {
            warn!("{} returned the deprecated flat response shape", url);
        }
        Ok(parsed)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message_from_body(status, &body);
            error!("API HTTP error {}: {}", status, message);
            return Err(ApiError::Status { status: status.as_u16(), message });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}
