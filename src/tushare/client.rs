//! HTTP client for the Tushare Pro API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DataProvider, QueryParams, Record};
use crate::error::UpstreamError;

/// Deadline for a single upstream request. There is no retry.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body expected by the Tushare Pro endpoint.
#[derive(Debug, Serialize)]
struct TushareRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: &'a QueryParams,
    fields: &'a [&'a str],
}

/// Response envelope returned by the Tushare Pro endpoint.
#[derive(Debug, Deserialize)]
struct TushareResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Process-wide provider: shared HTTP connection pool plus the fallback token.
///
/// A [`TushareClient`] is built per query so that a per-request token can be
/// used without mutating shared state.
#[derive(Debug, Clone)]
pub struct TushareProvider {
    http: reqwest::Client,
    api_url: String,
    default_token: Option<String>,
}

impl TushareProvider {
    /// Creates a provider for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        api_url: impl Into<String>,
        default_token: Option<String>,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .user_agent(format!("finance-mcp/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::Transport)?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            default_token: default_token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Whether a fallback token is configured.
    #[must_use]
    pub const fn has_default_token(&self) -> bool {
        self.default_token.is_some()
    }

    /// Builds a client bound to `token`, or to the configured fallback.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::MissingToken`] if neither is available.
    pub fn client(&self, token: Option<&str>) -> Result<TushareClient<'_>, UpstreamError> {
        TushareClient::new(
            &self.http,
            &self.api_url,
            token,
            self.default_token.as_deref(),
        )
    }
}

#[async_trait]
impl DataProvider for TushareProvider {
    async fn query(
        &self,
        token: Option<&str>,
        api_name: &str,
        params: &QueryParams,
    ) -> Result<Vec<Record>, UpstreamError> {
        self.client(token)?.call(api_name, params).await
    }
}

/// A Tushare client bound to one resolved token.
pub struct TushareClient<'a> {
    http: &'a reqwest::Client,
    api_url: &'a str,
    token: String,
}

impl std::fmt::Debug for TushareClient<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TushareClient")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl<'a> TushareClient<'a> {
    /// Resolves the token (explicit first, then `fallback`) and binds a client.
    ///
    /// Blank tokens count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::MissingToken`] if no token is resolvable.
    pub fn new(
        http: &'a reqwest::Client,
        api_url: &'a str,
        token: Option<&str>,
        fallback: Option<&str>,
    ) -> Result<Self, UpstreamError> {
        let token = [token, fallback]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|t| !t.is_empty())
            .ok_or(UpstreamError::MissingToken)?;

        Ok(Self {
            http,
            api_url,
            token: token.to_string(),
        })
    }

    /// Calls `api_name` with `params` and returns one record per row.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, a non-zero
    /// provider code, or an undecodable body.
    pub async fn call(
        &self,
        api_name: &str,
        params: &QueryParams,
    ) -> Result<Vec<Record>, UpstreamError> {
        tracing::debug!(api = api_name, params = ?params, "Calling Tushare API");

        let body = TushareRequest {
            api_name,
            token: &self.token,
            params,
            fields: &[],
        };

        let response = self
            .http
            .post(self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        let text = response.text().await.map_err(UpstreamError::Transport)?;

        if !status.is_success() {
            tracing::warn!(api = api_name, status = status.as_u16(), "Tushare API returned error status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: status_message(status, &text),
            });
        }

        let payload: TushareResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if payload.code != 0 {
            tracing::warn!(api = api_name, code = payload.code, "Tushare API rejected request");
            return Err(UpstreamError::Api {
                code: payload.code,
                message: payload.msg.unwrap_or_default(),
            });
        }

        let records = payload.data.as_ref().map(format_data).unwrap_or_default();
        tracing::debug!(api = api_name, rows = records.len(), "Tushare API call complete");

        Ok(records)
    }
}

/// Picks the message for a non-2xx reply: the JSON `msg` if the body has one,
/// otherwise the canonical reason phrase.
#[must_use]
pub fn status_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("msg").and_then(Value::as_str).map(str::to_owned))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

/// Converts a columnar `{fields, items}` payload into one record per row.
///
/// Position *i* of each row maps to field *i*. Missing `fields` or `items`
/// yields an empty sequence; short rows are padded with `null`, and rows that
/// are not arrays are skipped.
#[must_use]
pub fn format_data(data: &Value) -> Vec<Record> {
    let (Some(fields), Some(items)) = (
        data.get("fields").and_then(Value::as_array),
        data.get("items").and_then(Value::as_array),
    ) else {
        return Vec::new();
    };

    let names: Vec<String> = fields
        .iter()
        .map(|f| f.as_str().map_or_else(|| f.to_string(), str::to_owned))
        .collect();

    items
        .iter()
        .filter_map(Value::as_array)
        .map(|row| {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row.get(i).cloned().unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}
