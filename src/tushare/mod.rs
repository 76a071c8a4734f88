//! Tushare Pro upstream data access.
//!
//! Every tool reads from a single HTTP JSON endpoint that answers in a
//! columnar shape (`fields` + positional `items`). This module owns that
//! exchange and hands tools a row-per-record view of the data.
//!
//! Tools depend on the [`DataProvider`] trait rather than on the HTTP client
//! directly, so the registry can be driven by an in-process fake.

mod client;

pub use client::{format_data, status_message, TushareClient, TushareProvider, UPSTREAM_TIMEOUT};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::UpstreamError;

/// One upstream row: column name to scalar value, in upstream column order.
pub type Record = IndexMap<String, Value>;

/// Upstream query parameters, in the order the tool declares them.
pub type QueryParams = IndexMap<String, String>;

/// A source of tabular market data.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Runs one query against the named upstream API.
    ///
    /// `token` is the per-request credential; implementations fall back to
    /// their configured token when it is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is resolvable or the upstream call fails.
    async fn query(
        &self,
        token: Option<&str>,
        api_name: &str,
        params: &QueryParams,
    ) -> Result<Vec<Record>, UpstreamError>;
}
