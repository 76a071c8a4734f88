//! Error types for finance-mcp.
//!
//! # Security Note
//!
//! Error messages are carefully crafted to NEVER include credentials.
//! The Tushare token travels in request bodies and headers only; no variant
//! here carries it, and upstream messages are copied from the provider's
//! `msg` field rather than from the request.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while talking to the Tushare Pro API.
///
/// These never reach the protocol layer: tool handlers turn them into
/// error-flagged tool results.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// No token was supplied with the request and none is configured.
    #[error(
        "Tushare token is required. Set the TUSHARE_TOKEN environment variable \
         or send it in the X-Tushare-Token header"
    )]
    MissingToken,

    /// The HTTP request could not be completed (connection, timeout, TLS).
    #[error("Tushare API request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The provider answered with a non-success HTTP status.
    #[error("Tushare API request failed: {status} - {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Provider message, or the canonical status reason.
        message: String,
    },

    /// The provider answered with an application-level error code.
    #[error("Tushare API error ({code}): {message}")]
    Api {
        /// Provider error code (non-zero).
        code: i64,
        /// Provider message.
        message: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("Tushare API returned an unreadable response: {0}")]
    Decode(String),
}

/// Errors raised by the tool registry itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Two tools were registered under the same name.
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),
}
