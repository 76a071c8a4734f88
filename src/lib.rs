//! finance-mcp: MCP server for Tushare market data
//!
//! This library exposes Chinese A-share capital-flow, sector-index and
//! sector-membership data from the Tushare Pro API as MCP tools.
//!
//! # Architecture
//!
//! - **Tools**: nine query tools, each forwarding optional string parameters
//!   to one upstream API and rendering the rows as a text report
//! - **Upstream**: one HTTP JSON endpoint answering in a columnar shape
//! - **Transports**: newline-delimited stdio, or streamable HTTP with
//!   per-client sessions and per-request tokens
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`http`]: Streamable-HTTP transport and session routing
//! - [`mcp`]: MCP protocol implementation
//! - [`tools`]: Tool catalogue and report rendering
//! - [`tushare`]: Upstream data provider

pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod tools;
pub mod tushare;
