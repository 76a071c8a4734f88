//! Model Context Protocol (MCP) server implementation.
//!
//! Exposes the tool registry to MCP clients as JSON-RPC 2.0 over two
//! transports: newline-delimited stdio and streamable HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐                                            │
//! │   │   stdio     │──────────────┐                             │
//! │   │ (McpServer) │              ▼                             │
//! │   └─────────────┘       ┌─────────────┐    ┌─────────────┐   │
//! │                         │   Engine    │───▶│   Tools     │   │
//! │   ┌─────────────┐       │ (lifecycle) │    │ (registry)  │   │
//! │   │    HTTP     │──────▶└─────────────┘    └─────────────┘   │
//! │   │ (sessions)  │       one per session           │          │
//! │   └─────────────┘                                 ▼          │
//! │                                            ┌─────────────┐   │
//! │                                            │   Tushare   │   │
//! │                                            └─────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! The server default is 2024-11-05; 2025-03-26 is accepted when requested.

pub mod engine;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use engine::{EngineState, McpEngine};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::{shutdown_signal, McpServer};
pub use session::{Dispatched, Session, SessionPolicy, SessionStore};
pub use transport::{LineTransport, StdioTransport};
