//! Tool registry: the market-data tools exposed over MCP.
//!
//! Every tool is the same thing underneath: pick an upstream API (possibly by
//! a `data_source` discriminant), forward the optional string arguments the
//! tool declares, and render the returned rows as a text report. A tool is
//! therefore a [`QueryTool`] *value*; the concrete tools live in [`catalog`].
//!
//! Tool-level failures are data, not protocol errors: [`QueryTool::run`]
//! always yields a [`ToolOutcome`], and only an unknown tool name escapes
//! [`ToolRegistry::dispatch`] as an error.

pub mod catalog;
pub mod report;

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::mcp::protocol::{ToolCallResult, ToolDefinition};
use crate::tushare::{DataProvider, QueryParams};

pub use report::ReportTemplate;

/// Arguments accepted by a tool call, keyed by declared parameter name.
pub type QueryArgs = IndexMap<&'static str, String>;

/// A declared optional string parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Parameter name, forwarded unchanged to the upstream API.
    pub name: &'static str,
    /// Description shown in the tool schema.
    pub description: &'static str,
}

impl ParamSpec {
    /// Creates a parameter declaration.
    #[must_use]
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self { name, description }
    }
}

/// One allowed value of a data-source discriminant.
#[derive(Debug, Clone, Copy)]
pub struct SourceChoice {
    /// Value the client sends.
    pub value: &'static str,
    /// Label used in reports.
    pub label: &'static str,
    /// Upstream API name this value selects.
    pub api_name: &'static str,
}

/// How a tool picks its upstream API.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Always the same API.
    Fixed(&'static str),
    /// Chosen by a required enum parameter.
    BySource {
        /// Discriminant parameter name.
        param: &'static str,
        /// Description shown in the tool schema.
        description: &'static str,
        /// Allowed values.
        choices: &'static [SourceChoice],
    },
}

/// A tabular query tool.
#[derive(Debug, Clone)]
pub struct QueryTool {
    /// Unique tool name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Optional parameters forwarded to the upstream API.
    pub params: &'static [ParamSpec],
    /// Upstream API selection.
    pub endpoint: Endpoint,
    /// Maximum number of rows rendered.
    pub display_cap: usize,
    /// Report layout.
    pub report: ReportTemplate,
    /// Checklist printed with failures.
    pub hints: &'static [&'static str],
}

impl QueryTool {
    /// JSON Schema describing exactly the fields the handler reads.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            properties.insert(
                param.name.to_string(),
                json!({ "type": "string", "description": param.description }),
            );
        }

        let mut required = Vec::new();
        if let Endpoint::BySource {
            param,
            description,
            choices,
        } = &self.endpoint
        {
            let values: Vec<&str> = choices.iter().map(|c| c.value).collect();
            properties.insert(
                (*param).to_string(),
                json!({ "type": "string", "enum": values, "description": description }),
            );
            required.push(*param);
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// The `tools/list` entry for this tool.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            input_schema: self.input_schema(),
        }
    }

    /// Reads the declared parameters (and discriminant) from call arguments.
    ///
    /// Strings are taken as-is, numbers and booleans are stringified; nulls,
    /// empty strings and structured values count as absent. Undeclared
    /// arguments are ignored.
    #[must_use]
    pub fn extract_args(&self, arguments: &Value) -> QueryArgs {
        let discriminant = match &self.endpoint {
            Endpoint::BySource { param, .. } => Some(*param),
            Endpoint::Fixed(_) => None,
        };

        self.params
            .iter()
            .map(|p| p.name)
            .chain(discriminant)
            .filter_map(|name| {
                let text = match arguments.get(name)? {
                    Value::String(s) if !s.is_empty() => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((name, text))
            })
            .collect()
    }

    /// Resolves the upstream API name from the arguments.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message if the discriminant is missing or invalid.
    pub fn resolve_endpoint(
        &self,
        args: &QueryArgs,
    ) -> Result<(&'static str, Option<&'static SourceChoice>), String> {
        match self.endpoint {
            Endpoint::Fixed(api_name) => Ok((api_name, None)),
            Endpoint::BySource { param, choices, .. } => {
                let options = choices
                    .iter()
                    .map(|c| format!("'{}'", c.value))
                    .collect::<Vec<_>>()
                    .join(" 或 ");

                let Some(value) = args.get(param) else {
                    return Err(format!("数据源 {param} 是必填参数，请选择 {options}"));
                };

                choices
                    .iter()
                    .find(|c| c.value == value.as_str())
                    .map(|c| (c.api_name, Some(c)))
                    .ok_or_else(|| format!("无效的数据源，请选择 {options}"))
            }
        }
    }

    /// Upstream parameters: every provided declared field except the discriminant.
    #[must_use]
    pub fn upstream_params(&self, args: &QueryArgs) -> QueryParams {
        self.params
            .iter()
            .filter_map(|p| args.get(p.name).map(|v| (p.name.to_string(), v.clone())))
            .collect()
    }

    /// Runs the tool. Never fails: every error becomes a [`ToolOutcome::Failure`].
    pub async fn run(
        &self,
        provider: &dyn DataProvider,
        arguments: &Value,
        token: Option<&str>,
    ) -> ToolOutcome {
        let args = self.extract_args(arguments);

        let (api_name, source) = match self.resolve_endpoint(&args) {
            Ok(resolved) => resolved,
            Err(message) => return self.failure(&message),
        };

        let params = self.upstream_params(&args);
        match provider.query(token, api_name, &params).await {
            Ok(rows) => {
                tracing::debug!(tool = self.name, api = api_name, rows = rows.len(), "Tool query complete");
                ToolOutcome::Success(report::render(
                    &self.report,
                    &args,
                    source,
                    &rows,
                    self.display_cap,
                ))
            }
            Err(e) => {
                tracing::warn!(tool = self.name, api = api_name, error = %e, "Tool query failed");
                self.failure(&e.to_string())
            }
        }
    }

    fn failure(&self, message: &str) -> ToolOutcome {
        ToolOutcome::Failure(report::render_failure(message, self.hints))
    }
}

/// Result of running a tool.
///
/// Both variants serialise to the same result shape at the protocol boundary;
/// a failure only adds `isError: true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The report text.
    Success(String),
    /// Diagnostic text.
    Failure(String),
}

impl ToolOutcome {
    /// The text payload.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }

    /// Whether this is a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

impl From<ToolOutcome> for ToolCallResult {
    fn from(outcome: ToolOutcome) -> Self {
        match outcome {
            ToolOutcome::Success(text) => Self::text(text),
            ToolOutcome::Failure(text) => Self::error(text),
        }
    }
}

/// The immutable, ordered set of tools plus the provider they query.
///
/// Built once at start-up and shared by every session.
pub struct ToolRegistry {
    tools: Vec<QueryTool>,
    provider: Arc<dyn DataProvider>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.iter().map(|t| t.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// Creates a registry from `tools`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] if two tools share a name.
    pub fn new(tools: Vec<QueryTool>, provider: Arc<dyn DataProvider>) -> Result<Self, ToolError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name) {
                return Err(ToolError::DuplicateTool(tool.name.to_string()));
            }
        }
        Ok(Self { tools, provider })
    }

    /// Creates a registry with every tool in the catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue contains duplicate names.
    pub fn with_catalogue(provider: Arc<dyn DataProvider>) -> Result<Self, ToolError> {
        Self::new(catalog::TOOLS.to_vec(), provider)
    }

    /// The tools, in registration order.
    #[must_use]
    pub fn list(&self) -> &[QueryTool] {
        &self.tools
    }

    /// `tools/list` entries, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(QueryTool::definition).collect()
    }

    /// Looks a tool up by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&QueryTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Runs the named tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] if no tool has this name.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: &Value,
        token: Option<&str>,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        Ok(tool.run(self.provider.as_ref(), arguments, token).await)
    }
}
