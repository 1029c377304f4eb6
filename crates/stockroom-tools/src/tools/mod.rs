//! Catalog tools and the registry agents call them through
//!
//! Each tool declares its parameters as [`ToolParam`]s. The registry derives
//! the JSON schema it advertises from them and checks every call against the
//! same list before the tool runs, so handlers only see well-formed input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod products;

/// Description of a tool as handed to an agent runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Accepted values for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any non-empty string
    Text,
    /// One of a fixed set of strings
    OneOf(&'static [&'static str]),
}

/// A named input parameter of a catalog tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ToolParam {
    pub fn required_text(name: &'static str, description: &'static str) -> Self {
        Self { name, description, kind: ParamKind::Text, required: true }
    }

    pub fn optional_choice(
        name: &'static str,
        description: &'static str,
        choices: &'static [&'static str],
    ) -> Self {
        Self { name, description, kind: ParamKind::OneOf(choices), required: false }
    }

    fn schema(&self) -> Value {
        match self.kind {
            ParamKind::Text => json!({
                "type": "string",
                "minLength": 1,
                "description": self.description,
            }),
            ParamKind::OneOf(choices) => json!({
                "type": "string",
                "enum": choices,
                "description": self.description,
            }),
        }
    }

    fn check(&self, value: &Value) -> std::result::Result<(), String> {
        let Some(s) = value.as_str() else {
            return Err(format!("'{}' must be a string", self.name));
        };
        match self.kind {
            ParamKind::Text if s.trim().is_empty() => {
                Err(format!("'{}' must not be empty", self.name))
            }
            ParamKind::OneOf(choices) if !choices.contains(&s) => Err(format!(
                "'{}' must be one of {}, got '{}'",
                self.name,
                choices.join(", "),
                s
            )),
            _ => Ok(()),
        }
    }
}

/// A catalog operation an agent can invoke by name
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    fn params(&self) -> Vec<ToolParam> {
        Vec::new()
    }

    async fn execute(&self, input: Value) -> Result<String>;
}

/// JSON schema for a parameter list. Unknown properties are not allowed.
pub fn input_schema(params: &[ToolParam]) -> Value {
    let properties: Map<String, Value> = params
        .iter()
        .map(|p| (p.name.to_string(), p.schema()))
        .collect();
    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Check `input` against `params`. A JSON `null` counts as no arguments.
pub fn check_input(params: &[ToolParam], input: &Value) -> std::result::Result<(), String> {
    let empty = Map::new();
    let args = match input {
        Value::Null => &empty,
        Value::Object(map) => map,
        other => return Err(format!("expected a JSON object, got {}", other)),
    };

    if let Some(unknown) = args.keys().find(|k| !params.iter().any(|p| p.name == k.as_str())) {
        return Err(format!("unknown parameter '{}'", unknown));
    }

    for param in params {
        match args.get(param.name) {
            Some(value) => param.check(value)?,
            None if param.required => {
                return Err(format!("missing required parameter '{}'", param.name));
            }
            None => {}
        }
    }
    Ok(())
}

/// Why a tool call did not produce output
#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid input for {tool}: {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Catalog tools keyed by name, listed in name order
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A later tool with the same name replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        debug!("Registering catalog tool: {}", handler.name());
        if self.tools.insert(handler.name(), handler).is_some() {
            warn!("Replaced an already registered catalog tool");
        }
    }

    /// Definitions of every registered tool
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|handler| ToolDefinition {
                name: handler.name().to_string(),
                description: handler.description().to_string(),
                input_schema: input_schema(&handler.params()),
            })
            .collect()
    }

    /// Validate `input` for the named tool and run it
    pub async fn call(&self, tool_name: &str, input: Value) -> std::result::Result<String, ToolCallError> {
        let handler = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolCallError::UnknownTool(tool_name.to_string()))?;

        if let Err(reason) = check_input(&handler.params(), &input) {
            warn!("Rejected call to {}: {}", tool_name, reason);
            return Err(ToolCallError::InvalidInput {
                tool: tool_name.to_string(),
                reason,
            });
        }

        debug!("Calling catalog tool {} with {}", tool_name, input);
        handler.execute(input).await.map_err(|e| {
            warn!("Catalog tool {} failed: {:#}", tool_name, e);
            ToolCallError::Failed(e)
        })
    }
}
