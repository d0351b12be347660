//! Platform tools.
//!
//! [`PlatformTools`] is the executor behind every copilot tool.  Each tool
//! makes one platform call and reshapes the response into the plain data
//! the templates and the summarizer expect (`{"datasets": [...]}`,
//! `{"batches": [...]}` and so on).
//!
//! | Tool | Approval |
//! |------|----------|
//! | `list_datasets`, `get_dataset` | no |
//! | `list_batches`, `get_failed_batches`, `get_batch` | no |
//! | `list_schemas`, `list_sandboxes`, `list_queries` | no |
//! | `run_query`, `create_dataset`, `delete_dataset` | yes |

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::info;

use dataops_agent::{AgentError, ToolDefinition, ToolExecutor, ToolRegistry};

use crate::error::{AdapterError, Result};
use crate::platform::PlatformClient;
use crate::query::{QueryService, QuerySpec, QUERIES_PATH};

const DATASETS_PATH: &str = "data/foundation/catalog/dataSets";
const BATCHES_PATH: &str = "data/foundation/catalog/batches";
const SCHEMAS_PATH: &str = "data/foundation/schemaregistry/tenant/schemas";
const SANDBOXES_PATH: &str = "data/foundation/sandbox-management/sandboxes";

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 100;

/// Executor for all platform tools.
#[derive(Debug, Clone)]
pub struct PlatformTools {
    client: Arc<PlatformClient>,
    queries: QueryService,
}

impl PlatformTools {
    pub fn new(client: Arc<PlatformClient>, queries: QueryService) -> Self {
        Self { client, queries }
    }

    /// Definitions for every tool this executor serves.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "list_datasets",
                "List datasets in the current sandbox",
                limit_schema(),
            ),
            ToolDefinition::new(
                "get_dataset",
                "Get details of one dataset",
                id_schema("datasetId", "Dataset ID"),
            ),
            ToolDefinition::new(
                "list_batches",
                "List recent ingestion batches, newest first",
                limit_schema(),
            ),
            ToolDefinition::new(
                "get_failed_batches",
                "List recent ingestion batches that failed, with their errors",
                limit_schema(),
            ),
            ToolDefinition::new(
                "get_batch",
                "Get status and metrics of one ingestion batch",
                id_schema("batchId", "Batch ID"),
            ),
            ToolDefinition::new("list_schemas", "List tenant schemas", limit_schema()),
            ToolDefinition::new(
                "list_sandboxes",
                "List sandboxes available to the organization",
                json!({"type": "object", "properties": {}}),
            ),
            ToolDefinition::new(
                "list_queries",
                "List recent query service jobs",
                limit_schema(),
            ),
            ToolDefinition::new(
                "run_query",
                "Run a SQL query against the data lake and wait briefly for the result",
                json!({
                    "type": "object",
                    "properties": {
                        "sql": {"type": "string", "description": "SQL statement"},
                        "name": {"type": "string", "description": "Optional job name"}
                    },
                    "required": ["sql"]
                }),
            )
            .with_approval(),
            ToolDefinition::new(
                "create_dataset",
                "Create a dataset bound to an existing schema",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "schemaId": {"type": "string", "description": "Schema $id"},
                        "description": {"type": "string"}
                    },
                    "required": ["name", "schemaId"]
                }),
            )
            .with_approval(),
            ToolDefinition::new(
                "delete_dataset",
                "Delete a dataset and its data",
                id_schema("datasetId", "Dataset ID"),
            )
            .with_approval(),
        ]
    }

    /// A registry with every platform tool bound to `tools`.
    pub fn registry(tools: Arc<Self>) -> dataops_agent::Result<ToolRegistry> {
        ToolRegistry::builder()
            .register_all(Self::definitions(), tools)
            .build()
    }

    async fn dispatch(&self, tool_name: &str, args: &Value) -> Result<Value> {
        match tool_name {
            "list_datasets" => self.tool_list_datasets(args).await,
            "get_dataset" => self.tool_get_dataset(args).await,
            "list_batches" => self.tool_list_batches(args, false).await,
            "get_failed_batches" => self.tool_list_batches(args, true).await,
            "get_batch" => self.tool_get_batch(args).await,
            "list_schemas" => self.tool_list_schemas(args).await,
            "list_sandboxes" => self.tool_list_sandboxes().await,
            "list_queries" => self.tool_list_queries(args).await,
            "create_dataset" => self.tool_create_dataset(args).await,
            "delete_dataset" => self.tool_delete_dataset(args).await,
            _ => Err(AdapterError::ToolNotFound {
                tool_name: tool_name.to_owned(),
            }),
        }
    }

    // -- Catalog -------------------------------------------------------------

    async fn tool_list_datasets(&self, args: &Value) -> Result<Value> {
        let query = [("limit", limit(args).to_string())];
        let raw = self.client.get(DATASETS_PATH, &query).await?;
        Ok(json!({"datasets": keyed_to_list(raw)}))
    }

    async fn tool_get_dataset(&self, args: &Value) -> Result<Value> {
        let id = required_str(args, "datasetId", "get_dataset")?;
        let raw = self.client.get_item(DATASETS_PATH, id).await?;
        single_entry(raw, id)
    }

    async fn tool_list_batches(&self, args: &Value, failed_only: bool) -> Result<Value> {
        let mut query = vec![
            ("limit", limit(args).to_string()),
            ("orderBy", "desc:created".to_owned()),
        ];
        if failed_only {
            query.push(("status", "failed".to_owned()));
        }
        let raw = self.client.get(BATCHES_PATH, &query).await?;
        Ok(json!({"batches": keyed_to_list(raw)}))
    }

    async fn tool_get_batch(&self, args: &Value) -> Result<Value> {
        let id = required_str(args, "batchId", "get_batch")?;
        let raw = self.client.get_item(BATCHES_PATH, id).await?;
        single_entry(raw, id)
    }

    async fn tool_create_dataset(&self, args: &Value) -> Result<Value> {
        let name = required_str(args, "name", "create_dataset")?;
        let schema_id = required_str(args, "schemaId", "create_dataset")?;
        let mut body = json!({
            "name": name,
            "schemaRef": {
                "id": schema_id,
                "contentType": "application/vnd.adobe.xed+json;version=1"
            }
        });
        if let Some(description) = args.get("description").and_then(Value::as_str) {
            body["description"] = json!(description);
        }

        let raw = self.client.post(DATASETS_PATH, &body).await?;
        // The catalog answers with `["@/dataSets/<id>"]`.
        let id = raw
            .as_array()
            .and_then(|refs| refs.first())
            .and_then(Value::as_str)
            .map(|r| r.rsplit('/').next().unwrap_or(r).to_owned())
            .or_else(|| raw.get("id").and_then(Value::as_str).map(str::to_owned))
            .ok_or_else(|| AdapterError::UnexpectedResponse(format!("create dataset: {raw}")))?;

        info!(dataset_id = %id, name, "dataset created");
        Ok(json!({"id": id, "name": name}))
    }

    async fn tool_delete_dataset(&self, args: &Value) -> Result<Value> {
        let id = required_str(args, "datasetId", "delete_dataset")?;
        self.client.delete_item(DATASETS_PATH, id).await?;
        info!(dataset_id = %id, "dataset deleted");
        Ok(json!({"datasetId": id, "deleted": true}))
    }

    // -- Schemas and sandboxes -----------------------------------------------

    async fn tool_list_schemas(&self, args: &Value) -> Result<Value> {
        let query = [("limit", limit(args).to_string())];
        let raw = self.client.get(SCHEMAS_PATH, &query).await?;
        Ok(json!({"schemas": list_field(&raw, &["results", "schemas"])}))
    }

    async fn tool_list_sandboxes(&self) -> Result<Value> {
        let raw = self.client.get(SANDBOXES_PATH, &[]).await?;
        Ok(json!({"sandboxes": list_field(&raw, &["sandboxes"])}))
    }

    // -- Queries -------------------------------------------------------------

    async fn tool_list_queries(&self, args: &Value) -> Result<Value> {
        let query = [
            ("limit", limit(args).to_string()),
            ("orderby", "-created".to_owned()),
        ];
        let raw = self.client.get(QUERIES_PATH, &query).await?;
        Ok(json!({"queries": list_field(&raw, &["queries"])}))
    }

    /// Query failures keep their class: blank SQL stays a validation error
    /// and a failed status fetch stays a poll failure.
    async fn tool_run_query(&self, args: &Value) -> dataops_agent::Result<Value> {
        let spec = QuerySpec {
            sql: args
                .get("sql")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            name: args.get("name").and_then(Value::as_str).map(str::to_owned),
        };
        let outcome = self.queries.run(&spec).await.map_err(|e| match e {
            AgentError::ToolExecution { reason, .. } => AgentError::ToolExecution {
                tool_name: "run_query".into(),
                reason,
            },
            other => other,
        })?;
        Ok(serde_json::to_value(outcome)?)
    }
}

#[async_trait]
impl ToolExecutor for PlatformTools {
    async fn execute(&self, tool_name: &str, arguments: Value) -> dataops_agent::Result<Value> {
        if tool_name == "run_query" {
            return self.tool_run_query(&arguments).await;
        }
        self.dispatch(tool_name, &arguments)
            .await
            .map_err(|e| e.into_tool_error(tool_name))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn limit_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "limit": {
                "type": "integer",
                "description": "Maximum number of items to return",
                "default": DEFAULT_LIMIT
            }
        }
    })
}

fn id_schema(key: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {key: {"type": "string", "description": description}},
        "required": [key]
    })
}

/// `limit` argument clamped to `1..=100`, defaulting to 10.
fn limit(args: &Value) -> u64 {
    args.get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT)
}

fn required_str<'a>(args: &'a Value, key: &str, tool_name: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AdapterError::InvalidParams {
            tool_name: tool_name.to_owned(),
            reason: format!("missing required string field `{key}`"),
        })
}

/// Catalog responses are objects keyed by id; turn them into a list with the
/// id folded into each entry.  Arrays pass through.
fn keyed_to_list(raw: Value) -> Vec<Value> {
    match raw {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .map(|(id, entry)| with_id(entry, &id))
            .collect(),
        _ => Vec::new(),
    }
}

fn single_entry(raw: Value, id: &str) -> Result<Value> {
    match raw {
        Value::Object(mut map) if map.contains_key(id) => {
            Ok(with_id(map.remove(id).unwrap_or_default(), id))
        }
        Value::Object(map) if map.contains_key("id") => Ok(Value::Object(map)),
        other => Err(AdapterError::UnexpectedResponse(format!(
            "entry `{id}` missing from {other}"
        ))),
    }
}

fn with_id(entry: Value, id: &str) -> Value {
    match entry {
        Value::Object(mut fields) => {
            fields
                .entry("id")
                .or_insert_with(|| Value::String(id.to_owned()));
            Value::Object(fields)
        }
        other => {
            let mut fields = Map::new();
            fields.insert("id".into(), Value::String(id.to_owned()));
            fields.insert("value".into(), other);
            Value::Object(fields)
        }
    }
}

fn list_field(raw: &Value, keys: &[&str]) -> Vec<Value> {
    if let Some(items) = raw.as_array() {
        return items.clone();
    }
    keys.iter()
        .find_map(|k| raw.get(*k).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default()
}
