//! Template formatter.
//!
//! Renders tool output as user-facing markdown without a language model.
//! Each known tool has its own formatter function, looked up by name; any
//! other tool gets a generic listing of its top-level scalar fields.

use std::collections::HashMap;

use serde_json::Value;

use crate::turn::{ToolOutput, ToolResult};

/// Renders the data of one tool into text.
pub type TemplateFn = fn(&Value) -> String;

/// Maximum list items shown by a template before "...and N more".
const MAX_LIST_ITEMS: usize = 10;

/// Maximum scalar fields shown by the generic template.
const MAX_GENERIC_FIELDS: usize = 5;

/// Map from tool name to formatter function.
#[derive(Clone)]
pub struct TemplateFormatter {
    templates: HashMap<String, TemplateFn>,
}

impl std::fmt::Debug for TemplateFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.templates.keys().collect();
        names.sort();
        f.debug_struct("TemplateFormatter").field("templates", &names).finish()
    }
}

impl Default for TemplateFormatter {
    fn default() -> Self {
        Self::empty()
            .with_template("get_failed_batches", failed_batches)
            .with_template("list_batches", batches)
            .with_template("get_batch", batch)
            .with_template("list_datasets", datasets)
            .with_template("get_dataset", dataset)
            .with_template("list_schemas", schemas)
            .with_template("list_sandboxes", sandboxes)
            .with_template("list_queries", queries)
            .with_template("run_query", query_job)
            .with_template("create_dataset", created_dataset)
            .with_template("delete_dataset", deleted_dataset)
    }
}

impl TemplateFormatter {
    /// A formatter with no tool-specific templates.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Builder: add or replace the template for `tool`.
    pub fn with_template(mut self, tool: impl Into<String>, template: TemplateFn) -> Self {
        self.templates.insert(tool.into(), template);
        self
    }

    /// Render one successful tool's data.
    pub fn format(&self, tool: &str, data: &Value) -> String {
        match self.templates.get(tool) {
            Some(template) => template(data),
            None => generic(tool, data),
        }
    }

    /// Render one result, success or failure.
    pub fn format_result(&self, result: &ToolResult) -> String {
        match &result.output {
            ToolOutput::Data(data) => self.format(&result.tool, data),
            ToolOutput::Error(error) => format_error(&result.tool, error),
        }
    }

    /// Render all results in order, separated by blank lines.
    pub fn format_results(&self, results: &[ToolResult]) -> String {
        results
            .iter()
            .map(|r| self.format_result(r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The single explanatory line for a failed tool.
pub fn format_error(tool: &str, error: &str) -> String {
    format!("❌ **{tool}** failed: {error}\n")
}

/// Up to five top-level scalar fields as `key: value`, or a bare success
/// line when there are none.
pub fn generic(tool: &str, data: &Value) -> String {
    let fields: Vec<String> = data
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| scalar(v).map(|s| format!("- {k}: {s}")))
                .take(MAX_GENERIC_FIELDS)
                .collect()
        })
        .unwrap_or_default();

    if fields.is_empty() {
        format!("✅ `{tool}` completed successfully.\n")
    } else {
        format!("✅ `{tool}` completed:\n{}\n", fields.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First present string-ish field among `keys`.
fn field<'a>(v: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| v.get(*k).and_then(Value::as_str))
}

fn items<'a>(data: &'a Value, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn list(header: String, items: &[Value], line: impl Fn(&Value) -> String) -> String {
    let mut out = header;
    for item in items.iter().take(MAX_LIST_ITEMS) {
        out.push_str(&line(item));
        out.push('\n');
    }
    if items.len() > MAX_LIST_ITEMS {
        out.push_str(&format!("…and {} more\n", items.len() - MAX_LIST_ITEMS));
    }
    out
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("**1** {one}")
    } else {
        format!("**{n}** {many}")
    }
}

// ---------------------------------------------------------------------------
// Tool templates
// ---------------------------------------------------------------------------

fn failed_batches(data: &Value) -> String {
    let batches = items(data, "batches");
    if batches.is_empty() {
        return "✅ **Great news!** No failed batches found. Your ingestion is running smoothly!\n"
            .to_owned();
    }
    list(
        format!(
            "⚠️ Found {}:\n\n",
            plural(batches.len(), "failed batch", "failed batches")
        ),
        batches,
        |b| {
            let id = field(b, &["id", "batchId"]).unwrap_or("unknown");
            let dataset = field(b, &["datasetId", "dataSetId"]).unwrap_or("unknown dataset");
            let reason = b
                .get("errors")
                .and_then(Value::as_array)
                .and_then(|errs| errs.first())
                .and_then(|e| field(e, &["description", "message", "code"]))
                .unwrap_or("no error details");
            format!("- `{id}` (dataset `{dataset}`): {reason}")
        },
    )
}

fn batches(data: &Value) -> String {
    let batches = items(data, "batches");
    if batches.is_empty() {
        return "📭 No batches found.\n".to_owned();
    }
    list(
        format!("📦 Found {}:\n\n", plural(batches.len(), "batch", "batches")),
        batches,
        |b| {
            let id = field(b, &["id", "batchId"]).unwrap_or("unknown");
            let status = field(b, &["status"]).unwrap_or("unknown");
            format!("- `{id}`: **{status}**")
        },
    )
}

fn batch(data: &Value) -> String {
    let id = field(data, &["id", "batchId"]).unwrap_or("unknown");
    let status = field(data, &["status"]).unwrap_or("unknown");
    let mut out = format!("📦 Batch `{id}` is **{status}**.\n");
    if let Some(metrics) = data.get("metrics") {
        let read = metrics.get("inputRecordCount").and_then(scalar);
        let written = metrics.get("outputRecordCount").and_then(scalar);
        if let (Some(read), Some(written)) = (read, written) {
            out.push_str(&format!("Records read: {read}, written: {written}\n"));
        }
    }
    out
}

fn datasets(data: &Value) -> String {
    let datasets = items(data, "datasets");
    if datasets.is_empty() {
        return "📭 No datasets found.\n".to_owned();
    }
    list(
        format!("📊 Found {}:\n\n", plural(datasets.len(), "dataset", "datasets")),
        datasets,
        |d| {
            let name = field(d, &["name", "title"]).unwrap_or("(unnamed)");
            let id = field(d, &["id"]).unwrap_or("unknown");
            format!("- **{name}** (`{id}`)")
        },
    )
}

fn dataset(data: &Value) -> String {
    let name = field(data, &["name", "title"]).unwrap_or("(unnamed)");
    let id = field(data, &["id"]).unwrap_or("unknown");
    let mut out = format!("📊 Dataset **{name}** (`{id}`)\n");
    if let Some(description) = field(data, &["description"]) {
        out.push_str(&format!("{description}\n"));
    }
    if let Some(schema) = data
        .get("schemaRef")
        .and_then(|s| field(s, &["id"]))
        .or_else(|| field(data, &["schema"]))
    {
        out.push_str(&format!("Schema: `{schema}`\n"));
    }
    out
}

fn schemas(data: &Value) -> String {
    let schemas = items(data, "schemas");
    if schemas.is_empty() {
        return "📭 No schemas found.\n".to_owned();
    }
    list(
        format!("🧩 Found {}:\n\n", plural(schemas.len(), "schema", "schemas")),
        schemas,
        |s| {
            let title = field(s, &["title", "name"]).unwrap_or("(untitled)");
            let id = field(s, &["$id", "id"]).unwrap_or("unknown");
            format!("- **{title}** (`{id}`)")
        },
    )
}

fn sandboxes(data: &Value) -> String {
    let sandboxes = items(data, "sandboxes");
    if sandboxes.is_empty() {
        return "📭 No sandboxes found.\n".to_owned();
    }
    list(
        format!("🏖️ Found {}:\n\n", plural(sandboxes.len(), "sandbox", "sandboxes")),
        sandboxes,
        |s| {
            let name = field(s, &["name"]).unwrap_or("unknown");
            let kind = field(s, &["type"]).unwrap_or("unknown");
            let state = field(s, &["state"]).unwrap_or("unknown");
            format!("- **{name}** ({kind}, {state})")
        },
    )
}

fn queries(data: &Value) -> String {
    let queries = items(data, "queries");
    if queries.is_empty() {
        return "📭 No recent queries found.\n".to_owned();
    }
    list(
        format!("🔎 Found {}:\n\n", plural(queries.len(), "query", "queries")),
        queries,
        |q| {
            let id = field(q, &["id"]).unwrap_or("unknown");
            let state = field(q, &["state"]).unwrap_or("UNKNOWN");
            format!("- `{id}`: **{state}**")
        },
    )
}

fn query_job(data: &Value) -> String {
    let id = field(data, &["id"]).unwrap_or("unknown");
    let state = field(data, &["state"]).unwrap_or("UNKNOWN");
    if data.get("polling").and_then(Value::as_bool).unwrap_or(false) {
        return format!(
            "⏳ Query `{id}` is still running (state **{state}**). Check back later for results.\n"
        );
    }
    match state {
        "SUCCESS" => {
            let mut out = format!("✅ Query `{id}` finished successfully.\n");
            if let Some(rows) = data.get("rowCount").and_then(scalar) {
                out.push_str(&format!("Rows: {rows}\n"));
            }
            out
        }
        other => {
            let reason = data
                .get("errors")
                .and_then(Value::as_array)
                .and_then(|errs| errs.first())
                .and_then(|e| field(e, &["message", "code"]))
                .unwrap_or("no error details");
            format!("❌ Query `{id}` ended in state **{other}**: {reason}\n")
        }
    }
}

fn created_dataset(data: &Value) -> String {
    let id = field(data, &["id"])
        .or_else(|| data.get(0).and_then(Value::as_str))
        .unwrap_or("unknown");
    format!("✅ Dataset created: `{id}`\n")
}

fn deleted_dataset(data: &Value) -> String {
    let id = field(data, &["datasetId", "id"]).unwrap_or("unknown");
    format!("🗑️ Dataset `{id}` deleted.\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_failed_batches_message() {
        let f = TemplateFormatter::default();
        assert_eq!(
            f.format("get_failed_batches", &json!({"batches": []})),
            "✅ **Great news!** No failed batches found. Your ingestion is running smoothly!\n"
        );
    }

    #[test]
    fn failed_batches_list_first_error() {
        let f = TemplateFormatter::default();
        let out = f.format(
            "get_failed_batches",
            &json!({"batches": [{
                "id": "b1",
                "datasetId": "ds1",
                "errors": [{"code": "INGEST-1", "description": "schema mismatch"}]
            }]}),
        );
        assert!(out.starts_with("⚠️ Found **1** failed batch:\n\n"));
        assert!(out.contains("- `b1` (dataset `ds1`): schema mismatch\n"));
    }

    #[test]
    fn long_lists_are_capped() {
        let f = TemplateFormatter::default();
        let datasets: Vec<_> = (0..13).map(|i| json!({"id": format!("d{i}"), "name": "n"})).collect();
        let out = f.format("list_datasets", &json!({"datasets": datasets}));
        assert!(out.contains("**13** datasets"));
        assert!(out.contains("- **n** (`d9`)"));
        assert!(!out.contains("`d10`"));
        assert!(out.ends_with("…and 3 more\n"));
    }

    #[test]
    fn generic_lists_at_most_five_scalars() {
        let out = generic(
            "custom_tool",
            &json!({"a": 1, "b": "two", "c": true, "nested": {"x": 1}, "d": 4, "e": 5, "f": 6}),
        );
        assert!(out.starts_with("✅ `custom_tool` completed:\n"));
        assert_eq!(out.lines().filter(|l| l.starts_with("- ")).count(), 5);
        assert!(!out.contains("nested"));
    }

    #[test]
    fn generic_without_scalars_is_bare_success() {
        assert_eq!(
            generic("t", &json!({"items": [1, 2]})),
            "✅ `t` completed successfully.\n"
        );
        assert_eq!(generic("t", &json!([1, 2])), "✅ `t` completed successfully.\n");
    }

    #[test]
    fn errors_render_one_line_and_do_not_hide_other_results() {
        let f = TemplateFormatter::default();
        let out = f.format_results(&[
            ToolResult::error("get_batch", "404 not found"),
            ToolResult::data("list_batches", json!({"batches": [{"id": "b1", "status": "success"}]})),
        ]);
        assert!(out.starts_with("❌ **get_batch** failed: 404 not found\n\n"));
        assert!(out.contains("- `b1`: **success**"));
    }

    #[test]
    fn query_job_still_running() {
        let f = TemplateFormatter::default();
        let out = f.format(
            "run_query",
            &json!({"id": "q1", "state": "IN_PROGRESS", "polling": true, "message": "x"}),
        );
        assert!(out.starts_with("⏳ Query `q1` is still running"));
    }

    #[test]
    fn custom_template_overrides_builtin() {
        fn short(_: &Value) -> String {
            "short\n".into()
        }
        let f = TemplateFormatter::default().with_template("list_batches", short);
        assert_eq!(f.format("list_batches", &json!({})), "short\n");
    }
}
