//! Query service jobs.
//!
//! SQL statements run as asynchronous jobs on the platform.  [`QueryService`]
//! submits them, fetches their status and, through the [`JobPoller`], waits
//! for completion within a bounded time.

use std::sync::Arc;

use serde_json::{Value, json};

use dataops_agent::{AgentError, Job, JobPoller, PollOutcome};

use crate::error::{AdapterError, Result};
use crate::platform::PlatformClient;

pub(crate) const QUERIES_PATH: &str = "data/foundation/query/queries";

/// A query to submit.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl QuerySpec {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            name: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sql.trim().is_empty() {
            return Err(AdapterError::InvalidParams {
                tool_name: "run_query".into(),
                reason: "`sql` is required".into(),
            });
        }
        Ok(())
    }
}

/// Submit, inspect and await query jobs.
#[derive(Debug, Clone)]
pub struct QueryService {
    client: Arc<PlatformClient>,
    poller: JobPoller,
}

impl QueryService {
    pub fn new(client: Arc<PlatformClient>, poller: JobPoller) -> Self {
        Self { client, poller }
    }

    /// Submit a query job.  Fails with [`AdapterError::InvalidParams`] when
    /// the SQL is blank, before anything is sent.
    pub async fn submit(&self, spec: &QuerySpec) -> Result<Job> {
        spec.validate()?;
        let mut body = json!({
            "dbName": format!("{}:all", self.client.sandbox()),
            "sql": spec.sql,
        });
        if let Some(name) = &spec.name {
            body["name"] = json!(name);
        }
        let job = self.client.post(QUERIES_PATH, &body).await?;
        parse_job(job)
    }

    /// Current state of a job.
    pub async fn status(&self, id: &str) -> Result<Job> {
        let job = self.client.get_item(QUERIES_PATH, id).await?;
        parse_job(job)
    }

    /// Submit and wait until the job is terminal or the poll budget is
    /// spent.  Blank SQL is an [`AgentError::Validation`].
    pub async fn run(&self, spec: &QuerySpec) -> dataops_agent::Result<PollOutcome> {
        self.poller
            .run_to_completion(
                || async { self.submit(spec).await.map_err(AgentError::from) },
                |id| async move {
                    self.status(&id).await.map_err(|e| AgentError::JobPollFailed {
                        job_id: id.clone(),
                        reason: e.to_string(),
                    })
                },
            )
            .await
    }
}

fn parse_job(value: Value) -> Result<Job> {
    serde_json::from_value(value)
        .map_err(|e| AdapterError::UnexpectedResponse(format!("query job: {e}")))
}
