//! Bounded asynchronous job poller.
//!
//! Drives any "submit, then poll until terminal" remote operation.  The
//! poller never waits longer than `timeout + poll_interval` after
//! submission: sleeps are clipped to the remaining budget and every status
//! fetch runs under a hard deadline.  When the budget runs out the last
//! known job is returned as [`PollOutcome::StillRunning`]; a timeout is not
//! an error.
//!
//! Dropping the returned future cancels the wait.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::error::Result;

/// Message attached to a job that outlived the poll budget.
pub const STILL_RUNNING_MESSAGE: &str = "Job is still running. Check back later for results.";

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Remote job state, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Submitted,
    InProgress,
    Pending,
    Success,
    Failed,
    Killed,
    Error,
    /// Any state string this crate does not know, kept verbatim.
    Other(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "SUBMITTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
            Self::Error => "ERROR",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SUBMITTED" => Self::Submitted,
            "IN_PROGRESS" => Self::InProgress,
            "PENDING" => Self::Pending,
            "SUCCESS" => Self::Success,
            "FAILED" => Self::Failed,
            "KILLED" => Self::Killed,
            "ERROR" => Self::Error,
            _ => Self::Other(s),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote job.  Fields the poller does not interpret are kept in `extra`
/// and serialized back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    pub fn new(id: impl Into<String>, state: JobState) -> Self {
        Self {
            id: id.into(),
            state,
            submitted_at: None,
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of [`JobPoller::run_to_completion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PollOutcome {
    /// Budget exhausted; serializes as `{...job, message, polling: true}`.
    StillRunning {
        #[serde(flatten)]
        job: Job,
        message: String,
        polling: bool,
    },
    /// The job reached a terminal state.
    Completed(Job),
}

impl PollOutcome {
    fn still_running(job: Job) -> Self {
        Self::StillRunning {
            job,
            message: STILL_RUNNING_MESSAGE.to_owned(),
            polling: true,
        }
    }

    pub fn job(&self) -> &Job {
        match self {
            Self::Completed(job) | Self::StillRunning { job, .. } => job,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Poll cadence and budget.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// States that keep the poller waiting.
    pub non_terminal: HashSet<JobState>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            timeout: Duration::from_millis(30_000),
            non_terminal: [JobState::Submitted, JobState::InProgress, JobState::Pending]
                .into_iter()
                .collect(),
        }
    }
}

impl PollerConfig {
    /// Default states with a custom cadence.
    pub fn with_timing(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
            ..Self::default()
        }
    }

    pub fn is_terminal(&self, state: &JobState) -> bool {
        !self.non_terminal.contains(state)
    }
}

/// Submit-then-poll driver.
#[derive(Debug, Clone, Default)]
pub struct JobPoller {
    config: PollerConfig,
}

impl JobPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Submit once, then poll `fetch_status` until the job is terminal or
    /// the budget is spent.  The budget starts once `submit` returns, so
    /// polling never outlasts `timeout + poll_interval` after submission.
    ///
    /// # Errors
    ///
    /// Errors from `submit` or `fetch_status` are returned as is.
    pub async fn run_to_completion<S, SF, F, FF>(
        &self,
        submit: S,
        mut fetch_status: F,
    ) -> Result<PollOutcome>
    where
        S: FnOnce() -> SF,
        SF: Future<Output = Result<Job>>,
        F: FnMut(String) -> FF,
        FF: Future<Output = Result<Job>>,
    {
        let mut job = submit().await?;
        tracing::debug!(job_id = %job.id, state = %job.state, "job submitted");

        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let hard_deadline = deadline + self.config.poll_interval;

        let mut polls = 0u32;
        loop {
            if self.config.is_terminal(&job.state) {
                tracing::info!(
                    job_id = %job.id,
                    state = %job.state,
                    polls,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job finished"
                );
                return Ok(PollOutcome::Completed(job));
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;

            match tokio::time::timeout_at(hard_deadline, fetch_status(job.id.clone())).await {
                Ok(fetched) => job = fetched?,
                Err(_) => {
                    tracing::warn!(job_id = %job.id, "status fetch exceeded poll budget");
                    break;
                }
            }
            polls += 1;
            tracing::debug!(job_id = %job.id, state = %job.state, polls, "job polled");
        }

        tracing::info!(
            job_id = %job.id,
            state = %job.state,
            polls,
            "job still running after poll budget"
        );
        Ok(PollOutcome::still_running(job))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::AgentError;

    fn job(state: &str) -> Job {
        serde_json::from_value(json!({"id": "q1", "state": state})).unwrap()
    }

    #[test]
    fn state_strings_round_trip_verbatim() {
        let j: Job = serde_json::from_value(json!({
            "id": "q1",
            "state": "QUEUED_UPSTREAM",
            "submittedAt": "2024-05-01T10:00:00Z",
            "sql": "SELECT 1"
        }))
        .unwrap();
        assert_eq!(j.state, JobState::Other("QUEUED_UPSTREAM".into()));
        assert_eq!(j.extra["sql"], "SELECT 1");
        let back = serde_json::to_value(&j).unwrap();
        assert_eq!(back["state"], "QUEUED_UPSTREAM");
        assert_eq!(back["submittedAt"], "2024-05-01T10:00:00Z");
        assert_eq!(back["sql"], "SELECT 1");

        assert_eq!(job("IN_PROGRESS").state, JobState::InProgress);
    }

    #[test]
    fn still_running_serializes_flat() {
        let v = serde_json::to_value(PollOutcome::still_running(job("PENDING"))).unwrap();
        assert_eq!(
            v,
            json!({"id": "q1", "state": "PENDING", "message": STILL_RUNNING_MESSAGE, "polling": true})
        );
        let completed = serde_json::to_value(PollOutcome::Completed(job("SUCCESS"))).unwrap();
        assert_eq!(completed, json!({"id": "q1", "state": "SUCCESS"}));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_on_submit_returns_without_sleeping() {
        let poller = JobPoller::default();
        let fetches = AtomicU32::new(0);
        let started = Instant::now();

        let outcome = poller
            .run_to_completion(
                || async { Ok(job("SUCCESS")) },
                |_id| {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    async { Ok(job("SUCCESS")) }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::Completed(job("SUCCESS")));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_as_soon_as_job_finishes() {
        let poller = JobPoller::default();
        let fetches = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = Arc::clone(&fetches);
        let outcome = poller
            .run_to_completion(
                || async { Ok(job("SUBMITTED")) },
                move |id| {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        assert_eq!(id, "q1");
                        Ok(job(if n < 3 { "IN_PROGRESS" } else { "SUCCESS" }))
                    }
                },
            )
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn never_terminal_job_is_returned_within_budget() {
        let poller = JobPoller::default();
        let started = Instant::now();

        let outcome = poller
            .run_to_completion(|| async { Ok(job("PENDING")) }, |_id| async {
                Ok(job("IN_PROGRESS"))
            })
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(30_000));
        assert!(elapsed <= Duration::from_millis(32_000));
        match outcome {
            PollOutcome::StillRunning { job, polling, .. } => {
                assert!(polling);
                assert_eq!(job.state, JobState::InProgress);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_fetch_is_cut_at_hard_deadline() {
        let poller = JobPoller::default();
        let started = Instant::now();

        let outcome = poller
            .run_to_completion(|| async { Ok(job("SUBMITTED")) }, |_id| {
                std::future::pending::<Result<Job>>()
            })
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.job().state, JobState::Submitted);
        assert_eq!(started.elapsed(), Duration::from_millis(32_000));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_submit_does_not_eat_the_budget() {
        let poller = JobPoller::default();
        let started = Instant::now();

        let outcome = poller
            .run_to_completion(
                || async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(job("SUBMITTED"))
                },
                |_id| std::future::pending::<Result<Job>>(),
            )
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(started.elapsed(), Duration::from_millis(10_000 + 32_000));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_states_and_timing() {
        let mut config = PollerConfig::with_timing(Duration::from_millis(100), Duration::from_millis(250));
        config.non_terminal.insert(JobState::Other("QUEUED".into()));
        let poller = JobPoller::new(config);

        let outcome = poller
            .run_to_completion(|| async { Ok(job("QUEUED")) }, |_id| async { Ok(job("QUEUED")) })
            .await
            .unwrap();
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let poller = JobPoller::new(PollerConfig::with_timing(
            Duration::from_millis(1),
            Duration::from_millis(50),
        ));
        let err = poller
            .run_to_completion(|| async { Ok(job("SUBMITTED")) }, |id| async move {
                Err(AgentError::JobPollFailed {
                    job_id: id,
                    reason: "502".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::JobPollFailed { .. }));
    }
}
