//! Asynchronous job polling for the CloudStack driver.
//!
//! Most mutating CloudStack commands return a `jobid` immediately; the real
//! outcome is observed by polling `queryAsyncJobResult` until the job leaves
//! the in-progress state or the configured wait budget runs out.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::sleep;

use crate::provider::ApiParams;

use super::{CloudStackError, CloudStackIaas};

/// Default poll budget, in seconds, when `wait-timeout` is not configured.
pub(crate) const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;

/// Terminal classification of an asynchronous job.
///
/// The wire encoding is a small integer: 0 in progress, 1 succeeded,
/// 2 failed. Unknown codes are treated as terminal success, matching the
/// behaviour the production fixtures exercise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobStatus {
    /// The job has not reached a terminal state yet.
    InProgress,
    /// The job finished and its result payload is available.
    Succeeded,
    /// The job finished unsuccessfully; `jobresult` describes why.
    Failed,
}

impl JobStatus {
    /// Maps the wire integer onto a classification.
    #[must_use]
    pub const fn from_wire(code: i64) -> Self {
        match code {
            0 => Self::InProgress,
            2 => Self::Failed,
            _ => Self::Succeeded,
        }
    }
}

/// Envelope for `queryAsyncJobResult`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryAsyncJobResultResponse {
    /// Payload under `queryasyncjobresultresponse`.
    #[serde(rename = "queryasyncjobresultresponse", default)]
    pub job: AsyncJobRecord,
}

/// One observation of an asynchronous job.
#[derive(Debug, Default, Deserialize)]
pub struct AsyncJobRecord {
    /// Wire status code; see [`JobStatus::from_wire`].
    #[serde(default)]
    pub jobstatus: i64,
    /// Opaque result payload, carried verbatim into failure messages.
    #[serde(default)]
    pub jobresult: serde_json::Value,
    /// Server-reported type of the result payload.
    #[serde(default)]
    pub jobresulttype: String,
    /// Server-side result code.
    #[serde(default)]
    pub jobresultcode: i64,
}

impl AsyncJobRecord {
    /// Classifies the record's status field.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        JobStatus::from_wire(self.jobstatus)
    }

    /// Coerces the raw `jobresult` payload to human-readable text.
    #[must_use]
    pub fn result_text(&self) -> String {
        match &self.jobresult {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl CloudStackIaas {
    /// Polls `job_id` to a terminal outcome within the configured budget.
    ///
    /// One poll is issued per second of `wait-timeout` (default 300); the
    /// cadence between polls is fixed at one second. The sleep races the
    /// driver's shutdown token, so a stopping process never waits more than
    /// one cadence tick.
    ///
    /// # Errors
    ///
    /// Returns [`CloudStackError::JobFailed`] when the job reaches the
    /// failed state, [`CloudStackError::JobTimeout`] when the budget runs
    /// out, [`CloudStackError::Canceled`] on shutdown, and any transport or
    /// protocol error from the underlying polls unchanged.
    pub async fn wait_for_async_job(
        &self,
        job_id: &str,
    ) -> Result<AsyncJobRecord, CloudStackError> {
        let budget_secs = self.wait_timeout_secs();
        let mut remaining = budget_secs;
        let mut params = ApiParams::new();
        params.insert(String::from("jobid"), job_id.to_owned());

        loop {
            let response: QueryAsyncJobResultResponse =
                self.api_request("queryAsyncJobResult", &params).await?;
            let record = response.job;
            match record.status() {
                JobStatus::Succeeded => return Ok(record),
                JobStatus::Failed => {
                    return Err(CloudStackError::JobFailed {
                        job_id: job_id.to_owned(),
                        result: record.result_text(),
                    });
                }
                JobStatus::InProgress => {
                    if remaining == 0 {
                        return Err(CloudStackError::JobTimeout {
                            job_id: job_id.to_owned(),
                            waited: Duration::from_secs(budget_secs),
                        });
                    }
                    remaining -= 1;
                    tokio::select! {
                        () = self.shutdown.cancelled() => return Err(CloudStackError::Canceled),
                        () = sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }
}
