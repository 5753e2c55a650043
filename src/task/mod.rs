//! Queue-backed machine lifecycle tasks.
//!
//! The durable queue lives outside this crate; it hands each unit of work to
//! a task body together with an acknowledgement protocol (`success` /
//! `error`) and accepts compensating enqueues. Tasks are at-least-once: a
//! body may run again after a crash and must tolerate duplicate execution.
//! Per machine the queue serialises the create task before the delete task;
//! no ordering exists across machines.

mod create;
mod delete;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use create::MachineCreateTask;
pub use delete::MachineDeleteTask;

/// Queue name of the machine creation task.
pub const MACHINE_CREATE_TASK: &str = "machine-create";

/// Queue name of the machine deletion task.
pub const MACHINE_DELETE_TASK: &str = "machine-delete";

/// Error reported by the queue for enqueue and acknowledgement calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("queue operation failed: {0}")]
pub struct QueueError(pub String);

/// Write access to the durable queue, used for compensating enqueues.
pub trait Queue: Send + Sync {
    /// Submits a new task carrying `params`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the queue rejects the submission.
    fn enqueue(&self, task_name: &str, params: serde_json::Value) -> Result<(), QueueError>;
}

/// The queue's handle for one unit of work.
pub trait TaskHandle: Send + Sync {
    /// Raw parameters the task was enqueued with.
    fn parameters(&self) -> serde_json::Value;

    /// Reports the task's result to whoever enqueued it.
    ///
    /// Returns whether a waiting caller actually received the value; `false`
    /// means the result was stored but nobody was notified.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the acknowledgement cannot be recorded.
    fn success(&self, value: serde_json::Value) -> Result<bool, QueueError>;

    /// Reports the task as failed with a human-readable message.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the failure cannot be recorded.
    fn error(&self, message: &str) -> Result<(), QueueError>;
}

/// Typed parameters of a `machine-create` task.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CreateTaskParams {
    /// Job tracking the already-issued `deployVirtualMachine` call.
    #[serde(rename = "jobId")]
    pub job_id: String,
    /// Identifier of the machine being provisioned.
    #[serde(rename = "vmId")]
    pub vm_id: String,
    /// Optional project scoping for follow-up queries.
    #[serde(rename = "projectId", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Optional comma-separated `key:value` tags to attach on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Typed parameters of a `machine-delete` task.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeleteTaskParams {
    /// Identifier of the machine to tear down.
    #[serde(rename = "vmId")]
    pub vm_id: String,
    /// Optional project scoping for volume queries.
    #[serde(rename = "projectId", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl DeleteTaskParams {
    /// Parameters of the compensating delete for `vm_id`.
    #[must_use]
    pub const fn compensation(vm_id: String) -> Self {
        Self {
            vm_id,
            project_id: None,
        }
    }
}

/// Serialises `params`, reporting failures through the queue error type.
fn to_task_value<T: Serialize>(params: &T) -> Result<serde_json::Value, QueueError> {
    serde_json::to_value(params).map_err(|err| QueueError(err.to_string()))
}
