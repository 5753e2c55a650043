//! Machine creation task.

use std::sync::Arc;

use crate::cloudstack::CloudStackIaas;

use super::{
    CreateTaskParams, DeleteTaskParams, MACHINE_DELETE_TASK, Queue, TaskHandle, to_task_value,
};

/// Queue task that finishes provisioning a pre-deployed machine.
///
/// The deploy call itself happens synchronously in the caller; this task
/// waits for the provisioning job, resolves the machine's address, attaches
/// optional tags, and acknowledges the result. Whenever a machine was (or
/// may have been) created but cannot be handed to the caller, a compensating
/// `machine-delete` task is enqueued so the resource is not leaked.
pub struct MachineCreateTask<Q: Queue> {
    iaas: CloudStackIaas,
    queue: Arc<Q>,
}

impl<Q: Queue> MachineCreateTask<Q> {
    /// Creates the task body around a driver and its owning queue.
    #[must_use]
    pub const fn new(iaas: CloudStackIaas, queue: Arc<Q>) -> Self {
        Self { iaas, queue }
    }

    /// Enqueues a compensating delete for `vm_id`.
    fn enqueue_compensation(&self, vm_id: &str) -> Result<(), super::QueueError> {
        tracing::warn!(machine = %vm_id, "enqueueing compensating machine-delete");
        let params = to_task_value(&DeleteTaskParams::compensation(vm_id.to_owned()))?;
        self.queue.enqueue(MACHINE_DELETE_TASK, params)
    }

    /// Runs one unit of work.
    ///
    /// Every outcome is reported through `task`; this function never
    /// panics on malformed input.
    pub async fn run(&self, task: &dyn TaskHandle) {
        let params: CreateTaskParams = match serde_json::from_value(task.parameters()) {
            Ok(params) => params,
            Err(err) => {
                report_error(task, &format!("invalid machine-create parameters: {err}"));
                return;
            }
        };

        let address = match self
            .iaas
            .wait_vm_is_created(&params.job_id, &params.vm_id, params.project_id.as_deref())
            .await
        {
            Ok(address) => address,
            Err(wait_err) => {
                // The machine may exist server-side even though the wait
                // failed; compensate before reporting.
                let mut message = format!("machine-create failed: {wait_err}");
                if let Err(enqueue_err) = self.enqueue_compensation(&params.vm_id) {
                    message = format!(
                        "{message}; enqueueing compensating machine-delete also failed: {enqueue_err}"
                    );
                }
                report_error(task, &message);
                return;
            }
        };

        if let Some(tags) = params.tags.as_deref() {
            if let Err(tag_err) = self.iaas.tag_machine(&params.vm_id, tags).await {
                // The machine exists and is usable; the caller owns reaping
                // it, so no compensation here.
                report_error(task, &format!("machine-create failed: {tag_err}"));
                return;
            }
        }

        match task.success(serde_json::Value::String(address)) {
            Ok(true) => {}
            Ok(false) => {
                // Nobody was waiting for the result; the machine would leak.
                if let Err(enqueue_err) = self.enqueue_compensation(&params.vm_id) {
                    tracing::warn!(
                        machine = %params.vm_id,
                        error = %enqueue_err,
                        "failed to enqueue compensating machine-delete"
                    );
                }
            }
            Err(ack_err) => {
                tracing::warn!(
                    machine = %params.vm_id,
                    error = %ack_err,
                    "failed to acknowledge machine-create success"
                );
            }
        }
    }
}

pub(super) fn report_error(task: &dyn TaskHandle, message: &str) {
    if let Err(err) = task.error(message) {
        tracing::warn!(error = %err, "failed to report task error to the queue");
    }
}
