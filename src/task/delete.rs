//! Machine deletion task.

use crate::cloudstack::CloudStackIaas;
use crate::provider::{ApiParams, Machine};

use super::{DeleteTaskParams, TaskHandle};
use super::create::report_error;

/// Queue task that tears a machine down.
///
/// Runs the full teardown sequence (destroy, then detach and delete each
/// data disk); the first failing step stops the task so the queue can run
/// it again. Teardown is idempotent from the queue's point of view.
pub struct MachineDeleteTask {
    iaas: CloudStackIaas,
}

impl MachineDeleteTask {
    /// Creates the task body around a driver.
    #[must_use]
    pub const fn new(iaas: CloudStackIaas) -> Self {
        Self { iaas }
    }

    /// Runs one unit of work.
    ///
    /// Every outcome is reported through `task`; this function never
    /// panics on malformed input.
    pub async fn run(&self, task: &dyn TaskHandle) {
        let params: DeleteTaskParams = match serde_json::from_value(task.parameters()) {
            Ok(params) => params,
            Err(err) => {
                report_error(task, &format!("invalid machine-delete parameters: {err}"));
                return;
            }
        };

        let mut creation_params = ApiParams::new();
        creation_params.insert(String::from("virtualmachineid"), params.vm_id.clone());
        if let Some(project) = params.project_id.clone() {
            creation_params.insert(String::from("projectid"), project);
        }
        let machine = Machine {
            id: params.vm_id.clone(),
            creation_params,
            ..Machine::default()
        };

        if let Err(delete_err) = self.iaas.delete_machine(&machine).await {
            report_error(task, &format!("machine-delete failed: {delete_err}"));
            return;
        }

        if let Err(ack_err) = task.success(serde_json::Value::Null) {
            tracing::warn!(
                machine = %params.vm_id,
                error = %ack_err,
                "failed to acknowledge machine-delete success"
            );
        }
    }
}
