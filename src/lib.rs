//! Machine provisioning library for CloudStack-backed platforms.
//!
//! The crate exposes a provider abstraction for creating and destroying
//! virtual machines and a CloudStack implementation that signs every API
//! request, drives the provider's asynchronous job protocol to a terminal
//! state, and walks the full teardown sequence (destroy, then detach and
//! delete each data disk). A queue-backed task layer wraps the driver in
//! at-least-once `machine-create` / `machine-delete` tasks that enqueue
//! compensating deletes when a created machine cannot be handed back to its
//! caller.

pub mod cloudstack;
pub mod config;
pub mod provider;
pub mod task;

pub use cloudstack::client::{build_canonical_query, sign_canonical};
pub use cloudstack::{CloudStackError, CloudStackIaas, JobStatus};
pub use config::{ConfigError, ConfigSource, MemoryConfig};
pub use provider::{ApiParams, Machine, Provider, ProviderFuture};
pub use task::{
    CreateTaskParams, DeleteTaskParams, MACHINE_CREATE_TASK, MACHINE_DELETE_TASK,
    MachineCreateTask, MachineDeleteTask, Queue, QueueError, TaskHandle,
};
