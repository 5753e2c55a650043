//! CloudStack implementation of the machine lifecycle.

pub mod client;
mod error;
mod job;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ConfigSource};
use crate::provider::{ApiParams, Machine, Provider, ProviderFuture};
use response::{
    CreateTagsResponse, DeployVirtualMachineResponse, DestroyVirtualMachineResponse,
    DetachVolumeResponse, ListVirtualMachinesResponse, ListVolumesResponse, ListZonesResponse,
    VolumeKind,
};

pub use error::CloudStackError;
pub use job::{AsyncJobRecord, JobStatus, QueryAsyncJobResultResponse};

const BASE_IAAS_NAME: &str = "cloudstack";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MACHINE_STATUS_RUNNING: &str = "running";

/// Creation parameters every deploy must carry, in alphabetical order. The
/// first missing one is the one reported.
const MANDATORY_CREATE_PARAMS: [&str; 4] =
    ["networkids", "serviceofferingid", "templateid", "zoneid"];

/// Driver that provisions machines through the CloudStack API.
///
/// The driver is a stateless value beyond its configuration handle: it may
/// be shared across concurrent lifecycle calls. Configuration is resolved
/// per call under `iaas:<name>:<key>`, consulting the clone name first and
/// falling back to the base name, so a renamed copy created with
/// [`CloudStackIaas::with_name`] can override individual options.
#[derive(Clone)]
pub struct CloudStackIaas {
    base_name: String,
    iaas_name: String,
    config: Arc<dyn ConfigSource>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl CloudStackIaas {
    /// Creates a driver bound to the given configuration source.
    #[must_use]
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self {
            base_name: String::from(BASE_IAAS_NAME),
            iaas_name: String::from(BASE_IAAS_NAME),
            config,
            poll_interval: POLL_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns a copy of the driver operating under `name`.
    ///
    /// The copy resolves configuration under `iaas:<name>:` first and falls
    /// back to the base name; the original driver is left unchanged.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut clone = self.clone();
        clone.iaas_name = name.into();
        clone
    }

    /// Attaches a shutdown token raced against sleeps and requests.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Overrides the poll cadence.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Name the driver operates under (the clone name when set).
    #[must_use]
    pub fn iaas_name(&self) -> &str {
        &self.iaas_name
    }

    /// Resolves `iaas:<name>:<key>`, trying the active name before the base.
    pub(crate) fn config_string(&self, key: &str) -> Result<String, ConfigError> {
        let scoped = format!("iaas:{}:{key}", self.iaas_name);
        match self.config.get_string(&scoped) {
            Ok(value) => Ok(value),
            Err(ConfigError::Missing { .. }) if self.iaas_name != self.base_name => self
                .config
                .get_string(&format!("iaas:{}:{key}", self.base_name)),
            Err(err) => Err(err),
        }
    }

    /// Poll budget in seconds; unset or unparsable values fall back to 300.
    /// An explicit 0 is honored as a zero budget: one poll, then timeout.
    pub(crate) fn wait_timeout_secs(&self) -> u64 {
        self.config_string("wait-timeout")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(job::DEFAULT_WAIT_TIMEOUT_SECS)
    }

    fn validate_create_params(params: &ApiParams) -> Result<(), CloudStackError> {
        for name in MANDATORY_CREATE_PARAMS {
            if !params.contains_key(name) {
                return Err(CloudStackError::MissingParam {
                    name: name.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Provisions a machine and resolves its address.
    ///
    /// Deploys the machine, waits for the provisioning job, then resolves
    /// the address of its first NIC. Optional `user-data` configuration is
    /// injected as `userdata` into an internal copy of `params`; the
    /// caller's map is never mutated.
    ///
    /// # Errors
    ///
    /// Returns [`CloudStackError::MissingParam`] before any I/O when one of
    /// `networkids`, `serviceofferingid`, `templateid`, `zoneid` is absent,
    /// [`CloudStackError::NoAddress`] when the created machine exposes no
    /// NIC, and any job, transport, or protocol failure unchanged.
    pub async fn create_machine(&self, params: &ApiParams) -> Result<Machine, CloudStackError> {
        Self::validate_create_params(params)?;

        let mut deploy_params = params.clone();
        if let Ok(user_data) = self.config_string("user-data") {
            deploy_params.insert(String::from("userdata"), user_data);
        }

        let response: DeployVirtualMachineResponse =
            self.api_request("deployVirtualMachine", &deploy_params).await?;
        let machine_id = response.deploy.id;
        let address = self
            .wait_vm_is_created(
                &response.deploy.jobid,
                &machine_id,
                params.get("projectid").map(String::as_str),
            )
            .await?;

        tracing::info!(machine = %machine_id, address = %address, "machine created");
        Ok(Machine {
            id: machine_id,
            address,
            status: String::from(MACHINE_STATUS_RUNNING),
            creation_params: params.clone(),
        })
    }

    /// Waits for a deploy job and resolves the machine's address.
    ///
    /// Usable on its own when the deploy was issued elsewhere and only the
    /// job identifier travelled, as the queue-backed create task does.
    ///
    /// # Errors
    ///
    /// Returns [`CloudStackError::NoAddress`] when the machine list or its
    /// first NIC is empty, and any poll failure unchanged.
    pub async fn wait_vm_is_created(
        &self,
        job_id: &str,
        machine_id: &str,
        project_id: Option<&str>,
    ) -> Result<String, CloudStackError> {
        self.wait_for_async_job(job_id).await?;

        let mut list_params = ApiParams::new();
        list_params.insert(String::from("id"), machine_id.to_owned());
        if let Some(project) = project_id {
            list_params.insert(String::from("projectid"), project.to_owned());
        }
        let response: ListVirtualMachinesResponse =
            self.api_request("listVirtualMachines", &list_params).await?;

        response
            .list
            .machines
            .first()
            .and_then(|machine| machine.nics.first())
            .map(|nic| nic.ipaddress.clone())
            .filter(|address| !address.is_empty())
            .ok_or_else(|| CloudStackError::NoAddress {
                machine_id: machine_id.to_owned(),
            })
    }

    /// Destroys a machine and deletes its data disks.
    ///
    /// Volumes are listed first, then the machine is destroyed and its job
    /// awaited; each data disk is then detached (awaiting the detach job)
    /// and deleted, strictly in sequence. The first failing step aborts the
    /// remaining work and surfaces unchanged.
    ///
    /// # Errors
    ///
    /// Returns any transport, protocol, or job failure from the individual
    /// steps.
    pub async fn delete_machine(&self, machine: &Machine) -> Result<(), CloudStackError> {
        let mut volume_params = ApiParams::new();
        volume_params.insert(String::from("virtualmachineid"), machine.id.clone());
        if let Some(project) = machine.creation_params.get("projectid") {
            volume_params.insert(String::from("projectid"), project.clone());
        }
        let volumes: ListVolumesResponse = self.api_request("listVolumes", &volume_params).await?;

        let mut destroy_params = ApiParams::new();
        destroy_params.insert(String::from("id"), machine.id.clone());
        let destroy: DestroyVirtualMachineResponse = self
            .api_request("destroyVirtualMachine", &destroy_params)
            .await?;
        self.wait_for_async_job(&destroy.destroy.jobid).await?;

        for volume in volumes
            .list
            .volume
            .iter()
            .filter(|volume| volume.kind == VolumeKind::DataDisk)
        {
            let mut volume_id_params = ApiParams::new();
            volume_id_params.insert(String::from("id"), volume.id.clone());
            let detach: DetachVolumeResponse =
                self.api_request("detachVolume", &volume_id_params).await?;
            self.wait_for_async_job(&detach.detach.jobid).await?;
            self.do_request("deleteVolume", &volume_id_params).await?;
        }

        tracing::info!(machine = %machine.id, "machine deleted");
        Ok(())
    }

    /// Checks that the endpoint answers and exposes at least one zone.
    ///
    /// # Errors
    ///
    /// Returns [`CloudStackError::NotEnoughZones`] when the zone count is
    /// below one, and any transport or protocol failure unchanged.
    pub async fn health_check(&self) -> Result<(), CloudStackError> {
        let zones: ListZonesResponse = self.api_request("listZones", &ApiParams::new()).await?;
        if zones.list.count < 1 {
            return Err(CloudStackError::NotEnoughZones {
                iaas: self.iaas_name.clone(),
                count: zones.list.count,
            });
        }
        Ok(())
    }

    /// Attaches `key:value` tags to a machine via `createTags`.
    ///
    /// `tags` is a comma-separated list; entries without a `:` are skipped.
    /// Tag indices on the wire are 1-based. When no entry is usable the
    /// call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns any transport or protocol failure from `createTags`.
    pub async fn tag_machine(&self, machine_id: &str, tags: &str) -> Result<(), CloudStackError> {
        let mut tag_params = ApiParams::new();
        tag_params.insert(String::from("resourceids"), machine_id.to_owned());
        tag_params.insert(String::from("resourcetype"), String::from("UserVm"));

        let mut index = 0usize;
        for entry in tags.split(',') {
            let Some((key, value)) = entry.split_once(':') else {
                continue;
            };
            index += 1;
            tag_params.insert(format!("tags[{index}].key"), key.to_owned());
            tag_params.insert(format!("tags[{index}].value"), value.to_owned());
        }
        if index == 0 {
            return Ok(());
        }

        let _response: CreateTagsResponse = self.api_request("createTags", &tag_params).await?;
        Ok(())
    }
}

impl Provider for CloudStackIaas {
    type Error = CloudStackError;

    fn create_machine<'a>(
        &'a self,
        params: &'a ApiParams,
    ) -> ProviderFuture<'a, Machine, Self::Error> {
        Box::pin(self.create_machine(params))
    }

    fn delete_machine<'a>(
        &'a self,
        machine: &'a Machine,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(self.delete_machine(machine))
    }

    fn health_check(&self) -> ProviderFuture<'_, (), Self::Error> {
        Box::pin(self.health_check())
    }

    fn describe(&self) -> &'static str {
        "CloudStack IaaS required params:\n\
  networkids=<net ids>             Network uuids\n\
  templateid=<template id>         Template uuid\n\
  serviceofferingid=<offering id>  Service offering uuid\n\
  zoneid=<zone id>                 Zone uuid\n"
    }
}

#[cfg(test)]
mod tests;
