//! Response envelopes for the CloudStack commands the driver issues.
//!
//! Every command answers inside its own single-key outer object
//! (`deployvirtualmachineresponse`, ...). Each envelope is modelled as a
//! distinct concrete type rather than a generic unwrap-the-one-key helper:
//! some responses, `listZones` among them, carry meaningful siblings next to
//! the payload key.

use serde::Deserialize;

/// Envelope for `deployVirtualMachine`.
#[derive(Debug, Deserialize)]
pub struct DeployVirtualMachineResponse {
    /// Payload under `deployvirtualmachineresponse`.
    #[serde(rename = "deployvirtualmachineresponse", default)]
    pub deploy: DeployedVirtualMachine,
}

/// `deployVirtualMachine` payload.
#[derive(Debug, Default, Deserialize)]
pub struct DeployedVirtualMachine {
    /// Identifier of the machine being provisioned.
    #[serde(default)]
    pub id: String,
    /// Asynchronous job tracking the provisioning.
    #[serde(default)]
    pub jobid: String,
}

/// Envelope for `destroyVirtualMachine`.
#[derive(Debug, Deserialize)]
pub struct DestroyVirtualMachineResponse {
    /// Payload under `destroyvirtualmachineresponse`.
    #[serde(rename = "destroyvirtualmachineresponse", default)]
    pub destroy: AsyncCommandJob,
}

/// Envelope for `detachVolume`.
#[derive(Debug, Deserialize)]
pub struct DetachVolumeResponse {
    /// Payload under `detachvolumeresponse`.
    #[serde(rename = "detachvolumeresponse", default)]
    pub detach: AsyncCommandJob,
}

/// Payload of commands that only hand back a job identifier.
#[derive(Debug, Default, Deserialize)]
pub struct AsyncCommandJob {
    /// Asynchronous job tracking the command.
    #[serde(default)]
    pub jobid: String,
}

/// Envelope for `listVolumes`.
#[derive(Debug, Default, Deserialize)]
pub struct ListVolumesResponse {
    /// Payload under `listvolumesresponse`.
    #[serde(rename = "listvolumesresponse", default)]
    pub list: VolumeList,
}

/// `listVolumes` payload.
#[derive(Debug, Default, Deserialize)]
pub struct VolumeList {
    /// Volumes attached to the queried machine.
    #[serde(default)]
    pub volume: Vec<Volume>,
}

/// A single volume record.
#[derive(Clone, Debug, Deserialize)]
pub struct Volume {
    /// Volume identifier.
    #[serde(default)]
    pub id: String,
    /// Volume role; only data disks are detached and deleted on teardown.
    #[serde(rename = "type", default)]
    pub kind: VolumeKind,
}

/// Volume role as reported by the server.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum VolumeKind {
    /// The machine's root disk; destroyed together with the machine.
    #[serde(rename = "ROOT")]
    Root,
    /// A data disk; must be detached and deleted explicitly.
    #[serde(rename = "DATADISK")]
    DataDisk,
    /// Any role this driver does not manage.
    #[default]
    #[serde(other)]
    Other,
}

/// Envelope for `listVirtualMachines`.
#[derive(Debug, Default, Deserialize)]
pub struct ListVirtualMachinesResponse {
    /// Payload under `listvirtualmachinesresponse`.
    #[serde(rename = "listvirtualmachinesresponse", default)]
    pub list: VirtualMachineList,
}

/// `listVirtualMachines` payload.
#[derive(Debug, Default, Deserialize)]
pub struct VirtualMachineList {
    /// Number of machines matched by the query.
    #[serde(default)]
    pub count: i64,
    /// Machine records.
    #[serde(rename = "virtualmachine", default)]
    pub machines: Vec<VirtualMachine>,
}

/// A machine record inside `listVirtualMachines`.
#[derive(Debug, Default, Deserialize)]
pub struct VirtualMachine {
    /// Machine identifier.
    #[serde(default)]
    pub id: String,
    /// Network interfaces, in server order.
    #[serde(rename = "nic", default)]
    pub nics: Vec<Nic>,
}

/// A network interface record.
#[derive(Debug, Default, Deserialize)]
pub struct Nic {
    /// Address assigned to the interface.
    #[serde(default)]
    pub ipaddress: String,
}

/// Envelope for `listZones`.
#[derive(Debug, Default, Deserialize)]
pub struct ListZonesResponse {
    /// Payload under `listzonesresponse`.
    #[serde(rename = "listzonesresponse", default)]
    pub list: ZoneList,
}

/// `listZones` payload.
#[derive(Debug, Default, Deserialize)]
pub struct ZoneList {
    /// Number of zones visible to the credentials in use.
    #[serde(default)]
    pub count: i64,
}

/// Envelope for `createTags`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTagsResponse {
    /// Payload under `createtagsresponse`.
    #[serde(rename = "createtagsresponse", default)]
    pub tags: CreateTagsResult,
}

/// `createTags` payload.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTagsResult {
    /// Server-side status text.
    #[serde(default)]
    pub displaytext: String,
    /// Whether the tag request was accepted.
    #[serde(default)]
    pub success: bool,
}
