//! Error types for the CloudStack driver.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the CloudStack driver.
///
/// Message texts are operator-visible and matched by log tooling; change
/// them only together with the fleet's alerting rules.
#[derive(Debug, Error)]
pub enum CloudStackError {
    /// A required configuration option is missing or unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The caller omitted a mandatory creation parameter.
    #[error("param \"{name}\" is mandatory")]
    MissingParam {
        /// Name of the first missing parameter, in alphabetical order.
        name: String,
    },
    /// The HTTP layer failed before a response was read.
    #[error("request for {command} failed: {source}")]
    Transport {
        /// CloudStack command that was being issued.
        command: String,
        /// Underlying transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with a status other than 200.
    #[error("Unexpected response code for {command} {code}: {body}")]
    UnexpectedStatus {
        /// CloudStack command that was being issued.
        command: String,
        /// HTTP status code observed.
        code: u16,
        /// Raw response body, included verbatim for diagnosis.
        body: String,
    },
    /// The response body could not be decoded into the expected envelope.
    #[error("Unexpected result data for {command}: {message} - Body: {body}")]
    UnexpectedBody {
        /// CloudStack command that was being issued.
        command: String,
        /// Decoder error message.
        message: String,
        /// Raw response body, included verbatim for diagnosis.
        body: String,
    },
    /// An asynchronous job reached the failed terminal state.
    #[error("Job failed to complete: {result}")]
    JobFailed {
        /// Identifier of the failed job.
        job_id: String,
        /// The server's `jobresult` payload coerced to text.
        result: String,
    },
    /// The poll budget was exhausted before the job finished.
    #[error("cloudstack: time out after {waited:?} waiting for job \"{job_id}\"")]
    JobTimeout {
        /// Identifier of the job that never finished.
        job_id: String,
        /// Total time budget that elapsed.
        waited: Duration,
    },
    /// A created machine never exposed a network address.
    #[error("no network address for machine {machine_id}")]
    NoAddress {
        /// Provider-assigned machine identifier.
        machine_id: String,
    },
    /// The endpoint reports no usable availability zones.
    #[error("\"{iaas}\" - not enough zones available, want at least 1, got {count}")]
    NotEnoughZones {
        /// Active IaaS name (clone name when set).
        iaas: String,
        /// Zone count observed in the `listZones` response.
        count: i64,
    },
    /// Process shutdown was signalled while an operation was in flight.
    #[error("cloudstack: operation canceled by shutdown")]
    Canceled,
}
