//! Provider abstraction for machine lifecycle drivers.
//!
//! The control plane constructs a concrete provider at startup and hands it
//! to whichever component needs machines; there is no process-wide provider
//! registry. Providers are re-entrant values: concurrent callers may drive
//! independent lifecycles through a single instance.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Unordered string parameters attached to a single provider request.
///
/// Assembled by the caller and treated as immutable by drivers; any
/// server-side additions (command names, credentials, user-data) are made on
/// an internal copy.
pub type ApiParams = HashMap<String, String>;

/// A provisioned virtual machine.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Machine {
    /// Provider-assigned machine identifier.
    pub id: String,
    /// Network address resolved once provisioning finished.
    pub address: String,
    /// Lifecycle status as reported to callers (`running` after create).
    pub status: String,
    /// The parameter map the machine was created with. Preserved so later
    /// teardown can reuse request scoping such as `projectid`.
    pub creation_params: ApiParams,
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface implemented by machine lifecycle drivers.
pub trait Provider {
    /// Driver-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Provisions a machine and resolves its network address.
    ///
    /// Exactly one terminal outcome is visible to callers: a [`Machine`]
    /// with a non-empty address, or an error. There is no partially-created
    /// success state.
    fn create_machine<'a>(
        &'a self,
        params: &'a ApiParams,
    ) -> ProviderFuture<'a, Machine, Self::Error>;

    /// Destroys a machine and releases its data disks.
    fn delete_machine<'a>(&'a self, machine: &'a Machine)
    -> ProviderFuture<'a, (), Self::Error>;

    /// Verifies the provider endpoint is reachable and usable.
    fn health_check(&self) -> ProviderFuture<'_, (), Self::Error>;

    /// Returns a human-readable description of the creation parameters the
    /// provider understands.
    fn describe(&self) -> &'static str;
}
