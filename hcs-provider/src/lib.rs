//! HCS Provider
//!
//! HuaweiCloudStack provider built on the `hcs-core` lifecycle engine.
//!
//! ## Module Structure
//!
//! - `config` - Provider and acceptance-test settings read from the environment
//! - `client` - reqwest-backed invoker and per-service client factory
//! - `billing` - BSS order waiting and unsubscribe
//! - `kinds` - Resource kinds (schemas, endpoints, request bodies)
//! - `provider` - HcsProvider implementation
//! - `utils` - Billing period codes and loosely typed attributes

pub mod billing;
pub mod client;
pub mod config;
pub mod kinds;
pub mod provider;
pub mod utils;

// Re-export main types
pub use billing::BssBillingClient;
pub use client::{ClientFactory, RestClient};
pub use config::{AcceptanceConfig, ConfigError, ProviderConfig};
pub use kinds::HcsResourceKind;
pub use provider::HcsProvider;

use hcs_core::provider::{BoxFuture, Provider, ProviderResult};
use hcs_core::resource::{Resource, ResourceId, State};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for HcsProvider {
    fn name(&self) -> &'static str {
        "hcs"
    }

    fn resource_kinds(&self) -> Vec<&'static str> {
        kinds::resource_kinds()
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.read_resource(&id, &identifier).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        Box::pin(async move { self.delete_resource(&id, &identifier, &from).await })
    }
}
