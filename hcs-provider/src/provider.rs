//! HCS provider implementation
//!
//! Every call looks its kind up, picks the client for the kind's service and
//! runs the operation through a [`Lifecycle`].

use hcs_core::lifecycle::Lifecycle;
use hcs_core::provider::{ProviderError, ProviderResult, ResourceKind};
use hcs_core::resource::{Resource, ResourceId, State};

use crate::billing::BssBillingClient;
use crate::client::{ClientFactory, RestClient};
use crate::config::ProviderConfig;
use crate::kinds::HcsResourceKind;

const BILLING_SERVICE: &str = "bss";

/// HuaweiCloudStack provider
pub struct HcsProvider {
    factory: ClientFactory,
    billing: BssBillingClient<RestClient>,
}

impl HcsProvider {
    /// Create a provider for the configured region and project
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let factory = ClientFactory::new(config)?;
        let billing = BssBillingClient::new(factory.client(BILLING_SERVICE));
        Ok(Self { factory, billing })
    }

    /// Replace the billing client (e.g., to change its poll interval)
    pub fn with_billing(mut self, billing: BssBillingClient<RestClient>) -> Self {
        self.billing = billing;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        self.factory.config()
    }

    /// Client for a service, for building a custom billing client
    pub fn client(&self, service: &str) -> RestClient {
        self.factory.client(service)
    }

    fn kind(id: &ResourceId) -> ProviderResult<HcsResourceKind> {
        HcsResourceKind::from_name(&id.resource_type).ok_or_else(|| {
            ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
                .for_resource(id.clone())
        })
    }

    fn lifecycle<'a>(&'a self, kind: &'a HcsResourceKind, client: &'a RestClient) -> Lifecycle<'a> {
        let config = self.factory.config();
        Lifecycle::new(kind, client)
            .with_billing(&self.billing)
            .with_param("project_id", config.project_id.clone())
            .with_timeouts(config.timeouts)
    }

    pub async fn read_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
        let kind = Self::kind(id)?;
        let client = self.factory.client(&kind.definition().service);
        self.lifecycle(&kind, &client)
            .read(id, identifier)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }

    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        let kind = Self::kind(&resource.id)?;
        let client = self.factory.client(&kind.definition().service);
        self.lifecycle(&kind, &client)
            .create(&resource)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(resource.id.clone()))
    }

    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let kind = Self::kind(id)?;
        let client = self.factory.client(&kind.definition().service);
        self.lifecycle(&kind, &client)
            .update(id, identifier, from, to)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }

    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str, from: &State) -> ProviderResult<()> {
        let kind = Self::kind(id)?;
        let client = self.factory.client(&kind.definition().service);
        self.lifecycle(&kind, &client)
            .delete(id, identifier, from)
            .await
            .map_err(|e| ProviderError::from(e).for_resource(id.clone()))
    }
}
