//! Resource kinds handled by the HCS provider
//!
//! Each submodule describes one kind: its schema, its [`KindDefinition`] and
//! how its request bodies are built. [`HcsResourceKind`] is the closed set the
//! provider dispatches on.

use hcs_core::body::{BodyPurpose, BuildRequestBody};
use hcs_core::error::LifecycleResult;
use hcs_core::lifecycle::KindDefinition;
use hcs_core::provider::ResourceKind;
use hcs_core::resource::Resource;
use hcs_core::schema::ResourceSchema;
use serde_json::Value as Json;

pub mod elb_loadbalancer;
pub mod evs_volume;
pub mod lts_group;
pub mod rocketmq_instance;
pub mod vpc;
pub mod waf_ip_group;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HcsResourceKind {
    Vpc,
    ElbLoadBalancer,
    EvsVolume,
    RocketMqInstance,
    WafIpGroup,
    LtsGroup,
}

impl HcsResourceKind {
    pub const ALL: [HcsResourceKind; 6] = [
        HcsResourceKind::Vpc,
        HcsResourceKind::ElbLoadBalancer,
        HcsResourceKind::EvsVolume,
        HcsResourceKind::RocketMqInstance,
        HcsResourceKind::WafIpGroup,
        HcsResourceKind::LtsGroup,
    ];

    /// Look a kind up by its resource type name (e.g., "hcs_vpc")
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl BuildRequestBody for HcsResourceKind {
    fn build_request_body(
        &self,
        purpose: BodyPurpose<'_>,
        resource: &Resource,
    ) -> LifecycleResult<Option<Json>> {
        match self {
            HcsResourceKind::Vpc => vpc::request_body(purpose, resource),
            HcsResourceKind::ElbLoadBalancer => elb_loadbalancer::request_body(purpose, resource),
            HcsResourceKind::EvsVolume => evs_volume::request_body(purpose, resource),
            HcsResourceKind::RocketMqInstance => rocketmq_instance::request_body(purpose, resource),
            HcsResourceKind::WafIpGroup => waf_ip_group::request_body(purpose, resource),
            HcsResourceKind::LtsGroup => lts_group::request_body(purpose, resource),
        }
    }
}

impl ResourceKind for HcsResourceKind {
    fn name(&self) -> &'static str {
        match self {
            HcsResourceKind::Vpc => vpc::NAME,
            HcsResourceKind::ElbLoadBalancer => elb_loadbalancer::NAME,
            HcsResourceKind::EvsVolume => evs_volume::NAME,
            HcsResourceKind::RocketMqInstance => rocketmq_instance::NAME,
            HcsResourceKind::WafIpGroup => waf_ip_group::NAME,
            HcsResourceKind::LtsGroup => lts_group::NAME,
        }
    }

    fn schema(&self) -> ResourceSchema {
        match self {
            HcsResourceKind::Vpc => vpc::schema(),
            HcsResourceKind::ElbLoadBalancer => elb_loadbalancer::schema(),
            HcsResourceKind::EvsVolume => evs_volume::schema(),
            HcsResourceKind::RocketMqInstance => rocketmq_instance::schema(),
            HcsResourceKind::WafIpGroup => waf_ip_group::schema(),
            HcsResourceKind::LtsGroup => lts_group::schema(),
        }
    }

    fn definition(&self) -> KindDefinition {
        match self {
            HcsResourceKind::Vpc => vpc::definition(),
            HcsResourceKind::ElbLoadBalancer => elb_loadbalancer::definition(),
            HcsResourceKind::EvsVolume => evs_volume::definition(),
            HcsResourceKind::RocketMqInstance => rocketmq_instance::definition(),
            HcsResourceKind::WafIpGroup => waf_ip_group::definition(),
            HcsResourceKind::LtsGroup => lts_group::definition(),
        }
    }
}

/// Returns the names of all resource kinds supported by this provider
pub fn resource_kinds() -> Vec<&'static str> {
    HcsResourceKind::ALL.iter().map(|kind| kind.name()).collect()
}
