//! hcs_elb_loadbalancer - Dedicated load balancer (ELB v3)

use std::time::Duration;

use hcs_core::body::{BodyPurpose, schema_body};
use hcs_core::error::LifecycleResult;
use hcs_core::lifecycle::{Endpoint, KindDefinition, TagDefinition, UpdateGroup};
use hcs_core::poller::PollSpec;
use hcs_core::resource::Resource;
use hcs_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

pub const NAME: &str = "hcs_elb_loadbalancer";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(NAME)
        .with_description("Dedicated load balancer")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_path("loadbalancer.name"),
        )
        .attribute(
            AttributeSchema::new("availability_zone", AttributeType::List(Box::new(AttributeType::String)))
                .required()
                .force_new()
                .with_path("loadbalancer.availability_zone_list"),
        )
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .force_new()
                .with_path("loadbalancer.vpc_id"),
        )
        .attribute(
            AttributeSchema::new("ipv4_subnet_id", AttributeType::String)
                .force_new()
                .with_path("loadbalancer.vip_subnet_cidr_id"),
        )
        .attribute(
            AttributeSchema::new("ipv4_address", AttributeType::String)
                .force_new()
                .with_path("loadbalancer.vip_address"),
        )
        .attribute(
            AttributeSchema::new("l4_flavor_id", AttributeType::String)
                .force_new()
                .with_path("loadbalancer.l4_flavor_id"),
        )
        .attribute(
            AttributeSchema::new("cross_vpc_backend", AttributeType::Bool)
                .with_path("loadbalancer.ip_target_enable"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_path("loadbalancer.description"),
        )
        .attribute(AttributeSchema::new("tags", types::tags()))
        .attribute(
            AttributeSchema::new("provisioning_status", AttributeType::String)
                .computed()
                .with_read_path("loadbalancer.provisioning_status"),
        )
}

pub fn definition() -> KindDefinition {
    KindDefinition::new(
        "elb",
        Endpoint::post("v3/{project_id}/elb/loadbalancers"),
        "loadbalancer.id",
        Endpoint::get("v3/{project_id}/elb/loadbalancers/{id}"),
        Endpoint::delete("v3/{project_id}/elb/loadbalancers/{id}").with_success_codes(&[204]),
    )
    .with_status_path("loadbalancer.provisioning_status")
    .with_create_poll(
        PollSpec::new(&["PENDING_CREATE"], &["ACTIVE"])
            .with_failures(&["ERROR"])
            .with_interval(Duration::from_secs(5)),
    )
    .with_update_group(UpdateGroup::new(
        &["name", "description", "cross_vpc_backend"],
        Endpoint::put("v3/{project_id}/elb/loadbalancers/{id}"),
    ))
    .with_delete_poll(PollSpec::until_deleted(&["ACTIVE", "PENDING_DELETE"]).with_interval(Duration::from_secs(5)))
    .with_tags(
        TagDefinition::new("v2.0/{project_id}/loadbalancers/{id}/tags/action").with_read_path("loadbalancer.tags"),
    )
}

/// The API only accepts `ip_target_enable: true`; `false` is sent by omission
pub fn request_body(purpose: BodyPurpose<'_>, resource: &Resource) -> LifecycleResult<Option<Json>> {
    let mut body = schema_body(&schema(), purpose, resource);
    if let Some(lb) = body.get_mut("loadbalancer").and_then(Json::as_object_mut)
        && lb.get("ip_target_enable") == Some(&Json::Bool(false))
        && matches!(purpose, BodyPurpose::Create)
    {
        lb.remove("ip_target_enable");
    }
    Ok(Some(body))
}
