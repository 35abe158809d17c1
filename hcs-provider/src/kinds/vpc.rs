//! hcs_vpc - Virtual Private Cloud (VPC v1)

use std::time::Duration;

use hcs_core::body::{BodyPurpose, schema_body};
use hcs_core::error::LifecycleResult;
use hcs_core::lifecycle::{Endpoint, KindDefinition, TagDefinition, UpdateGroup};
use hcs_core::poller::PollSpec;
use hcs_core::resource::Resource;
use hcs_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

pub const NAME: &str = "hcs_vpc";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(NAME)
        .with_description("Virtual private cloud")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_path("vpc.name"),
        )
        .attribute(
            AttributeSchema::new("cidr", types::cidr())
                .required()
                .with_path("vpc.cidr")
                .with_description("IPv4 range of the VPC (e.g., 192.168.0.0/16)"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String).with_path("vpc.description"))
        .attribute(
            AttributeSchema::new("enterprise_project_id", AttributeType::String)
                .force_new()
                .with_path("vpc.enterprise_project_id"),
        )
        .attribute(AttributeSchema::new("tags", types::tags()))
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_read_path("vpc.status"),
        )
}

pub fn definition() -> KindDefinition {
    KindDefinition::new(
        "vpc",
        Endpoint::post("v1/{project_id}/vpcs"),
        "vpc.id",
        Endpoint::get("v1/{project_id}/vpcs/{id}"),
        Endpoint::delete("v1/{project_id}/vpcs/{id}").with_success_codes(&[204]),
    )
    .with_status_path("vpc.status")
    .with_create_poll(
        PollSpec::new(&["CREATING"], &["OK"])
            .with_failures(&["ERROR"])
            .with_interval(Duration::from_secs(3)),
    )
    .with_update_group(UpdateGroup::new(
        &["name", "cidr", "description"],
        Endpoint::put("v1/{project_id}/vpcs/{id}"),
    ))
    .with_delete_poll(PollSpec::until_deleted(&["OK"]).with_interval(Duration::from_secs(3)))
    .with_tags(TagDefinition::new("v2.0/{project_id}/vpcs/{id}/tags/action"))
}

pub fn request_body(purpose: BodyPurpose<'_>, resource: &Resource) -> LifecycleResult<Option<Json>> {
    Ok(Some(schema_body(&schema(), purpose, resource)))
}
