//! hcs_lts_group - Log group (LTS v2)
//!
//! LTS has no single-group GET; reads list every group and pick ours out.

use hcs_core::body::{BodyPurpose, schema_body};
use hcs_core::error::LifecycleResult;
use hcs_core::lifecycle::{Endpoint, KindDefinition, ReadSelector, UpdateGroup};
use hcs_core::resource::Resource;
use hcs_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

pub const NAME: &str = "hcs_lts_group";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(NAME)
        .with_description("Log group")
        .attribute(
            AttributeSchema::new("group_name", AttributeType::String)
                .required()
                .force_new()
                .with_request_key("log_group_name")
                .with_read_path("log_group_name"),
        )
        .attribute(
            AttributeSchema::new("ttl_in_days", types::positive_int())
                .required()
                .with_path("ttl_in_days")
                .with_description("Days to keep logs (1 to 365)"),
        )
        .attribute(
            AttributeSchema::new("creation_time", AttributeType::Int)
                .computed()
                .with_read_path("creation_time"),
        )
}

pub fn definition() -> KindDefinition {
    KindDefinition::new(
        "lts",
        Endpoint::post("v2/{project_id}/groups").with_success_codes(&[200, 201]),
        "log_group_id",
        Endpoint::get("v2/{project_id}/groups"),
        Endpoint::delete("v2/{project_id}/groups/{id}").with_success_codes(&[200, 204]),
    )
    .with_read_selector(ReadSelector::new("log_groups", "log_group_id"))
    .with_update_group(UpdateGroup::new(
        &["ttl_in_days"],
        Endpoint::post("v2/{project_id}/groups/{id}"),
    ))
}

pub fn request_body(purpose: BodyPurpose<'_>, resource: &Resource) -> LifecycleResult<Option<Json>> {
    Ok(Some(schema_body(&schema(), purpose, resource)))
}
