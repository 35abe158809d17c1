//! hcs_dms_rocketmq_instance - Distributed message service for RocketMQ (DMS v2)

use std::time::Duration;

use hcs_core::body::{BodyPurpose, Field, build, schema_body};
use hcs_core::error::{LifecycleError, LifecycleResult};
use hcs_core::invoker::NotFoundRule;
use hcs_core::lifecycle::{
    BillingDefinition, CompensationPolicy, Endpoint, KindDefinition, PREPAID, TagDefinition, UpdateGroup,
};
use hcs_core::poller::PollSpec;
use hcs_core::resource::{Resource, Value};
use hcs_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

use crate::utils::bool_attribute;

pub const NAME: &str = "hcs_dms_rocketmq_instance";

/// Vendor code returned for instances that do not exist
pub const INSTANCE_NOT_FOUND: &str = "DMS.00404022";

const ENGINE: &str = "reliability";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(NAME)
        .with_description("RocketMQ instance")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_path("name"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String).with_path("description"))
        .attribute(
            AttributeSchema::new("engine_version", AttributeType::String)
                .required()
                .force_new()
                .with_path("engine_version"),
        )
        .attribute(
            AttributeSchema::new("flavor_id", AttributeType::String)
                .required()
                .force_new()
                .with_path("product_id"),
        )
        .attribute(
            AttributeSchema::new("storage_spec_code", AttributeType::String)
                .required()
                .force_new()
                .with_path("storage_spec_code"),
        )
        .attribute(
            AttributeSchema::new("storage_space", types::positive_int())
                .required()
                .force_new()
                .with_path("storage_space"),
        )
        .attribute(
            AttributeSchema::new("broker_num", types::positive_int())
                .force_new()
                .with_path("broker_num"),
        )
        .attribute(
            AttributeSchema::new("vpc_id", AttributeType::String)
                .required()
                .force_new()
                .with_path("vpc_id"),
        )
        .attribute(
            AttributeSchema::new("subnet_id", AttributeType::String)
                .required()
                .force_new()
                .with_path("subnet_id"),
        )
        .attribute(
            AttributeSchema::new("security_group_id", AttributeType::String)
                .required()
                .force_new()
                .with_path("security_group_id"),
        )
        .attribute(
            AttributeSchema::new("availability_zones", AttributeType::List(Box::new(AttributeType::String)))
                .required()
                .force_new()
                .with_path("available_zones"),
        )
        .attribute(
            AttributeSchema::new("enable_acl", AttributeType::Bool)
                .with_path("enable_acl"),
        )
        .attribute(
            AttributeSchema::new("charging_mode", types::charging_mode())
                .force_new()
                .with_default(Value::String("postPaid".to_string())),
        )
        .attribute(
            AttributeSchema::new(
                "period_unit",
                AttributeType::Enum(vec!["month".to_string(), "year".to_string()]),
            )
            .force_new(),
        )
        .attribute(AttributeSchema::new("period", types::positive_int()).force_new())
        .attribute(AttributeSchema::new("auto_renew", AttributeType::Bool))
        .attribute(AttributeSchema::new("tags", types::tags()))
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_read_path("status"),
        )
        .attribute(
            AttributeSchema::new("namesrv_address", AttributeType::String)
                .computed()
                .with_read_path("namesrv_address"),
        )
}

pub fn definition() -> KindDefinition {
    KindDefinition::new(
        "dms",
        Endpoint::post(format!("v2/{}/{{project_id}}/instances", ENGINE)),
        "instance_id",
        Endpoint::get("v2/{project_id}/instances/{id}"),
        Endpoint::delete("v2/{project_id}/instances/{id}").with_success_codes(&[204]),
    )
    .with_status_path("status")
    .with_gone_states(&["DELETED"])
    .with_create_poll(
        PollSpec::new(&["CREATING"], &["RUNNING"])
            .with_failures(&["CREATEFAILED", "ERROR"])
            .with_initial_delay(Duration::from_secs(120))
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(50 * 60)),
    )
    .with_update_group(UpdateGroup::new(
        &["name", "description", "enable_acl"],
        Endpoint::put("v2/{project_id}/instances/{id}").with_success_codes(&[204]),
    ))
    .with_delete_poll(
        PollSpec::until_deleted(&["DELETING", "RUNNING"])
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(30 * 60)),
    )
    .with_not_found(NotFoundRule::with_error_codes(&[INSTANCE_NOT_FOUND]))
    .with_billing(BillingDefinition::new("order_id"))
    .with_tags(TagDefinition::new("v2/{project_id}/rocketmq/{id}/tags/action").with_read_path("tags"))
    .with_compensation(CompensationPolicy::DeleteBestEffort)
}

pub fn request_body(purpose: BodyPurpose<'_>, resource: &Resource) -> LifecycleResult<Option<Json>> {
    let mut body = schema_body(&schema(), purpose, resource);
    if let BodyPurpose::Create = purpose
        && let Some(object) = body.as_object_mut()
    {
        object.insert("engine".to_string(), Json::String(ENGINE.to_string()));
        if let Some(bss) = bss_param(resource)? {
            object.insert("bss_param".to_string(), bss);
        }
    }
    Ok(Some(body))
}

fn bss_param(resource: &Resource) -> LifecycleResult<Option<Json>> {
    if resource.get_string("charging_mode") != Some(PREPAID) {
        return Ok(None);
    }
    let unit = resource.get_string("period_unit");
    let period = resource.attributes.get("period").and_then(Value::as_i64);
    let (Some(unit), Some(period)) = (unit, period) else {
        return Err(LifecycleError::configuration(format!(
            "{}: period_unit and period are required when charging_mode is prePaid",
            resource.id
        )));
    };

    Ok(Some(build(&[
        Field::required("charging_mode", PREPAID),
        Field::required("period_type", unit),
        Field::required("period_num", period),
        Field::optional("is_auto_renew", bool_attribute(resource, "auto_renew")),
        Field::required("is_auto_pay", true),
    ])))
}
