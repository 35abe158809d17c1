//! hcs_evs_volume - Elastic block volume (EVS v2/v2.1)
//!
//! Volumes can be prepaid: the create body then carries a `bssParam` block and
//! the volume appears only once its order completes. Extending a volume is a
//! separate action with its own narrow poll.

use std::time::Duration;

use hcs_core::body::{BodyPurpose, Field, FieldValue, build, schema_body};
use hcs_core::error::{LifecycleError, LifecycleResult};
use hcs_core::lifecycle::{BillingDefinition, Endpoint, KindDefinition, PREPAID, TagDefinition, UpdateGroup};
use hcs_core::poller::PollSpec;
use hcs_core::resource::{Resource, Value};
use hcs_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use serde_json::Value as Json;

use crate::utils::{bool_attribute, period_type};

pub const NAME: &str = "hcs_evs_volume";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(NAME)
        .with_description("Elastic volume")
        .attribute(
            AttributeSchema::new("availability_zone", AttributeType::String)
                .required()
                .force_new()
                .with_path("volume.availability_zone"),
        )
        .attribute(
            AttributeSchema::new("volume_type", AttributeType::String)
                .required()
                .force_new()
                .with_path("volume.volume_type"),
        )
        .attribute(
            AttributeSchema::new("size", types::positive_int())
                .required()
                .with_path("volume.size")
                .with_description("Size in GB; volumes can only grow"),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String).with_path("volume.name"))
        .attribute(
            AttributeSchema::new("description", AttributeType::String).with_path("volume.description"),
        )
        .attribute(
            AttributeSchema::new("multiattach", AttributeType::Bool)
                .force_new()
                .with_path("volume.multiattach"),
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
        .attribute(AttributeSchema::new("tags", types::tags()).with_read_path("volume.tags"))
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_read_path("volume.status"),
        )
}

pub fn definition() -> KindDefinition {
    KindDefinition::new(
        "evs",
        Endpoint::post("v2.1/{project_id}/cloudvolumes"),
        "volume_ids[0]",
        Endpoint::get("v2/{project_id}/cloudvolumes/{id}"),
        Endpoint::delete("v2/{project_id}/cloudvolumes/{id}"),
    )
    .with_status_path("volume.status")
    .with_create_poll(
        PollSpec::new(&["creating", "downloading"], &["available"])
            .with_failures(&["error"])
            .with_interval(Duration::from_secs(5)),
    )
    .with_update_group(UpdateGroup::new(
        &["name", "description"],
        Endpoint::put("v2/{project_id}/cloudvolumes/{id}"),
    ))
    .with_update_group(
        UpdateGroup::new(&["size"], Endpoint::post("v2.1/{project_id}/cloudvolumes/{id}/action")).with_poll(
            PollSpec::new(&["extending"], &["available", "in-use"])
                .with_failures(&["error_extending"])
                .with_interval(Duration::from_secs(5)),
        ),
    )
    .with_delete_poll(
        PollSpec::until_deleted(&["deleting", "available", "in-use"])
            .with_failures(&["error_deleting"])
            .with_interval(Duration::from_secs(5)),
    )
    .with_billing(BillingDefinition::new("order_id"))
    .with_tags(TagDefinition::new("v2/{project_id}/cloudvolumes/{id}/tags/action"))
}

pub fn request_body(purpose: BodyPurpose<'_>, resource: &Resource) -> LifecycleResult<Option<Json>> {
    match purpose {
        BodyPurpose::Create => {
            let mut body = schema_body(&schema(), purpose, resource);
            if let Some(bss) = bss_param(resource)?
                && let Some(object) = body.as_object_mut()
            {
                object.insert("bssParam".to_string(), bss);
            }
            Ok(Some(body))
        }
        BodyPurpose::Update(group) if group.attributes.iter().any(|a| a == "size") => {
            let prepaid = is_prepaid(resource);
            Ok(Some(build(&[
                Field::required(
                    "os-extend",
                    FieldValue::Object(vec![Field::required(
                        "new_size",
                        FieldValue::from_attribute(resource.attributes.get("size")),
                    )]),
                ),
                Field::optional(
                    "bssParam",
                    FieldValue::Object(vec![Field::optional(
                        "isAutoPay",
                        prepaid.then_some("true"),
                    )]),
                ),
            ])))
        }
        BodyPurpose::Update(_) => Ok(Some(schema_body(&schema(), purpose, resource))),
    }
}

fn is_prepaid(resource: &Resource) -> bool {
    resource.get_string("charging_mode") == Some(PREPAID)
}

/// Billing block of a prepaid create; `None` for pay-per-use volumes
fn bss_param(resource: &Resource) -> LifecycleResult<Option<Json>> {
    if !is_prepaid(resource) {
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
    let period_code = period_type(unit).ok_or_else(|| {
        LifecycleError::configuration(format!("{}: unknown period_unit '{}'", resource.id, unit))
    })?;
    let auto_renew = bool_attribute(resource, "auto_renew").unwrap_or(false);

    Ok(Some(build(&[
        Field::required("chargingMode", PREPAID),
        Field::required("periodType", period_code),
        Field::required("periodNum", period),
        Field::required("isAutoRenew", auto_renew.to_string()),
        Field::required("isAutoPay", "true"),
    ])))
}
