//! hcs_waf_ip_group - WAF address group (WAF v1)
//!
//! Synchronous: the group is usable as soon as create returns. The API takes
//! its addresses as one comma-separated string.

use hcs_core::body::{BodyPurpose, Field, FieldValue, build};
use hcs_core::error::{LifecycleError, LifecycleResult};
use hcs_core::lifecycle::{Endpoint, KindDefinition, UpdateGroup};
use hcs_core::resource::{Resource, Value};
use hcs_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use serde_json::Value as Json;

pub const NAME: &str = "hcs_waf_ip_group";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(NAME)
        .with_description("WAF IP address group")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_read_path("name"),
        )
        .attribute(
            AttributeSchema::new("ip_addresses", AttributeType::List(Box::new(AttributeType::String)))
                .required()
                .with_description("IP addresses or CIDR blocks"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String).with_read_path("description"))
        .attribute(
            AttributeSchema::new("enterprise_project_id", AttributeType::String).force_new(),
        )
        .attribute(
            AttributeSchema::new("size", AttributeType::Int)
                .computed()
                .with_read_path("size"),
        )
}

pub fn definition() -> KindDefinition {
    KindDefinition::new(
        "waf",
        Endpoint::post("v1/{project_id}/waf/ip-group"),
        "id",
        Endpoint::get("v1/{project_id}/waf/ip-group/{id}"),
        Endpoint::delete("v1/{project_id}/waf/ip-group/{id}").with_success_codes(&[200]),
    )
    .with_update_group(UpdateGroup::new(
        &["name", "ip_addresses", "description"],
        Endpoint::put("v1/{project_id}/waf/ip-group/{id}").with_success_codes(&[200]),
    ))
    .with_header("X-Language", "en-us")
}

/// Create and update send the same body
pub fn request_body(_purpose: BodyPurpose<'_>, resource: &Resource) -> LifecycleResult<Option<Json>> {
    let ips = match resource.attributes.get("ip_addresses") {
        Some(Value::List(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    LifecycleError::configuration(format!("{}: ip_addresses must be strings", resource.id))
                })
            })
            .collect::<LifecycleResult<Vec<String>>>()?,
        _ => Vec::new(),
    };

    Ok(Some(build(&[
        Field::required("name", resource.get_string("name")),
        Field::required("ips", ips.join(",")),
        // an empty description clears it on update
        Field::required("description", resource.get_string("description").unwrap_or_default()),
        Field::optional(
            "enterprise_project_id",
            FieldValue::from(resource.get_string("enterprise_project_id")),
        ),
    ])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_joins_addresses() {
        let resource = Resource::new(NAME, "blocked")
            .with_attribute("name", Value::String("blocked".to_string()))
            .with_attribute(
                "ip_addresses",
                Value::List(vec![
                    Value::String("192.168.1.0/24".to_string()),
                    Value::String("10.0.0.1".to_string()),
                ]),
            );

        let body = request_body(BodyPurpose::Create, &resource).unwrap();
        assert_eq!(
            body,
            Some(json!({
                "name": "blocked",
                "ips": "192.168.1.0/24,10.0.0.1",
                "description": "",
            }))
        );
    }

    #[test]
    fn every_request_carries_language_header() {
        let definition = definition();
        assert_eq!(
            definition.headers,
            vec![("X-Language".to_string(), "en-us".to_string())]
        );
        assert!(definition.create_poll.is_none());
    }
}
