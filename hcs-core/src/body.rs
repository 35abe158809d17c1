//! Request Body Builder
//!
//! Turns an ordered list of fields into a nested JSON object. A field is
//! dropped only when its value is [`FieldValue::Absent`] and it is marked
//! `omit_if_empty`; explicit `false`, `0`, `""` and empty lists are always kept.

use std::collections::HashMap;

use serde_json::{Map, Value as Json};

use crate::error::LifecycleResult;
use crate::lifecycle::UpdateGroup;
use crate::resource::{Resource, Value};
use crate::schema::ResourceSchema;

/// What a request body is being built for
#[derive(Debug, Clone, Copy)]
pub enum BodyPurpose<'a> {
    Create,
    Update(&'a UpdateGroup),
}

/// Builds the request body of each resource kind
pub trait BuildRequestBody {
    /// Body for the given purpose; `None` sends no body
    fn build_request_body(
        &self,
        purpose: BodyPurpose<'_>,
        resource: &Resource,
    ) -> LifecycleResult<Option<Json>>;
}

/// Body built purely from the schema's request keys
///
/// Updates only carry the attributes of their update group.
pub fn schema_body(schema: &ResourceSchema, purpose: BodyPurpose<'_>, resource: &Resource) -> Json {
    let include = match purpose {
        BodyPurpose::Create => None,
        BodyPurpose::Update(group) => Some(group.attributes.as_slice()),
    };
    build(&fields_from_attributes(schema, &resource.attributes, include))
}

/// Value of a body field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The field was not set by the caller
    Absent,
    Scalar(Json),
    Object(Vec<Field>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Lift an optional attribute into a field value
    pub fn from_attribute(value: Option<&Value>) -> Self {
        match value {
            None => FieldValue::Absent,
            Some(Value::List(items)) => FieldValue::List(
                items
                    .iter()
                    .map(|item| FieldValue::from_attribute(Some(item)))
                    .collect(),
            ),
            Some(Value::Map(map)) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                FieldValue::Object(
                    keys.into_iter()
                        .map(|k| Field::optional(k.clone(), FieldValue::from_attribute(map.get(k))))
                        .collect(),
                )
            }
            Some(v) => FieldValue::Scalar(v.to_json()),
        }
    }
}

impl From<Json> for FieldValue {
    fn from(value: Json) -> Self {
        FieldValue::Scalar(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Absent)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(Json::String(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Scalar(Json::String(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Scalar(Json::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Scalar(Json::Bool(value))
    }
}

/// One field of a request body
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
    pub omit_if_empty: bool,
}

impl Field {
    /// Field that is dropped when absent
    pub fn optional(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            omit_if_empty: true,
        }
    }

    /// Field that is always emitted, as `null` when absent
    pub fn required(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            omit_if_empty: false,
        }
    }
}

/// Build a JSON object from fields
pub fn build(fields: &[Field]) -> Json {
    Json::Object(build_map(fields))
}

fn build_map(fields: &[Field]) -> Map<String, Json> {
    let mut map = Map::new();
    for field in fields {
        match render(&field.value) {
            Some(json) => {
                map.insert(field.key.clone(), json);
            }
            None if !field.omit_if_empty => {
                map.insert(field.key.clone(), Json::Null);
            }
            None => {}
        }
    }
    map
}

/// Render a value, `None` meaning "absent"
fn render(value: &FieldValue) -> Option<Json> {
    match value {
        FieldValue::Absent => None,
        FieldValue::Scalar(json) => Some(json.clone()),
        FieldValue::Object(fields) => {
            let map = build_map(fields);
            // an object with nothing set is itself unset
            if map.is_empty() && !fields.is_empty() {
                None
            } else {
                Some(Json::Object(map))
            }
        }
        FieldValue::List(items) => Some(Json::Array(items.iter().filter_map(render).collect())),
    }
}

/// Build the field list for a resource from its schema
///
/// Each attribute with a request key contributes one field; dotted keys such
/// as `vpc.name` nest under `vpc`. Attributes not in `include` are skipped
/// when a filter is given. Fields follow the key order of the schema.
pub fn fields_from_attributes(
    schema: &ResourceSchema,
    attributes: &HashMap<String, Value>,
    include: Option<&[String]>,
) -> Vec<Field> {
    let mut root: Vec<Field> = Vec::new();

    for attr in schema.sorted_attributes() {
        let Some(key) = attr.request_key.as_deref() else {
            continue;
        };
        if include.is_some_and(|names| !names.iter().any(|n| *n == attr.name)) {
            continue;
        }
        let value = FieldValue::from_attribute(attributes.get(&attr.name));
        let segments: Vec<&str> = key.split('.').collect();
        insert_nested(&mut root, &segments, value, !attr.required);
    }

    root
}

fn insert_nested(fields: &mut Vec<Field>, segments: &[&str], value: FieldValue, optional: bool) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        fields.push(Field {
            key: head.to_string(),
            value,
            omit_if_empty: optional,
        });
        return;
    }

    let position = fields
        .iter()
        .position(|f| f.key == *head && matches!(f.value, FieldValue::Object(_)));
    let index = match position {
        Some(i) => i,
        None => {
            fields.push(Field::optional(*head, FieldValue::Object(Vec::new())));
            fields.len() - 1
        }
    };

    if let FieldValue::Object(children) = &mut fields[index].value {
        insert_nested(children, rest, value, optional);
    }
}
