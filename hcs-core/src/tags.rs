//! Tag helpers
//!
//! HCS services exchange tags as `[{"key": .., "value": ..}]`; resources
//! carry them as a string map.

use std::collections::HashMap;

use serde_json::json;

use crate::resource::Value;

/// Build the tag list for a request from a tags attribute
pub fn build_tags(user_tags: Option<&Value>) -> Vec<serde_json::Value> {
    let mut tags = Vec::new();
    if let Some(Value::Map(user_tags)) = user_tags {
        let mut keys: Vec<&String> = user_tags.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(Value::String(v)) = user_tags.get(key) {
                tags.push(json!({"key": key, "value": v}));
            }
        }
    }
    tags
}

/// Parse a tag list into a map
pub fn parse_tags(tags_array: &[serde_json::Value]) -> HashMap<String, Value> {
    let mut tags_map = HashMap::new();
    for tag in tags_array {
        if let Some(key) = tag.get("key").and_then(|v| v.as_str()) {
            let value = tag.get("value").and_then(|v| v.as_str()).unwrap_or_default();
            tags_map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
    tags_map
}

/// Tags to remove and to add when moving from `old` to `new`
///
/// A changed value shows up in both lists: HCS has no in-place tag update.
pub fn diff_tags(
    old: Option<&Value>,
    new: Option<&Value>,
) -> (Vec<serde_json::Value>, Vec<serde_json::Value>) {
    let old = as_map(old);
    let new = as_map(new);

    let removed: HashMap<String, Value> = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let added: HashMap<String, Value> = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    (
        build_tags(Some(&Value::Map(removed))),
        build_tags(Some(&Value::Map(added))),
    )
}

fn as_map(value: Option<&Value>) -> HashMap<String, Value> {
    match value {
        Some(Value::Map(map)) => map.clone(),
        _ => HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    #[test]
    fn test_build_and_parse_tags() {
        let built = build_tags(Some(&tags(&[("team", "net"), ("env", "prod")])));
        assert_eq!(
            built,
            vec![
                json!({"key": "env", "value": "prod"}),
                json!({"key": "team", "value": "net"})
            ]
        );
        let parsed = parse_tags(&built);
        assert_eq!(Value::Map(parsed), tags(&[("team", "net"), ("env", "prod")]));
    }

    #[test]
    fn test_diff_tags() {
        let old = tags(&[("env", "dev"), ("team", "net")]);
        let new = tags(&[("env", "prod"), ("owner", "ops"), ("team", "net")]);
        let (removed, added) = diff_tags(Some(&old), Some(&new));
        assert_eq!(removed, vec![json!({"key": "env", "value": "dev"})]);
        assert_eq!(
            added,
            vec![
                json!({"key": "env", "value": "prod"}),
                json!({"key": "owner", "value": "ops"})
            ]
        );
    }

    #[test]
    fn test_diff_tags_from_nothing() {
        let (removed, added) = diff_tags(None, Some(&tags(&[("env", "prod")])));
        assert!(removed.is_empty());
        assert_eq!(added.len(), 1);
    }
}
