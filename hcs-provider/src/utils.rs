//! Helpers for billing parameters and loosely typed attributes

use hcs_core::resource::{Resource, Value};

/// BSS period type for a period unit ("month" -> 2, "year" -> 3)
pub fn period_type(unit: &str) -> Option<i64> {
    match unit {
        "month" => Some(2),
        "year" => Some(3),
        _ => None,
    }
}

/// Parse a boolean given as a bool or as "true"/"false"
pub fn bool_attribute(resource: &Resource, name: &str) -> Option<bool> {
    match resource.attributes.get(name)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
