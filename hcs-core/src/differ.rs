//! Differ - Compare desired configuration with the flattened state
//!
//! The result tells the orchestrator whether the object must be created,
//! updated in place, replaced, or left alone.

use std::collections::HashMap;

use crate::resource::{Resource, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create,
    /// Resource exists with updatable differences
    Update { changed_attributes: Vec<String> },
    /// A ForceNew attribute changed -> destroy and recreate
    Replace { attributes: Vec<String> },
    /// Resource exists with no differences -> no action needed
    NoChange,
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange)
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(schema: &ResourceSchema, desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create;
    }

    let changed = find_changed_attributes(schema, &desired.attributes, &current.attributes);

    let force_new: Vec<String> = changed
        .iter()
        .filter(|name| schema.attributes.get(*name).is_some_and(|a| a.force_new))
        .cloned()
        .collect();

    if !force_new.is_empty() {
        Diff::Replace {
            attributes: force_new,
        }
    } else if changed.is_empty() {
        Diff::NoChange
    } else {
        Diff::Update {
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
///
/// Only attributes the caller sets are compared; computed attributes and
/// internal ones (starting with `_`) are skipped.
fn find_changed_attributes(
    schema: &ResourceSchema,
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        if key.starts_with('_') {
            continue;
        }
        if schema.attributes.get(key).is_some_and(|a| a.computed) {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}
