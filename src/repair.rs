//! Reference repair - replaces dangling internal `$ref` pointers.
//!
//! API listings generated by frameworks often reference definitions that were
//! never emitted. Repair walks the document's literal tree (not the reference
//! graph) and turns every internal `$ref` whose target is missing into the
//! placeholder schema `{"type": "object"}`, so later stages can assume every
//! surviving internal reference resolves.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::loader::{escape_token, resolve_pointer};
use crate::types::{RefForm, REF_KEY};

/// A `$ref` that was replaced by the placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairedRef {
    /// JSON Pointer to the node that carried the reference.
    pub location: String,
    /// The dangling reference.
    pub reference: String,
}

/// Replace every dangling internal `$ref` in place.
///
/// Never fails. Non-string and external references are left alone. Applying
/// it twice gives the same document as applying it once.
pub fn repair_refs(document: &mut Value) -> Vec<RepairedRef> {
    // Targets are checked against the unmodified document first, then patched
    let mut broken = HashSet::new();
    collect_broken(document, document, &mut broken);
    if broken.is_empty() {
        return Vec::new();
    }

    let mut repaired = Vec::new();
    patch(document, &broken, &mut String::new(), &mut repaired);
    for r in &repaired {
        tracing::warn!(location = %r.location, reference = %r.reference, "repaired dangling $ref");
    }
    repaired
}

/// Reference string of an internal `$ref` on this node, if any.
fn internal_ref(map: &Map<String, Value>) -> Option<&str> {
    match RefForm::of(map) {
        RefForm::Internal(r) => Some(r),
        RefForm::Absent | RefForm::External(_) | RefForm::NotAString(_) => None,
    }
}

fn collect_broken(root: &Value, node: &Value, broken: &mut HashSet<String>) {
    match node {
        Value::Object(map) => {
            if let Some(reference) = internal_ref(map) {
                if resolve_pointer(root, reference).is_none() {
                    broken.insert(reference.to_string());
                }
            }
            for (key, child) in map {
                if key != REF_KEY || !child.is_string() {
                    collect_broken(root, child, broken);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_broken(root, item, broken);
            }
        }
        _ => {}
    }
}

fn patch(
    node: &mut Value,
    broken: &HashSet<String>,
    location: &mut String,
    repaired: &mut Vec<RepairedRef>,
) {
    match node {
        Value::Object(map) => {
            let dangling = internal_ref(map)
                .filter(|r| broken.contains(*r))
                .map(str::to_string);
            if let Some(reference) = dangling {
                map.remove(REF_KEY);
                if !map.contains_key("type") {
                    map.insert("type".to_string(), Value::String("object".to_string()));
                }
                repaired.push(RepairedRef {
                    location: if location.is_empty() {
                        "/".to_string()
                    } else {
                        location.clone()
                    },
                    reference,
                });
            }
            for (key, child) in map.iter_mut() {
                let len = location.len();
                location.push('/');
                location.push_str(&escape_token(key));
                patch(child, broken, location, repaired);
                location.truncate(len);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                let len = location.len();
                location.push('/');
                location.push_str(&i.to_string());
                patch(item, broken, location, repaired);
                location.truncate(len);
            }
        }
        _ => {}
    }
}
