//! Operation lookup and document narrowing.

use serde_json::{Map, Value};

use crate::types::HTTP_METHODS;

/// One path/method pair found by operation id.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationMatch<'a> {
    pub path: &'a str,
    /// Method key as written in the document.
    pub method: &'a str,
    pub operation: &'a Value,
}

/// Method entries of a path item, in document order.
///
/// Only HTTP method keys holding an object count; path-level `parameters`,
/// `summary` and the like are skipped.
fn operations(path_item: &Value) -> impl Iterator<Item = (&String, &Value)> {
    path_item
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(method, op)| {
            op.is_object() && HTTP_METHODS.contains(&method.to_ascii_lowercase().as_str())
        })
}

fn has_id(operation: &Value, operation_id: &str) -> bool {
    operation.get("operationId").and_then(Value::as_str) == Some(operation_id)
}

/// Every path/method pair whose `operationId` equals `operation_id`, in document order.
pub fn find_operations<'a>(document: &'a Value, operation_id: &str) -> Vec<OperationMatch<'a>> {
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for (path, item) in paths {
        for (method, op) in operations(item) {
            if has_id(op, operation_id) {
                found.push(OperationMatch {
                    path,
                    method,
                    operation: op,
                });
            }
        }
    }
    found
}

/// First path/method pair carrying `operation_id`.
pub fn find_operation<'a>(document: &'a Value, operation_id: &str) -> Option<OperationMatch<'a>> {
    find_operations(document, operation_id).into_iter().next()
}

/// Build a path table holding only the operation(s) with `operation_id`.
///
/// The table is empty when nothing matches. Operation ids are expected to be
/// unique; when they aren't, each duplicate is logged and a later match under
/// the same path replaces the earlier one.
pub fn locate_operation(document: &Value, operation_id: &str) -> Map<String, Value> {
    let matches = find_operations(document, operation_id);
    if matches.len() > 1 {
        for m in &matches {
            tracing::warn!(
                operation_id,
                path = m.path,
                method = m.method,
                "duplicate operationId"
            );
        }
    }

    let mut table = Map::new();
    for m in matches {
        let mut methods = Map::new();
        methods.insert(m.method.to_string(), m.operation.clone());
        table.insert(m.path.to_string(), Value::Object(methods));
    }
    table
}

/// Replace the document's path table with only the operation(s) with `operation_id`.
///
/// Returns the number of path entries left.
pub fn narrow_to_operation(document: &mut Value, operation_id: &str) -> usize {
    let table = locate_operation(document, operation_id);
    let len = table.len();
    if let Value::Object(root) = document {
        root.insert("paths".to_string(), Value::Object(table));
    }
    len
}
