//! Reference dereferencing - inlines internal `$ref` pointers.
//!
//! Every internal `$ref` is replaced by a copy of its target, itself expanded
//! recursively. Cycles in the reference graph are detected with a stack of the
//! pointers currently being expanded: a `$ref` to a pointer already on the
//! stack (or to an ancestor of the node being walked) is left as written and
//! reported in [`Dereferenced::circular`].
//!
//! A recursive target, one that can reach itself through `$ref`s, is inlined
//! at its first use only. Later uses keep their `$ref` and are reported as
//! circular too, which keeps the output linear in the number of definitions.
//! Non-recursive targets are inlined at every use.
//!
//! Problems with a single reference never abort the walk. They are collected
//! as [`ReferenceWarning`]s and the offending node is left unexpanded.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ReferenceWarning, WarningKind};
use crate::loader::{escape_token, resolve_pointer};
use crate::types::{json_type_name, RefForm};

/// A `$ref` left in place because expanding it would loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircularRef {
    /// JSON Pointer to the node in the output that still carries `$ref`.
    pub location: String,
    pub reference: String,
}

/// Result of dereferencing.
#[derive(Debug, Clone)]
pub struct Dereferenced {
    pub value: Value,
    pub warnings: Vec<ReferenceWarning>,
    pub circular: Vec<CircularRef>,
}

impl Dereferenced {
    /// True when every reference was expanded.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty() && self.circular.is_empty()
    }
}

/// Dereference a whole document.
pub fn dereference(document: &Value) -> Dereferenced {
    let mut walker = Walker::new(document);
    let mut value = document.clone();
    walker.expand(&mut value, &mut String::new());
    walker.finish(value)
}

/// Dereference the subtree at `pointer` (e.g., "/paths"), resolving against the whole document.
///
/// Returns `None` if `pointer` doesn't exist.
pub fn dereference_at(document: &Value, pointer: &str) -> Option<Dereferenced> {
    let mut value = document.pointer(pointer)?.clone();
    let mut walker = Walker::new(document);
    walker.expand(&mut value, &mut pointer.to_string());
    Some(walker.finish(value))
}

struct Walker<'a> {
    root: &'a Value,
    /// Canonical pointers being expanded on the current path.
    active: Vec<String>,
    /// Literal location where the outermost expansion on the stack started.
    entry: Option<String>,
    /// Pointers already inlined somewhere in the output.
    inlined: HashSet<String>,
    /// Memo for [`Walker::is_recursive`].
    recursive: HashMap<String, bool>,
    warnings: Vec<ReferenceWarning>,
    circular: Vec<CircularRef>,
}

impl<'a> Walker<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            active: Vec::new(),
            entry: None,
            inlined: HashSet::new(),
            recursive: HashMap::new(),
            warnings: Vec::new(),
            circular: Vec::new(),
        }
    }

    fn finish(self, value: Value) -> Dereferenced {
        for w in &self.warnings {
            tracing::warn!(warning = %w, "reference left unexpanded");
        }
        for c in &self.circular {
            tracing::debug!(location = %c.location, reference = %c.reference, "circular $ref ignored");
        }
        Dereferenced {
            value,
            warnings: self.warnings,
            circular: self.circular,
        }
    }

    fn warn(&mut self, location: &str, reference: String, kind: WarningKind) {
        self.warnings.push(ReferenceWarning {
            location: display_location(location),
            reference,
            kind,
        });
    }

    fn expand(&mut self, node: &mut Value, location: &mut String) {
        let replacement = match node {
            Value::Object(map) => {
                let reference = match RefForm::of(map) {
                    RefForm::Absent => None,
                    RefForm::Internal(r) => Some(r.to_string()),
                    RefForm::External(r) => {
                        self.warn(location, r.to_string(), WarningKind::External);
                        None
                    }
                    RefForm::NotAString(other) => {
                        let actual = json_type_name(other).to_string();
                        self.warn(location, actual, WarningKind::NotAString);
                        None
                    }
                };

                self.expand_children(map, location, reference.is_some());
                reference.and_then(|r| self.expand_ref(map, &r, location))
            }
            Value::Array(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let len = location.len();
                    location.push('/');
                    location.push_str(&i.to_string());
                    self.expand(item, location);
                    location.truncate(len);
                }
                None
            }
            _ => None,
        };

        if let Some(replacement) = replacement {
            *node = replacement;
        }
    }

    fn expand_children(&mut self, map: &mut Map<String, Value>, location: &mut String, skip_ref: bool) {
        for (key, child) in map.iter_mut() {
            if skip_ref && key == RefForm::KEY {
                continue;
            }
            let len = location.len();
            location.push('/');
            location.push_str(&escape_token(key));
            self.expand(child, location);
            location.truncate(len);
        }
    }

    /// Inline the target of `reference` into `map`.
    ///
    /// Returns a whole replacement when the target isn't an object and
    /// nothing else sits next to the `$ref`.
    fn expand_ref(
        &mut self,
        map: &mut Map<String, Value>,
        reference: &str,
        location: &mut String,
    ) -> Option<Value> {
        let key = canonical(reference).into_owned();
        if self.is_cycle(&key, location) {
            self.circular.push(CircularRef {
                location: display_location(location),
                reference: reference.to_string(),
            });
            return None;
        }

        let Some(target) = resolve_pointer(self.root, reference) else {
            self.warn(location, reference.to_string(), WarningKind::Unresolvable);
            return None;
        };

        let mut expanded = target.clone();
        if self.active.is_empty() {
            self.entry = Some(location.clone());
        }
        self.inlined.insert(key.clone());
        self.active.push(key);
        self.expand(&mut expanded, location);
        self.active.pop();
        if self.active.is_empty() {
            self.entry = None;
        }

        map.remove(RefForm::KEY);
        match expanded {
            Value::Object(target_map) => {
                for (k, v) in target_map {
                    map.entry(k).or_insert(v);
                }
                None
            }
            other if map.is_empty() => Some(other),
            // Non-object target with siblings: keep the siblings, drop the ref
            _ => None,
        }
    }
}

impl Walker<'_> {
    /// True if expanding `key` here would loop or repeat a recursive schema.
    fn is_cycle(&mut self, key: &str, location: &str) -> bool {
        if self.active.iter().any(|k| k == key) {
            return true;
        }
        let literal = self.entry.as_deref().unwrap_or(location);
        if is_ancestor(key, literal) {
            return true;
        }
        self.inlined.contains(key) && self.is_recursive(key)
    }

    /// True if the schema at `key` can reach itself through internal refs.
    fn is_recursive(&mut self, key: &str) -> bool {
        if let Some(&known) = self.recursive.get(key) {
            return known;
        }

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        if let Some(target) = self.root.pointer(key) {
            collect_refs(target, &mut pending);
        }
        let mut found = false;
        while let Some(next) = pending.pop() {
            if next == key {
                found = true;
                break;
            }
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(target) = self.root.pointer(&next) {
                collect_refs(target, &mut pending);
            }
        }

        self.recursive.insert(key.to_string(), found);
        found
    }
}

/// Canonical pointers of every internal `$ref` under `value`.
fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let RefForm::Internal(r) = RefForm::of(map) {
                out.push(canonical(r).into_owned());
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, out);
            }
        }
        _ => {}
    }
}

/// True if `pointer` names `location` or one of its ancestors.
fn is_ancestor(pointer: &str, location: &str) -> bool {
    pointer.is_empty()
        || location == pointer
        || location
            .strip_prefix(pointer)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Key used for cycle detection: the pointer part, percent-decoded.
fn canonical(reference: &str) -> Cow<'_, str> {
    let pointer = reference.trim_start_matches('#');
    percent_decode_str(pointer)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(pointer))
}

fn display_location(location: &str) -> String {
    if location.is_empty() {
        "/".to_string()
    } else {
        location.to_string()
    }
}
