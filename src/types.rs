//! Core types for operation extraction.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Key marking a JSON reference.
pub const REF_KEY: &str = "$ref";

/// HTTP methods that may appear under a path item.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Steps of the extraction pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    ParsingUrl,
    FetchingDocument,
    ValidatingFormat,
    RepairingRefs,
    LocatingOperation,
    Dereferencing,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ParsingUrl => "parsing-url",
            Stage::FetchingDocument => "fetching-document",
            Stage::ValidatingFormat => "validating-format",
            Stage::RepairingRefs => "repairing-refs",
            Stage::LocatingOperation => "locating-operation",
            Stage::Dereferencing => "dereferencing",
            Stage::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for deriving the document URL and fetching it.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Viewer page stripped from the doc URL path (e.g., "doc.html").
    pub viewer_page: String,
    /// Path appended to form the API listing URL (e.g., "/v2/api-docs").
    pub api_docs_path: String,
    /// Timeout for the document fetch.
    pub timeout: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            viewer_page: "doc.html".to_string(),
            api_docs_path: "/v2/api-docs".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the viewer page name. A leading `/` is ignored.
    pub fn viewer_page(mut self, page: impl Into<String>) -> Self {
        self.viewer_page = page.into().trim_start_matches('/').to_string();
        self
    }

    /// Set the API listing path. A leading `/` is added if missing.
    pub fn api_docs_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.api_docs_path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How a node carries its `$ref` key.
///
/// Shared by [`Schema::from_value`] and the dereferencer so both agree on what
/// counts as a reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefForm<'a> {
    /// No `$ref` key.
    Absent,
    /// `#...` pointer into the same document.
    Internal(&'a str),
    /// Any other string (another file or URL).
    External(&'a str),
    /// `$ref` holding something other than a string.
    NotAString(&'a Value),
}

impl<'a> RefForm<'a> {
    pub const KEY: &'static str = REF_KEY;

    pub fn of(map: &'a Map<String, Value>) -> Self {
        match map.get(Self::KEY) {
            None => RefForm::Absent,
            Some(Value::String(r)) if r.starts_with('#') => RefForm::Internal(r),
            Some(Value::String(r)) => RefForm::External(r),
            Some(other) => RefForm::NotAString(other),
        }
    }

    /// The reference string, internal or external.
    pub fn pointer(&self) -> Option<&'a str> {
        match *self {
            RefForm::Internal(r) | RefForm::External(r) => Some(r),
            RefForm::Absent | RefForm::NotAString(_) => None,
        }
    }
}

/// A named property of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub required: bool,
    pub schema: Schema,
}

/// Structural type node.
///
/// After dereferencing, a `Reference` only survives where expanding it
/// would have re-entered a schema already being expanded.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Reference {
        pointer: String,
    },
    Object {
        title: Option<String>,
        description: Option<String>,
        properties: Vec<Property>,
        /// Value schema for map-like objects (`additionalProperties`).
        additional: Option<Box<Schema>>,
    },
    Array {
        description: Option<String>,
        items: Box<Schema>,
    },
    Primitive {
        /// `None` when the node declares no type at all.
        kind: Option<String>,
        format: Option<String>,
        description: Option<String>,
        enum_values: Vec<Value>,
    },
}

impl Schema {
    /// Schema accepting anything.
    pub fn any() -> Self {
        Schema::Primitive {
            kind: None,
            format: None,
            description: None,
            enum_values: Vec::new(),
        }
    }

    /// Classify a raw JSON node.
    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Schema::any();
        };

        if let Some(pointer) = RefForm::of(map).pointer() {
            return Schema::Reference {
                pointer: pointer.to_string(),
            };
        }

        let kind = map.get("type").and_then(Value::as_str);
        let description = str_field(map, "description");

        if kind == Some("array") || map.contains_key("items") {
            let items = map.get("items").map(Schema::from_value).unwrap_or_else(Schema::any);
            return Schema::Array {
                description,
                items: Box::new(items),
            };
        }

        if kind == Some("object") || map.contains_key("properties") || map.contains_key("allOf")
        {
            let mut properties = Vec::new();
            collect_properties(map, &mut properties);
            let additional = match map.get("additionalProperties") {
                Some(v @ Value::Object(_)) => Some(Box::new(Schema::from_value(v))),
                _ => None,
            };
            return Schema::Object {
                title: str_field(map, "title"),
                description,
                properties,
                additional,
            };
        }

        Schema::Primitive {
            kind: kind.map(str::to_string),
            format: str_field(map, "format"),
            description,
            enum_values: map
                .get("enum")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// Render back to a JSON schema node.
    pub fn to_value(&self) -> Value {
        match self {
            Schema::Reference { pointer } => json!({ REF_KEY: pointer }),
            Schema::Object {
                title,
                description,
                properties,
                additional,
            } => {
                let mut map = Map::new();
                map.insert("type".into(), json!("object"));
                put_opt(&mut map, "title", title);
                put_opt(&mut map, "description", description);
                if !properties.is_empty() {
                    let props: Map<String, Value> = properties
                        .iter()
                        .map(|p| (p.name.clone(), p.schema.to_value()))
                        .collect();
                    map.insert("properties".into(), Value::Object(props));
                    let required: Vec<Value> = properties
                        .iter()
                        .filter(|p| p.required)
                        .map(|p| json!(p.name))
                        .collect();
                    if !required.is_empty() {
                        map.insert("required".into(), Value::Array(required));
                    }
                }
                if let Some(additional) = additional {
                    map.insert("additionalProperties".into(), additional.to_value());
                }
                Value::Object(map)
            }
            Schema::Array { description, items } => {
                let mut map = Map::new();
                map.insert("type".into(), json!("array"));
                put_opt(&mut map, "description", description);
                map.insert("items".into(), items.to_value());
                Value::Object(map)
            }
            Schema::Primitive {
                kind,
                format,
                description,
                enum_values,
            } => {
                let mut map = Map::new();
                put_opt(&mut map, "type", kind);
                put_opt(&mut map, "format", format);
                put_opt(&mut map, "description", description);
                if !enum_values.is_empty() {
                    map.insert("enum".into(), Value::Array(enum_values.clone()));
                }
                Value::Object(map)
            }
        }
    }

    /// True if a reference survives anywhere in this schema.
    pub fn has_references(&self) -> bool {
        match self {
            Schema::Reference { .. } => true,
            Schema::Object {
                properties,
                additional,
                ..
            } => {
                properties.iter().any(|p| p.schema.has_references())
                    || additional.as_ref().is_some_and(|a| a.has_references())
            }
            Schema::Array { items, .. } => items.has_references(),
            Schema::Primitive { .. } => false,
        }
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|v| Schema::from_value(&v))
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn put_opt(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        map.insert(key.to_string(), Value::String(v.clone()));
    }
}

/// Gather properties from `properties`, flattening `allOf` members.
fn collect_properties(map: &Map<String, Value>, out: &mut Vec<Property>) {
    if let Some(Value::Array(members)) = map.get("allOf") {
        for member in members {
            if let Value::Object(member) = member {
                collect_properties(member, out);
            }
        }
    }

    let required: Vec<&str> = map
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if let Some(Value::Object(props)) = map.get("properties") {
        for (name, prop) in props {
            let property = Property {
                name: name.clone(),
                required: required.contains(&name.as_str()),
                schema: Schema::from_value(prop),
            };
            match out.iter_mut().find(|p| p.name == *name) {
                Some(existing) => *existing = property,
                None => out.push(property),
            }
        }
    }
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
    Cookie,
}

/// One operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Item schema for array-typed non-body parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Schema>,
    /// Body schema (Swagger 2 body parameters, OpenAPI 3 parameters and request bodies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// One response entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSpec {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl ResponseSpec {
    /// Read a Swagger 2 (`schema`) or OpenAPI 3 (`content.*.schema`) response.
    pub fn from_value(value: &Value) -> Self {
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let schema = value
            .get("schema")
            .or_else(|| first_media_schema(value))
            .map(Schema::from_value);
        Self {
            description,
            schema,
        }
    }
}

fn first_media_schema(value: &Value) -> Option<&Value> {
    value
        .get("content")?
        .as_object()?
        .values()
        .find_map(|media| media.get("schema"))
}

/// Self-contained description of one operation, ready for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinition {
    /// `basePath` joined with the operation's path.
    pub full_path: String,
    /// Uppercase HTTP method.
    pub method: String,
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    pub parameters: Vec<Parameter>,
    pub responses: BTreeMap<String, ResponseSpec>,
    /// Primary success response: `200`, else the first 2xx, else the first listed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSpec>,
}

impl ApiDefinition {
    /// Build from an (already dereferenced) operation object.
    pub fn from_operation(base_path: &str, path: &str, method: &str, operation: &Value) -> Self {
        let mut parameters = Vec::new();
        for raw in operation
            .get("parameters")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            match serde_json::from_value::<Parameter>(raw.clone()) {
                Ok(param) => parameters.push(param),
                Err(e) => tracing::warn!(path, method, error = %e, "skipping unreadable parameter"),
            }
        }
        if let Some(body) = operation.get("requestBody") {
            parameters.push(Parameter {
                name: "body".to_string(),
                location: ParameterLocation::Body,
                description: body
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
                kind: None,
                format: None,
                items: None,
                schema: first_media_schema(body).map(Schema::from_value),
                default: None,
            });
        }

        let mut responses = BTreeMap::new();
        let mut primary = None;
        if let Some(Value::Object(raw)) = operation.get("responses") {
            primary = raw
                .get("200")
                .or_else(|| {
                    raw.iter()
                        .find(|(code, _)| code.starts_with('2'))
                        .map(|(_, v)| v)
                })
                .or_else(|| raw.values().next())
                .map(ResponseSpec::from_value);
            for (code, value) in raw {
                responses.insert(code.clone(), ResponseSpec::from_value(value));
            }
        }

        Self {
            full_path: join_path(base_path, path),
            method: method.to_uppercase(),
            operation_id: str_at(operation, "operationId").unwrap_or_default(),
            summary: str_at(operation, "summary"),
            description: str_at(operation, "description"),
            tags: string_list(operation, "tags"),
            consumes: string_list(operation, "consumes"),
            produces: string_list(operation, "produces"),
            deprecated: operation
                .get("deprecated")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            parameters,
            responses,
            response: primary,
        }
    }

    /// Parameters that feed downstream typing; header parameters are left out.
    pub fn typed_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.location != ParameterLocation::Header)
    }
}

fn str_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Join `basePath` and a path without doubling or dropping the slash.
pub fn join_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
