//! Extraction pipeline - from viewer URL to one self-contained operation.
//!
//! ```text
//! ParsingUrl -> FetchingDocument -> ValidatingFormat -> RepairingRefs
//!            -> LocatingOperation -> Dereferencing -> Done
//! ```
//!
//! Any stage may fail; the error reports which one via [`ExtractError::stage`].

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::deref::{dereference_at, CircularRef};
use crate::doc_url::DocUrl;
use crate::error::{ExtractError, ReferenceWarning};
use crate::loader::DocumentSource;
use crate::locator::narrow_to_operation;
use crate::repair::{repair_refs, RepairedRef};
use crate::types::{ApiDefinition, ExtractOptions, Stage};

#[cfg(feature = "remote")]
use crate::loader::HttpSource;

/// Descriptive fields of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub title: String,
    pub version: String,
    pub description: String,
    pub host: String,
    pub base_path: String,
    pub tags: Vec<String>,
}

impl DocumentSummary {
    pub fn from_document(document: &Value) -> Self {
        let text = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let info = document.get("info");
        Self {
            title: text(info.and_then(|i| i.get("title"))),
            version: text(info.and_then(|i| i.get("version"))),
            description: text(info.and_then(|i| i.get("description"))),
            host: text(document.get("host")),
            base_path: text(document.get("basePath")),
            tags: document
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(|t| t.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Successful extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Where the document came from and which operation was asked for.
    pub doc_url: DocUrl,
    pub summary: DocumentSummary,
    /// `basePath` of the document ("" when absent).
    pub base_path: String,
    /// Narrowed path table, fully dereferenced except for circular refs.
    pub paths: Map<String, Value>,
    /// The operation as a typed record.
    pub definition: ApiDefinition,
    /// Dangling refs replaced during repair.
    pub repaired: Vec<RepairedRef>,
    /// References that could not be expanded.
    pub warnings: Vec<ReferenceWarning>,
    /// References left in place to break cycles.
    pub circular: Vec<CircularRef>,
}

impl Extraction {
    /// Full report: narrowed document plus diagnostics.
    pub fn to_report(&self) -> Value {
        json!({
            "documentUrl": self.doc_url.document_url,
            "operationId": self.doc_url.operation_id,
            "summary": self.summary,
            "basePath": self.base_path,
            "paths": self.paths,
            "definition": self.definition,
            "repaired": self.repaired,
            "warnings": self.warnings,
            "circular": self.circular,
        })
    }
}

/// Runs extractions against one document source.
#[derive(Debug, Clone)]
pub struct Extractor<S> {
    source: S,
    options: ExtractOptions,
}

#[cfg(feature = "remote")]
impl Extractor<HttpSource> {
    /// Extractor fetching over HTTP with the configured timeout.
    pub fn http(options: ExtractOptions) -> Self {
        let source = HttpSource::new(options.timeout);
        Self::new(source, options)
    }
}

impl<S: DocumentSource> Extractor<S> {
    pub fn new(source: S, options: ExtractOptions) -> Self {
        Self { source, options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Run the whole pipeline for one viewer URL.
    ///
    /// # Errors
    ///
    /// `MalformedDocUrl`, `FetchFailed`, `InvalidDocument` or
    /// `OperationNotFound`, depending on the stage that failed.
    pub fn extract(&self, doc_url: &str) -> Result<Extraction, ExtractError> {
        enter(Stage::ParsingUrl);
        let doc_url = DocUrl::parse_with(doc_url, &self.options)?;

        enter(Stage::FetchingDocument);
        let document = self.source.fetch(&doc_url.document_url)?;

        extract_operation(document, doc_url)
    }
}

fn enter(stage: Stage) {
    tracing::debug!(stage = %stage, "entering stage");
}

/// True if the document declares a `swagger` or `openapi` version.
pub fn has_version_marker(document: &Value) -> bool {
    ["swagger", "openapi"].iter().any(|key| match document.get(key) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    })
}

/// Run the stages after fetching on an already loaded document.
pub fn extract_operation(mut document: Value, doc_url: DocUrl) -> Result<Extraction, ExtractError> {
    enter(Stage::ValidatingFormat);
    if !has_version_marker(&document) {
        tracing::error!(url = %doc_url.document_url, "document has no swagger/openapi marker");
        return Err(ExtractError::InvalidDocument {
            url: doc_url.document_url,
        });
    }

    enter(Stage::RepairingRefs);
    let repaired = repair_refs(&mut document);

    enter(Stage::LocatingOperation);
    tracing::info!(operation_id = %doc_url.operation_id, "looking up operation");
    if narrow_to_operation(&mut document, &doc_url.operation_id) == 0 {
        return Err(ExtractError::OperationNotFound {
            operation_id: doc_url.operation_id,
            url: doc_url.document_url,
        });
    }

    enter(Stage::Dereferencing);
    let not_found = |doc_url: &DocUrl| ExtractError::OperationNotFound {
        operation_id: doc_url.operation_id.clone(),
        url: doc_url.document_url.clone(),
    };
    let deref = dereference_at(&document, "/paths").ok_or_else(|| not_found(&doc_url))?;
    let paths = match deref.value {
        Value::Object(paths) => paths,
        _ => Map::new(),
    };

    let base_path = document
        .get("basePath")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    // With duplicate ids the last match wins
    let definition = paths
        .iter()
        .flat_map(|(path, methods)| {
            methods
                .as_object()
                .into_iter()
                .flatten()
                .map(move |(method, op)| (path, method, op))
        })
        .last()
        .map(|(path, method, op)| ApiDefinition::from_operation(&base_path, path, method, op))
        .ok_or_else(|| not_found(&doc_url))?;

    tracing::info!(
        method = %definition.method,
        path = %definition.full_path,
        "found operation"
    );
    enter(Stage::Done);

    Ok(Extraction {
        summary: DocumentSummary::from_document(&document),
        doc_url,
        base_path,
        paths,
        definition,
        repaired,
        warnings: deref.warnings,
        circular: deref.circular,
    })
}
