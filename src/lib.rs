//! Swagger Slice
//!
//! Extracts one self-contained operation from a Swagger 2.0 / OpenAPI
//! document, starting from the documentation-viewer URL a human would share.
//!
//! The pipeline recovers the group and operation id from the URL fragment,
//! fetches the group's API listing, repairs dangling `$ref`s, narrows the path
//! table to the one operation, and inlines every internal reference (leaving
//! cycles in place).
//!
//! # Example
//!
//! ```
//! use swagger_slice::{ExtractOptions, Extractor, StaticSource};
//! use serde_json::json;
//!
//! let document = json!({
//!     "swagger": "2.0",
//!     "basePath": "/api",
//!     "paths": {
//!         "/users/{id}": {
//!             "get": {
//!                 "operationId": "getUserUsingGET",
//!                 "responses": {
//!                     "200": { "description": "OK", "schema": { "$ref": "#/definitions/User" } }
//!                 }
//!             }
//!         }
//!     },
//!     "definitions": {
//!         "User": { "type": "object", "properties": { "name": { "type": "string" } } }
//!     }
//! });
//!
//! let extractor = Extractor::new(StaticSource::new(document), ExtractOptions::default());
//! let extraction = extractor
//!     .extract("https://h/api/doc.html#/default/user/getUserUsingGET")
//!     .unwrap();
//!
//! assert_eq!(extraction.doc_url.document_url, "https://h/api/v2/api-docs?group=default");
//! assert_eq!(extraction.definition.full_path, "/api/users/{id}");
//! let response = extraction.paths["/users/{id}"]["get"]["responses"]["200"].clone();
//! assert_eq!(response["schema"]["properties"]["name"]["type"], "string");
//! ```
//!
//! # Stages
//!
//! | Stage | Fails with |
//! |-------|------------|
//! | parse viewer URL | `MalformedDocUrl` |
//! | fetch document | `FetchFailed` |
//! | check `swagger`/`openapi` marker | `InvalidDocument` |
//! | repair dangling refs | never |
//! | locate operation | `OperationNotFound` |
//! | dereference | never (warnings only) |

mod deref;
mod doc_url;
mod error;
mod loader;
mod locator;
mod pipeline;
mod repair;
mod types;

pub use deref::{dereference, dereference_at, CircularRef, Dereferenced};
pub use doc_url::DocUrl;
pub use error::{BoxError, ExtractError, ReferenceWarning, WarningKind};
pub use loader::{
    escape_token, is_internal, is_url, load_document, load_document_auto, load_document_str,
    resolve_pointer, DocumentSource, StaticSource,
};
pub use locator::{find_operation, find_operations, locate_operation, narrow_to_operation, OperationMatch};
pub use pipeline::{extract_operation, has_version_marker, DocumentSummary, Extraction, Extractor};
pub use repair::{repair_refs, RepairedRef};
pub use types::{
    json_type_name, ApiDefinition, ExtractOptions, Parameter, ParameterLocation, Property,
    RefForm, ResponseSpec, Schema, Stage,
};

#[cfg(feature = "remote")]
pub use loader::{load_document_url, HttpSource};
