//! Error types for operation extraction.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::Stage;

/// Boxed transport error, so any `DocumentSource` can report its own failure type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort an extraction request.
#[derive(Debug, Error)]
pub enum ExtractError {
    // Input errors (exit code 2)
    #[error("malformed doc URL '{url}': {reason}")]
    MalformedDocUrl { url: String, reason: String },

    // IO errors (exit code 3)
    #[error("failed to fetch {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Document errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid document at {url}: neither a 'swagger' nor an 'openapi' version marker")]
    InvalidDocument { url: String },

    // Lookup errors (exit code 1)
    #[error("operation '{operation_id}' not found in {url}")]
    OperationNotFound { operation_id: String, url: String },
}

impl ExtractError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FetchFailed { .. } | Self::FileNotFound { .. } | Self::ReadError { .. } => 3,
            Self::OperationNotFound { .. } => 1,
            _ => 2,
        }
    }

    /// Pipeline stage in which this error is raised.
    pub fn stage(&self) -> Stage {
        match self {
            Self::MalformedDocUrl { .. } => Stage::ParsingUrl,
            Self::FetchFailed { .. }
            | Self::FileNotFound { .. }
            | Self::ReadError { .. }
            | Self::InvalidJson { .. } => Stage::FetchingDocument,
            Self::InvalidDocument { .. } => Stage::ValidatingFormat,
            Self::OperationNotFound { .. } => Stage::LocatingOperation,
        }
    }
}

/// Why a single `$ref` was left unexpanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// Points outside the document (file or URL). Never fetched.
    External,
    /// Internal pointer whose target does not exist.
    Unresolvable,
    /// `$ref` value is not a string.
    NotAString,
}

/// Non-fatal diagnostic recorded while dereferencing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceWarning {
    /// JSON Pointer (RFC 6901) to the node carrying the `$ref`.
    pub location: String,
    /// The reference as written, or the JSON type name when it isn't a string.
    pub reference: String,
    pub kind: WarningKind,
}

impl std::fmt::Display for ReferenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.kind {
            WarningKind::External => "external reference ignored",
            WarningKind::Unresolvable => "unresolvable reference",
            WarningKind::NotAString => "$ref is not a string",
        };
        write!(f, "{}: {} ({})", self.location, what, self.reference)
    }
}
