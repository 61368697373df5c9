//! Document loading and pointer navigation.
//!
//! Handles loading documents from files, strings, and HTTP URLs, and walking
//! internal `#/...` pointers.

use std::path::Path;

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::error::ExtractError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Where the pipeline gets its document from.
///
/// Implementations must not retry; a failure is reported as-is.
pub trait DocumentSource {
    fn fetch(&self, url: &str) -> Result<Value, ExtractError>;
}

impl<F> DocumentSource for F
where
    F: Fn(&str) -> Result<Value, ExtractError>,
{
    fn fetch(&self, url: &str) -> Result<Value, ExtractError> {
        self(url)
    }
}

/// Serves one already-loaded document for any URL.
#[derive(Debug, Clone)]
pub struct StaticSource {
    document: Value,
}

impl StaticSource {
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

impl DocumentSource for StaticSource {
    fn fetch(&self, _url: &str) -> Result<Value, ExtractError> {
        Ok(self.document.clone())
    }
}

/// Fetches documents with a blocking HTTP GET.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    timeout: Duration,
}

#[cfg(feature = "remote")]
impl HttpSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "remote")]
impl DocumentSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<Value, ExtractError> {
        load_document_url(url, self.timeout)
    }
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `ExtractError::FileNotFound` if the file doesn't exist,
/// or `ExtractError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ExtractError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a document from a JSON string.
///
/// # Errors
///
/// Returns `ExtractError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, ExtractError> {
    serde_json::from_str(content).map_err(|source| ExtractError::InvalidJson { source })
}

/// Load a document from an HTTP/HTTPS URL.
///
/// # Errors
///
/// Returns `ExtractError::FetchFailed` if the request fails, the server
/// answers with an error status, or the body isn't JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str, timeout: Duration) -> Result<Value, ExtractError> {
    let fetch_failed = |source: reqwest::Error| ExtractError::FetchFailed {
        url: url.to_string(),
        source: Box::new(source),
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(fetch_failed)?;

    tracing::info!(url, "fetching document");
    let response = client.get(url).send().map_err(fetch_failed)?;

    // Check for HTTP errors before parsing
    let response = response.error_for_status().map_err(fetch_failed)?;

    response.json().map_err(fetch_failed)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// URL loading requires the `remote` feature.
#[cfg_attr(not(feature = "remote"), allow(unused_variables))]
pub fn load_document_auto(
    source: &str,
    timeout: std::time::Duration,
) -> Result<Value, ExtractError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source, timeout)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(ExtractError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// True for references that stay inside the current document.
pub fn is_internal(reference: &str) -> bool {
    reference.starts_with('#')
}

/// Navigate an internal reference (e.g., "#/definitions/User") from the document root.
///
/// Segments use JSON Pointer escaping (`~1` = `/`, `~0` = `~`) and may be
/// percent-encoded; numeric segments index into arrays. Returns `None` if the
/// reference isn't internal or any segment is missing.
pub fn resolve_pointer<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if let Some(found) = root.pointer(pointer) {
        return Some(found);
    }
    // Some generators percent-encode non-ASCII definition names
    let decoded = percent_decode_str(pointer).decode_utf8().ok()?;
    if decoded == pointer {
        return None;
    }
    root.pointer(&decoded)
}

/// Escape one key for use inside a JSON Pointer.
pub fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
