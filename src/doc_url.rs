//! Identifier recovery from documentation-viewer URLs.
//!
//! Viewer pages address one operation through the URL fragment:
//!
//! ```text
//! https://host/api/doc.html#/<group>/<tag>/<operationId>
//! ```
//!
//! The group selects which API listing to fetch; the operation id selects
//! the operation inside it.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::ExtractError;
use crate::types::ExtractOptions;

/// Identifiers recovered from a viewer URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocUrl {
    /// The viewer URL as given.
    pub source: String,
    /// Decoded definition-group name.
    pub group: String,
    /// Decoded operation id.
    pub operation_id: String,
    /// URL of the API listing for `group`.
    pub document_url: String,
}

impl DocUrl {
    /// Parse with the default viewer page and API listing path.
    pub fn parse(doc_url: &str) -> Result<Self, ExtractError> {
        Self::parse_with(doc_url, &ExtractOptions::default())
    }

    /// Parse a viewer URL.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::MalformedDocUrl` if the URL doesn't parse or its
    /// fragment has fewer than four non-empty `/`-separated tokens.
    pub fn parse_with(doc_url: &str, options: &ExtractOptions) -> Result<Self, ExtractError> {
        let malformed = |reason: String| ExtractError::MalformedDocUrl {
            url: doc_url.to_string(),
            reason,
        };

        let parsed = Url::parse(doc_url).map_err(|e| malformed(e.to_string()))?;
        let fragment = parsed
            .fragment()
            .ok_or_else(|| malformed("missing '#' fragment".to_string()))?;

        // The leading '#' counts as token 0, so the group sits at 1 and the operation at 3
        let hash = format!("#{}", fragment);
        let tokens: Vec<&str> = hash.split('/').filter(|t| !t.is_empty()).collect();
        if tokens.len() < 4 {
            return Err(malformed(format!(
                "fragment '{}' has {} token(s), expected at least 4",
                hash,
                tokens.len()
            )));
        }

        let group = decode(tokens[1]);
        let operation_id = decode(tokens[3]);
        let document_url = listing_url(&parsed, &group, options);

        tracing::info!(
            document_url = %document_url,
            operation_id = %operation_id,
            "recovered identifiers from doc URL"
        );

        Ok(Self {
            source: doc_url.to_string(),
            group,
            operation_id,
            document_url,
        })
    }
}

fn decode(token: &str) -> String {
    percent_decode_str(token).decode_utf8_lossy().into_owned()
}

/// Build `<origin><path without viewer page><api docs path>?group=<group>`.
fn listing_url(parsed: &Url, group: &str, options: &ExtractOptions) -> String {
    let path = parsed.path();
    let suffix = format!("/{}", options.viewer_page);
    let base = path.strip_suffix(suffix.as_str()).unwrap_or(path);
    let base = base.trim_end_matches('/');

    let mut url = parsed.clone();
    url.set_fragment(None);
    url.set_query(None);
    url.set_path(&format!("{}{}", base, options.api_docs_path));
    url.query_pairs_mut().append_pair("group", group);
    url.to_string()
}
