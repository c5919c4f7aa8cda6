//! Resource reference validation
//!
//! A reference is the full HATEOAS URL the server hands out for a resource,
//! e.g. `http://localhost:9311/v1/secrets/<uuid>`. Bare identifiers are
//! rejected rather than joined onto a guessed base URL.

use reqwest::Url;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Check that `reference` is an absolute http(s) URL ending in a UUID
pub fn validate_ref(reference: &str, entity: &str) -> Result<()> {
    let url = Url::parse(reference).map_err(|_| Error::invalid_reference(entity, reference))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::invalid_reference(entity, reference));
    }

    let trailing = url
        .path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    Uuid::parse_str(trailing).map_err(|_| Error::invalid_reference(entity, reference))?;
    Ok(())
}

/// Last path segment of a reference (the resource UUID)
pub fn ref_id(reference: &str) -> &str {
    reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(reference)
}

/// Reject empty references before issuing a DELETE
pub(crate) fn require_ref<'a>(reference: &'a str, entity: &str) -> Result<&'a str> {
    if reference.trim().is_empty() {
        return Err(Error::MissingReference {
            entity: entity.to_string(),
        });
    }
    Ok(reference)
}
