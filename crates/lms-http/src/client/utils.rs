//! Utility functions for the API client.

use crate::error::{ApiError, Result};

/// Validate `raw` and force exactly one trailing `/`.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::Config("base_url is required".into()));
    }

    let normalized = format!("{}/", trimmed);
    let parsed = url::Url::parse(&normalized)
        .map_err(|e| ApiError::Config(format!("invalid base_url '{}': {}", raw, e)))?;
    if parsed.cannot_be_a_base() {
        return Err(ApiError::Config(format!(
            "base_url '{}' cannot be used as a base",
            raw
        )));
    }

    Ok(normalized)
}

/// Join a call-site path onto a normalized base.
///
/// Exactly one leading `/` is stripped so the path stays relative to the
/// base instead of replacing its path.
pub fn join_path(base: &str, path: &str) -> String {
    let relative = path.strip_prefix('/').unwrap_or(path);
    format!("{}{}", base, relative)
}

/// Parse a request method as given. Extension methods pass through.
pub fn parse_method(raw: &str) -> Result<reqwest::Method> {
    reqwest::Method::from_bytes(raw.as_bytes())
        .map_err(|_| ApiError::InvalidMethod(raw.to_string()))
}

pub fn is_access_denied_status(status: u16) -> bool {
    matches!(status, 401 | 403)
}
