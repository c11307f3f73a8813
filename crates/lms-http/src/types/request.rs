//! Outgoing API request parameters.

use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outgoing API request parameters.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: String,
    pub content_type: Option<String>,
    pub body: bytes::Bytes,
    pub extra_headers: BTreeMap<String, String>,
}

impl ApiRequest {
    #[inline]
    pub fn new() -> Self {
        Self {
            method: "GET".to_string(),
            content_type: None,
            body: bytes::Bytes::new(),
            extra_headers: BTreeMap::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self> {
        let encoded = serde_json::to_vec(body)?;
        Ok(self
            .with_content_type("application/json")
            .with_body(encoded))
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.extra_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set `name`, replacing any existing header that differs only in case.
    pub fn replace_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.extra_headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.extra_headers.insert(name.to_string(), value.into());
        self
    }
}

impl Default for ApiRequest {
    fn default() -> Self {
        Self::new()
    }
}
