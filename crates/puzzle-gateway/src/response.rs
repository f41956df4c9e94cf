//! Upstream content response handling.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::client::FetchError;

/// A fragment content response.
///
/// The upstream returns a JSON object whose string-valued keys are partials
/// (`main` plus optional named slots) and whose optional `model` key carries
/// the page model exposed to client scripts. Status and headers are kept so
/// a primary fragment can dictate the page response.
#[derive(Debug, Clone)]
pub struct ContentResponse {
    /// The upstream HTTP status code.
    pub status: u16,
    /// The upstream response headers.
    pub headers: HashMap<String, String>,
    /// Rendered partials by name.
    pub html: HashMap<String, String>,
    /// Page model exposed on `window`, if the fragment returned one.
    pub model: Option<Map<String, Value>>,
}

impl ContentResponse {
    /// Create an empty response with a status code.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            html: HashMap::new(),
            model: None,
        }
    }

    /// Add a rendered partial.
    pub fn with_partial(mut self, name: impl Into<String>, html: impl Into<String>) -> Self {
        self.html.insert(name.into(), html.into());
        self
    }

    /// Add a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the page model.
    pub fn with_model(mut self, model: Map<String, Value>) -> Self {
        self.model = Some(model);
        self
    }

    /// The payload a failed or timed-out fetch resolves to.
    ///
    /// Every sentinel that would have been filled from this response is
    /// substituted with the content-not-found marker instead.
    pub fn error_payload() -> Self {
        Self::new(500)
    }

    /// Parse an upstream JSON body.
    ///
    /// String values become partials; an object under `model` becomes the
    /// page model; anything else is ignored.
    pub fn from_json_body(
        status: u16,
        headers: HashMap<String, String>,
        body: &str,
    ) -> Result<Self, FetchError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| FetchError::Parse("content body is not a JSON object".to_string()))?;

        let mut html = HashMap::new();
        let mut model = None;
        for (key, value) in object {
            if key == "model" {
                if let Value::Object(map) = value {
                    model = Some(map.clone());
                }
            } else if let Value::String(s) = value {
                html.insert(key.clone(), s.clone());
            }
        }

        Ok(Self {
            status,
            headers,
            html,
            model,
        })
    }

    /// Get a rendered partial by name.
    pub fn partial(&self, name: &str) -> Option<&str> {
        self.html.get(name).map(|s| s.as_str())
    }

    /// Get a header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }

    /// Check if the response was successful (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(body: &str) -> ContentResponse {
        ContentResponse::from_json_body(200, HashMap::new(), body).unwrap()
    }

    // === Parsing Tests ===

    #[test]
    fn test_from_json_body_extracts_partials() {
        let resp = make_response(r#"{"main":"<p>x</p>","meta":"<meta>"}"#);
        assert_eq!(resp.partial("main"), Some("<p>x</p>"));
        assert_eq!(resp.partial("meta"), Some("<meta>"));
        assert_eq!(resp.partial("missing"), None);
    }

    #[test]
    fn test_from_json_body_extracts_model() {
        let resp = make_response(r#"{"main":"<p>x</p>","model":{"cart":{"items":3}}}"#);
        let model = resp.model.unwrap();
        assert_eq!(model["cart"]["items"], 3);
    }

    #[test]
    fn test_from_json_body_ignores_non_string_partials() {
        let resp = make_response(r#"{"main":"<p>x</p>","count":7}"#);
        assert_eq!(resp.html.len(), 1);
    }

    #[test]
    fn test_from_json_body_rejects_non_object() {
        let result = ContentResponse::from_json_body(200, HashMap::new(), r#"["a"]"#);
        assert!(result.is_err());
    }

    // === Status and Header Tests ===

    #[test]
    fn test_error_payload_is_500_with_no_partials() {
        let resp = ContentResponse::error_payload();
        assert_eq!(resp.status, 500);
        assert!(resp.html.is_empty());
        assert!(resp.model.is_none());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = ContentResponse::new(301).with_header("Location", "/elsewhere");
        assert_eq!(resp.header("location"), Some("/elsewhere"));
        assert_eq!(resp.header("LOCATION"), Some("/elsewhere"));
    }

    #[test]
    fn test_is_success() {
        assert!(ContentResponse::new(200).is_success());
        assert!(!ContentResponse::new(301).is_success());
        assert!(!ContentResponse::new(500).is_success());
    }
}
