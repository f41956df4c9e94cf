//! Upstream content request construction.

use std::collections::BTreeMap;

use crate::timeout::TimeoutConfig;

/// Attributes of a `<fragment>` tag that are never forwarded upstream.
pub const RESERVED_ATTRIBUTES: [&str; 5] = ["from", "name", "partial", "primary", "shouldwait"];

/// Query parameter announcing the streaming render mode to the upstream.
const RENDER_MODE_PARAM: (&str, &str) = ("__renderMode", "stream");

/// A content fetch for one fragment.
///
/// Attributes come from the fragment's `main` occurrence in the template;
/// reserved attributes are filtered out when the query string is built.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    /// Fragment name.
    pub fragment: String,
    /// Fragment base URL on its gateway.
    pub fragment_url: String,
    /// Render path from the fragment configuration.
    pub render_url: String,
    /// Attribute bag of the `main` occurrence.
    pub attributes: BTreeMap<String, String>,
    /// Fetch timeout.
    pub timeout: TimeoutConfig,
}

impl ContentRequest {
    /// Create a new content request.
    pub fn new(
        fragment: impl Into<String>,
        fragment_url: impl Into<String>,
        render_url: impl Into<String>,
    ) -> Self {
        Self {
            fragment: fragment.into(),
            fragment_url: fragment_url.into(),
            render_url: render_url.into(),
            attributes: BTreeMap::new(),
            timeout: TimeoutConfig::default(),
        }
    }

    /// Set the attribute bag.
    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the fetch timeout.
    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    /// The full upstream URL, query string included.
    ///
    /// Every attribute of the `main` occurrence is forwarded except the
    /// reserved set, plus the render-mode marker.
    pub fn url(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.attributes {
            if !RESERVED_ATTRIBUTES.contains(&key.as_str()) {
                serializer.append_pair(key, value);
            }
        }
        serializer.append_pair(RENDER_MODE_PARAM.0, RENDER_MODE_PARAM.1);
        format!("{}{}?{}", self.fragment_url, self.render_url, serializer.finish())
    }
}
