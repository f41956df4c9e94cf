//! Sentinel keys and replacement plans.
//!
//! A sentinel is an opaque token embedded in the compiled shell marking a
//! substitution site. Substitution is literal substring replacement, never
//! regex, so `$` and back-references in fragment content are inert.

use std::collections::BTreeMap;

use puzzle_gateway::{ContentRequest, TimeoutConfig};

use crate::fragment::FragmentDescriptor;

/// Sentinel for a waited fragment partial.
pub fn content_sentinel(name: &str, from: &str, partial: &str) -> String {
    format!("{{fragment|{}_{}_{}}}", name, from, partial)
}

/// Sentinel for a fragment's page-model script.
pub fn model_sentinel(name: &str) -> String {
    format!("{{fragment|{}_pageModel}}", name)
}

/// Chunk key for a chunked fragment partial; doubles as the `puzzle-chunk`
/// attribute value.
pub fn chunk_key(name: &str, partial: &str) -> String {
    format!("{}_{}", name, partial)
}

/// Placeholder key for a chunked fragment partial.
pub fn placeholder_key(name: &str, partial: &str) -> String {
    format!("{}_{}_placeholder", name, partial)
}

/// What a replace item substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceItemType {
    /// Waited content, substituted into the first flush.
    Content,
    /// Chunked content, streamed after the first flush.
    ChunkedContent,
    /// Compile-time placeholder content.
    Placeholder,
    /// Page-model script for a waited fragment.
    ModelScript,
}

/// One substitution site.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceItem {
    /// Substitution kind.
    pub item_type: ReplaceItemType,
    /// Sentinel or chunk key, unique per `(fragment, partial, type)`.
    pub key: String,
    /// Partial this item carries.
    pub partial: String,
}

impl ReplaceItem {
    /// Waited content item.
    pub fn content(name: &str, from: &str, partial: &str) -> Self {
        Self {
            item_type: ReplaceItemType::Content,
            key: content_sentinel(name, from, partial),
            partial: partial.to_string(),
        }
    }

    /// Chunked content item.
    pub fn chunked(name: &str, partial: &str) -> Self {
        Self {
            item_type: ReplaceItemType::ChunkedContent,
            key: chunk_key(name, partial),
            partial: partial.to_string(),
        }
    }

    /// Placeholder item.
    pub fn placeholder(name: &str, partial: &str) -> Self {
        Self {
            item_type: ReplaceItemType::Placeholder,
            key: placeholder_key(name, partial),
            partial: partial.to_string(),
        }
    }

    /// Page-model script item.
    pub fn model(name: &str) -> Self {
        Self {
            item_type: ReplaceItemType::ModelScript,
            key: model_sentinel(name),
            partial: String::new(),
        }
    }
}

/// Everything needed to fetch one fragment's content at request time.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSpec {
    /// Fragment name.
    pub fragment: String,
    /// Gateway identifier.
    pub from: String,
    /// Fragment base URL on its gateway.
    pub fragment_url: String,
    /// Render path from the fragment configuration.
    pub render_url: String,
    /// Attribute bag of the `main` occurrence.
    pub attributes: BTreeMap<String, String>,
    /// Configured timeout in milliseconds, when present.
    pub timeout_ms: Option<u64>,
}

impl FetchSpec {
    /// Build from a descriptor and the `main` occurrence's attribute bag.
    pub fn from_descriptor(
        descriptor: &FragmentDescriptor,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        let render = descriptor.render();
        Self {
            fragment: descriptor.name.clone(),
            from: descriptor.from.clone(),
            fragment_url: descriptor.fragment_url.clone(),
            render_url: render.map(|r| r.url.clone()).unwrap_or_else(|| "/".to_string()),
            attributes,
            timeout_ms: render.and_then(|r| r.timeout),
        }
    }

    /// The concrete upstream request.
    pub fn to_request(&self) -> ContentRequest {
        ContentRequest::new(&self.fragment, &self.fragment_url, &self.render_url)
            .with_attributes(self.attributes.clone())
            .with_timeout(TimeoutConfig::from_render_timeout(self.timeout_ms))
    }
}

/// The replacement plan for one waited fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceSet {
    /// Fragment name.
    pub fragment: String,
    /// Substitution sites, content items first, model script last.
    pub replace_items: Vec<ReplaceItem>,
    /// How to fetch the fragment.
    pub fetch: FetchSpec,
    /// Whether this fragment dictates the page status and headers.
    pub primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_formats() {
        assert_eq!(content_sentinel("f", "g", "main"), "{fragment|f_g_main}");
        assert_eq!(model_sentinel("f"), "{fragment|f_pageModel}");
        assert_eq!(chunk_key("f", "main"), "f_main");
        assert_eq!(placeholder_key("f", "main"), "f_main_placeholder");
    }

    #[test]
    fn test_keys_distinct_per_partial_and_type() {
        let content = ReplaceItem::content("f", "g", "main");
        let side = ReplaceItem::content("f", "g", "side");
        let chunked = ReplaceItem::chunked("f", "main");
        let placeholder = ReplaceItem::placeholder("f", "main");
        let keys = [&content.key, &side.key, &chunked.key, &placeholder.key];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
