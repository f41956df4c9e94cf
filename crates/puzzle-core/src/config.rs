//! Gateway-exposed fragment configuration.
//!
//! Gateways describe each fragment they serve with a metadata snapshot:
//! which assets and shared dependencies it needs, and how it renders
//! (placeholder support, static rendering, self-replacement, timeout).
//! These types mirror that wire format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Asset resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Js,
    Css,
}

/// Where an asset is injected into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetLocation {
    Head,
    BodyStart,
    ContentStart,
    ContentEnd,
    BodyEnd,
}

/// How an asset is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectType {
    /// A `src` reference to an external resource.
    External,
    /// Body inlined into the document.
    Inline,
    /// Anything the gateway sends that this engine does not recognize.
    /// Rendered as an HTML comment marker and logged.
    #[serde(other)]
    Unknown,
}

impl Default for InjectType {
    fn default() -> Self {
        Self::External
    }
}

/// Script execution mode, appended as an attribute on emitted script tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecuteType {
    Sync,
    Async,
    Defer,
}

impl Default for ExecuteType {
    fn default() -> Self {
        Self::Sync
    }
}

impl ExecuteType {
    /// The attribute suffix emitted on script tags (empty for sync).
    pub fn attribute(&self) -> &'static str {
        match self {
            Self::Sync => "",
            Self::Async => " async",
            Self::Defer => " defer",
        }
    }
}

/// A single asset a fragment ships with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDescriptor {
    /// Unique asset name.
    pub name: String,
    /// Resource kind.
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    /// Injection location.
    pub location: AssetLocation,
    /// Injection mode.
    #[serde(default)]
    pub inject_type: InjectType,
    /// Script execution mode.
    #[serde(default)]
    pub execute_type: ExecuteType,
    /// Absolute URL for external assets.
    #[serde(default)]
    pub link: Option<String>,
    /// File name served from the gateway's static route.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Inline body, when the gateway embeds it in the metadata.
    #[serde(default)]
    pub content: Option<String>,
}

/// A shared dependency a fragment requires in `<head>`.
///
/// Dependencies are deduplicated by name across all fragments of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyDescriptor {
    /// Dependency name (dedup key).
    pub name: String,
    /// Absolute URL for external dependencies.
    #[serde(default)]
    pub link: Option<String>,
    /// Inline body.
    #[serde(default)]
    pub content: Option<String>,
}

/// How a fragment renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    /// Render path appended to the fragment URL.
    #[serde(default = "default_render_url")]
    pub url: String,
    /// Whether the fragment exposes a placeholder.
    #[serde(default)]
    pub placeholder: bool,
    /// Whether the fragment is resolved at compile time.
    #[serde(rename = "static", default)]
    pub static_render: bool,
    /// Whether the fragment replaces its own container client-side.
    #[serde(default)]
    pub self_replace: bool,
    /// Content fetch timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_render_url() -> String {
    "/".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            url: default_render_url(),
            placeholder: false,
            static_render: false,
            self_replace: false,
            timeout: None,
        }
    }
}

/// Gateway-exposed metadata snapshot for a single fragment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentConfig {
    /// Assets the fragment ships with.
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
    /// Shared dependencies required in `<head>`.
    #[serde(default)]
    pub dependencies: Vec<DependencyDescriptor>,
    /// Render behavior.
    #[serde(default)]
    pub render: RenderConfig,
}

/// A gateway and the fragments it exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayDefinition {
    /// Gateway identifier, referenced by `<fragment from="…">`.
    pub name: String,
    /// Gateway base URL.
    pub url: String,
    /// Exposed fragments by name.
    #[serde(default)]
    pub fragments: HashMap<String, FragmentConfig>,
}

impl GatewayDefinition {
    /// Create a new gateway definition.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            fragments: HashMap::new(),
        }
    }

    /// Expose a fragment on this gateway.
    pub fn with_fragment(mut self, name: impl Into<String>, config: FragmentConfig) -> Self {
        self.fragments.insert(name.into(), config);
        self
    }

    /// The base URL for a fragment served by this gateway.
    pub fn fragment_url(&self, fragment: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_defaults() {
        let render: RenderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(render.url, "/");
        assert!(!render.placeholder);
        assert!(!render.static_render);
        assert!(!render.self_replace);
        assert_eq!(render.timeout, None);
    }

    #[test]
    fn test_render_config_wire_names() {
        let render: RenderConfig = serde_json::from_str(
            r#"{"url":"/product","static":true,"selfReplace":true,"timeout":250}"#,
        )
        .unwrap();
        assert_eq!(render.url, "/product");
        assert!(render.static_render);
        assert!(render.self_replace);
        assert_eq!(render.timeout, Some(250));
    }

    #[test]
    fn test_asset_descriptor_wire_names() {
        let asset: AssetDescriptor = serde_json::from_str(
            r#"{"name":"bundle","type":"js","location":"content-end","injectType":"external","executeType":"async","link":"https://cdn/b.js"}"#,
        )
        .unwrap();
        assert_eq!(asset.asset_type, AssetType::Js);
        assert_eq!(asset.location, AssetLocation::ContentEnd);
        assert_eq!(asset.execute_type, ExecuteType::Async);
    }

    #[test]
    fn test_fragment_url_trims_trailing_slash() {
        let gw = GatewayDefinition::new("browsing", "https://gw.example.com/");
        assert_eq!(gw.fragment_url("header"), "https://gw.example.com/header");
    }
}
