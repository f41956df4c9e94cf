//! Stylesheet bundling: concatenate, minify, hash, register, link.

use md5::{Digest, Md5};
use puzzle_core::AssetType;
use puzzle_gateway::GatewayClient;
use puzzle_observability::StructuredLogger;

use crate::fragment::FragmentRegistry;
use crate::markup;

/// Cache policy for the bundled stylesheet route.
const CSS_CACHE_CONTROL: &str = "public, max-age=31557600";

/// An in-process static route registered at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticRoute {
    /// Route path, e.g. `/static/storefront.min.css`.
    pub path: String,
    /// Content hash used as the `v` query version.
    pub version: String,
    /// `Content-Type` header value.
    pub content_type: String,
    /// `Cache-Control` header value.
    pub cache_control: String,
    /// Response body.
    pub body: String,
}

/// Receives compile-time static route registrations.
///
/// The HTTP server is an external collaborator; it implements this to serve
/// the bundled stylesheet.
pub trait StaticRouteRegistry {
    /// Register a GET route.
    fn register(&mut self, route: StaticRoute);
}

/// In-memory registry for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct VecRouteRegistry {
    /// Registered routes.
    pub routes: Vec<StaticRoute>,
}

impl StaticRouteRegistry for VecRouteRegistry {
    fn register(&mut self, route: StaticRoute) {
        self.routes.push(route);
    }
}

/// Bundles every fragment's CSS into one minified, hashed stylesheet.
pub struct StylesheetBundler<'a> {
    client: &'a dyn GatewayClient,
    logger: &'a StructuredLogger,
}

impl<'a> StylesheetBundler<'a> {
    /// Create a new bundler.
    pub fn new(client: &'a dyn GatewayClient, logger: &'a StructuredLogger) -> Self {
        Self { client, logger }
    }

    /// Bundle, register the route, and return the `<link>` HTML.
    ///
    /// CSS asset bodies are concatenated in descriptor iteration order; a
    /// fragment without configuration is skipped. Returns `None` (and
    /// registers nothing) when the minified output is empty.
    pub async fn bundle(
        &self,
        template_name: &str,
        registry: &FragmentRegistry,
        routes: &mut dyn StaticRouteRegistry,
    ) -> Option<String> {
        let mut css = String::new();

        for descriptor in registry.iter() {
            let Some(config) = &descriptor.config else {
                continue;
            };
            for asset in config
                .assets
                .iter()
                .filter(|a| a.asset_type == AssetType::Css)
            {
                let body = if let Some(content) = &asset.content {
                    content.clone()
                } else if let Some(file_name) = &asset.file_name {
                    match self
                        .client
                        .fetch_asset(&descriptor.fragment_url, file_name)
                        .await
                    {
                        Ok(body) => body,
                        Err(err) => {
                            self.logger
                                .warn_builder("stylesheet fetch failed")
                                .fragment(&descriptor.name)
                                .field("asset", asset.name.clone())
                                .field("error", err.to_string())
                                .emit();
                            String::new()
                        }
                    }
                } else {
                    continue;
                };
                css.push_str(&body);
                css.push('\n');
            }
        }

        let minified = minify_css(&css);
        if minified.is_empty() {
            return None;
        }

        let version = md5_hex(&minified);
        let path = format!("/static/{}.min.css", template_name);
        let href = format!("{}?v={}", path, version);
        routes.register(StaticRoute {
            path,
            version,
            content_type: "text/css".to_string(),
            cache_control: CSS_CACHE_CONTROL.to_string(),
            body: minified,
        });

        Some(markup::stylesheet_link(&href))
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Parsing state for the minifier state machine.
enum State {
    Normal,
    InComment,
    InString(char),
}

/// Conservative CSS minification.
///
/// Strips `/* … */` comments, collapses whitespace runs, and drops spaces
/// around `{}`, `;`, `:`, `,` and `>`. String literals pass through
/// untouched. If unsure about a construct, the input is emitted unchanged.
pub fn minify_css(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut state = State::Normal;
    let mut pending_space = false;
    let mut chars = css.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => {
                if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    state = State::InComment;
                    continue;
                }
                if c.is_whitespace() {
                    pending_space = !out.is_empty();
                    continue;
                }
                if pending_space {
                    let after_delimiter =
                        matches!(out.chars().last(), Some('{' | '}' | ';' | ':' | ',' | '>'));
                    let before_delimiter = matches!(c, '{' | '}' | ';' | ':' | ',' | '>');
                    if !after_delimiter && !before_delimiter {
                        out.push(' ');
                    }
                    pending_space = false;
                }
                out.push(c);
                if c == '"' || c == '\'' {
                    state = State::InString(c);
                }
            }
            State::InComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                }
            }
            State::InString(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    state = State::Normal;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Minifier Tests ===

    #[test]
    fn test_minify_strips_comments_and_whitespace() {
        let css = "/* header */\n.a {\n  color : red ;\n}\n";
        assert_eq!(minify_css(css), ".a{color:red;}");
    }

    #[test]
    fn test_minify_keeps_selector_spaces() {
        assert_eq!(minify_css(".a  .b { x:1 }"), ".a .b{x:1}");
        assert_eq!(minify_css(".a > .b { x:1 }"), ".a>.b{x:1}");
    }

    #[test]
    fn test_minify_preserves_strings() {
        let css = r#".a{background:url("a  b.png")}"#;
        assert_eq!(minify_css(css), css);
    }

    #[test]
    fn test_minify_empty_input() {
        assert_eq!(minify_css(""), "");
        assert_eq!(minify_css("  /* nothing */  "), "");
    }

    // === Hash Tests ===

    #[test]
    fn test_md5_hex_known_digest() {
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }
}
