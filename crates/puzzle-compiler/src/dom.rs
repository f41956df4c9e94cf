//! HTML parse + manipulation facade over the template document.
//!
//! The template is parsed with HTML5 semantics. `<fragment>` is not a known
//! HTML element and a conforming parser would relocate it out of `<head>`,
//! so fragment tags are masked as typed `<script>` markers before parsing;
//! markers are valid anywhere, keep their attributes, and swallow any
//! children (fragment tags are placeholders, their children are discarded).
//! Serialization walks the tree, swaps each marker for its planned
//! replacement in document order, and applies the head/body injections.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Marker type distinguishing masked fragment tags from real scripts.
const FRAGMENT_MARKER_TYPE: &str = "x-puzzle/fragment";

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn fragment_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<fragment\b([^>]*?)\s*(/?)>").unwrap())
}

fn fragment_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</fragment\s*>").unwrap())
}

fn head_or_body_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(?:head|body)[\s/>]").unwrap())
}

fn mask_fragment_tags(html: &str) -> String {
    let masked = fragment_open_re().replace_all(html, |caps: &regex::Captures| {
        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let self_closing = caps.get(2).map(|m| m.as_str()) == Some("/");
        if self_closing {
            format!(r#"<script type="{}"{}></script>"#, FRAGMENT_MARKER_TYPE, attrs)
        } else {
            format!(r#"<script type="{}"{}>"#, FRAGMENT_MARKER_TYPE, attrs)
        }
    });
    fragment_close_re()
        .replace_all(&masked, "</script>")
        .into_owned()
}

/// A `<fragment>` element found in the template, in document order.
#[derive(Debug, Clone)]
pub struct RawFragmentElement {
    /// Document-order index among fragment elements.
    pub index: usize,
    /// All attributes except the internal marker type.
    pub attributes: BTreeMap<String, String>,
    /// Whether the element sits inside `<head>`.
    pub in_head: bool,
}

impl RawFragmentElement {
    /// Get an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Whether a boolean attribute (present with any value) is set.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

/// Planned mutations applied while serializing the template document.
#[derive(Debug, Clone, Default)]
pub struct RewritePlan {
    /// Replacement HTML per fragment element, in document order.
    pub replacements: Vec<String>,
    /// HTML appended at the end of `<head>`.
    pub head_appends: Vec<String>,
    /// HTML inserted at the start of `<body>`.
    pub body_prepends: Vec<String>,
    /// HTML appended at the end of `<body>`.
    pub body_appends: Vec<String>,
}

/// Parse + manipulation facade over the template document.
pub struct DomView {
    document: Html,
}

impl DomView {
    /// Parse a template region with HTML5 semantics.
    ///
    /// A template without an explicit `<head>` or `<body>` is wrapped in
    /// one first: leading script markers would otherwise be hoisted into
    /// the synthesized head by the parser's before-head insertion mode.
    pub fn parse(template_html: &str) -> Self {
        let masked = mask_fragment_tags(template_html);
        let document = if head_or_body_re().is_match(&masked) {
            Html::parse_document(&masked)
        } else {
            Html::parse_document(&format!("<head></head><body>{}</body>", masked))
        };
        Self { document }
    }

    /// Every `<fragment>` element in document order.
    pub fn fragments(&self) -> Vec<RawFragmentElement> {
        let mut out = Vec::new();
        collect_fragments(self.document.tree.root(), false, &mut out);
        out
    }

    /// Serialize the document, applying the rewrite plan.
    pub fn serialize(&self, plan: &RewritePlan) -> String {
        let mut out = String::new();
        let mut fragment_index = 0usize;
        serialize_node(
            self.document.tree.root(),
            plan,
            &mut fragment_index,
            false,
            &mut out,
        );
        out
    }
}

fn is_fragment_marker(element: &scraper::node::Element) -> bool {
    element.name() == "script" && element.attr("type") == Some(FRAGMENT_MARKER_TYPE)
}

fn collect_fragments(node: NodeRef<'_, Node>, in_head: bool, out: &mut Vec<RawFragmentElement>) {
    for child in node.children() {
        if let Some(element) = child.value().as_element() {
            if is_fragment_marker(element) {
                let attributes = element
                    .attrs()
                    .filter(|(name, _)| *name != "type")
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect();
                out.push(RawFragmentElement {
                    index: out.len(),
                    attributes,
                    in_head,
                });
                continue;
            }
            collect_fragments(child, in_head || element.name() == "head", out);
        } else {
            collect_fragments(child, in_head, out);
        }
    }
}

fn serialize_node(
    node: NodeRef<'_, Node>,
    plan: &RewritePlan,
    fragment_index: &mut usize,
    raw_text: bool,
    out: &mut String,
) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                serialize_node(child, plan, fragment_index, raw_text, out);
            }
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(&doctype.name());
            out.push('>');
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(&comment);
            out.push_str("-->");
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(&text);
            } else {
                escape_text(&text, out);
            }
        }
        Node::Element(element) => {
            if is_fragment_marker(&element) {
                if let Some(replacement) = plan.replacements.get(*fragment_index) {
                    out.push_str(replacement);
                }
                *fragment_index += 1;
                return;
            }

            let name = element.name();
            out.push('<');
            out.push_str(name);
            let mut attributes: Vec<(&str, &str)> = element.attrs().collect();
            attributes.sort_by_key(|(attr_name, _)| *attr_name);
            for (attr_name, value) in attributes {
                out.push(' ');
                out.push_str(attr_name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    escape_attr(value, out);
                    out.push('"');
                }
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&name) {
                return;
            }

            match name {
                "head" => {
                    for child in node.children() {
                        serialize_node(child, plan, fragment_index, false, out);
                    }
                    for html in &plan.head_appends {
                        out.push_str(html);
                    }
                }
                "body" => {
                    for html in &plan.body_prepends {
                        out.push_str(html);
                    }
                    for child in node.children() {
                        serialize_node(child, plan, fragment_index, false, out);
                    }
                    for html in &plan.body_appends {
                        out.push_str(html);
                    }
                }
                _ => {
                    let raw_children = name == "script" || name == "style";
                    let before = out.len();
                    for child in node.children() {
                        serialize_node(child, plan, fragment_index, raw_children, out);
                    }
                    // A single space keeps empty pairs from collapsing to
                    // <div/> in downstream parsers.
                    if out.len() == before {
                        out.push(' ');
                    }
                }
            }

            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        _ => {}
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
