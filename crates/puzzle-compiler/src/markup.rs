//! The emitted HTML contract.
//!
//! Client-side scripts select on these exact shapes, so every container,
//! mover, and script tag the engine writes is built here.

use puzzle_core::ExecuteType;
use serde_json::{Map, Value};

/// Substituted wherever a fragment response is missing a requested partial.
pub const CONTENT_NOT_FOUND_ERROR: &str =
    "<script>console.error('Content not found');</script>";

/// Debugger bundle injected into `<head>` in debug mode.
pub const PUZZLE_DEBUGGER_LINK: &str =
    "https://unpkg.com/puzzle-debug@latest/dist/puzzle_debug.min.js";

/// One-time client-side content-replace helper, injected into `<head>` the
/// first time any chunked fragment is seen. `$p(target, source)` moves a
/// streamed chunk into its placeholder container.
pub const CONTENT_REPLACE_SCRIPT: &str =
    "<script>function $p(t,s){var e=document.querySelector(t),n=document.querySelector(s);e.innerHTML=n.innerHTML;n.parentNode.removeChild(n);}</script>";

/// Analytics close calls emitted before `</body>` in debug mode.
pub const ANALYTICS_CLOSE_SCRIPT: &str =
    "<script>PuzzleJs.analytics.end();PuzzleJs.variables.end();</script>";

/// Container for a waited or static fragment occurrence.
pub fn waited_container(name: &str, from: &str, partial: &str, inner: &str) -> String {
    format!(
        r#"<div id="{name}" puzzle-fragment="{name}" puzzle-gateway="{from}" fragment-partial="{partial}">{inner}</div>"#,
        name = name,
        from = from,
        partial = partial,
        inner = if inner.is_empty() { " " } else { inner },
    )
}

/// Container for a chunked fragment occurrence in the first flush.
///
/// `placeholder_key` is present only when the fragment exposes a placeholder
/// and the occurrence is the `main` partial; `inner` is the fetched
/// placeholder HTML (empty when there is none).
pub fn chunked_container(
    name: &str,
    from: &str,
    partial: &str,
    chunk_key: &str,
    placeholder_key: Option<&str>,
    inner: &str,
) -> String {
    let placeholder_attr = placeholder_key
        .map(|key| format!(r#" puzzle-placeholder="{}""#, key))
        .unwrap_or_default();
    format!(
        r#"<div id="{name}" puzzle-fragment="{name}" puzzle-gateway="{from}" fragment-partial="{partial}" puzzle-chunk="{chunk}"{placeholder}>{inner}</div>"#,
        name = name,
        from = from,
        partial = partial,
        chunk = chunk_key,
        placeholder = placeholder_attr,
        inner = if inner.is_empty() { " " } else { inner },
    )
}

/// Container for a fragment whose gateway exposed no configuration.
pub fn unfetched_container(name: &str, from: &str) -> String {
    format!(
        r#"<div puzzle-fragment="{name}" puzzle-gateway="{from}">{error}</div>"#,
        name = name,
        from = from,
        error = CONTENT_NOT_FOUND_ERROR,
    )
}

/// Hidden container carrying streamed chunk content.
pub fn chunk_stream_container(name: &str, chunk_key: &str, content: &str) -> String {
    format!(
        r#"<div style="display: none;" puzzle-fragment="{name}" puzzle-chunk-key="{key}">{content}</div>"#,
        name = name,
        key = chunk_key,
        content = content,
    )
}

/// Mover script relocating a streamed chunk into its placeholder container.
pub fn mover_script(chunk_key: &str) -> String {
    format!(
        r#"<script>$p('[puzzle-chunk="{key}"]','[puzzle-chunk-key="{key}"]');</script>"#,
        key = chunk_key,
    )
}

/// Page-model script exposing fragment model keys on `window`.
pub fn model_script(model: &Map<String, Value>) -> String {
    let mut script = String::from("<script>");
    for (key, value) in model {
        let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
        script.push_str(&format!(
            "window['{key}']=window['{key}']||{json};",
            key = key,
            json = json,
        ));
    }
    script.push_str("</script>");
    script
}

/// External script tag for an asset or dependency.
pub fn external_script(name: &str, link: &str, execute: ExecuteType) -> String {
    format!(
        r#"<script puzzle-dependency="{name}" src="{link}" type="text/javascript"{exec}> </script>"#,
        name = name,
        link = link,
        exec = execute.attribute(),
    )
}

/// Inline script tag for an asset or dependency.
pub fn inline_script(name: &str, content: &str) -> String {
    format!(
        r#"<script puzzle-dependency="{name}" type="text/javascript">{content}</script>"#,
        name = name,
        content = content,
    )
}

/// Comment marker for an asset whose inject type is not recognized.
pub fn unknown_inject_marker(name: &str) -> String {
    format!("<!-- puzzle: unknown inject type for asset '{}' -->", name)
}

/// Stylesheet link tag for the bundled page CSS.
pub fn stylesheet_link(href: &str) -> String {
    format!(r#"<link rel="stylesheet" href="{}">"#, href)
}

/// Debugger injection for `<head>` in debug mode.
pub fn debugger_scripts(fragments_json: &str) -> String {
    format!(
        r#"<script src="{link}"></script><script>PuzzleJs.fragments.set({json})</script>"#,
        link = PUZZLE_DEBUGGER_LINK,
        json = fragments_json,
    )
}

/// Opening analytics marker for a streamed chunk in debug mode.
pub fn analytics_start(name: &str) -> String {
    format!("<script>PuzzleJs.analytics.start('{}');</script>", name)
}

/// Closing analytics marker for a streamed chunk in debug mode.
pub fn analytics_end(name: &str) -> String {
    format!("<script>PuzzleJs.analytics.end('{}');</script>", name)
}
