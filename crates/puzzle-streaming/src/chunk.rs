//! Streamed chunk assembly.

use puzzle_compiler::{markup, ChunkPlan, ReplaceItemType, CONTENT_NOT_FOUND_ERROR};
use puzzle_gateway::ContentResponse;
use serde_json::{Map, Value};

/// Render the page-model script for a fragment's model.
pub fn render_model_script(model: &Map<String, Value>) -> String {
    markup::model_script(model)
}

/// Assemble one fragment's chunk from its upstream response.
///
/// Sub-parts are emitted in a fixed order: debug marker, page-model script,
/// content-start assets, content containers with their movers, content-end
/// assets, closing debug marker. The mover is omitted for the `main`
/// partial of a self-replacing fragment.
pub fn build_chunk(plan: &ChunkPlan, response: &ContentResponse, debug: bool) -> String {
    let mut out = String::new();

    if debug {
        out.push_str(&markup::analytics_start(&plan.fragment));
    }

    if let Some(model) = &response.model {
        out.push_str(&render_model_script(model));
    }

    for asset in &plan.content_start {
        out.push_str(&asset.html());
    }

    for item in &plan.replace_items {
        if item.item_type != ReplaceItemType::ChunkedContent {
            continue;
        }
        let content = response
            .partial(&item.partial)
            .unwrap_or(CONTENT_NOT_FOUND_ERROR);
        out.push_str(&markup::chunk_stream_container(
            &plan.fragment,
            &item.key,
            content,
        ));
        let self_replacing_main = plan.self_replace && item.partial == "main";
        if !self_replacing_main {
            out.push_str(&markup::mover_script(&item.key));
        }
    }

    for asset in &plan.content_end {
        out.push_str(&asset.html());
    }

    if debug {
        out.push_str(&markup::analytics_end(&plan.fragment));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use puzzle_compiler::{FetchSpec, ReplaceItem};

    fn make_plan(self_replace: bool, partials: &[&str]) -> ChunkPlan {
        ChunkPlan {
            fragment: "f".to_string(),
            replace_items: partials
                .iter()
                .map(|p| ReplaceItem::chunked("f", p))
                .collect(),
            fetch: FetchSpec {
                fragment: "f".to_string(),
                from: "g".to_string(),
                fragment_url: "https://g.example.com/f".to_string(),
                render_url: "/".to_string(),
                attributes: BTreeMap::new(),
                timeout_ms: None,
            },
            self_replace,
            content_start: Vec::new(),
            content_end: Vec::new(),
        }
    }

    #[test]
    fn test_chunk_contains_content_div_and_mover() {
        let response = ContentResponse::new(200).with_partial("main", "<p>x</p>");
        let chunk = build_chunk(&make_plan(false, &["main"]), &response, false);
        assert!(chunk.contains(
            r#"<div style="display: none;" puzzle-fragment="f" puzzle-chunk-key="f_main"><p>x</p></div>"#
        ));
        assert!(chunk.contains(
            r#"<script>$p('[puzzle-chunk="f_main"]','[puzzle-chunk-key="f_main"]');</script>"#
        ));
    }

    #[test]
    fn test_self_replace_omits_mover_for_main_only() {
        let response = ContentResponse::new(200)
            .with_partial("main", "<p>x</p>")
            .with_partial("side", "<p>y</p>");
        let chunk = build_chunk(&make_plan(true, &["main", "side"]), &response, false);
        assert!(!chunk.contains(r#"$p('[puzzle-chunk="f_main"]"#));
        assert!(chunk.contains(r#"$p('[puzzle-chunk="f_side"]"#));
    }

    #[test]
    fn test_missing_partial_substitutes_error_marker() {
        let response = ContentResponse::new(500);
        let chunk = build_chunk(&make_plan(false, &["main"]), &response, false);
        assert!(chunk.contains(CONTENT_NOT_FOUND_ERROR));
    }

    #[test]
    fn test_model_script_precedes_content() {
        let mut model = serde_json::Map::new();
        model.insert("user".to_string(), serde_json::json!({"id": 1}));
        let response = ContentResponse::new(200)
            .with_partial("main", "<p>x</p>")
            .with_model(model);
        let chunk = build_chunk(&make_plan(false, &["main"]), &response, false);
        let model_at = chunk.find("window['user']").unwrap();
        let content_at = chunk.find("puzzle-chunk-key").unwrap();
        assert!(model_at < content_at);
    }

    #[test]
    fn test_debug_markers_wrap_chunk() {
        let response = ContentResponse::new(200).with_partial("main", "<p>x</p>");
        let chunk = build_chunk(&make_plan(false, &["main"]), &response, true);
        assert!(chunk.starts_with("<script>PuzzleJs.analytics.start('f');</script>"));
        assert!(chunk.ends_with("<script>PuzzleJs.analytics.end('f');</script>"));
    }
}
