//! Waited-replacement resolution.

use futures::future::join_all;

use puzzle_compiler::{ReplaceItemType, ReplaceSet, CONTENT_NOT_FOUND_ERROR};
use puzzle_gateway::{ContentResponse, GatewayClient};
use puzzle_observability::StructuredLogger;

use crate::chunk::render_model_script;

/// The resolved first flush plus the response status and headers derived
/// from the primary fragment.
#[derive(Debug, Clone)]
pub struct WaitedOutcome {
    /// Response status; the primary fragment's upstream status, else 200.
    pub status: u16,
    /// The primary fragment's upstream headers, else empty.
    pub headers: Vec<(String, String)>,
    /// The shell with every waited sentinel substituted.
    pub html: String,
}

/// Fetch all waited fragments in parallel and substitute their sentinels.
///
/// Substitution is literal, never regex. An upstream failure resolves to the
/// 500 payload: its sentinels become the content-not-found marker and, if it
/// is the primary fragment, the page responds 500. Failures never abort
/// sibling fetches.
pub async fn resolve_waited(
    shell_html: String,
    sets: &[ReplaceSet],
    client: &dyn GatewayClient,
    logger: &StructuredLogger,
) -> WaitedOutcome {
    let fetches = sets.iter().map(|set| async move {
        match client.fetch_content(&set.fetch.to_request()).await {
            Ok(response) => (set, response),
            Err(err) => {
                logger
                    .warn_builder("fragment upstream failed")
                    .fragment(&set.fragment)
                    .field("error", err.to_string())
                    .emit();
                (set, ContentResponse::error_payload())
            }
        }
    });
    let results = join_all(fetches).await;

    let mut html = shell_html;
    let mut status = 200u16;
    let mut headers = Vec::new();

    for (set, response) in &results {
        for item in &set.replace_items {
            match item.item_type {
                ReplaceItemType::Content => {
                    let content = response
                        .partial(&item.partial)
                        .unwrap_or(CONTENT_NOT_FOUND_ERROR);
                    html = html.replace(&item.key, content);
                }
                ReplaceItemType::ModelScript => {
                    let script = response
                        .model
                        .as_ref()
                        .map(render_model_script)
                        .unwrap_or_default();
                    html = html.replace(&item.key, &script);
                }
                ReplaceItemType::ChunkedContent | ReplaceItemType::Placeholder => {}
            }
        }
        if set.primary {
            status = response.status;
            headers = response
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }
    }

    WaitedOutcome {
        status,
        headers,
        html,
    }
}
