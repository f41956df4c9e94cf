//! The compiled page request handler.
//!
//! One logical task per request spawns N+1 sub-tasks: one fetch per chunked
//! fragment plus the waited-batch resolver, all started together. The waited
//! outcome gates the first flush; chunk completions arriving earlier are
//! buffered and written right after it, then the rest stream in
//! fetch-completion order. All writes funnel through the streaming sink, so
//! ordering on the response writer is serialized.

use std::fmt::Display;

use futures::future::{self, Either};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::{pin_mut, Sink};

use puzzle_compiler::{markup, ChunkPlan, PagePlan, RenderMode};
use puzzle_core::{PageHooks, RequestContext};
use puzzle_gateway::{ContentResponse, GatewayClient};
use puzzle_observability::StructuredLogger;

use crate::chunk::build_chunk;
use crate::resolver::{resolve_waited, WaitedOutcome};
use crate::sink::{ResponseEvent, ResponseHead, StreamError, StreamingSink};

/// A compiled page bound to its hook receiver.
///
/// The plan is immutable across requests; the hook receiver may keep state.
/// `handle` takes `&mut self`, so one page instance serves one request at a
/// time; callers wanting parallel requests clone the plan or synchronize.
pub struct Page {
    plan: PagePlan,
    hooks: Box<dyn PageHooks>,
    logger: StructuredLogger,
}

impl Page {
    /// Bind a compiled plan to its hooks. Invokes `on_create`.
    pub fn new(plan: PagePlan, hooks: Box<dyn PageHooks>) -> Self {
        let logger = StructuredLogger::compile_time().with_template(plan.template_name.clone());
        let mut page = Self {
            plan,
            hooks,
            logger,
        };
        page.hooks.on_create();
        page
    }

    /// The compiled plan.
    pub fn plan(&self) -> &PagePlan {
        &self.plan
    }

    /// Serve one request.
    pub async fn handle<S, E>(
        &mut self,
        req: &RequestContext,
        client: &dyn GatewayClient,
        sink: &mut StreamingSink<S, E>,
    ) -> Result<(), StreamError>
    where
        S: Sink<ResponseEvent, Error = E> + Unpin,
        E: Display,
    {
        let Self {
            plan,
            hooks,
            logger,
        } = self;
        hooks.on_request(req);

        match plan.mode {
            RenderMode::Single => {
                handle_single(plan, hooks.as_mut(), logger, req, client, sink).await
            }
            RenderMode::Chunked => {
                handle_chunked(plan, hooks.as_mut(), logger, req, client, sink).await
            }
        }
    }
}

async fn handle_single<S, E>(
    plan: &PagePlan,
    hooks: &mut dyn PageHooks,
    logger: &StructuredLogger,
    req: &RequestContext,
    client: &dyn GatewayClient,
    sink: &mut StreamingSink<S, E>,
) -> Result<(), StreamError>
where
    S: Sink<ResponseEvent, Error = E> + Unpin,
    E: Display,
{
    let shell = plan.shell.render(req);
    let outcome = resolve_waited(shell, &plan.waited, client, logger).await;

    sink.send_head(make_head(&outcome, false)).await?;
    if outcome.status == 301 {
        sink.complete().await?;
        hooks.on_response_end();
        return Ok(());
    }

    let mut document = outcome.html;
    if plan.debug {
        inject_before(&mut document, "</head>", &markup::debugger_scripts(&plan.fragments_debug_json));
        inject_before_last(&mut document, "</body>", markup::ANALYTICS_CLOSE_SCRIPT);
    }

    sink.send_first_flush(&document).await?;
    sink.complete().await?;
    hooks.on_response_end();
    Ok(())
}

async fn handle_chunked<S, E>(
    plan: &PagePlan,
    hooks: &mut dyn PageHooks,
    logger: &StructuredLogger,
    req: &RequestContext,
    client: &dyn GatewayClient,
    sink: &mut StreamingSink<S, E>,
) -> Result<(), StreamError>
where
    S: Sink<ResponseEvent, Error = E> + Unpin,
    E: Display,
{
    let shell = plan.shell.render(req);

    // Fire everything together: the waited batch and one fetch per chunk.
    let waited_fut = resolve_waited(shell, &plan.waited, client, logger);
    pin_mut!(waited_fut);

    let mut chunk_fetches: FuturesUnordered<_> = plan
        .chunked
        .iter()
        .map(|chunk_plan| fetch_chunk(chunk_plan, client, logger))
        .collect();

    // Chunks finishing before the waited batch are buffered; the first
    // flush always reaches the wire before any chunk.
    let mut completed_early = Vec::new();
    let outcome = loop {
        if chunk_fetches.is_empty() {
            break (&mut waited_fut).await;
        }
        match future::select(&mut waited_fut, chunk_fetches.next()).await {
            Either::Left((outcome, _)) => break outcome,
            Either::Right((Some(done), _)) => completed_early.push(done),
            Either::Right((None, _)) => continue,
        }
    };

    sink.send_head(make_head(&outcome, true)).await?;
    if outcome.status == 301 {
        sink.complete().await?;
        hooks.on_response_end();
        return Ok(());
    }

    let mut first_flush = strip_document_close(outcome.html);
    if plan.debug {
        inject_before(
            &mut first_flush,
            "</head>",
            &markup::debugger_scripts(&plan.fragments_debug_json),
        );
    }
    sink.send_first_flush(&first_flush).await?;

    for (chunk_plan, response) in completed_early {
        write_chunk(plan, hooks, sink, chunk_plan, &response).await?;
    }
    while let Some((chunk_plan, response)) = chunk_fetches.next().await {
        write_chunk(plan, hooks, sink, chunk_plan, &response).await?;
    }

    // The document closes only after every chunked fetch has completed.
    let mut closing = String::new();
    for asset in &plan.body_end {
        closing.push_str(&asset.html());
    }
    if plan.debug {
        closing.push_str(markup::ANALYTICS_CLOSE_SCRIPT);
    }
    closing.push_str("</body></html>");
    sink.send_raw(closing.into_bytes()).await?;

    sink.complete().await?;
    hooks.on_response_end();
    Ok(())
}

async fn fetch_chunk<'a>(
    chunk_plan: &'a ChunkPlan,
    client: &dyn GatewayClient,
    logger: &StructuredLogger,
) -> (&'a ChunkPlan, ContentResponse) {
    match client.fetch_content(&chunk_plan.fetch.to_request()).await {
        Ok(response) => (chunk_plan, response),
        Err(err) => {
            logger
                .warn_builder("fragment upstream failed")
                .fragment(&chunk_plan.fragment)
                .field("error", err.to_string())
                .emit();
            (chunk_plan, ContentResponse::error_payload())
        }
    }
}

async fn write_chunk<S, E>(
    plan: &PagePlan,
    hooks: &mut dyn PageHooks,
    sink: &mut StreamingSink<S, E>,
    chunk_plan: &ChunkPlan,
    response: &ContentResponse,
) -> Result<(), StreamError>
where
    S: Sink<ResponseEvent, Error = E> + Unpin,
    E: Display,
{
    let html = build_chunk(chunk_plan, response, plan.debug);
    hooks.on_chunk(&html);
    sink.send_chunk(&chunk_plan.fragment, &html).await
}

fn make_head(outcome: &WaitedOutcome, chunked: bool) -> ResponseHead {
    let mut head = ResponseHead::new(outcome.status);
    if chunked {
        head = head.with_header("Transfer-Encoding", "chunked");
    }
    let has_content_type = outcome
        .headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    if !has_content_type {
        head = head.with_header("Content-Type", "text/html; charset=UTF-8");
    }
    for (name, value) in &outcome.headers {
        // The upstream body is not this body.
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        if chunked && name.eq_ignore_ascii_case("transfer-encoding") {
            continue;
        }
        head = head.with_header(name, value);
    }
    head
}

fn strip_document_close(mut html: String) -> String {
    let trimmed = html.trim_end().len();
    html.truncate(trimmed);
    if html.ends_with("</body></html>") {
        let keep = html.len() - "</body></html>".len();
        html.truncate(keep);
    }
    html
}

fn inject_before(html: &mut String, needle: &str, insert: &str) {
    if let Some(pos) = html.find(needle) {
        html.insert_str(pos, insert);
    }
}

fn inject_before_last(html: &mut String, needle: &str, insert: &str) {
    if let Some(pos) = html.rfind(needle) {
        html.insert_str(pos, insert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_document_close() {
        assert_eq!(
            strip_document_close("<html><body>x</body></html>".to_string()),
            "<html><body>x"
        );
        assert_eq!(
            strip_document_close("<html><body>x</body></html>  \n".to_string()),
            "<html><body>x"
        );
        assert_eq!(strip_document_close("no close".to_string()), "no close");
    }

    #[test]
    fn test_make_head_defaults_and_overlays() {
        let outcome = WaitedOutcome {
            status: 404,
            headers: vec![
                ("x-upstream".to_string(), "1".to_string()),
                ("Content-Length".to_string(), "12".to_string()),
            ],
            html: String::new(),
        };
        let head = make_head(&outcome, true);
        assert_eq!(head.status, 404);
        assert_eq!(head.header("transfer-encoding"), Some("chunked"));
        assert_eq!(head.header("content-type"), Some("text/html; charset=UTF-8"));
        assert_eq!(head.header("x-upstream"), Some("1"));
        assert_eq!(head.header("content-length"), None);
    }

    #[test]
    fn test_make_head_keeps_primary_content_type() {
        let outcome = WaitedOutcome {
            status: 200,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            html: String::new(),
        };
        let head = make_head(&outcome, false);
        assert_eq!(head.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_injections() {
        let mut html = "<head></head><body></body>".to_string();
        inject_before(&mut html, "</head>", "[H]");
        inject_before_last(&mut html, "</body>", "[B]");
        assert_eq!(html, "<head>[H]</head><body>[B]</body>");
    }
}
