//! The template compiler / planner.
//!
//! Compilation happens once per template: parse the template region,
//! classify every fragment occurrence, join descriptors with gateway
//! metadata, plan asset injection, rewrite the DOM into sentinel tokens and
//! containers, and precompile the shell. The resulting `PagePlan` is
//! immutable at request time and reused across all requests.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use puzzle_core::GatewayDefinition;
use puzzle_gateway::{ContentResponse, GatewayClient};
use puzzle_observability::StructuredLogger;

use crate::assets::{AssetPlanner, AssetReplaceItem, FragmentAssetPlan};
use crate::dependencies::DependencyInjector;
use crate::dom::{DomView, RewritePlan};
use crate::error::CompileError;
use crate::fragment::{FragmentClass, FragmentDescriptor, FragmentOccurrence, FragmentRegistry};
use crate::markup;
use crate::replace::{
    chunk_key, content_sentinel, model_sentinel, placeholder_key, FetchSpec, ReplaceItem,
    ReplaceSet,
};
use crate::shell::CompiledShell;
use crate::stylesheet::{StaticRouteRegistry, StylesheetBundler};

/// Compile options for one template.
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Template name; names the bundled stylesheet route.
    pub name: String,
    /// Whether debug injections (debugger, analytics markers) are emitted.
    pub debug: bool,
}

impl PageOptions {
    /// Create options with a template name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            debug: false,
        }
    }

    /// Enable or disable debug injections.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Which handler mode the plan drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// No chunked fragments; the document is sent in a single response.
    Single,
    /// Chunked transfer: first flush, then chunks in completion order.
    Chunked,
}

/// The streaming plan for one chunked fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    /// Fragment name.
    pub fragment: String,
    /// Chunked-content and placeholder items, in occurrence order.
    pub replace_items: Vec<ReplaceItem>,
    /// How to fetch the fragment.
    pub fetch: FetchSpec,
    /// Whether the `main` partial replaces its own container client-side.
    pub self_replace: bool,
    /// Assets emitted before the chunk content.
    pub content_start: Vec<AssetReplaceItem>,
    /// Assets emitted after the chunk content.
    pub content_end: Vec<AssetReplaceItem>,
}

/// Everything the request handler needs, produced once at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    /// Template name.
    pub template_name: String,
    /// Whether debug injections are emitted.
    pub debug: bool,
    /// Handler mode.
    pub mode: RenderMode,
    /// The precompiled first-flush shell, sentinels intact.
    pub shell: CompiledShell,
    /// Replacement plans for waited fragments.
    pub waited: Vec<ReplaceSet>,
    /// Streaming plans for chunked fragments.
    pub chunked: Vec<ChunkPlan>,
    /// Body-end assets emitted in the closing chunk (chunked mode only;
    /// otherwise they are already in the shell).
    pub body_end: Vec<AssetReplaceItem>,
    /// Payload for the debugger's fragment map.
    pub fragments_debug_json: String,
}

/// The template compiler / planner.
pub struct TemplateCompiler<'a> {
    client: &'a dyn GatewayClient,
    logger: StructuredLogger,
    options: PageOptions,
}

impl<'a> TemplateCompiler<'a> {
    /// Create a compiler for one template.
    pub fn new(client: &'a dyn GatewayClient, options: PageOptions) -> Self {
        let logger = StructuredLogger::compile_time().with_template(options.name.clone());
        Self {
            client,
            logger,
            options,
        }
    }

    /// Compile a page source against the known gateways.
    ///
    /// The source must contain a `<template>…</template>` region; a sibling
    /// `<script>` region is ignored (hooks are supplied statically).
    /// Compile-time fetches (static content, placeholders, asset bodies)
    /// happen here; their failures degrade and never abort compilation.
    pub async fn compile(
        &self,
        source: &str,
        gateways: &[GatewayDefinition],
        routes: &mut dyn StaticRouteRegistry,
    ) -> Result<PagePlan, CompileError> {
        let (template_html, had_script_region) =
            extract_template_region(source).ok_or(CompileError::TemplateNotFound)?;
        if had_script_region {
            self.logger
                .debug("template script region ignored; page hooks are supplied statically");
        }

        let dom = DomView::parse(&collapse_between_tags(&template_html));

        let mut occurrences = Vec::new();
        for raw in dom.fragments() {
            occurrences.push(FragmentOccurrence::from_raw(&raw)?);
        }
        let registry = FragmentRegistry::from_occurrences(&occurrences, gateways)?;

        if registry.is_empty() {
            let shell = CompiledShell::parse(&dom.serialize(&RewritePlan::default()));
            return Ok(PagePlan {
                template_name: self.options.name.clone(),
                debug: self.options.debug,
                mode: RenderMode::Single,
                shell,
                waited: Vec::new(),
                chunked: Vec::new(),
                body_end: Vec::new(),
                fragments_debug_json: "{}".to_string(),
            });
        }

        let planner = AssetPlanner::new(self.client, &self.logger);
        let mut asset_plans: Vec<(String, FragmentAssetPlan)> = Vec::new();
        for descriptor in registry.iter() {
            asset_plans.push((descriptor.name.clone(), planner.plan(descriptor).await));
        }

        let has_chunked = registry
            .iter()
            .any(|d| d.class() == FragmentClass::Chunked);

        let mut rewrite = RewritePlan::default();
        for (_, plan) in &asset_plans {
            for item in &plan.head {
                rewrite.head_appends.push(item.html());
            }
            for item in &plan.body_start {
                rewrite.body_prepends.push(item.html());
            }
        }
        DependencyInjector::inject(&registry, &mut rewrite.head_appends, &self.logger);
        let bundler = StylesheetBundler::new(self.client, &self.logger);
        if let Some(link) = bundler
            .bundle(&self.options.name, &registry, routes)
            .await
        {
            rewrite.head_appends.push(link);
        }
        if has_chunked {
            rewrite
                .head_appends
                .push(markup::CONTENT_REPLACE_SCRIPT.to_string());
        }

        let empty_assets = FragmentAssetPlan::default();
        let mut replacements = vec![String::new(); occurrences.len()];
        let mut waited = Vec::new();
        let mut chunked = Vec::new();

        for descriptor in registry.iter() {
            let occs: Vec<&FragmentOccurrence> = occurrences
                .iter()
                .filter(|o| o.name == descriptor.name)
                .collect();
            let main_attributes = occs
                .iter()
                .find(|o| o.is_main())
                .or_else(|| occs.first())
                .map(|o| o.attributes.clone())
                .unwrap_or_default();
            let assets = asset_plans
                .iter()
                .find(|(name, _)| name == &descriptor.name)
                .map(|(_, plan)| plan)
                .unwrap_or(&empty_assets);

            match descriptor.class() {
                FragmentClass::Waited => {
                    rewrite_waited(descriptor, &occs, assets, &mut replacements);
                    waited.push(make_replace_set(descriptor, &occs, main_attributes));
                }
                FragmentClass::Chunked => {
                    self.rewrite_chunked(descriptor, &occs, &mut replacements)
                        .await;
                    chunked.push(make_chunk_plan(descriptor, &occs, assets, main_attributes));
                }
                FragmentClass::Static => {
                    self.rewrite_static(descriptor, &occs, assets, main_attributes, &mut replacements)
                        .await;
                }
                FragmentClass::Unfetched => {
                    for occ in &occs {
                        replacements[occ.index] =
                            markup::unfetched_container(&descriptor.name, &descriptor.from);
                    }
                }
            }
        }

        let mut body_end = Vec::new();
        for (_, plan) in &asset_plans {
            body_end.extend(plan.body_end.iter().cloned());
        }
        if !has_chunked {
            for item in &body_end {
                rewrite.body_appends.push(item.html());
            }
        }

        rewrite.replacements = replacements;
        let shell = CompiledShell::parse(&dom.serialize(&rewrite));

        let mut debug_map = serde_json::Map::new();
        for descriptor in registry.iter() {
            debug_map.insert(
                descriptor.name.clone(),
                serde_json::json!({ "chunked": descriptor.class() == FragmentClass::Chunked }),
            );
        }

        Ok(PagePlan {
            template_name: self.options.name.clone(),
            debug: self.options.debug,
            mode: if has_chunked {
                RenderMode::Chunked
            } else {
                RenderMode::Single
            },
            shell,
            waited,
            chunked,
            body_end: if has_chunked { body_end } else { Vec::new() },
            fragments_debug_json: serde_json::Value::Object(debug_map).to_string(),
        })
    }

    async fn rewrite_chunked(
        &self,
        descriptor: &FragmentDescriptor,
        occs: &[&FragmentOccurrence],
        replacements: &mut [String],
    ) {
        let placeholder_enabled = descriptor.render().map(|r| r.placeholder).unwrap_or(false);
        let placeholder_html = if placeholder_enabled && occs.iter().any(|o| o.is_main()) {
            match self.client.fetch_placeholder(&descriptor.fragment_url).await {
                Ok(html) => html,
                Err(err) => {
                    self.logger
                        .warn_builder("placeholder fetch failed")
                        .fragment(&descriptor.name)
                        .field("error", err.to_string())
                        .emit();
                    String::new()
                }
            }
        } else {
            String::new()
        };

        for occ in occs {
            let key = chunk_key(&descriptor.name, &occ.partial);
            let marker = (placeholder_enabled && occ.is_main())
                .then(|| placeholder_key(&descriptor.name, &occ.partial));
            let inner = if occ.is_main() {
                placeholder_html.as_str()
            } else {
                ""
            };
            replacements[occ.index] = markup::chunked_container(
                &descriptor.name,
                &descriptor.from,
                &occ.partial,
                &key,
                marker.as_deref(),
                inner,
            );
        }
    }

    async fn rewrite_static(
        &self,
        descriptor: &FragmentDescriptor,
        occs: &[&FragmentOccurrence],
        assets: &FragmentAssetPlan,
        main_attributes: std::collections::BTreeMap<String, String>,
        replacements: &mut [String],
    ) {
        let fetch = FetchSpec::from_descriptor(descriptor, main_attributes);
        let response = match self.client.fetch_content(&fetch.to_request()).await {
            Ok(response) => response,
            Err(err) => {
                self.logger
                    .warn_builder("fragment upstream failed")
                    .fragment(&descriptor.name)
                    .field("error", err.to_string())
                    .emit();
                ContentResponse::error_payload()
            }
        };

        let first = occs.first().map(|o| o.index);
        let last = occs.last().map(|o| o.index);
        for occ in occs {
            let content = response
                .partial(&occ.partial)
                .unwrap_or(markup::CONTENT_NOT_FOUND_ERROR);
            let mut html = markup::waited_container(
                &descriptor.name,
                &descriptor.from,
                &occ.partial,
                content,
            );
            if Some(occ.index) == first {
                let prefix: String = assets.content_start.iter().map(|a| a.html()).collect();
                html = format!("{}{}", prefix, html);
            }
            if Some(occ.index) == last {
                for item in &assets.content_end {
                    html.push_str(&item.html());
                }
            }
            replacements[occ.index] = html;
        }
    }
}

fn rewrite_waited(
    descriptor: &FragmentDescriptor,
    occs: &[&FragmentOccurrence],
    assets: &FragmentAssetPlan,
    replacements: &mut [String],
) {
    let first = occs.first().map(|o| o.index);
    let last = occs.last().map(|o| o.index);
    for occ in occs {
        let sentinel = content_sentinel(&descriptor.name, &descriptor.from, &occ.partial);
        let mut html = if occ.in_head {
            sentinel
        } else {
            markup::waited_container(&descriptor.name, &descriptor.from, &occ.partial, &sentinel)
        };
        if Some(occ.index) == first {
            let mut prefix: String = assets.content_start.iter().map(|a| a.html()).collect();
            prefix.push_str(&model_sentinel(&descriptor.name));
            html = format!("{}{}", prefix, html);
        }
        if Some(occ.index) == last {
            for item in &assets.content_end {
                html.push_str(&item.html());
            }
        }
        replacements[occ.index] = html;
    }
}

fn make_replace_set(
    descriptor: &FragmentDescriptor,
    occs: &[&FragmentOccurrence],
    main_attributes: std::collections::BTreeMap<String, String>,
) -> ReplaceSet {
    let mut seen = HashSet::new();
    let mut replace_items = Vec::new();
    for occ in occs {
        if seen.insert(occ.partial.clone()) {
            replace_items.push(ReplaceItem::content(
                &descriptor.name,
                &descriptor.from,
                &occ.partial,
            ));
        }
    }
    replace_items.push(ReplaceItem::model(&descriptor.name));

    ReplaceSet {
        fragment: descriptor.name.clone(),
        replace_items,
        fetch: FetchSpec::from_descriptor(descriptor, main_attributes),
        primary: descriptor.primary,
    }
}

fn make_chunk_plan(
    descriptor: &FragmentDescriptor,
    occs: &[&FragmentOccurrence],
    assets: &FragmentAssetPlan,
    main_attributes: std::collections::BTreeMap<String, String>,
) -> ChunkPlan {
    let placeholder_enabled = descriptor.render().map(|r| r.placeholder).unwrap_or(false);
    let mut seen = HashSet::new();
    let mut replace_items = Vec::new();
    for occ in occs {
        if seen.insert(occ.partial.clone()) {
            replace_items.push(ReplaceItem::chunked(&descriptor.name, &occ.partial));
            if placeholder_enabled && occ.is_main() {
                replace_items.push(ReplaceItem::placeholder(&descriptor.name, &occ.partial));
            }
        }
    }

    ChunkPlan {
        fragment: descriptor.name.clone(),
        replace_items,
        fetch: FetchSpec::from_descriptor(descriptor, main_attributes),
        self_replace: descriptor.render().map(|r| r.self_replace).unwrap_or(false),
        content_start: assets.content_start.clone(),
        content_end: assets.content_end.clone(),
    }
}

fn template_region_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<template[^>]*>(.*?)</template\s*>").unwrap())
}

fn between_tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">\s+<").unwrap())
}

/// Extract the `<template>` region and whether a sibling script region
/// exists.
fn extract_template_region(source: &str) -> Option<(String, bool)> {
    let captures = template_region_re().captures(source)?;
    let whole = captures.get(0)?;
    let inner = captures
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let outside = format!("{}{}", &source[..whole.start()], &source[whole.end()..]);
    let had_script_region = outside.to_ascii_lowercase().contains("<script");
    Some((inner, had_script_region))
}

/// Collapse whitespace between tags before parsing, so the single-space
/// empty-tag normalization survives serialization.
fn collapse_between_tags(html: &str) -> String {
    between_tags_re().replace_all(html, "><").into_owned()
}
