//! Per-fragment asset planning.

use puzzle_core::{AssetLocation, AssetType, ExecuteType, InjectType};
use puzzle_gateway::GatewayClient;
use puzzle_observability::StructuredLogger;

use crate::fragment::FragmentDescriptor;
use crate::markup;

/// A planned asset injection with its body resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetReplaceItem {
    /// Asset name.
    pub name: String,
    /// Injection location.
    pub location: AssetLocation,
    /// Injection mode.
    pub inject_type: InjectType,
    /// Script execution mode.
    pub execute_type: ExecuteType,
    /// External URL, for external assets.
    pub link: Option<String>,
    /// Resolved body, for inline assets.
    pub content: Option<String>,
}

impl AssetReplaceItem {
    /// Render the asset as HTML.
    pub fn html(&self) -> String {
        match self.inject_type {
            InjectType::External => self
                .link
                .as_deref()
                .map(|link| markup::external_script(&self.name, link, self.execute_type))
                .unwrap_or_default(),
            InjectType::Inline => {
                markup::inline_script(&self.name, self.content.as_deref().unwrap_or(""))
            }
            InjectType::Unknown => markup::unknown_inject_marker(&self.name),
        }
    }
}

/// A fragment's JS assets, partitioned by injection location.
///
/// Head and body-start assets mutate the document at compile time;
/// content-start, content-end, and body-end assets travel with the fragment
/// in the plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentAssetPlan {
    pub head: Vec<AssetReplaceItem>,
    pub body_start: Vec<AssetReplaceItem>,
    pub content_start: Vec<AssetReplaceItem>,
    pub content_end: Vec<AssetReplaceItem>,
    pub body_end: Vec<AssetReplaceItem>,
}

impl FragmentAssetPlan {
    fn push(&mut self, item: AssetReplaceItem) {
        match item.location {
            AssetLocation::Head => self.head.push(item),
            AssetLocation::BodyStart => self.body_start.push(item),
            AssetLocation::ContentStart => self.content_start.push(item),
            AssetLocation::ContentEnd => self.content_end.push(item),
            AssetLocation::BodyEnd => self.body_end.push(item),
        }
    }
}

/// Classifies a fragment's JS assets and resolves inline bodies.
pub struct AssetPlanner<'a> {
    client: &'a dyn GatewayClient,
    logger: &'a StructuredLogger,
}

impl<'a> AssetPlanner<'a> {
    /// Create a new planner.
    pub fn new(client: &'a dyn GatewayClient, logger: &'a StructuredLogger) -> Self {
        Self { client, logger }
    }

    /// Plan one fragment's JS assets.
    ///
    /// CSS assets are handled by the stylesheet bundler. Inline assets
    /// without an embedded body fetch it from the gateway's static route;
    /// a failed fetch resolves to an empty body and is logged.
    pub async fn plan(&self, descriptor: &FragmentDescriptor) -> FragmentAssetPlan {
        let mut plan = FragmentAssetPlan::default();
        let Some(config) = &descriptor.config else {
            return plan;
        };

        for asset in config.assets.iter().filter(|a| a.asset_type == AssetType::Js) {
            if asset.inject_type == InjectType::Unknown {
                self.logger
                    .warn_builder("unknown asset inject type")
                    .fragment(&descriptor.name)
                    .field("asset", asset.name.clone())
                    .emit();
            }
            let content = self.resolve_content(descriptor, asset).await;
            plan.push(AssetReplaceItem {
                name: asset.name.clone(),
                location: asset.location,
                inject_type: asset.inject_type,
                execute_type: asset.execute_type,
                link: asset.link.clone(),
                content,
            });
        }

        plan
    }

    async fn resolve_content(
        &self,
        descriptor: &FragmentDescriptor,
        asset: &puzzle_core::AssetDescriptor,
    ) -> Option<String> {
        if asset.inject_type != InjectType::Inline {
            return asset.content.clone();
        }
        if asset.content.is_some() {
            return asset.content.clone();
        }
        let file_name = asset.file_name.as_deref()?;
        match self
            .client
            .fetch_asset(&descriptor.fragment_url, file_name)
            .await
        {
            Ok(body) => Some(body),
            Err(err) => {
                self.logger
                    .warn_builder("asset fetch failed")
                    .fragment(&descriptor.name)
                    .field("asset", asset.name.clone())
                    .field("error", err.to_string())
                    .emit();
                Some(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(inject_type: InjectType) -> AssetReplaceItem {
        AssetReplaceItem {
            name: "bundle".to_string(),
            location: AssetLocation::ContentEnd,
            inject_type,
            execute_type: ExecuteType::Defer,
            link: Some("https://cdn/b.js".to_string()),
            content: Some("var a=1;".to_string()),
        }
    }

    #[test]
    fn test_external_html_uses_link() {
        let html = make_item(InjectType::External).html();
        assert!(html.contains(r#"src="https://cdn/b.js""#));
        assert!(html.contains(" defer"));
    }

    #[test]
    fn test_inline_html_uses_content() {
        let html = make_item(InjectType::Inline).html();
        assert!(html.contains("var a=1;"));
        assert!(!html.contains("src="));
    }

    #[test]
    fn test_unknown_inject_type_renders_comment() {
        let html = make_item(InjectType::Unknown).html();
        assert!(html.starts_with("<!--"));
        assert!(html.contains("bundle"));
    }

    #[test]
    fn test_plan_partitions_by_location() {
        let mut plan = FragmentAssetPlan::default();
        for location in [
            AssetLocation::Head,
            AssetLocation::BodyStart,
            AssetLocation::ContentStart,
            AssetLocation::ContentEnd,
            AssetLocation::BodyEnd,
        ] {
            let mut item = make_item(InjectType::External);
            item.location = location;
            plan.push(item);
        }
        assert_eq!(plan.head.len(), 1);
        assert_eq!(plan.body_start.len(), 1);
        assert_eq!(plan.content_start.len(), 1);
        assert_eq!(plan.content_end.len(), 1);
        assert_eq!(plan.body_end.len(), 1);
    }
}
