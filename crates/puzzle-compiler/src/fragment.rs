//! Fragment occurrences, descriptors, and the per-template registry.

use std::collections::BTreeMap;

use puzzle_core::{FragmentConfig, GatewayDefinition, RenderConfig};

use crate::dom::RawFragmentElement;
use crate::error::CompileError;

/// The default partial name.
pub const MAIN_PARTIAL: &str = "main";

/// A single `<fragment>` element in the template.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentOccurrence {
    /// Document-order index among fragment elements.
    pub index: usize,
    /// Fragment name.
    pub name: String,
    /// Gateway identifier.
    pub from: String,
    /// Partial this occurrence renders (`main` by default).
    pub partial: String,
    /// Whether the tag carries `primary`.
    pub primary: bool,
    /// Whether the tag carries `shouldwait`.
    pub should_wait: bool,
    /// Whether the tag sits inside `<head>`.
    pub in_head: bool,
    /// The full attribute bag, custom attributes included.
    pub attributes: BTreeMap<String, String>,
}

impl FragmentOccurrence {
    /// Build from a raw template element.
    pub fn from_raw(raw: &RawFragmentElement) -> Result<Self, CompileError> {
        let name = raw
            .attr("name")
            .ok_or(CompileError::MissingFragmentAttribute {
                index: raw.index,
                attribute: "name",
            })?;
        let from = raw
            .attr("from")
            .ok_or(CompileError::MissingFragmentAttribute {
                index: raw.index,
                attribute: "from",
            })?;

        Ok(Self {
            index: raw.index,
            name: name.to_string(),
            from: from.to_string(),
            partial: raw.attr("partial").unwrap_or(MAIN_PARTIAL).to_string(),
            primary: raw.has_attr("primary"),
            should_wait: raw.has_attr("shouldwait"),
            in_head: raw.in_head,
            attributes: raw.attributes.clone(),
        })
    }

    /// Whether this occurrence renders the `main` partial.
    pub fn is_main(&self) -> bool {
        self.partial == MAIN_PARTIAL
    }
}

/// How a fragment participates in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentClass {
    /// Substituted into the first flush before any bytes are sent.
    Waited,
    /// Streamed after the first flush as its response arrives.
    Chunked,
    /// Resolved at compile time, request-independent.
    Static,
    /// No gateway configuration; rendered as an error container.
    Unfetched,
}

/// In-memory record of a declared fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDescriptor {
    /// Fragment name.
    pub name: String,
    /// Gateway identifier.
    pub from: String,
    /// Whether this fragment dictates the page status and headers.
    pub primary: bool,
    /// Whether the fragment is substituted before the first flush.
    pub should_wait: bool,
    /// Fragment base URL on its gateway (empty when the gateway is unknown).
    pub fragment_url: String,
    /// Gateway-exposed configuration, when the gateway exposes the fragment.
    pub config: Option<FragmentConfig>,
}

impl FragmentDescriptor {
    /// Classify the fragment.
    pub fn class(&self) -> FragmentClass {
        match &self.config {
            None => FragmentClass::Unfetched,
            Some(config) => {
                if self.should_wait {
                    FragmentClass::Waited
                } else if config.render.static_render {
                    FragmentClass::Static
                } else {
                    FragmentClass::Chunked
                }
            }
        }
    }

    /// The render configuration, when the fragment is configured.
    pub fn render(&self) -> Option<&RenderConfig> {
        self.config.as_ref().map(|c| &c.render)
    }
}

/// Owned registry of fragment descriptors for one compiled template.
///
/// Descriptors keep declaration order; stylesheet bundling and asset
/// injection iterate in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentRegistry {
    descriptors: Vec<FragmentDescriptor>,
}

impl FragmentRegistry {
    /// Build the registry from template occurrences and gateway metadata.
    ///
    /// Fails when two different fragment names both claim `primary`.
    pub fn from_occurrences(
        occurrences: &[FragmentOccurrence],
        gateways: &[GatewayDefinition],
    ) -> Result<Self, CompileError> {
        let mut descriptors: Vec<FragmentDescriptor> = Vec::new();
        let mut primary_name: Option<String> = None;

        for occurrence in occurrences {
            if occurrence.primary {
                match &primary_name {
                    Some(existing) if existing != &occurrence.name => {
                        return Err(CompileError::MultiplePrimaryFragments {
                            first: existing.clone(),
                            second: occurrence.name.clone(),
                        });
                    }
                    _ => primary_name = Some(occurrence.name.clone()),
                }
            }

            let should_wait = occurrence.primary || occurrence.should_wait || occurrence.in_head;

            if let Some(descriptor) = descriptors
                .iter_mut()
                .find(|d| d.name == occurrence.name)
            {
                descriptor.primary |= occurrence.primary;
                descriptor.should_wait |= should_wait;
            } else {
                let gateway = gateways.iter().find(|g| g.name == occurrence.from);
                let (fragment_url, config) = match gateway {
                    Some(gateway) => (
                        gateway.fragment_url(&occurrence.name),
                        gateway.fragments.get(&occurrence.name).cloned(),
                    ),
                    None => (String::new(), None),
                };
                descriptors.push(FragmentDescriptor {
                    name: occurrence.name.clone(),
                    from: occurrence.from.clone(),
                    primary: occurrence.primary,
                    should_wait,
                    fragment_url,
                    config,
                });
            }
        }

        Ok(Self { descriptors })
    }

    /// Whether the template declares no fragments.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Number of distinct fragments.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Look up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&FragmentDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// The primary descriptor, when one exists.
    pub fn primary(&self) -> Option<&FragmentDescriptor> {
        self.descriptors.iter().find(|d| d.primary)
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FragmentDescriptor> {
        self.descriptors.iter()
    }
}
