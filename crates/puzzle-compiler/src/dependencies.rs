//! Shared dependency injection.

use std::collections::HashSet;

use puzzle_core::ExecuteType;
use puzzle_observability::StructuredLogger;

use crate::fragment::FragmentRegistry;
use crate::markup;

/// Deduplicates shared dependencies and appends them into `<head>`.
pub struct DependencyInjector;

impl DependencyInjector {
    /// Inject every distinct dependency, in descriptor iteration order.
    ///
    /// Each dependency name lands in `<head>` at most once. A fragment
    /// without configuration is skipped; it cannot contribute dependencies.
    pub fn inject(
        registry: &FragmentRegistry,
        head: &mut Vec<String>,
        logger: &StructuredLogger,
    ) -> usize {
        let mut seen: HashSet<String> = HashSet::new();
        let mut injected = 0;

        for descriptor in registry.iter() {
            let Some(config) = &descriptor.config else {
                continue;
            };
            for dependency in &config.dependencies {
                if !seen.insert(dependency.name.clone()) {
                    continue;
                }
                let html = if let Some(link) = &dependency.link {
                    markup::external_script(&dependency.name, link, ExecuteType::Sync)
                } else if let Some(content) = &dependency.content {
                    markup::inline_script(&dependency.name, content)
                } else {
                    logger
                        .warn_builder("dependency has neither link nor content")
                        .fragment(&descriptor.name)
                        .field("dependency", dependency.name.clone())
                        .emit();
                    continue;
                };
                head.push(html);
                injected += 1;
            }
        }

        injected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puzzle_core::{DependencyDescriptor, FragmentConfig, GatewayDefinition};

    use crate::fragment::{FragmentOccurrence, MAIN_PARTIAL};

    fn make_occurrence(index: usize, name: &str) -> FragmentOccurrence {
        FragmentOccurrence {
            index,
            name: name.to_string(),
            from: "g".to_string(),
            partial: MAIN_PARTIAL.to_string(),
            primary: false,
            should_wait: false,
            in_head: false,
            attributes: Default::default(),
        }
    }

    fn make_registry(configs: &[(&str, FragmentConfig)]) -> FragmentRegistry {
        let mut gateway = GatewayDefinition::new("g", "https://g.example.com");
        for (name, config) in configs {
            gateway = gateway.with_fragment(*name, config.clone());
        }
        let occurrences: Vec<_> = configs
            .iter()
            .enumerate()
            .map(|(i, (name, _))| make_occurrence(i, name))
            .collect();
        FragmentRegistry::from_occurrences(&occurrences, &[gateway]).unwrap()
    }

    fn dependency(name: &str) -> DependencyDescriptor {
        DependencyDescriptor {
            name: name.to_string(),
            link: Some(format!("https://cdn/{}.js", name)),
            content: None,
        }
    }

    #[test]
    fn test_shared_dependency_injected_once() {
        let config_a = FragmentConfig {
            dependencies: vec![dependency("vue")],
            ..Default::default()
        };
        let config_b = FragmentConfig {
            dependencies: vec![dependency("vue"), dependency("router")],
            ..Default::default()
        };
        let registry = make_registry(&[("a", config_a), ("b", config_b)]);

        let mut head = Vec::new();
        let injected =
            DependencyInjector::inject(&registry, &mut head, &StructuredLogger::compile_time());

        assert_eq!(injected, 2);
        let joined = head.join("");
        assert_eq!(joined.matches(r#"puzzle-dependency="vue""#).count(), 1);
        assert_eq!(joined.matches(r#"puzzle-dependency="router""#).count(), 1);
    }

    #[test]
    fn test_dependency_without_source_is_skipped() {
        let config = FragmentConfig {
            dependencies: vec![DependencyDescriptor {
                name: "ghost".to_string(),
                link: None,
                content: None,
            }],
            ..Default::default()
        };
        let registry = make_registry(&[("a", config)]);

        let mut head = Vec::new();
        let injected =
            DependencyInjector::inject(&registry, &mut head, &StructuredLogger::compile_time());
        assert_eq!(injected, 0);
        assert!(head.is_empty());
    }
}
