//! Rule registry — named categories of parsed rules.
//!
//! Built once from a [`CloudConfig`] and never mutated afterwards. When the
//! configuration cannot be loaded, [`RuleRegistry::load`] degrades to a
//! registry holding one `expand` and one `contract` category built from the
//! process-wide defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::bounds::BoundsChecker;
use crate::config::CloudConfig;
use crate::error::CoreResult;
use crate::rule::Rule;

/// How a category's nomination interacts with instance bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Expand,
    Contract,
    Other,
}

impl CategoryKind {
    /// Classify by substring, so `"preexpand"` is an expand category.
    pub fn of(name: &str) -> Self {
        if name.contains("expand") {
            CategoryKind::Expand
        } else if name.contains("contract") {
            CategoryKind::Contract
        } else {
            CategoryKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleCategory {
    pub name: String,
    pub kind: CategoryKind,
    pub rules: Vec<Rule>,
}

impl RuleCategory {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: CategoryKind::of(name),
            rules: Vec::new(),
        }
    }
}

/// Where a registry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySource {
    Config,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleRegistry {
    categories: BTreeMap<String, RuleCategory>,
    source: RegistrySource,
}

impl RuleRegistry {
    /// Parse every rule in `config`. The first malformed rule fails the build.
    pub fn build(config: &CloudConfig) -> CoreResult<Self> {
        let mut categories: BTreeMap<String, RuleCategory> = BTreeMap::new();

        for (name, specs) in &config.options.rules {
            for spec in specs.iter() {
                let rule = Rule::parse(spec)?;
                categories
                    .entry(name.clone())
                    .or_insert_with(|| RuleCategory::new(name))
                    .rules
                    .push(rule);
            }
        }

        Ok(Self {
            categories,
            source: RegistrySource::Config,
        })
    }

    /// The registry used when configuration is unusable.
    pub fn fallback() -> Self {
        // The defaults are compile-time constants that always parse.
        let mut registry = Self::build(&CloudConfig::fallback()).unwrap_or_else(|_| Self {
            categories: BTreeMap::new(),
            source: RegistrySource::Fallback,
        });
        registry.source = RegistrySource::Fallback;
        registry
    }

    /// Load a config file and derive the registry and bounds from it.
    ///
    /// Any failure is logged and replaced by [`RuleRegistry::fallback`] with
    /// default bounds; it is never returned to the caller.
    pub fn load(path: &Path) -> (Self, BoundsChecker) {
        match Self::try_load(path) {
            Ok((registry, bounds)) => {
                debug!(
                    path = %path.display(),
                    categories = registry.len(),
                    min = bounds.min,
                    max = bounds.max,
                    "rule registry loaded"
                );
                (registry, bounds)
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "config load failed, using default rules and bounds"
                );
                (Self::fallback(), BoundsChecker::default())
            }
        }
    }

    fn try_load(path: &Path) -> CoreResult<(Self, BoundsChecker)> {
        let config = CloudConfig::from_file(path)?;
        let registry = Self::build(&config)?;
        let bounds = BoundsChecker::from_options(&config.options)?;
        Ok((registry, bounds))
    }

    /// Categories in ascending name order.
    pub fn categories(&self) -> impl Iterator<Item = &RuleCategory> {
        self.categories.values()
    }

    pub fn get(&self, name: &str) -> Option<&RuleCategory> {
        self.categories.get(name)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn source(&self) -> RegistrySource {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == RegistrySource::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults;
    use crate::rule::Comparator;
    use std::io::Write;

    fn config(json: &str) -> CloudConfig {
        CloudConfig::from_json_str(json).unwrap()
    }

    #[test]
    fn category_kind_substring_heuristic() {
        assert_eq!(CategoryKind::of("expand"), CategoryKind::Expand);
        assert_eq!(CategoryKind::of("expand_when"), CategoryKind::Expand);
        assert_eq!(CategoryKind::of("preexpand"), CategoryKind::Expand);
        assert_eq!(CategoryKind::of("contract_when"), CategoryKind::Contract);
        assert_eq!(CategoryKind::of("rebalance"), CategoryKind::Other);
    }

    #[test]
    fn build_groups_rules_by_category() {
        let registry = RuleRegistry::build(&config(
            r#"{"options": {"rules": {
                "expand": "load > 0.9",
                "contract": ["load < 0.4", "active_count > 4"]
            }}}"#,
        ))
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("contract").unwrap().rules.len(), 2);
        assert_eq!(registry.get("expand").unwrap().kind, CategoryKind::Expand);
        assert!(!registry.is_fallback());
    }

    #[test]
    fn categories_iterate_in_name_order() {
        let registry = RuleRegistry::build(&config(
            r#"{"options": {"rules": {"zeta": "x > 1", "alpha": "y > 1", "expand": "load > 1"}}}"#,
        ))
        .unwrap();
        let names: Vec<&str> = registry.categories().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "expand", "zeta"]);
    }

    #[test]
    fn build_rejects_malformed_rule() {
        let err = RuleRegistry::build(&config(
            r#"{"options": {"rules": {"expand": "load ~~ 0.9"}}}"#,
        ))
        .unwrap_err();
        assert!(err.is_rule_parse());
    }

    #[test]
    fn fallback_uses_default_thresholds() {
        let registry = RuleRegistry::fallback();
        assert!(registry.is_fallback());
        assert_eq!(registry.len(), 2);

        let expand = registry.get("expand").unwrap();
        assert_eq!(expand.rules, vec![Rule::parse(defaults::EXPAND_WHEN).unwrap()]);
        let contract = registry.get("contract").unwrap();
        assert_eq!(contract.rules.len(), 1);
        assert_eq!(contract.rules[0].comparator, Comparator::Lt);
    }

    #[test]
    fn load_missing_file_falls_back() {
        let (registry, bounds) = RuleRegistry::load(Path::new("/nonexistent/clouds.json"));
        assert!(registry.is_fallback());
        assert_eq!(registry.len(), 2);
        assert_eq!(bounds, BoundsChecker::default());
    }

    #[test]
    fn load_malformed_document_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let (registry, _) = RuleRegistry::load(file.path());
        assert!(registry.is_fallback());
        assert!(registry.get("expand").is_some());
        assert!(registry.get("contract").is_some());
    }

    #[test]
    fn load_bad_rule_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"options": {{"rules": {{"expand": "load >> 1"}}, "maximum_instances": 9}}}}"#
        )
        .unwrap();

        let (registry, bounds) = RuleRegistry::load(file.path());
        assert!(registry.is_fallback());
        assert_eq!(bounds.max, defaults::MAXIMUM_INSTANCES);
    }

    #[test]
    fn load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"options": {{"rules": {{"expand": "load > 2"}}, "minimum_instances": 1, "maximum_instances": 9}}}}"#
        )
        .unwrap();

        let (registry, bounds) = RuleRegistry::load(file.path());
        assert!(!registry.is_fallback());
        assert_eq!(registry.len(), 1);
        assert_eq!(bounds, BoundsChecker::new(1, 9));
    }
}
