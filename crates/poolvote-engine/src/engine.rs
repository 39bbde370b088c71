//! The per-node engine: frozen rules and bounds plus a reloadable stats cache.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use poolvote_core::{BoundsChecker, RuleRegistry};
use tracing::{debug, info};

use crate::cache::StatsCache;
use crate::error::{StatsError, StatsResult};
use crate::probe::ProbeSource;
use crate::stats::{ResolveChain, StatTable};
use crate::value::StatValue;

/// Stats always present in the default bundle.
pub const DEFAULT_BUNDLE: [&str; 2] = ["load", "nominations"];

pub struct Engine {
    registry: RuleRegistry,
    bounds: BoundsChecker,
    probe: Arc<dyn ProbeSource>,
    table: StatTable,
    cache: StatsCache,
}

impl Engine {
    pub fn new(registry: RuleRegistry, bounds: BoundsChecker, probe: Arc<dyn ProbeSource>) -> Self {
        Self::with_table(registry, bounds, probe, StatTable::standard())
    }

    pub fn with_table(
        registry: RuleRegistry,
        bounds: BoundsChecker,
        probe: Arc<dyn ProbeSource>,
        table: StatTable,
    ) -> Self {
        info!(
            categories = registry.len(),
            source = ?registry.source(),
            min = bounds.min,
            max = bounds.max,
            "engine ready"
        );
        Self {
            registry,
            bounds,
            probe,
            table,
            cache: StatsCache::new(),
        }
    }

    /// Build from a config file, degrading to the default rules on failure.
    pub fn from_config_file(path: &Path, probe: Arc<dyn ProbeSource>) -> Self {
        let (registry, bounds) = RuleRegistry::load(path);
        Self::new(registry, bounds, probe)
    }

    /// Resolve a stat from the dispatch table through the cache.
    pub fn get(&self, name: &str) -> StatsResult<StatValue> {
        self.resolve(name, &mut ResolveChain::default())
    }

    /// The nominated category names for the current generation.
    pub fn nominations(&self) -> StatsResult<Vec<String>> {
        match self.get("nominations")? {
            StatValue::List(names) => Ok(names),
            other => Err(StatsError::QueryHandling(format!(
                "nominations resolved to non-list value {other}"
            ))),
        }
    }

    /// Resolve the default bundle, then return every stat cached so far.
    pub fn default_bundle(&self) -> StatsResult<BTreeMap<String, StatValue>> {
        let mut resolved = Vec::with_capacity(DEFAULT_BUNDLE.len());
        for name in DEFAULT_BUNDLE {
            resolved.push((name, self.get(name)?));
        }

        // A concurrent reload may have emptied the cache; the bundle still
        // carries what this call resolved.
        let (_, mut bundle) = self.cache.entries();
        for (name, value) in resolved {
            bundle.entry(name.to_string()).or_insert(value);
        }
        Ok(bundle)
    }

    /// Clear cached stats and start a new generation. Rules and bounds stay.
    pub fn reload(&self) -> u64 {
        self.cache.reload()
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    pub fn cached(&self, name: &str) -> Option<StatValue> {
        self.cache.peek(name)
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn bounds(&self) -> &BoundsChecker {
        &self.bounds
    }

    pub fn probe(&self) -> &dyn ProbeSource {
        self.probe.as_ref()
    }

    pub fn table(&self) -> &StatTable {
        &self.table
    }

    /// Resolve a table stat, tracking `chain` to reject cycles.
    pub fn resolve(&self, name: &str, chain: &mut ResolveChain) -> StatsResult<StatValue> {
        let provider = self
            .table
            .get(name)
            .ok_or_else(|| StatsError::UnknownStat(name.to_string()))?;

        chain.enter(name)?;
        let result = self.cache.get(name, || {
            debug!(stat = name, depth = chain.depth(), "computing stat");
            provider.compute(self, chain)
        });
        chain.leave();
        result
    }

    /// Resolve a rule key: table stats first, then a direct probe measurement
    /// cached under the same key.
    pub fn resolve_metric(&self, key: &str, chain: &mut ResolveChain) -> StatsResult<StatValue> {
        if self.table.contains(key) {
            return self.resolve(key, chain);
        }

        chain.enter(key)?;
        let result = self.cache.get(key, || {
            debug!(probe = key, "measuring probe key");
            self.probe.measure(key).map_err(StatsError::from)
        });
        chain.leave();
        result
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("bounds", &self.bounds)
            .field("table", &self.table)
            .field("generation", &self.cache.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::StaticProbe;
    use poolvote_core::CloudConfig;

    fn engine_with(json: &str, probe: Arc<StaticProbe>, min: u32, max: u32) -> Engine {
        let registry = RuleRegistry::build(&CloudConfig::from_json_str(json).unwrap()).unwrap();
        Engine::new(registry, BoundsChecker::new(min, max), probe)
    }

    const EXPAND: &str = r#"{"options": {"rules": {"expand": "load > 0.9"}}}"#;

    #[test]
    fn get_caches_within_generation() {
        let probe = Arc::new(StaticProbe::new().with_value("load", 0.5));
        let engine = engine_with(EXPAND, probe.clone(), 1, 5);

        assert_eq!(engine.get("load").unwrap(), StatValue::Number(0.5));
        probe.set("load", 0.99);
        assert_eq!(engine.get("load").unwrap(), StatValue::Number(0.5));
        assert_eq!(probe.measure_calls(), 1);
    }

    #[test]
    fn reload_forces_recompute() {
        let probe = Arc::new(StaticProbe::new().with_value("load", 0.5));
        let engine = engine_with(EXPAND, probe.clone(), 1, 5);

        engine.get("load").unwrap();
        assert_eq!(engine.reload(), 1);
        assert_eq!(engine.get("load").unwrap(), StatValue::Number(0.5));
        assert_eq!(probe.measure_calls(), 2);
    }

    #[test]
    fn reload_keeps_rules_and_bounds() {
        let probe = Arc::new(StaticProbe::new());
        let engine = engine_with(EXPAND, probe, 1, 5);
        engine.reload();
        assert_eq!(engine.registry().len(), 1);
        assert_eq!(*engine.bounds(), BoundsChecker::new(1, 5));
    }

    #[test]
    fn unknown_stat_rejected() {
        let engine = engine_with(EXPAND, Arc::new(StaticProbe::new()), 1, 5);
        assert!(matches!(
            engine.get("disk_usage"),
            Err(StatsError::UnknownStat(name)) if name == "disk_usage"
        ));
    }

    #[test]
    fn nominations_with_room_to_grow() {
        let probe = Arc::new(StaticProbe::new().with_value("load", 0.95).with_active(2));
        let engine = engine_with(EXPAND, probe, 1, 5);
        assert_eq!(engine.nominations().unwrap(), vec!["expand"]);
        assert!(engine.cached("nominations").is_some());
        assert!(engine.cached("load").is_some());
    }

    #[test]
    fn nominations_at_max_are_empty() {
        let probe = Arc::new(StaticProbe::new().with_value("load", 0.95).with_active(5));
        let engine = engine_with(EXPAND, probe, 1, 5);
        assert!(engine.nominations().unwrap().is_empty());
    }

    #[test]
    fn rule_on_nominations_is_cyclic() {
        let probe = Arc::new(StaticProbe::new().with_active(2));
        let engine = engine_with(
            r#"{"options": {"rules": {"expand": "nominations > 0"}}}"#,
            probe,
            1,
            5,
        );
        let err = engine.get("nominations").unwrap_err();
        assert!(err.is_cyclic());
        assert!(engine.cached("nominations").is_none());
    }

    #[test]
    fn cyclic_rule_fails_under_any_load() {
        let probe = Arc::new(StaticProbe::new().with_value("load", 0.95).with_active(2));
        let engine = engine_with(
            r#"{"options": {"rules": {"expand": ["load > 0.9", "nominations > 0"]}}}"#,
            probe.clone(),
            1,
            5,
        );
        assert!(engine.nominations().unwrap_err().is_cyclic());

        probe.set("load", 0.1);
        engine.reload();
        assert!(engine.nominations().unwrap_err().is_cyclic());
    }

    #[test]
    fn custom_probe_key_measured_and_cached() {
        let probe = Arc::new(
            StaticProbe::new()
                .with_value("queue_depth", 250.0)
                .with_active(3),
        );
        let engine = engine_with(
            r#"{"options": {"rules": {"expand": "queue_depth > 100"}}}"#,
            probe,
            1,
            5,
        );
        assert_eq!(engine.nominations().unwrap(), vec!["expand"]);
        assert_eq!(engine.cached("queue_depth"), Some(StatValue::Number(250.0)));
        // Probe keys are reachable from rules only, not from queries.
        assert!(engine.get("queue_depth").is_err());
    }

    #[test]
    fn active_count_derives_from_instances() {
        let probe = Arc::new(StaticProbe::new().with_active(4));
        let engine = engine_with(EXPAND, probe.clone(), 1, 5);
        assert_eq!(engine.get("active_count").unwrap(), StatValue::Count(4));
        assert!(engine.cached("instances").is_some());
        assert_eq!(probe.list_calls(), 1);
    }

    #[test]
    fn bounds_stats() {
        let probe = Arc::new(StaticProbe::new().with_active(5));
        let engine = engine_with(EXPAND, probe, 2, 5);
        assert_eq!(engine.get("min_instances").unwrap(), StatValue::Count(2));
        assert_eq!(engine.get("max_instances").unwrap(), StatValue::Count(5));
        assert_eq!(engine.get("can_expand?").unwrap(), StatValue::Flag(false));
        assert_eq!(engine.get("can_contract?").unwrap(), StatValue::Flag(true));
    }

    #[test]
    fn default_bundle_contains_load_and_nominations() {
        let probe = Arc::new(StaticProbe::new().with_value("load", 0.2).with_active(2));
        let engine = engine_with(EXPAND, probe, 1, 5);
        engine.get("min_instances").unwrap();

        let bundle = engine.default_bundle().unwrap();
        assert_eq!(bundle["load"], StatValue::Number(0.2));
        assert_eq!(bundle["nominations"], StatValue::List(vec![]));
        assert!(bundle.contains_key("min_instances"));
    }

    #[test]
    fn missing_config_file_uses_fallback() {
        let engine = Engine::from_config_file(
            Path::new("/nonexistent/clouds.json"),
            Arc::new(StaticProbe::new()),
        );
        assert!(engine.registry().is_fallback());
        assert_eq!(*engine.bounds(), BoundsChecker::default());
    }
}
