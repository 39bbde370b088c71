//! The stat dispatch table.
//!
//! Every queryable stat name maps to one [`StatProvider`]. The table is
//! fixed when the engine is built; names outside it are rejected.

use std::collections::BTreeMap;

use crate::engine::Engine;
use crate::error::{StatsError, StatsResult};
use crate::nomination;
use crate::value::StatValue;

/// Computes one stat. Providers may resolve other stats through the engine,
/// passing `chain` along so cycles are caught.
pub trait StatProvider: Send + Sync {
    fn compute(&self, engine: &Engine, chain: &mut ResolveChain) -> StatsResult<StatValue>;
}

impl<F> StatProvider for F
where
    F: Fn(&Engine, &mut ResolveChain) -> StatsResult<StatValue> + Send + Sync,
{
    fn compute(&self, engine: &Engine, chain: &mut ResolveChain) -> StatsResult<StatValue> {
        self(engine, chain)
    }
}

/// Names of stats currently being computed, outermost first.
#[derive(Debug, Default)]
pub struct ResolveChain {
    names: Vec<String>,
}

impl ResolveChain {
    /// Mark `name` as in progress, failing if it already is.
    pub fn enter(&mut self, name: &str) -> StatsResult<()> {
        if self.names.iter().any(|n| n == name) {
            let mut path = self.names.clone();
            path.push(name.to_string());
            return Err(StatsError::CyclicDependency(path.join(" -> ")));
        }
        self.names.push(name.to_string());
        Ok(())
    }

    pub fn leave(&mut self) {
        self.names.pop();
    }

    pub fn depth(&self) -> usize {
        self.names.len()
    }
}

pub struct StatTable {
    providers: BTreeMap<&'static str, Box<dyn StatProvider>>,
}

impl StatTable {
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// The stats every node answers for.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register("load", load);
        table.register("instances", instances);
        table.register("active_count", active_count);
        table.register("nominations", nominations);
        table.register("min_instances", min_instances);
        table.register("max_instances", max_instances);
        table.register("can_expand?", can_expand);
        table.register("can_contract?", can_contract);
        table
    }

    pub fn register(&mut self, name: &'static str, provider: impl StatProvider + 'static) {
        self.providers.insert(name, Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn StatProvider> {
        self.providers.get(name).map(|p| p.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.keys().copied()
    }
}

impl std::fmt::Debug for StatTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}

fn load(engine: &Engine, _: &mut ResolveChain) -> StatsResult<StatValue> {
    Ok(engine.probe().measure("load")?)
}

fn instances(engine: &Engine, _: &mut ResolveChain) -> StatsResult<StatValue> {
    Ok(StatValue::List(engine.probe().list_active()?))
}

fn active_count(engine: &Engine, chain: &mut ResolveChain) -> StatsResult<StatValue> {
    let instances = engine.resolve("instances", chain)?;
    let count = instances.as_list().map_or(0, <[String]>::len);
    Ok(StatValue::Count(count as u64))
}

fn nominations(engine: &Engine, chain: &mut ResolveChain) -> StatsResult<StatValue> {
    // Cluster size can change between generations, so bounds are checked
    // against a fresh listing rather than the cached `instances`.
    let active = engine.probe().list_active()?.len();
    let nominated = nomination::nominate(engine.registry(), engine.bounds(), active, |key| {
        engine.resolve_metric(key, chain)
    })?;
    Ok(StatValue::List(nominated))
}

fn min_instances(engine: &Engine, _: &mut ResolveChain) -> StatsResult<StatValue> {
    Ok(StatValue::Count(engine.bounds().min.into()))
}

fn max_instances(engine: &Engine, _: &mut ResolveChain) -> StatsResult<StatValue> {
    Ok(StatValue::Count(engine.bounds().max.into()))
}

fn can_expand(engine: &Engine, _: &mut ResolveChain) -> StatsResult<StatValue> {
    let active = engine.probe().list_active()?.len();
    Ok(StatValue::Flag(engine.bounds().can_expand(active)))
}

fn can_contract(engine: &Engine, _: &mut ResolveChain) -> StatsResult<StatValue> {
    let active = engine.probe().list_active()?.len();
    Ok(StatValue::Flag(engine.bounds().can_contract(active)))
}
