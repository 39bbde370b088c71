//! Nomination pass — which scaling actions this node votes for.
//!
//! Walks the rule categories in name order. A category is matched when any
//! of its rules holds for the current stats, then gated by instance bounds
//! according to its kind:
//!
//! ```text
//! matched && Expand   → nominate if active < max
//! matched && Contract → nominate if active > min
//! matched && Other    → nominate
//! ```
//!
//! Every rule of a category is evaluated, even after one has matched, so a
//! rule on a cyclic stat fails the pass regardless of the current readings.
//! A rule whose stat cannot be read or is not numeric counts as false; the
//! pass carries on with the remaining rules. Only a cyclic stat dependency
//! aborts the pass.

use poolvote_core::{BoundsChecker, CategoryKind, Rule, RuleCategory, RuleRegistry};
use tracing::{debug, warn};

use crate::error::{StatsError, StatsResult};
use crate::value::StatValue;

/// Evaluate every category and return the nominated category names.
///
/// `lookup` resolves a rule key to its current value.
pub fn nominate<F>(
    registry: &RuleRegistry,
    bounds: &BoundsChecker,
    active: usize,
    mut lookup: F,
) -> StatsResult<Vec<String>>
where
    F: FnMut(&str) -> StatsResult<StatValue>,
{
    let mut nominated = Vec::new();

    for category in registry.categories() {
        if !category_matches(category, &mut lookup)? {
            continue;
        }

        let allowed = match category.kind {
            CategoryKind::Expand => bounds.can_expand(active),
            CategoryKind::Contract => bounds.can_contract(active),
            CategoryKind::Other => true,
        };

        debug!(
            category = %category.name,
            kind = ?category.kind,
            active,
            min = bounds.min,
            max = bounds.max,
            allowed,
            "category matched"
        );

        if allowed {
            nominated.push(category.name.clone());
        }
    }

    Ok(nominated)
}

fn category_matches<F>(category: &RuleCategory, lookup: &mut F) -> StatsResult<bool>
where
    F: FnMut(&str) -> StatsResult<StatValue>,
{
    let mut matched = false;
    for rule in &category.rules {
        matched |= rule_holds(&category.name, rule, lookup)?;
    }
    Ok(matched)
}

fn rule_holds<F>(category: &str, rule: &Rule, lookup: &mut F) -> StatsResult<bool>
where
    F: FnMut(&str) -> StatsResult<StatValue>,
{
    let value = match lookup(&rule.key) {
        Ok(value) => value,
        Err(e) if e.is_cyclic() => return Err(e),
        Err(e) => {
            warn!(category, rule = %rule, error = %e, "rule stat unavailable, treating as false");
            return Ok(false);
        }
    };

    match value.as_f64() {
        Some(n) => Ok(rule.matches(n)),
        None => {
            let e = StatsError::Coercion {
                key: rule.key.clone(),
                value: value.to_string(),
            };
            warn!(category, rule = %rule, error = %e, "rule stat not numeric, treating as false");
            Ok(false)
        }
    }
}
