//! Minimum/maximum instance bounds.

use serde::Serialize;

use crate::config::{CloudOptions, defaults};
use crate::error::{CoreError, CoreResult};

/// Configured cluster size limits. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundsChecker {
    pub min: u32,
    pub max: u32,
}

impl Default for BoundsChecker {
    fn default() -> Self {
        Self {
            min: defaults::MINIMUM_INSTANCES,
            max: defaults::MAXIMUM_INSTANCES,
        }
    }
}

impl BoundsChecker {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Derive bounds from config options, using defaults for absent fields.
    pub fn from_options(options: &CloudOptions) -> CoreResult<Self> {
        let min = match &options.minimum_instances {
            Some(count) => count.to_count("minimum_instances")?,
            None => defaults::MINIMUM_INSTANCES,
        };
        let max = match &options.maximum_instances {
            Some(count) => count.to_count("maximum_instances")?,
            None => defaults::MAXIMUM_INSTANCES,
        };

        if min > max {
            return Err(CoreError::InvalidBound {
                field: "minimum_instances",
                reason: format!("minimum {min} exceeds maximum {max}"),
            });
        }

        Ok(Self { min, max })
    }

    /// Another instance may be added while strictly below the maximum.
    pub fn can_expand(&self, active: usize) -> bool {
        active < self.max as usize
    }

    /// An instance may be removed while strictly above the minimum.
    pub fn can_contract(&self, active: usize) -> bool {
        active > self.min as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceCount;

    #[test]
    fn expand_blocked_at_max() {
        let bounds = BoundsChecker::new(2, 5);
        assert!(bounds.can_expand(4));
        assert!(!bounds.can_expand(5));
        assert!(!bounds.can_expand(6));
    }

    #[test]
    fn contract_blocked_at_min() {
        let bounds = BoundsChecker::new(2, 5);
        assert!(bounds.can_contract(3));
        assert!(!bounds.can_contract(2));
        assert!(!bounds.can_contract(0));
    }

    #[test]
    fn absent_options_use_defaults() {
        let bounds = BoundsChecker::from_options(&CloudOptions::default()).unwrap();
        assert_eq!(bounds, BoundsChecker::default());
    }

    #[test]
    fn options_override_defaults() {
        let options = CloudOptions {
            minimum_instances: Some(InstanceCount::Int(1)),
            maximum_instances: Some(InstanceCount::Text("10".into())),
            ..Default::default()
        };
        let bounds = BoundsChecker::from_options(&options).unwrap();
        assert_eq!(bounds, BoundsChecker::new(1, 10));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let options = CloudOptions {
            minimum_instances: Some(InstanceCount::Int(6)),
            maximum_instances: Some(InstanceCount::Int(3)),
            ..Default::default()
        };
        assert!(BoundsChecker::from_options(&options).is_err());
    }
}
