//! Cloud configuration document.
//!
//! The engine reads one document at construction:
//!
//! ```text
//! {
//!   "options": {
//!     "rules": { "expand": "load > 0.9", "contract": ["load < 0.4", "active_count > 4"] },
//!     "minimum_instances": 2,
//!     "maximum_instances": 5
//!   }
//! }
//! ```
//!
//! JSON is the native format; a file ending in `.toml` is read as TOML with
//! the same shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// Process-wide defaults used when no usable configuration exists.
pub mod defaults {
    pub const EXPAND_WHEN: &str = "load > 0.9";
    pub const CONTRACT_WHEN: &str = "load < 0.4";
    pub const MINIMUM_INSTANCES: u32 = 2;
    pub const MAXIMUM_INSTANCES: u32 = 5;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudConfig {
    pub options: CloudOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudOptions {
    /// Category name → rule expression(s). Sorted by category name.
    #[serde(default)]
    pub rules: BTreeMap<String, RuleSpecs>,
    pub minimum_instances: Option<InstanceCount>,
    pub maximum_instances: Option<InstanceCount>,
}

/// One rule expression or several for the same category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpecs {
    One(String),
    Many(Vec<String>),
}

impl RuleSpecs {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let specs: &[String] = match self {
            RuleSpecs::One(spec) => std::slice::from_ref(spec),
            RuleSpecs::Many(specs) => specs,
        };
        specs.iter().map(String::as_str)
    }
}

/// An instance bound as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceCount {
    Int(i64),
    Float(f64),
    Text(String),
}

impl InstanceCount {
    /// Coerce to a non-negative count. Negatives clamp to zero, floats
    /// truncate, text must hold a number.
    pub fn to_count(&self, field: &'static str) -> CoreResult<u32> {
        let raw = match self {
            InstanceCount::Int(n) => *n as f64,
            InstanceCount::Float(f) => *f,
            InstanceCount::Text(s) => s.trim().parse::<f64>().map_err(|_| CoreError::InvalidBound {
                field,
                reason: format!("{s:?} is not a number"),
            })?,
        };
        if !raw.is_finite() {
            return Err(CoreError::InvalidBound {
                field,
                reason: format!("{raw} is not finite"),
            });
        }
        Ok(raw.trunc().clamp(0.0, u32::MAX as f64) as u32)
    }
}

impl CloudConfig {
    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let parsed = if is_toml {
            toml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| CoreError::Malformed {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_json_str(content: &str) -> CoreResult<Self> {
        serde_json::from_str(content).map_err(|e| CoreError::Malformed {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// The hard-coded configuration used when loading fails.
    pub fn fallback() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            "expand".to_string(),
            RuleSpecs::One(defaults::EXPAND_WHEN.to_string()),
        );
        rules.insert(
            "contract".to_string(),
            RuleSpecs::One(defaults::CONTRACT_WHEN.to_string()),
        );
        CloudConfig {
            options: CloudOptions {
                rules,
                minimum_instances: None,
                maximum_instances: None,
            },
        }
    }
}
