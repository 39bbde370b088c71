//! poolvote-core — configuration and rules for the poolvote node engine.
//!
//! ```text
//! clouds.json ──► CloudConfig ──┬─► RuleRegistry (categories of Rule)
//!                               └─► BoundsChecker (min/max instances)
//! ```
//!
//! Both products are frozen after construction. A config that cannot be
//! read or parsed degrades to the built-in `expand`/`contract` defaults.

pub mod bounds;
pub mod config;
pub mod error;
pub mod registry;
pub mod rule;

pub use bounds::BoundsChecker;
pub use config::{CloudConfig, CloudOptions, InstanceCount, RuleSpecs};
pub use error::{CoreError, CoreResult};
pub use registry::{CategoryKind, RegistrySource, RuleCategory, RuleRegistry};
pub use rule::{Comparator, Rule};
