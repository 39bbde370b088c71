//! poolvote-engine — per-node stats and scaling nominations.
//!
//! Each cluster node runs one [`Engine`]. It measures local pressure
//! through a [`ProbeSource`], evaluates the frozen rule registry, and
//! reports which scaling actions this node nominates. Tallying votes
//! across nodes and acting on them happen elsewhere.
//!
//! # Architecture
//!
//! ```text
//! QueryHandler::handle(params)
//!   └── Engine::get(name)
//!         ├── StatTable  (name → StatProvider, fixed at construction)
//!         └── StatsCache (one value per name per generation)
//!               ├── ProbeSource      ← load, instances, custom keys
//!               └── nomination pass  ← RuleRegistry + BoundsChecker
//! ```
//!
//! `Engine::reload` starts a new generation; rules and bounds never change
//! after construction.

pub mod cache;
pub mod engine;
pub mod error;
pub mod handler;
pub mod nomination;
pub mod probe;
pub mod stats;
pub mod value;

pub use cache::StatsCache;
pub use engine::{DEFAULT_BUNDLE, Engine};
pub use error::{StatsError, StatsResult};
pub use handler::{QueryHandler, QueryResponse};
pub use nomination::nominate;
pub use probe::{ProbeError, ProbeResult, ProbeSource, StaticProbe, SystemProbe};
pub use stats::{ResolveChain, StatProvider, StatTable};
pub use value::StatValue;
