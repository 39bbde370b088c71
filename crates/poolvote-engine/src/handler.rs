//! Query handler — the request/response contract callers use.
//!
//! A request carries zero or one stat name:
//!
//! - no name: JSON object of the default bundle (`load`, `nominations`,
//!   plus whatever else is cached this generation);
//! - a name: the raw value of that stat.
//!
//! Every failure, including a panicking probe, is contained here and
//! reported as `failed = true` with an `Error: ...` body.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{StatsError, StatsResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    pub body: String,
    pub failed: bool,
}

impl QueryResponse {
    fn ok(body: String) -> Self {
        Self {
            body,
            failed: false,
        }
    }

    fn error(err: &StatsError) -> Self {
        Self {
            body: format!("Error: {err}"),
            failed: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryHandler {
    engine: Arc<Engine>,
}

impl QueryHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Answer a query. Never panics and never returns an error.
    pub fn handle<S: AsRef<str>>(&self, params: &[S]) -> QueryResponse {
        let params: Vec<&str> = params.iter().map(|p| p.as_ref()).collect();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&params)))
            .unwrap_or_else(|payload| Err(StatsError::QueryHandling(panic_message(payload))));

        match outcome {
            Ok(body) => QueryResponse::ok(body),
            Err(e) => {
                warn!(
                    stat = params.first().copied().unwrap_or("<bundle>"),
                    error = %e,
                    "query failed"
                );
                QueryResponse::error(&e)
            }
        }
    }

    fn dispatch(&self, params: &[&str]) -> StatsResult<String> {
        let Some(&name) = params.first() else {
            let bundle = self.engine.default_bundle()?;
            return Ok(serde_json::to_string(&bundle)?);
        };

        if params.len() > 1 {
            debug!(
                stat = name,
                ignored = params.len() - 1,
                "extra query parameters ignored"
            );
        }

        Ok(self.engine.get(name)?.to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
