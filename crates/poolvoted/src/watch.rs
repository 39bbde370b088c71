//! Periodic nomination loop.
//!
//! Every tick starts a new stats generation and recomputes the nominations,
//! logging what this node votes for. Probes may block, so each pass runs on
//! the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use poolvote_engine::Engine;
use tokio::sync::watch;
use tracing::{error, info};

/// Run until `shutdown` flips. Returns the number of completed passes.
pub async fn run(
    engine: Arc<Engine>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    info!(interval_ms = interval.as_millis() as u64, "nomination loop started");
    let mut passes = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let engine = Arc::clone(&engine);
                let outcome = tokio::task::spawn_blocking(move || {
                    let generation = engine.reload();
                    (generation, engine.nominations())
                })
                .await;

                match outcome {
                    Ok((generation, Ok(nominations))) => {
                        passes += 1;
                        info!(generation, ?nominations, "nominations computed");
                    }
                    Ok((generation, Err(e))) => {
                        error!(generation, error = %e, "nomination pass failed");
                    }
                    Err(e) => {
                        error!(error = %e, "nomination task aborted");
                    }
                }
            }
            _ = shutdown.changed() => {
                info!(passes, "nomination loop shutting down");
                break;
            }
        }
    }

    passes
}
