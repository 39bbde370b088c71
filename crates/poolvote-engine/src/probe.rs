//! Probe sources — where raw measurements come from.
//!
//! The engine only depends on the [`ProbeSource`] contract. Calls may block
//! for as long as the underlying source takes; nothing here imposes a
//! timeout.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::value::StatValue;

pub type ProbeResult<T> = Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no probe for key {0:?}")]
    UnknownKey(String),

    #[error("failed to run {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command:?} exited with {status}")]
    Status { command: String, status: String },

    #[error("could not parse {what} from {raw:?}")]
    Parse { what: &'static str, raw: String },
}

/// Supplies measurements by name and the set of active cluster nodes.
pub trait ProbeSource: Send + Sync {
    /// Measure a named quantity, e.g. `"load"`.
    fn measure(&self, key: &str) -> ProbeResult<StatValue>;

    /// Identifiers of the currently active nodes.
    fn list_active(&self) -> ProbeResult<Vec<String>>;
}

/// Probes the local host: load average from `/proc/loadavg` (or `uptime`),
/// active nodes from an external listing command.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    list_active_cmd: String,
    loadavg_path: PathBuf,
}

impl SystemProbe {
    pub const DEFAULT_LIST_ACTIVE_CMD: &'static str = "server-list-active names";

    pub fn new(list_active_cmd: impl Into<String>) -> Self {
        Self {
            list_active_cmd: list_active_cmd.into(),
            loadavg_path: PathBuf::from("/proc/loadavg"),
        }
    }

    pub fn with_loadavg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.loadavg_path = path.into();
        self
    }

    fn load(&self) -> ProbeResult<f64> {
        match std::fs::read_to_string(&self.loadavg_path) {
            Ok(content) => parse_loadavg(&content),
            Err(e) => {
                debug!(
                    path = %self.loadavg_path.display(),
                    error = %e,
                    "loadavg unreadable, falling back to uptime"
                );
                parse_uptime(&run_shell("uptime")?)
            }
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIST_ACTIVE_CMD)
    }
}

impl ProbeSource for SystemProbe {
    fn measure(&self, key: &str) -> ProbeResult<StatValue> {
        match key {
            "load" => self.load().map(StatValue::Number),
            _ => Err(ProbeError::UnknownKey(key.to_string())),
        }
    }

    fn list_active(&self) -> ProbeResult<Vec<String>> {
        let out = run_shell(&self.list_active_cmd)?;
        Ok(out.split_whitespace().map(str::to_string).collect())
    }
}

fn run_shell(command: &str) -> ProbeResult<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|source| ProbeError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Status {
            command: command.to_string(),
            status: output.status.to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// First field of `/proc/loadavg`: the 1-minute load average.
fn parse_loadavg(content: &str) -> ProbeResult<f64> {
    content
        .split_whitespace()
        .next()
        .and_then(|field| field.parse::<f64>().ok())
        .ok_or_else(|| ProbeError::Parse {
            what: "load average",
            raw: content.trim().to_string(),
        })
}

/// `uptime` ends with the 1, 5 and 15 minute averages; take the 1-minute one.
fn parse_uptime(output: &str) -> ProbeResult<f64> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    fields
        .len()
        .checked_sub(3)
        .and_then(|i| fields[i].trim_end_matches(',').parse::<f64>().ok())
        .ok_or_else(|| ProbeError::Parse {
            what: "load average",
            raw: output.trim().to_string(),
        })
}

/// In-memory probe whose readings can be changed while the engine runs.
#[derive(Debug, Default)]
pub struct StaticProbe {
    values: RwLock<BTreeMap<String, StatValue>>,
    active: RwLock<Vec<String>>,
    measure_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: impl Into<StatValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Active node count, with synthetic identifiers `node-0..n`.
    pub fn with_active(self, count: usize) -> Self {
        self.set_active((0..count).map(|i| format!("node-{i}")).collect());
        self
    }

    pub fn set(&self, key: &str, value: impl Into<StatValue>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
    }

    pub fn set_active(&self, nodes: Vec<String>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = nodes;
    }

    /// Number of `measure` calls served so far.
    pub fn measure_calls(&self) -> usize {
        self.measure_calls.load(Ordering::Relaxed)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::Relaxed)
    }
}

impl ProbeSource for StaticProbe {
    fn measure(&self, key: &str) -> ProbeResult<StatValue> {
        self.measure_calls.fetch_add(1, Ordering::Relaxed);
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| ProbeError::UnknownKey(key.to_string()))
    }

    fn list_active(&self) -> ProbeResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
