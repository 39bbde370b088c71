//! Stat values.

use std::fmt;

use serde::Serialize;

/// A computed or probed stat. Serializes as the bare JSON value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Count(u64),
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl StatValue {
    /// Numeric view used by rule evaluation. Flags and lists have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Number(n) => Some(*n),
            StatValue::Count(c) => Some(*c as f64),
            StatValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            StatValue::Flag(_) | StatValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            StatValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// The raw response body for a single stat: scalars as plain text, lists as
/// a JSON array.
impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Number(n) => write!(f, "{n}"),
            StatValue::Count(c) => write!(f, "{c}"),
            StatValue::Flag(b) => write!(f, "{b}"),
            StatValue::Text(s) => f.write_str(s),
            StatValue::List(items) => {
                let json = serde_json::to_string(items).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<f64> for StatValue {
    fn from(n: f64) -> Self {
        StatValue::Number(n)
    }
}
