//! Rule expression parsing.
//!
//! A rule is written as exactly three whitespace-separated tokens:
//! `<key> <comparator> <threshold>`, e.g. `load > 0.9`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};

/// The closed set of comparison operators a rule may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    /// Apply the comparison `lhs <op> rhs`.
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Gt => lhs > rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Eq => lhs == rhs,
            Comparator::Ne => lhs != rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

impl FromStr for Comparator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Comparator::Gt),
            "<" => Ok(Comparator::Lt),
            ">=" => Ok(Comparator::Ge),
            "<=" => Ok(Comparator::Le),
            "==" => Ok(Comparator::Eq),
            "!=" => Ok(Comparator::Ne),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed threshold rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    /// Stat or probe name the rule reads.
    pub key: String,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl Rule {
    /// Parse a rule expression. Malformed input is rejected, never coerced.
    pub fn parse(spec: &str) -> CoreResult<Self> {
        let tokens: Vec<&str> = spec.split_whitespace().collect();
        let [key, comparator, threshold] = tokens.as_slice() else {
            return Err(CoreError::rule(
                spec,
                format!("expected 3 tokens, found {}", tokens.len()),
            ));
        };

        let comparator = comparator
            .parse::<Comparator>()
            .map_err(|_| CoreError::rule(spec, format!("unknown comparator {comparator:?}")))?;

        let threshold = threshold
            .parse::<f64>()
            .ok()
            .filter(|t| t.is_finite())
            .ok_or_else(|| CoreError::rule(spec, format!("threshold {threshold:?} is not a number")))?;

        Ok(Rule {
            key: key.to_string(),
            comparator,
            threshold,
        })
    }

    /// Whether `value` satisfies this rule.
    pub fn matches(&self, value: f64) -> bool {
        self.comparator.apply(value, self.threshold)
    }
}

impl FromStr for Rule {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::parse(s)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.comparator, self.threshold)
    }
}
