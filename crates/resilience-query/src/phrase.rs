//! Range phrase parsing
//!
//! Turns free text such as "counties with CRI between 0.4 and 0.6" into a
//! `(lo, hi)` range. Rules are tried in order and the first match wins:
//!
//! 1. `between X and Y` / `between X to Y` -> `(X, Y)`
//! 2. `above X` -> `(X, 1.0)`
//! 3. `below X` -> `(0.0, X)`
//!
//! Matching is case-insensitive; numbers may omit the leading digit (`.5`).

use crate::{QueryError, Result};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Upper end of the CRI scale
pub const CRI_MAX: f64 = 1.0;
/// Lower end of the CRI scale
pub const CRI_MIN: f64 = 0.0;

static BETWEEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"between\s*([0-9]*\.?[0-9]+)\s*(?:and|to)\s*([0-9]*\.?[0-9]+)").ok()
});
static ABOVE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"above\s*([0-9]*\.?[0-9]+)").ok());
static BELOW: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"below\s*([0-9]*\.?[0-9]+)").ok());

/// One phrase shape and how to turn its captures into a range
pub struct PhraseRule {
    pub name: &'static str,
    pub regex: &'static LazyLock<Option<Regex>>,
    pub extract: fn(&Captures<'_>) -> Option<(f64, f64)>,
}

fn number(caps: &Captures<'_>, group: usize) -> Option<f64> {
    caps.get(group)?.as_str().parse().ok()
}

fn between(caps: &Captures<'_>) -> Option<(f64, f64)> {
    Some((number(caps, 1)?, number(caps, 2)?))
}

fn above(caps: &Captures<'_>) -> Option<(f64, f64)> {
    Some((number(caps, 1)?, CRI_MAX))
}

fn below(caps: &Captures<'_>) -> Option<(f64, f64)> {
    Some((CRI_MIN, number(caps, 1)?))
}

pub static RULES: &[PhraseRule] = &[
    PhraseRule {
        name: "between",
        regex: &BETWEEN,
        extract: between,
    },
    PhraseRule {
        name: "above",
        regex: &ABOVE,
        extract: above,
    },
    PhraseRule {
        name: "below",
        regex: &BELOW,
        extract: below,
    },
];

/// Parse a range phrase into `(lo, hi)`
pub fn parse(text: &str) -> Result<(f64, f64)> {
    let lowered = text.to_lowercase();

    for rule in RULES {
        let Some(regex) = rule.regex.as_ref() else {
            continue;
        };
        if let Some(range) = regex.captures(&lowered).and_then(|c| (rule.extract)(&c)) {
            tracing::debug!("Query {:?} matched rule '{}' -> {:?}", text, rule.name, range);
            return Ok(range);
        }
    }

    Err(QueryError::UnparsableQuery(text.to_string()))
}
