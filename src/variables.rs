//! Variable code normalization and estimate/MOE expansion.

use crate::error::{AcsError, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Variables the API publishes without a margin of error.
static NO_MOE: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    include_str!("../data/no_moe_vars.txt")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
});

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+\d+").expect("valid variable regex"));

pub fn has_moe(code: &str) -> bool {
    !NO_MOE.contains(code)
}

/// Drop a trailing `E`/`M` that the caller may have included.
pub fn strip_suffix(code: &str) -> &str {
    code.strip_suffix(['E', 'M']).unwrap_or(code)
}

/// Trim, uppercase, strip the suffix and check the shape of a code.
pub fn normalize_code(raw: &str) -> Result<String> {
    let upper = raw.trim().to_ascii_uppercase();
    if !CODE_RE.is_match(&upper) {
        return Err(AcsError::Validation(format!(
            "'{}' is not a valid ACS variable code",
            raw.trim()
        )));
    }
    Ok(strip_suffix(&upper).to_string())
}

/// Base codes in first-appearance order, suffixes stripped, duplicates removed.
pub fn base_codes<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(strip_suffix)
        .filter(|c| seen.insert(c.to_string()))
        .map(str::to_string)
        .collect()
}

/// Expand base codes into API column names: `<code>E,<code>M` for codes
/// with a margin of error, then `<code>E` for those without.
pub fn expand_tokens<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let codes = base_codes(raw);
    let (with_moe, without_moe): (Vec<&String>, Vec<&String>) =
        codes.iter().partition(|c| has_moe(c));

    let mut tokens = Vec::with_capacity(with_moe.len() * 2 + without_moe.len());
    for c in with_moe {
        tokens.push(format!("{c}E"));
        tokens.push(format!("{c}M"));
    }
    tokens.extend(without_moe.into_iter().map(|c| format!("{c}E")));
    tokens
}

/// Comma-joined form used for the `get` parameter.
pub fn expand<'a>(raw: impl IntoIterator<Item = &'a str>) -> String {
    expand_tokens(raw).join(",")
}

/// Table family a code belongs to, used to split mixed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableFamily {
    /// Detailed (`B`) and collapsed (`C`) tables
    Detailed,
    /// Subject tables (`S`)
    Subject,
    /// Data profile (`DP`)
    Profile,
    /// Supplemental estimates (`K`)
    Supplemental,
    Other,
}

impl TableFamily {
    pub fn of(code: &str) -> Self {
        match code.as_bytes().first() {
            Some(b'B' | b'C') => TableFamily::Detailed,
            Some(b'S') => TableFamily::Subject,
            Some(b'D') => TableFamily::Profile,
            Some(b'K') => TableFamily::Supplemental,
            _ => TableFamily::Other,
        }
    }
}

/// `^K\d`: a supplemental-estimates code.
pub fn is_supplemental(code: &str) -> bool {
    let b = code.as_bytes();
    b.len() >= 2 && b[0] == b'K' && b[1].is_ascii_digit()
}

/// `^S\d`: a subject-table code.
pub fn is_subject(code: &str) -> bool {
    let b = code.as_bytes();
    b.len() >= 2 && b[0] == b'S' && b[1].is_ascii_digit()
}

/// `^DP`: a data-profile code.
pub fn is_profile(code: &str) -> bool {
    code.starts_with("DP")
}
