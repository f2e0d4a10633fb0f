use crate::error::{AcsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which ACS data product to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Survey {
    /// 1-year estimates
    Acs1,
    /// 5-year estimates
    Acs5,
    /// 1-year supplemental estimates (`K` tables)
    Acsse,
}

impl Survey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Survey::Acs1 => "acs1",
            Survey::Acs5 => "acs5",
            Survey::Acsse => "acsse",
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Survey {
    type Err = AcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acs1" => Ok(Survey::Acs1),
            "acs5" => Ok(Survey::Acs5),
            "acsse" => Ok(Survey::Acsse),
            other => Err(AcsError::Validation(format!(
                "unknown survey '{other}', expected acs1 or acs5"
            ))),
        }
    }
}

/// Table layout of the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One row per (GEOID, variable) with `estimate`/`moe` columns.
    #[default]
    Tidy,
    /// One row per GEOID with `<code>E`/`<code>M` columns.
    Wide,
}

impl FromStr for OutputMode {
    type Err = AcsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tidy" => Ok(OutputMode::Tidy),
            "wide" => Ok(OutputMode::Wide),
            other => Err(AcsError::Validation(format!(
                "unknown output '{other}', expected tidy or wide"
            ))),
        }
    }
}

/// Confidence level the margins of error are reported at.
///
/// The API publishes 90% margins; other levels rescale by the ratio of
/// z-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoeLevel {
    #[default]
    Ninety,
    NinetyFive,
    NinetyNine,
}

impl MoeLevel {
    pub fn factor(&self) -> f64 {
        match self {
            MoeLevel::Ninety => 1.0,
            MoeLevel::NinetyFive => 1.96 / 1.645,
            MoeLevel::NinetyNine => 2.56 / 1.645,
        }
    }
}

impl TryFrom<u32> for MoeLevel {
    type Error = AcsError;

    fn try_from(level: u32) -> Result<Self> {
        match level {
            90 => Ok(MoeLevel::Ninety),
            95 => Ok(MoeLevel::NinetyFive),
            99 => Ok(MoeLevel::NinetyNine),
            _ => Err(AcsError::Configuration(
                "`moe_level` must be one of 90, 95, or 99.".into(),
            )),
        }
    }
}

/// Ordered mapping from requested variable code to an optional
/// caller-facing alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSet {
    entries: Vec<(String, Option<String>)>,
}

impl VariableSet {
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: codes.into_iter().map(|c| (c.into(), None)).collect(),
        }
    }

    /// Build from `(alias, code)` pairs, the way callers usually write them.
    pub fn with_aliases<I, A, C>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: Into<String>,
        C: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(a, c)| (c.into(), Some(a.into())))
                .collect(),
        }
    }

    pub fn push(&mut self, code: impl Into<String>, alias: Option<String>) {
        self.entries.push((code.into(), alias));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn entries(&self) -> &[(String, Option<String>)] {
        &self.entries
    }

    /// Alias for a base code, if one was supplied.
    pub fn alias_for(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == code)
            .and_then(|(_, a)| a.as_deref())
    }
}

/// Geography filters supplied by the caller. Empty means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    pub state: Vec<String>,
    pub county: Vec<String>,
    pub zcta: Vec<String>,
    pub place: Vec<String>,
    pub cbsa: Vec<String>,
}

/// One request against the Census API.
///
/// `Display` and `Debug` never show the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub base_url: String,
    pub year: i32,
    /// Path below `acs/`, e.g. `acs5`, `acs5/subject`, `acsse`.
    pub dataset: String,
    pub get: String,
    pub for_clause: String,
    pub in_clause: Option<String>,
    pub key: String,
}

impl ApiCall {
    pub fn endpoint(&self) -> String {
        format!("{}/{}/acs/{}", self.base_url, self.year, self.dataset)
    }

    /// Query parameters in wire order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("get", self.get.as_str()), ("for", self.for_clause.as_str())];
        if let Some(i) = &self.in_clause {
            pairs.push(("in", i.as_str()));
        }
        pairs.push(("key", self.key.as_str()));
        pairs
    }

    /// Full URL including the key. Use only for the actual request.
    pub fn url(&self) -> String {
        crate::request::encode_url(&self.endpoint(), &self.query_pairs())
    }

    /// URL safe for logs and display.
    pub fn redacted_url(&self) -> String {
        let pairs: Vec<(&str, &str)> = self
            .query_pairs()
            .into_iter()
            .map(|(k, v)| if k == "key" { (k, "REDACTED") } else { (k, v) })
            .collect();
        crate::request::encode_url(&self.endpoint(), &pairs)
    }
}

impl fmt::Display for ApiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted_url())
    }
}

impl fmt::Debug for ApiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCall")
            .field("endpoint", &self.endpoint())
            .field("get", &self.get)
            .field("for", &self.for_clause)
            .field("in", &self.in_clause)
            .field("key", &"REDACTED")
            .finish()
    }
}

/// One geography in a wide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub geoid: String,
    pub name: String,
    /// Aligned with `WideTable::columns`.
    pub values: Vec<Option<f64>>,
}

/// Denormalized result: one row per GEOID, one column per `E`/`M` variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    pub columns: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn row(&self, geoid: &str) -> Option<&WideRow> {
        self.rows.iter().find(|r| r.geoid == geoid)
    }

    /// Cell lookup by GEOID and column name.
    pub fn value(&self, geoid: &str, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.row(geoid).and_then(|r| r.values[idx])
    }

    /// Add columns not yet present, padding existing rows with missing values.
    /// Returns, for each of `columns`, its index in `self`.
    fn union_columns(&mut self, columns: &[String]) -> Vec<usize> {
        let mut mapping = Vec::with_capacity(columns.len());
        for c in columns {
            match self.column_index(c) {
                Some(i) => mapping.push(i),
                None => {
                    self.columns.push(c.clone());
                    for r in &mut self.rows {
                        r.values.push(None);
                    }
                    mapping.push(self.columns.len() - 1);
                }
            }
        }
        mapping
    }

    /// Outer join on GEOID. Columns already present in `self` keep their
    /// values; rows only in `other` are appended.
    pub fn merge_outer(&mut self, other: WideTable) {
        let existing: Vec<bool> = other
            .columns
            .iter()
            .map(|c| self.column_index(c).is_some())
            .collect();
        let mapping = self.union_columns(&other.columns);
        let mut by_geoid: HashMap<String, usize> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.geoid.clone(), i))
            .collect();

        for row in other.rows {
            match by_geoid.get(&row.geoid) {
                Some(&i) => {
                    let target = &mut self.rows[i];
                    for (j, v) in row.values.into_iter().enumerate() {
                        if !existing[j] {
                            target.values[mapping[j]] = v;
                        }
                    }
                }
                None => {
                    let mut values = vec![None; self.columns.len()];
                    for (j, v) in row.values.into_iter().enumerate() {
                        values[mapping[j]] = v;
                    }
                    by_geoid.insert(row.geoid.clone(), self.rows.len());
                    self.rows.push(WideRow {
                        geoid: row.geoid,
                        name: row.name,
                        values,
                    });
                }
            }
        }
    }

    /// Row-wise concatenation; columns are unioned.
    pub fn append(&mut self, other: WideTable) {
        let mapping = self.union_columns(&other.columns);
        for row in other.rows {
            let mut values = vec![None; self.columns.len()];
            for (j, v) in row.values.into_iter().enumerate() {
                values[mapping[j]] = v;
            }
            self.rows.push(WideRow {
                geoid: row.geoid,
                name: row.name,
                values,
            });
        }
    }

    /// Stable sort by GEOID.
    pub fn sort_by_geoid(&mut self) {
        self.rows.sort_by(|a, b| a.geoid.cmp(&b.geoid));
    }
}

/// Normalized result row (one observation = one geography x variable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TidyRow {
    #[serde(rename = "GEOID")]
    pub geoid: String,
    #[serde(rename = "NAME")]
    pub name: String,
    pub variable: String,
    pub estimate: Option<f64>,
    pub moe: Option<f64>,
}

/// Final table handed back to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum AcsTable {
    Tidy(Vec<TidyRow>),
    Wide(WideTable),
}

impl AcsTable {
    pub fn len(&self) -> usize {
        match self {
            AcsTable::Tidy(rows) => rows.len(),
            AcsTable::Wide(t) => t.rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_tidy(&self) -> Option<&[TidyRow]> {
        match self {
            AcsTable::Tidy(rows) => Some(rows),
            AcsTable::Wide(_) => None,
        }
    }

    pub fn as_wide(&self) -> Option<&WideTable> {
        match self {
            AcsTable::Wide(t) => Some(t),
            AcsTable::Tidy(_) => None,
        }
    }
}
