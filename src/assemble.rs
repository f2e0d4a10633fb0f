//! The ACS request pipeline: validate a query, plan the calls it needs,
//! fetch them, merge the pieces and reshape the result.
//!
//! A query is turned into a [`Plan`] before anything is fetched. The plan
//! groups the work first by table family (detailed, subject, profile tables
//! live behind different endpoints) and then by geographic partition (the
//! API only serves tracts and block groups one state at a time, and older
//! vintages one county at a time). Each piece is fetched in chunks of at
//! most [`MAX_VARIABLES_PER_CALL`] variables.

use crate::api::Client;
use crate::error::{AcsError, Result};
use crate::geography::{BLOCK_GROUP, ResolvedSelectors, TRACT, canonical_geography, check_selectors};
use crate::models::{
    AcsTable, MoeLevel, OutputMode, Selectors, Survey, TidyRow, VariableSet, WideTable,
};
use crate::request::{BLOCK_GROUP_COUNTY_WILDCARD_YEAR, CallTarget, build_call};
use crate::variables::{
    TableFamily, expand_tokens, has_moe, is_profile, is_subject, is_supplemental, normalize_code,
};
use log::{debug, info};
use std::fmt;

/// Base variable codes per API call. With estimate and MOE columns plus
/// `NAME` this stays under the API's 50-column limit.
pub const MAX_VARIABLES_PER_CALL: usize = 24;
pub const ACS5_FIRST_YEAR: i32 = 2009;
pub const ACS1_FIRST_YEAR: i32 = 2005;
/// Environment variable consulted when no key is passed.
pub const API_KEY_ENV: &str = "CENSUS_API_KEY";

/// Annotation values the API uses in place of an estimate.
pub const MISSING_SENTINELS: [f64; 9] = [
    -111111111.0,
    -222222222.0,
    -333333333.0,
    -444444444.0,
    -555555555.0,
    -666666666.0,
    -777777777.0,
    -888888888.0,
    -999999999.0,
];

/// A request for ACS data.
///
/// Built with [`AcsQuery::new`] and the chained setters, then passed to
/// [`Client::get_acs`].
///
/// ### Fields
/// - `geography`: API geography name or one of the aliases `cbsa`, `cbg`,
///   `zcta`, `puma`.
/// - `variables` / `table`: exactly one of the two must be given.
/// - `year`: end year of the survey period (default 2019).
/// - `survey`: `acs5` (default) or `acs1`; supplemental `K` tables switch to
///   `acsse` on their own.
/// - `selectors`: states and counties by FIPS code or name, places, ZCTAs,
///   CBSAs.
///
/// ### Example
/// ```
/// use acs_rs::{AcsQuery, OutputMode};
/// let q = AcsQuery::new("tract")
///     .aliased_variables([("median_income", "B19013_001")])
///     .state("NY")
///     .county("New York")
///     .output(OutputMode::Wide)
///     .moe_level(95);
/// assert_eq!(q.geography, "tract");
/// ```
#[derive(Clone)]
pub struct AcsQuery {
    pub geography: String,
    pub variables: VariableSet,
    pub table: Option<String>,
    pub year: i32,
    pub survey: Survey,
    pub output: OutputMode,
    pub selectors: Selectors,
    /// Falls back to `CENSUS_API_KEY` when `None`.
    pub key: Option<String>,
    /// 90, 95 or 99.
    pub moe_level: u32,
    /// Log every call's (redacted) URL at info level.
    pub show_call: bool,
}

impl AcsQuery {
    pub fn new(geography: impl Into<String>) -> Self {
        Self {
            geography: geography.into(),
            variables: VariableSet::default(),
            table: None,
            year: 2019,
            survey: Survey::Acs5,
            output: OutputMode::Tidy,
            selectors: Selectors::default(),
            key: None,
            moe_level: 90,
            show_call: false,
        }
    }

    pub fn variables<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = VariableSet::from_codes(codes);
        self
    }

    /// Variables given as `(alias, code)`; results use the alias.
    pub fn aliased_variables<I, A, C>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: Into<String>,
        C: Into<String>,
    {
        self.variables = VariableSet::with_aliases(pairs);
        self
    }

    pub fn variable_set(mut self, variables: VariableSet) -> Self {
        self.variables = variables;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn survey(mut self, survey: Survey) -> Self {
        self.survey = survey;
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.selectors.state.push(state.into());
        self
    }

    pub fn county(mut self, county: impl Into<String>) -> Self {
        self.selectors.county.push(county.into());
        self
    }

    pub fn zcta(mut self, zcta: impl Into<String>) -> Self {
        self.selectors.zcta.push(zcta.into());
        self
    }

    pub fn place(mut self, place: impl Into<String>) -> Self {
        self.selectors.place.push(place.into());
        self
    }

    pub fn cbsa(mut self, cbsa: impl Into<String>) -> Self {
        self.selectors.cbsa.push(cbsa.into());
        self
    }

    pub fn selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn moe_level(mut self, level: u32) -> Self {
        self.moe_level = level;
        self
    }

    pub fn show_call(mut self, show: bool) -> Self {
        self.show_call = show;
        self
    }
}

impl fmt::Debug for AcsQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcsQuery")
            .field("geography", &self.geography)
            .field("variables", &self.variables)
            .field("table", &self.table)
            .field("year", &self.year)
            .field("survey", &self.survey)
            .field("output", &self.output)
            .field("selectors", &self.selectors)
            .field("key", &self.key.as_ref().map(|_| "REDACTED"))
            .field("moe_level", &self.moe_level)
            .field("show_call", &self.show_call)
            .finish()
    }
}

/// Pick the explicit key, else the environment value. Blank keys count as
/// missing.
pub fn resolve_api_key(explicit: Option<&str>, from_env: Option<String>) -> Result<String> {
    explicit
        .map(str::to_string)
        .or(from_env)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            AcsError::Configuration(
                "A Census API key is required. Obtain one at http://api.census.gov/data/key_signup.html, \
                 and then pass it explicitly or set the CENSUS_API_KEY environment variable."
                    .into(),
            )
        })
}

/// A query after every check that can run without the network.
struct Prepared {
    geography: String,
    /// Normalized base codes with their aliases. Empty in table mode.
    variables: VariableSet,
    table: Option<String>,
    year: i32,
    survey: Survey,
    output: OutputMode,
    moe: MoeLevel,
    key: String,
    selectors: ResolvedSelectors,
    show_call: bool,
}

fn normalize_variables(raw: &VariableSet) -> Result<VariableSet> {
    let mut out = VariableSet::default();
    for (code, alias) in raw.entries() {
        let code = normalize_code(code)?;
        if out.codes().all(|c| c != code) {
            out.push(code, alias.clone());
        }
    }
    Ok(out)
}

/// Validate the survey/year pair and apply the supplemental-estimates
/// override.
fn check_survey(survey: Survey, year: i32, supplemental: bool) -> Result<Survey> {
    match survey {
        Survey::Acs5 if year < ACS5_FIRST_YEAR => {
            return Err(AcsError::Validation(
                "5-year ACS support begins with the 2005-2009 5-year ACS.".into(),
            ));
        }
        Survey::Acs1 if year < ACS1_FIRST_YEAR => {
            return Err(AcsError::Validation(
                "1-year ACS support begins with the 2005 1-year ACS.".into(),
            ));
        }
        Survey::Acs1 => info!(
            "The 1-year ACS provides data for geographies with populations of 65,000 and greater."
        ),
        _ => {}
    }

    if supplemental {
        info!(
            "Getting data from the ACS 1-year Supplemental Estimates. \
             Data are available for geographies with populations of 20,000 and greater."
        );
        return Ok(Survey::Acsse);
    }
    match survey {
        Survey::Acs1 => info!("Getting data from the {year} 1-year ACS"),
        Survey::Acs5 => info!("Getting data from the {}-{} 5-year ACS", year - 4, year),
        Survey::Acsse => {}
    }
    Ok(survey)
}

/// Dataset path used to look up a table's member variables.
fn table_dataset(table: &str, survey: Survey) -> String {
    if is_supplemental(table) {
        Survey::Acsse.as_str().to_string()
    } else if is_subject(table) {
        format!("{survey}/subject")
    } else if is_profile(table) {
        format!("{survey}/profile")
    } else {
        survey.as_str().to_string()
    }
}

/// One homogeneous unit of work: a single endpoint and geographic scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequest {
    pub codes: Vec<String>,
    pub selectors: ResolvedSelectors,
}

/// Work for a query: table-family groups, each split into geographic
/// partitions.
///
/// Partitions within a group are concatenated in order; groups are merged
/// on GEOID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub groups: Vec<Vec<SubRequest>>,
}

impl Plan {
    /// True when results of several table families are combined.
    pub fn is_multi_family(&self) -> bool {
        self.groups.len() > 1
    }

    /// Number of sub-requests, each fetched in one or more chunks.
    pub fn request_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

/// Split codes into endpoint-homogeneous groups.
pub fn partition_families(codes: &[String]) -> Result<Vec<Vec<String>>> {
    let mut families: Vec<(TableFamily, Vec<String>)> = Vec::new();
    for code in codes {
        let fam = TableFamily::of(code);
        match families.iter_mut().find(|(f, _)| *f == fam) {
            Some((_, v)) => v.push(code.clone()),
            None => families.push((fam, vec![code.clone()])),
        }
    }
    if families.len() <= 1 {
        return Ok(families.into_iter().map(|(_, v)| v).collect());
    }
    if codes.iter().any(|c| is_supplemental(c)) {
        return Err(AcsError::Validation(
            "At the moment, supplemental estimates variables cannot be combined with variables from other datasets."
                .into(),
        ));
    }
    families.sort_by_key(|(f, _)| *f);
    Ok(families.into_iter().map(|(_, v)| v).collect())
}

/// Geographic partitions the API forces on us.
pub fn partition_geography(
    geography: &str,
    year: i32,
    selectors: &ResolvedSelectors,
) -> Vec<ResolvedSelectors> {
    if (geography == TRACT || geography == BLOCK_GROUP) && selectors.state.len() > 1 {
        info!("Fetching {geography} data by state and combining the result.");
        return selectors
            .state
            .iter()
            .map(|s| ResolvedSelectors {
                state: vec![s.clone()],
                ..selectors.clone()
            })
            .collect();
    }
    if geography == BLOCK_GROUP
        && year < BLOCK_GROUP_COUNTY_WILDCARD_YEAR
        && selectors.county.len() > 1
    {
        info!("Fetching block group data by county and combining the result.");
        return selectors
            .county
            .iter()
            .map(|c| ResolvedSelectors {
                county: vec![c.clone()],
                ..selectors.clone()
            })
            .collect();
    }
    vec![selectors.clone()]
}

/// Build the full plan for a set of base codes.
pub fn plan(
    geography: &str,
    year: i32,
    codes: &[String],
    selectors: &ResolvedSelectors,
) -> Result<Plan> {
    let families = partition_families(codes)?;
    if families.len() > 1 {
        info!("Fetching data by table type (\"B/C\", \"S\", \"DP\") and combining the result.");
    }
    let partitions = partition_geography(geography, year, selectors);
    let groups = families
        .into_iter()
        .map(|family| {
            partitions
                .iter()
                .map(|sel| SubRequest {
                    codes: family.clone(),
                    selectors: sel.clone(),
                })
                .collect()
        })
        .collect();
    Ok(Plan { groups })
}

/// Replace sentinel annotation values with missing.
pub fn replace_missing(table: &mut WideTable) {
    for row in &mut table.rows {
        for v in &mut row.values {
            if v.is_some_and(|x| MISSING_SENTINELS.contains(&x)) {
                *v = None;
            }
        }
    }
}

/// Keep exactly `columns`, in that order. Absent columns become missing.
fn select_columns(table: WideTable, columns: &[String]) -> WideTable {
    let idx: Vec<Option<usize>> = columns.iter().map(|c| table.column_index(c)).collect();
    let rows = table
        .rows
        .into_iter()
        .map(|mut r| {
            r.values = idx
                .iter()
                .map(|i| i.and_then(|i| r.values[i]))
                .collect();
            r
        })
        .collect();
    WideTable {
        columns: columns.to_vec(),
        rows,
    }
}

/// Long layout: one row per GEOID and base code, sorted by GEOID and then
/// by variable name.
pub fn to_tidy(table: &WideTable, variables: &VariableSet, moe: MoeLevel) -> Vec<TidyRow> {
    let factor = moe.factor();
    let lookup: Vec<(&str, Option<usize>, Option<usize>)> = variables
        .codes()
        .map(|code| {
            let est = table.column_index(&format!("{code}E"));
            let m = if has_moe(code) {
                table.column_index(&format!("{code}M"))
            } else {
                None
            };
            (code, est, m)
        })
        .collect();

    let mut out = Vec::with_capacity(table.rows.len() * lookup.len());
    for row in &table.rows {
        for &(code, est, m) in &lookup {
            let variable = variables.alias_for(code).unwrap_or(code).to_string();
            out.push(TidyRow {
                geoid: row.geoid.clone(),
                name: row.name.clone(),
                variable,
                estimate: est.and_then(|i| row.values[i]),
                moe: m.and_then(|i| row.values[i]).map(|x| x * factor),
            });
        }
    }
    out.sort_by(|a, b| a.geoid.cmp(&b.geoid).then_with(|| a.variable.cmp(&b.variable)));
    out
}

/// Wide layout: scale MOE columns, then swap codes for aliases.
pub fn to_wide(mut table: WideTable, variables: &VariableSet, moe: MoeLevel) -> WideTable {
    let factor = moe.factor();
    let moe_cols: Vec<usize> = variables
        .codes()
        .filter(|c| has_moe(c))
        .filter_map(|c| table.column_index(&format!("{c}M")))
        .collect();
    for row in &mut table.rows {
        for &i in &moe_cols {
            if let Some(v) = row.values[i].as_mut() {
                *v *= factor;
            }
        }
    }

    for (code, alias) in variables.entries() {
        let Some(alias) = alias else { continue };
        for col in &mut table.columns {
            if let Some(suffix) = col.strip_prefix(code.as_str())
                && (suffix == "E" || suffix == "M")
            {
                *col = format!("{alias}{suffix}");
            }
        }
    }
    table
}

impl Client {
    /// Fetch ACS data and return it as a tidy or wide table.
    ///
    /// All validation happens before the first request. Any failing call
    /// aborts the whole query.
    ///
    /// ### Arguments
    /// - `query`: geography, variables or table, year, survey, layout,
    ///   selectors, key and MOE level. See [`AcsQuery`].
    ///
    /// ### Returns
    /// [`AcsTable::Tidy`] with one row per area and variable, sorted by GEOID
    /// and variable, or [`AcsTable::Wide`] with `<name>E`/`<name>M` columns.
    /// Suppressed estimates are `None`; margins of error are scaled to the
    /// requested confidence level.
    ///
    /// ### Errors
    /// - [`AcsError::Configuration`] for a missing API key or an unsupported MOE level
    /// - [`AcsError::Validation`] / [`AcsError::InvalidGeography`] for bad
    ///   variables, years or selectors (no request is sent)
    /// - [`AcsError::Api`], [`AcsError::UnavailableVariable`],
    ///   [`AcsError::InvalidApiKey`] or [`AcsError::Transport`] from any call
    ///
    /// ### Example
    /// ```no_run
    /// # use acs_rs::{AcsQuery, Client};
    /// let table = Client::default().get_acs(
    ///     &AcsQuery::new("county")
    ///         .variables(["B19013_001"])
    ///         .state("TX")
    ///         .county("Harris"),
    /// )?;
    /// println!("{} rows", table.len());
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn get_acs(&self, query: &AcsQuery) -> Result<AcsTable> {
        let prepared = self.prepare(query)?;

        let variables = match &prepared.table {
            Some(table) => {
                let dataset = table_dataset(table, prepared.survey);
                let codes = self.variables_from_table(table, prepared.year, &dataset)?;
                VariableSet::from_codes(codes)
            }
            None => prepared.variables.clone(),
        };
        let codes: Vec<String> = variables.codes().map(str::to_string).collect();
        let plan = plan(
            &prepared.geography,
            prepared.year,
            &codes,
            &prepared.selectors,
        )?;

        let merged = self.run_plan(&prepared, &plan)?;
        let tokens = expand_tokens(codes.iter().map(String::as_str));
        let mut wide = select_columns(merged, &tokens);
        replace_missing(&mut wide);

        Ok(match prepared.output {
            OutputMode::Tidy => AcsTable::Tidy(to_tidy(&wide, &variables, prepared.moe)),
            OutputMode::Wide => AcsTable::Wide(to_wide(wide, &variables, prepared.moe)),
        })
    }

    /// Every check that does not need the network.
    fn prepare(&self, query: &AcsQuery) -> Result<Prepared> {
        let variables = normalize_variables(&query.variables)?;
        let table = query
            .table
            .as_deref()
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty());

        let supplemental = variables.codes().any(is_supplemental)
            || table.as_deref().is_some_and(is_supplemental);
        let survey = check_survey(query.survey, query.year, supplemental)?;

        let key = resolve_api_key(query.key.as_deref(), std::env::var(API_KEY_ENV).ok())?;

        match (variables.is_empty(), table.is_some()) {
            (true, false) => {
                return Err(AcsError::Validation(
                    "Either a vector of variables or an ACS table must be specified.".into(),
                ));
            }
            (false, true) => {
                return Err(AcsError::Validation(
                    "Specify variables or a table to retrieve; they cannot be combined.".into(),
                ));
            }
            _ => {}
        }

        let moe = MoeLevel::try_from(query.moe_level)?;

        let geography = canonical_geography(&query.geography);
        check_selectors(&geography, &query.selectors)?;
        let selectors = self.reference().resolve(&query.selectors)?;

        // Mixed families are rejected here so nothing is fetched first.
        let codes: Vec<String> = variables.codes().map(str::to_string).collect();
        partition_families(&codes)?;

        Ok(Prepared {
            geography,
            variables,
            table,
            year: query.year,
            survey,
            output: query.output,
            moe,
            key,
            selectors,
            show_call: query.show_call,
        })
    }

    fn run_plan(&self, prepared: &Prepared, plan: &Plan) -> Result<WideTable> {
        debug!(
            "Plan: {} table families, {} sub-requests",
            plan.groups.len(),
            plan.request_count()
        );
        let mut merged: Option<WideTable> = None;
        for group in &plan.groups {
            let mut family: Option<WideTable> = None;
            for sub in group {
                let part = self.fetch_chunked(prepared, sub)?;
                match family.as_mut() {
                    Some(t) => t.append(part),
                    None => family = Some(part),
                }
            }
            let Some(family) = family else { continue };
            match merged.as_mut() {
                Some(t) => t.merge_outer(family),
                None => merged = Some(family),
            }
        }
        let mut merged = merged.unwrap_or_default();
        if plan.is_multi_family() {
            merged.sort_by_geoid();
        }
        Ok(merged)
    }

    fn fetch_chunked(&self, prepared: &Prepared, sub: &SubRequest) -> Result<WideTable> {
        let target = CallTarget {
            base_url: &self.base_url,
            geography: &prepared.geography,
            year: prepared.year,
            survey: prepared.survey,
            key: &prepared.key,
            selectors: &sub.selectors,
        };
        let chunks: Vec<&[String]> = sub.codes.chunks(MAX_VARIABLES_PER_CALL).collect();
        let mut result: Option<WideTable> = None;
        for (i, chunk) in chunks.iter().enumerate() {
            debug!("Fetching variable chunk {} of {}", i + 1, chunks.len());
            let tokens = expand_tokens(chunk.iter().map(String::as_str));
            let call = build_call(&target, &tokens);
            let table = self.execute(&call, prepared.show_call)?;
            match result.as_mut() {
                Some(t) => t.merge_outer(table),
                None => result = Some(table),
            }
        }
        Ok(result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WideRow;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn one_row(columns: &[&str], values: &[Option<f64>]) -> WideTable {
        WideTable {
            columns: strings(columns),
            rows: vec![WideRow {
                geoid: "0100000US".into(),
                name: "United States".into(),
                values: values.to_vec(),
            }],
        }
    }

    #[test]
    fn sentinels_become_missing() {
        let mut t = one_row(
            &["B01001_001E", "B01001_001M", "B19013_001E"],
            &[Some(-666666666.0), Some(5.0), Some(-999999999.0)],
        );
        replace_missing(&mut t);
        assert_eq!(t.rows[0].values, vec![None, Some(5.0), None]);
    }

    #[test]
    fn ordinary_negatives_survive() {
        let mut t = one_row(&["B01001_001E"], &[Some(-1.0)]);
        replace_missing(&mut t);
        assert_eq!(t.rows[0].values, vec![Some(-1.0)]);
    }

    #[test]
    fn tidy_splits_estimate_and_moe() {
        let t = one_row(&["B01001_001E", "B01001_001M"], &[Some(100.0), Some(5.0)]);
        let rows = to_tidy(&t, &VariableSet::from_codes(["B01001_001"]), MoeLevel::Ninety);
        assert_eq!(
            rows,
            vec![TidyRow {
                geoid: "0100000US".into(),
                name: "United States".into(),
                variable: "B01001_001".into(),
                estimate: Some(100.0),
                moe: Some(5.0),
            }]
        );
    }

    #[test]
    fn tidy_scales_moe_and_uses_aliases() {
        let t = one_row(
            &["B01001_001E", "B01001_001M", "B00001_001E"],
            &[Some(100.0), Some(10.0), Some(7.0)],
        );
        let vars = VariableSet::with_aliases([("pop", "B01001_001"), ("sample", "B00001_001")]);
        let rows = to_tidy(&t, &vars, MoeLevel::NinetyFive);
        assert_eq!(rows[0].variable, "pop");
        assert!((rows[0].moe.unwrap() - 10.0 * 1.96 / 1.645).abs() < 1e-9);
        assert_eq!(rows[1].variable, "sample");
        assert_eq!(rows[1].estimate, Some(7.0));
        assert_eq!(rows[1].moe, None);
    }

    #[test]
    fn tidy_rows_sort_by_geoid_then_variable() {
        let row = |geoid: &str, values: Vec<Option<f64>>| WideRow {
            geoid: geoid.into(),
            name: String::new(),
            values,
        };
        let t = WideTable {
            columns: strings(&["B19013_001E", "B19013_001M", "B01001_001E", "B01001_001M"]),
            rows: vec![
                row("06003", vec![Some(1.0), None, Some(2.0), None]),
                row("06001", vec![Some(3.0), None, Some(4.0), None]),
            ],
        };
        let vars = VariableSet::from_codes(["B19013_001", "B01001_001"]);
        let got: Vec<(String, String)> = to_tidy(&t, &vars, MoeLevel::Ninety)
            .into_iter()
            .map(|r| (r.geoid, r.variable))
            .collect();
        let want: Vec<(String, String)> = [
            ("06001", "B01001_001"),
            ("06001", "B19013_001"),
            ("06003", "B01001_001"),
            ("06003", "B19013_001"),
        ]
        .iter()
        .map(|(g, v)| (g.to_string(), v.to_string()))
        .collect();
        assert_eq!(got, want);
    }

    #[test]
    fn wide_scales_and_renames() {
        let t = one_row(&["B01001_001E", "B01001_001M"], &[Some(100.0), Some(10.0)]);
        let vars = VariableSet::with_aliases([("pop", "B01001_001")]);
        let w = to_wide(t, &vars, MoeLevel::NinetyNine);
        assert_eq!(w.columns, vec!["popE", "popM"]);
        assert_eq!(w.rows[0].values[0], Some(100.0));
        assert!((w.rows[0].values[1].unwrap() - 15.562).abs() < 1e-3);
    }

    #[test]
    fn wide_at_ninety_is_untouched() {
        let t = one_row(&["B01001_001E", "B01001_001M"], &[Some(100.0), Some(10.0)]);
        let w = to_wide(t.clone(), &VariableSet::from_codes(["B01001_001"]), MoeLevel::Ninety);
        assert_eq!(w, t);
    }

    #[test]
    fn year_limits_per_survey() {
        assert!(check_survey(Survey::Acs5, 2008, false).unwrap_err().is_validation());
        assert_eq!(check_survey(Survey::Acs5, 2009, false).unwrap(), Survey::Acs5);
        assert!(check_survey(Survey::Acs1, 2004, false).is_err());
        assert_eq!(check_survey(Survey::Acs1, 2005, false).unwrap(), Survey::Acs1);
        assert_eq!(check_survey(Survey::Acs5, 2019, true).unwrap(), Survey::Acsse);
    }

    #[test]
    fn families_are_grouped_in_fixed_order() {
        let codes = strings(&["S1701_C03_002", "B05002_013", "DP05_0001", "C17002_001"]);
        let groups = partition_families(&codes).unwrap();
        assert_eq!(
            groups,
            vec![
                strings(&["B05002_013", "C17002_001"]),
                strings(&["S1701_C03_002"]),
                strings(&["DP05_0001"]),
            ]
        );
    }

    #[test]
    fn b_and_c_stay_together() {
        let codes = strings(&["B01001_001", "C17002_001"]);
        assert_eq!(partition_families(&codes).unwrap().len(), 1);
    }

    #[test]
    fn supplemental_cannot_mix() {
        let codes = strings(&["K200101_001", "B01001_001"]);
        assert!(partition_families(&codes).unwrap_err().is_validation());
    }

    #[test]
    fn tracts_fan_out_by_state() {
        let sel = ResolvedSelectors {
            state: strings(&["06", "36"]),
            ..Default::default()
        };
        let p = plan(TRACT, 2019, &strings(&["B01001_001"]), &sel).unwrap();
        assert_eq!(p.request_count(), 2);
        assert_eq!(p.groups[0][1].selectors.state, strings(&["36"]));
        assert!(!p.is_multi_family());
    }

    #[test]
    fn old_block_groups_fan_out_by_county() {
        let sel = ResolvedSelectors {
            state: strings(&["06"]),
            county: strings(&["001", "003"]),
            ..Default::default()
        };
        assert_eq!(partition_geography(BLOCK_GROUP, 2012, &sel).len(), 2);
        assert_eq!(partition_geography(BLOCK_GROUP, 2013, &sel).len(), 1);
    }

    #[test]
    fn key_resolution() {
        assert_eq!(resolve_api_key(Some("abc"), Some("env".into())).unwrap(), "abc");
        assert_eq!(resolve_api_key(None, Some("env".into())).unwrap(), "env");
        assert!(matches!(
            resolve_api_key(None, None),
            Err(AcsError::Configuration(_))
        ));
        assert!(resolve_api_key(Some("  "), None).is_err());
    }

    #[test]
    fn table_datasets() {
        assert_eq!(table_dataset("S1701", Survey::Acs5), "acs5/subject");
        assert_eq!(table_dataset("DP02", Survey::Acs1), "acs1/profile");
        assert_eq!(table_dataset("K200101", Survey::Acs1), "acsse");
        assert_eq!(table_dataset("B01001", Survey::Acs5), "acs5");
    }
}
