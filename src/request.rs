//! Turning a resolved query into the `get`/`for`/`in`/`key` parameters of
//! one API call.

use crate::geography::{BLOCK_GROUP, ResolvedSelectors, STATE};
use crate::models::{ApiCall, Survey};
use crate::variables::{is_profile, is_subject, is_supplemental};
use log::info;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

/// First vintage in which block groups can be requested for every county of
/// a state with `county:*`.
pub const BLOCK_GROUP_COUNTY_WILDCARD_YEAR: i32 = 2013;

// Keep the geography syntax readable in URLs.
const SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b':')
    .remove(b',')
    .remove(b'+')
    .remove(b'*');

fn enc(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, SAFE).to_string()
}

/// Build `endpoint?k=v&...` with percent-encoded values.
pub fn encode_url(endpoint: &str, pairs: &[(&str, &str)]) -> String {
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, enc(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{endpoint}?{query}")
}

/// Dataset path below `acs/` for the given column names.
pub fn dataset_for(survey: Survey, tokens: &[String]) -> String {
    if survey == Survey::Acsse || tokens.iter().any(|t| is_supplemental(t)) {
        return Survey::Acsse.as_str().to_string();
    }
    let mut path = survey.as_str().to_string();
    if tokens.iter().any(|t| is_profile(t)) {
        info!("Using the ACS Data Profile");
        path.push_str("/profile");
    } else if tokens.iter().any(|t| is_subject(t)) {
        info!("Using the ACS Subject Tables");
        path.push_str("/subject");
    }
    path
}

/// Everything needed for one call besides the variables.
#[derive(Debug, Clone)]
pub struct CallTarget<'a> {
    pub base_url: &'a str,
    pub geography: &'a str,
    pub year: i32,
    pub survey: Survey,
    pub key: &'a str,
    pub selectors: &'a ResolvedSelectors,
}

/// `for`/`in` clauses for a geography and its selectors.
///
/// Precedence: CBSA, then state (with county or place nested inside),
/// then ZCTA, then nationwide.
pub fn geography_clauses(
    geography: &str,
    year: i32,
    sel: &ResolvedSelectors,
) -> (String, Option<String>) {
    if !sel.cbsa.is_empty() {
        return (format!("{}:{}", geography, sel.cbsa.join(",")), None);
    }

    if !sel.state.is_empty() {
        let states = sel.state.join(",");
        if geography == STATE {
            return (format!("state:{states}"), None);
        }
        let wildcard = format!("{geography}:*");

        if !sel.county.is_empty() {
            let counties = sel.county.join(",");
            return if geography == "county" {
                (format!("county:{counties}"), Some(format!("state:{states}")))
            } else {
                (wildcard, Some(format!("state:{states}+county:{counties}")))
            };
        }

        if !sel.place.is_empty() {
            let places = sel.place.join(",");
            return if geography == "place" {
                (format!("place:{places}"), Some(format!("state:{states}")))
            } else {
                (wildcard, Some(format!("state:{states}+place:{places}")))
            };
        }

        if geography == BLOCK_GROUP && year >= BLOCK_GROUP_COUNTY_WILDCARD_YEAR {
            return (wildcard, Some(format!("state:{states}+county:*")));
        }
        return (wildcard, Some(format!("state:{states}")));
    }

    if !sel.zcta.is_empty() {
        return (format!("{}:{}", geography, sel.zcta.join(",")), None);
    }

    (format!("{geography}:*"), None)
}

/// Build the call for one chunk of already-expanded column names.
/// `NAME` is always appended to the requested columns.
pub fn build_call(target: &CallTarget<'_>, tokens: &[String]) -> ApiCall {
    let (for_clause, in_clause) =
        geography_clauses(target.geography, target.year, target.selectors);
    let mut get = tokens.join(",");
    get.push_str(",NAME");
    ApiCall {
        base_url: target.base_url.trim_end_matches('/').to_string(),
        year: target.year,
        dataset: dataset_for(target.survey, tokens),
        get,
        for_clause,
        in_clause,
        key: target.key.to_string(),
    }
}
