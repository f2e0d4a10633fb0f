//! Geography names and state/county selector resolution.
//!
//! State and county selectors may be given as FIPS codes, postal
//! abbreviations or names. They are resolved against FIPS reference tables
//! that ship with the crate (see [`ReferenceData::bundled`]) or that the
//! caller loads from CSV.

use crate::error::{AcsError, Result};
use crate::models::Selectors;
use log::{info, warn};
use serde::Deserialize;
use std::io::Read;
use std::sync::{Arc, LazyLock};

pub const STATE: &str = "state";
pub const COUNTY: &str = "county";
pub const TRACT: &str = "tract";
pub const BLOCK_GROUP: &str = "block group";
pub const PLACE: &str = "place";
pub const ZCTA: &str = "zip code tabulation area";
pub const CBSA: &str = "metropolitan statistical area/micropolitan statistical area";
pub const PUMA: &str = "public use microdata area";

/// Geographies that can be filtered by a county selector.
const COUNTY_NESTED: &[&str] = &[COUNTY, "county subdivision", TRACT, BLOCK_GROUP];

const BUNDLED_STATES: &str = include_str!("../data/fips_state_table.csv");
const BUNDLED_COUNTIES: &str = include_str!("../data/fips_county_table.csv");

static BUNDLED: LazyLock<Arc<ReferenceData>> = LazyLock::new(|| {
    Arc::new(
        ReferenceData::from_readers(BUNDLED_STATES.as_bytes(), BUNDLED_COUNTIES.as_bytes())
            .expect("bundled FIPS tables are valid CSV"),
    )
});

/// Map short geography aliases to the names the API expects.
pub fn canonical_geography(geography: &str) -> String {
    match geography.trim() {
        "cbsa" => CBSA.to_string(),
        "cbg" => BLOCK_GROUP.to_string(),
        "zcta" => ZCTA.to_string(),
        "puma" => PUMA.to_string(),
        other => other.to_string(),
    }
}

/// Cross-field checks between the geography and the supplied selectors.
/// `geography` must already be canonical.
pub fn check_selectors(geography: &str, selectors: &Selectors) -> Result<()> {
    if geography == ZCTA && !selectors.county.is_empty() {
        return Err(AcsError::Validation(
            "ZCTAs are available by state, but not by county.".into(),
        ));
    }
    if !selectors.zcta.is_empty() && geography != ZCTA {
        return Err(AcsError::Validation(
            "ZCTAs can only be specified when requesting data at the zip code tabulation area-level."
                .into(),
        ));
    }
    if !selectors.county.is_empty() {
        if !COUNTY_NESTED.contains(&geography) {
            return Err(AcsError::Validation(format!(
                "a county selector cannot be combined with geography '{geography}'"
            )));
        }
        if selectors.state.is_empty() {
            return Err(AcsError::Validation(
                "a county selector requires a state selector".into(),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateRecord {
    pub fips: String,
    pub abb: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountyRecord {
    pub state_code: String,
    pub county_code: String,
    pub county: String,
    pub state_name: String,
}

/// State and county selectors after resolution to FIPS codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSelectors {
    pub state: Vec<String>,
    pub county: Vec<String>,
    pub place: Vec<String>,
    pub zcta: Vec<String>,
    pub cbsa: Vec<String>,
}

/// FIPS lookup tables.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    states: Vec<StateRecord>,
    counties: Vec<CountyRecord>,
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// True when `name[..at]` ends a word of `name`.
fn ends_on_word(name: &str, at: usize) -> bool {
    name[at..].chars().next().is_none_or(|c| c == ' ')
}

fn zero_pad(s: &str, width: usize) -> String {
    format!("{s:0>width$}")
}

fn invalid_state(input: &str) -> AcsError {
    AcsError::InvalidGeography(format!(
        "'{input}' is not a valid FIPS code or state name/abbreviation"
    ))
}

impl ReferenceData {
    /// Tables compiled into the crate: every state, DC and Puerto Rico with
    /// their counties and county equivalents, plus the island areas.
    pub fn bundled() -> &'static ReferenceData {
        BUNDLED.as_ref()
    }

    /// Shared handle to the bundled tables.
    pub fn bundled_shared() -> Arc<ReferenceData> {
        Arc::clone(&BUNDLED)
    }

    /// Load from CSV: states with `fips,abb,name`, counties with
    /// `state_code,county_code,county,state_name`.
    pub fn from_readers<S: Read, C: Read>(states: S, counties: C) -> Result<Self> {
        let parse_err = |what: &str, e: csv::Error| {
            AcsError::Configuration(format!("could not read {what} table: {e}"))
        };
        let states = csv::Reader::from_reader(states)
            .deserialize()
            .collect::<std::result::Result<Vec<StateRecord>, _>>()
            .map_err(|e| parse_err("FIPS state", e))?;
        let counties = csv::Reader::from_reader(counties)
            .deserialize()
            .collect::<std::result::Result<Vec<CountyRecord>, _>>()
            .map_err(|e| parse_err("FIPS county", e))?;
        Ok(Self { states, counties })
    }

    fn state_by_fips(&self, fips: &str) -> Option<&StateRecord> {
        self.states.iter().find(|s| s.fips == fips)
    }

    /// Resolve a state FIPS code, postal abbreviation or name to its
    /// two-digit FIPS code.
    ///
    /// Single-digit codes are zero padded. A longer numeric input that is not
    /// a state code (typically a county FIPS) falls back to its first two
    /// digits, with a warning.
    pub fn validate_state(&self, input: &str) -> Result<String> {
        let state = input.trim().to_lowercase();

        if all_digits(&state) {
            let code = zero_pad(&state, 2);
            if self.state_by_fips(&code).is_some() {
                return Ok(code);
            }
            let prefix = &code[..2];
            return match self.state_by_fips(prefix) {
                Some(rec) => {
                    warn!(
                        "Using first two digits of {code} - '{prefix}' ({}) - for FIPS code.",
                        rec.name
                    );
                    Ok(prefix.to_string())
                }
                None => Err(invalid_state(&state)),
            };
        }

        if state.chars().next().is_some_and(|c| c.is_alphabetic()) {
            let found = if state.chars().count() == 2 {
                self.states.iter().find(|s| s.abb.to_lowercase() == state)
            } else if state.chars().count() > 2 {
                self.states.iter().find(|s| s.name.to_lowercase() == state)
            } else {
                None
            };
            if let Some(rec) = found {
                info!("Using FIPS code '{}' for state '{}'", rec.fips, rec.name);
                return Ok(rec.fips.clone());
            }
        }

        Err(invalid_state(&state))
    }

    /// Resolve a county FIPS code or name prefix within `state`.
    ///
    /// Unknown numeric codes are passed through with a warning. Names are
    /// matched case-insensitively as prefixes and must identify exactly one
    /// county; among several matches, a single one where the input ends on a
    /// word boundary wins.
    pub fn validate_county(&self, state: &str, county: &str) -> Result<String> {
        let state = self.validate_state(state)?;
        let state_name = self
            .state_by_fips(&state)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| state.clone());
        let in_state: Vec<&CountyRecord> = self
            .counties
            .iter()
            .filter(|c| c.state_code == state)
            .collect();
        let county = county.trim();

        if all_digits(county) {
            let code = zero_pad(county, 3);
            if !in_state.iter().any(|c| c.county_code == code) {
                warn!("'{code}' is not a current FIPS code for counties in {state_name}");
            }
            return Ok(code);
        }

        if county.is_empty() {
            return Err(AcsError::InvalidGeography(format!(
                "empty county selector for {state_name}"
            )));
        }

        let needle = county.to_lowercase();
        let mut matches: Vec<&CountyRecord> = in_state
            .into_iter()
            .filter(|c| c.county.to_lowercase().starts_with(&needle))
            .collect();

        // "Harris" names Harris County, not Harrison County.
        if matches.len() > 1 {
            let whole_word: Vec<&CountyRecord> = matches
                .iter()
                .copied()
                .filter(|c| ends_on_word(&c.county.to_lowercase(), needle.len()))
                .collect();
            if let [only] = whole_word.as_slice() {
                matches = vec![*only];
            }
        }

        match matches.as_slice() {
            [] => Err(AcsError::InvalidGeography(format!(
                "'{county}' is not a valid name for counties in {state_name}"
            ))),
            [only] => {
                info!("Using FIPS code '{}' for '{}'", only.county_code, only.county);
                Ok(only.county_code.clone())
            }
            many => {
                let names: Vec<&str> = many.iter().map(|c| c.county.as_str()).collect();
                Err(AcsError::Validation(format!(
                    "Your county string matches: {names:?}. Please refine your selection."
                )))
            }
        }
    }

    /// Resolve every state and county selector. Counties are only
    /// meaningful within a single state.
    pub fn resolve(&self, selectors: &Selectors) -> Result<ResolvedSelectors> {
        let state = selectors
            .state
            .iter()
            .map(|s| self.validate_state(s))
            .collect::<Result<Vec<_>>>()?;

        let county = match (state.as_slice(), selectors.county.is_empty()) {
            (_, true) => Vec::new(),
            ([single], false) => selectors
                .county
                .iter()
                .map(|c| self.validate_county(single, c))
                .collect::<Result<Vec<_>>>()?,
            _ => {
                return Err(AcsError::Validation(
                    "county selectors can only be combined with a single state".into(),
                ));
            }
        };

        Ok(ResolvedSelectors {
            state,
            county,
            place: selectors.place.clone(),
            zcta: selectors.zcta.clone(),
            cbsa: selectors.cbsa.clone(),
        })
    }
}
