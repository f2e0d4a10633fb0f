//! Live API tests. Run with: `cargo test --features online -- --nocapture`
//! Needs `CENSUS_API_KEY` in the environment.
#![cfg(feature = "online")]

use acs_rs::{AcsError, AcsQuery, Client, OutputMode};

#[test]
fn fetch_county_income() {
    let cli = Client::default();
    let table = cli
        .get_acs(
            &AcsQuery::new("county")
                .variables(["B19013_001"])
                .state("DE")
                .year(2019),
        )
        .unwrap();
    let rows = table.as_tidy().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.geoid.starts_with("10")));
    assert!(rows.iter().all(|r| r.estimate.is_some()));
}

#[test]
fn fetch_mixed_tables_wide() {
    let cli = Client::default();
    let table = cli
        .get_acs(
            &AcsQuery::new("state")
                .variables(["B01001_001", "S1701_C03_001"])
                .state("RI")
                .output(OutputMode::Wide),
        )
        .unwrap();
    let wide = table.as_wide().unwrap();
    assert_eq!(wide.rows.len(), 1);
    assert!(wide.value("44", "B01001_001E").is_some());
}

#[test]
fn fetch_table_members() {
    let cli = Client::default();
    let codes = cli.variables_from_table("B01003", 2019, "acs5").unwrap();
    assert_eq!(codes, vec!["B01003_001".to_string()]);
}

#[test]
fn unknown_variable_surfaces_api_message() {
    let cli = Client::default();
    let err = cli
        .get_acs(&AcsQuery::new("state").variables(["B99999_999"]).state("RI"))
        .unwrap_err();
    assert!(err.is_api(), "{err}");
    assert!(!matches!(err, AcsError::InvalidApiKey));
}
