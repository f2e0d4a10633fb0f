//! acs_rs
//!
//! A lightweight Rust library for retrieving American Community Survey
//! tables from the Census Data API. Pairs with the `acs` CLI.
//!
//! ### Features
//! - Resolve state and county selectors given as FIPS codes, abbreviations or names
//! - Request estimates with their margins of error, split across as many calls as the API needs
//! - Translate the API's annotation sentinels into missing values
//! - Rescale margins of error to 90, 95 or 99% confidence
//! - Return tidy (one row per variable) or wide (one column per variable) tables
//! - Save as CSV or JSON
//!
//! ### Example
//! ```no_run
//! use acs_rs::{AcsQuery, Client, OutputMode};
//!
//! let client = Client::default();
//! let table = client.get_acs(
//!     &AcsQuery::new("county")
//!         .variables(["B19013_001", "B01001_001"])
//!         .state("CA")
//!         .year(2019)
//!         .output(OutputMode::Wide)
//!         .moe_level(95),
//! )?;
//! acs_rs::storage::save_csv(&table, "ca_counties.csv")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod assemble;
pub mod error;
pub mod geography;
pub mod models;
pub mod request;
pub mod retry;
pub mod storage;
pub mod variables;

pub use api::Client;
pub use assemble::AcsQuery;
pub use error::{AcsError, Result};
pub use geography::ReferenceData;
pub use models::{AcsTable, MoeLevel, OutputMode, Selectors, Survey, TidyRow, VariableSet, WideTable};
