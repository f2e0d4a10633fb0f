//! Synchronous client for the **Census Data API**, ACS endpoints.
//!
//! This module issues single calls and decodes their payloads into
//! [`WideTable`]s. The whole request pipeline (validation, chunking, fan-out,
//! reshaping) lives in [`crate::assemble`] and is reached through
//! [`Client::get_acs`].
//!
//! ### Notes
//! - The API answers with a JSON array of rows whose first row is the header.
//!   Every value arrives as text; variable columns are parsed as `f64`.
//! - A bad key is sometimes reported inside a 200 response, so the body is
//!   checked before decoding.
//! - Network timeouts default to 30s and can be changed with
//!   [`Client::with_timeout`].
//!
//! Typical usage:
//! ```no_run
//! # use acs_rs::{AcsQuery, Client};
//! let client = Client::default();
//! let table = client.get_acs(
//!     &AcsQuery::new("county")
//!         .variables(["B19013_001"])
//!         .state("CA")
//!         .year(2019),
//! )?;
//! # Ok::<(), acs_rs::AcsError>(())
//! ```
use crate::error::{AcsError, Result};
use crate::geography::ReferenceData;
use crate::models::{ApiCall, WideRow, WideTable};
use log::info;
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.census.gov/data";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Issues GET requests. Implemented over reqwest for real use; tests
/// substitute a canned implementation.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        (**self).get(url)
    }
}

/// Blocking reqwest transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout) // total request timeout
            .connect_timeout(Duration::from_secs(10)) // connect timeout
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("acs_rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT).expect("reqwest client build")
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let resp = self.http.get(url).send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Clone)]
pub struct Client {
    pub base_url: String,
    transport: Arc<dyn Transport>,
    reference: Arc<ReferenceData>,
}

impl Default for Client {
    fn default() -> Self {
        Self::with_transport(ReqwestTransport::default())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Body markers the API uses for known failures.
const UNAVAILABLE_MARKER: &str = "resource is not available";
const BAD_KEY_MARKER: &str = "You included a key with this request";

/// Turn a raw response into a table, given the columns that were requested.
pub fn decode_response(response: &HttpResponse, variables: &[String]) -> Result<WideTable> {
    if response.status != 200 {
        let message = if response.body.trim().is_empty() {
            format!("HTTP {}", response.status)
        } else {
            response.body.trim().to_string()
        };
        if message.contains(UNAVAILABLE_MARKER) {
            return Err(AcsError::UnavailableVariable { message });
        }
        return Err(AcsError::Api {
            status: Some(response.status),
            message,
        });
    }
    if response.body.contains(BAD_KEY_MARKER) {
        return Err(AcsError::InvalidApiKey);
    }
    decode_rows(&response.body, variables)
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cell_number(v: &Value, column: &str) -> Result<Option<f64>> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            AcsError::Decode(format!("non-numeric value '{s}' in column {column}"))
        }),
        other => Err(AcsError::Decode(format!(
            "unexpected value {other} in column {column}"
        ))),
    }
}

/// Decode the array-of-rows payload.
///
/// Columns other than the requested variables and `NAME` identify the
/// geography; their values are concatenated in returned order into `GEOID`.
pub fn decode_rows(body: &str, variables: &[String]) -> Result<WideTable> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)
        .map_err(|e| AcsError::Decode(format!("expected an array of rows: {e}")))?;
    let mut rows = rows.into_iter();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| AcsError::Decode("empty response".into()))?
        .iter()
        .map(cell_text)
        .collect();

    let position = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AcsError::Decode(format!("column {name} missing from response")))
    };
    let name_idx = position("NAME")?;
    let var_idx = variables
        .iter()
        .map(|v| position(v))
        .collect::<Result<Vec<_>>>()?;
    let id_idx: Vec<usize> = (0..header.len())
        .filter(|i| *i != name_idx && !var_idx.contains(i))
        .collect();

    let mut table = WideTable::new(variables.to_vec());
    for (n, row) in rows.enumerate() {
        if row.len() != header.len() {
            return Err(AcsError::Decode(format!(
                "row {} has {} cells, header has {}",
                n + 1,
                row.len(),
                header.len()
            )));
        }
        let geoid: String = id_idx.iter().map(|&i| cell_text(&row[i])).collect();
        let values = var_idx
            .iter()
            .zip(variables)
            .map(|(&i, col)| cell_number(&row[i], col))
            .collect::<Result<Vec<_>>>()?;
        table.rows.push(WideRow {
            geoid,
            name: cell_text(&row[name_idx]),
            values,
        });
    }
    Ok(table)
}

#[derive(Debug, Deserialize)]
struct GroupDoc {
    variables: HashMap<String, Value>,
}

impl Client {
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            transport: Arc::new(transport),
            reference: ReferenceData::bundled_shared(),
        }
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new(timeout)?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the bundled FIPS tables.
    pub fn with_reference_data(mut self, reference: ReferenceData) -> Self {
        self.reference = Arc::new(reference);
        self
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Issue one call and decode the result. The requested variables are
    /// taken from the call's `get` parameter.
    ///
    /// ### Errors
    /// - [`AcsError::Transport`] for network failures and timeouts
    /// - [`AcsError::Api`], [`AcsError::UnavailableVariable`] or
    ///   [`AcsError::InvalidApiKey`] when the API rejects the call
    /// - [`AcsError::Decode`] when the body is not a table
    pub fn execute(&self, call: &ApiCall, show_call: bool) -> Result<WideTable> {
        if show_call {
            info!("Census API call: {}", call);
        }
        let variables: Vec<String> = call
            .get
            .split(',')
            .filter(|v| *v != "NAME")
            .map(str::to_string)
            .collect();
        let response = self.transport.get(&call.url())?;
        decode_response(&response, &variables)
    }

    /// Member variables of an ACS table, e.g. `B01001` -> `B01001_001`, ...
    ///
    /// ### Arguments
    /// - `table`: table code, any case (`"B01001"`, `"s1701"`).
    /// - `year`: survey year the table definition is read for.
    /// - `dataset`: the path below `acs/` (`"acs5"`, `"acs1/subject"`, `"acsse"`).
    ///
    /// ### Returns
    /// Base codes of the table's estimate variables, without the `E` suffix,
    /// sorted.
    ///
    /// ### Errors
    /// - [`AcsError::Api`] when the table metadata cannot be loaded
    /// - [`AcsError::Decode`] when the metadata is not the expected JSON
    /// - [`AcsError::Validation`] when the table has no estimate variables
    ///
    /// ### Example
    /// ```no_run
    /// # use acs_rs::Client;
    /// let codes = Client::default().variables_from_table("B01003", 2019, "acs5")?;
    /// assert_eq!(codes, vec!["B01003_001"]);
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn variables_from_table(&self, table: &str, year: i32, dataset: &str) -> Result<Vec<String>> {
        let table = table.trim().to_ascii_uppercase();
        let url = format!(
            "{}/{}/acs/{}/groups/{}.json",
            self.base_url.trim_end_matches('/'),
            year,
            dataset,
            table
        );
        let response = self.transport.get(&url)?;
        if response.status != 200 {
            return Err(AcsError::Api {
                status: Some(response.status),
                message: format!("could not load table {table}: {}", response.body.trim()),
            });
        }
        let doc: GroupDoc = serde_json::from_str(&response.body)
            .map_err(|e| AcsError::Decode(format!("table {table} metadata: {e}")))?;

        let prefix = format!("{table}_");
        let mut codes: Vec<String> = doc
            .variables
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .filter_map(|k| k.strip_suffix('E'))
            .map(str::to_string)
            .collect();
        codes.sort();
        if codes.is_empty() {
            return Err(AcsError::Validation(format!(
                "table {table} has no estimate variables in {year} {dataset}"
            )));
        }
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: body.into(),
        }
    }

    #[test]
    fn decode_builds_geoid_from_id_columns() {
        let body = r#"[["NAME","B01001_001E","B01001_001M","state","county"],
                       ["Alameda County, California","1656754","-555555555","06","001"],
                       ["Alpine County, California","1039","161","06","003"]]"#;
        let t = decode_response(&ok(body), &vars(&["B01001_001E", "B01001_001M"])).unwrap();
        assert_eq!(t.columns, vec!["B01001_001E", "B01001_001M"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].geoid, "06001");
        assert_eq!(t.rows[0].name, "Alameda County, California");
        assert_eq!(t.value("06003", "B01001_001E"), Some(1039.0));
        assert_eq!(t.value("06001", "B01001_001M"), Some(-555555555.0));
    }

    #[test]
    fn null_cells_are_missing() {
        let body = r#"[["B01001_001E","NAME","us"],[null,"United States","1"]]"#;
        let t = decode_response(&ok(body), &vars(&["B01001_001E"])).unwrap();
        assert_eq!(t.rows[0].values, vec![None]);
        assert_eq!(t.rows[0].geoid, "1");
    }

    #[test]
    fn non_numeric_variable_is_a_decode_error() {
        let body = r#"[["B01001_001E","NAME","us"],["abc","United States","1"]]"#;
        assert!(matches!(
            decode_response(&ok(body), &vars(&["B01001_001E"])),
            Err(AcsError::Decode(_))
        ));
    }

    #[test]
    fn unavailable_variable() {
        let resp = HttpResponse {
            status: 404,
            body: "error: The requested resource is not available.".into(),
        };
        let err = decode_response(&resp, &[]).unwrap_err();
        assert!(matches!(err, AcsError::UnavailableVariable { .. }));
        assert!(err.to_string().contains("requested resource is not available"));
    }

    #[test]
    fn other_errors_carry_message() {
        let resp = HttpResponse {
            status: 400,
            body: "error: unknown variable 'B99999_999E'".into(),
        };
        match decode_response(&resp, &[]).unwrap_err() {
            AcsError::Api { status, message } => {
                assert_eq!(status, Some(400));
                assert!(message.contains("B99999_999E"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_key_in_successful_response() {
        let resp = ok("<html>You included a key with this request, however, it is not valid.</html>");
        assert!(matches!(
            decode_response(&resp, &[]),
            Err(AcsError::InvalidApiKey)
        ));
    }

    #[test]
    fn missing_requested_column() {
        let body = r#"[["NAME","us"],["United States","1"]]"#;
        assert!(matches!(
            decode_rows(body, &vars(&["B01001_001E"])),
            Err(AcsError::Decode(_))
        ));
    }
}
