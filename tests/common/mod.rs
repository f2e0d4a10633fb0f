#![allow(dead_code)]

use acs_rs::Result;
use acs_rs::api::{HttpResponse, Transport};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&str) -> HttpResponse + Send + Sync>;

/// Transport that records every URL and answers from a closure.
pub struct MockTransport {
    calls: Mutex<Vec<String>>,
    respond: Responder,
}

impl MockTransport {
    pub fn new(respond: impl Fn(&str) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls against the data endpoint (not table metadata).
    pub fn data_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|u| !u.contains("/groups/"))
            .collect()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok((self.respond)(url))
    }
}

/// Raw (still encoded) value of a query parameter.
pub fn param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

pub fn ok(body: Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: body.to_string(),
    }
}

/// Answer like the API would for counties: one row per `(state, county,
/// name)` matching the `in` clause, every requested column filled with
/// `row * 1000 + column`.
/// `B19013_001E` in the first row carries a suppression sentinel.
pub fn county_responder(
    areas: &'static [(&'static str, &'static str, &'static str)],
) -> impl Fn(&str) -> HttpResponse + Send + Sync + 'static {
    move |url: &str| {
        let get = param(url, "get").unwrap_or_default();
        let cols: Vec<&str> = get.split(',').collect();
        let state_filter = param(url, "in")
            .or_else(|| param(url, "for"))
            .and_then(|v| v.strip_prefix("state:"))
            .map(|v| v.split(['+', ',']).next().unwrap_or_default().to_string());
        let county_filter: Option<Vec<String>> = param(url, "in")
            .and_then(|v| v.split_once("+county:"))
            .map(|(_, c)| c)
            .filter(|c| *c != "*")
            .map(|c| c.split(',').map(str::to_string).collect());

        let mut header: Vec<Value> = cols.iter().map(|c| json!(c)).collect();
        header.push(json!("state"));
        header.push(json!("county"));
        let mut rows = vec![Value::Array(header)];

        for (i, (st, co, name)) in areas.iter().enumerate() {
            if state_filter.as_deref().is_some_and(|f| f != *st) {
                continue;
            }
            if county_filter
                .as_ref()
                .is_some_and(|f| !f.iter().any(|c| c.as_str() == *co))
            {
                continue;
            }
            let mut row: Vec<Value> = cols
                .iter()
                .enumerate()
                .map(|(j, c)| match *c {
                    "NAME" => json!(name),
                    "B19013_001E" if i == 0 => json!("-666666666"),
                    _ => json!(((i + 1) * 1000 + j).to_string()),
                })
                .collect();
            row.push(json!(st));
            row.push(json!(co));
            rows.push(Value::Array(row));
        }
        ok(Value::Array(rows))
    }
}

pub const CA_COUNTIES: &[(&str, &str, &str)] = &[
    ("06", "001", "Alameda County, California"),
    ("06", "003", "Alpine County, California"),
];

pub const TWO_STATES: &[(&str, &str, &str)] = &[
    ("36", "061", "New York County, New York"),
    ("06", "001", "Alameda County, California"),
];
