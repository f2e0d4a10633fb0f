use crate::models::{AcsTable, TidyRow, WideTable};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Prefix text that a spreadsheet would evaluate as a formula.
fn safe_cell(s: &str) -> String {
    match s.chars().next() {
        Some('=' | '+' | '-' | '@') => format!("'{s}"),
        _ => s.to_string(),
    }
}

fn num_cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn write_tidy_csv<W: Write>(rows: &[TidyRow], out: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(out);
    wtr.write_record(["GEOID", "NAME", "variable", "estimate", "moe"])?;
    for r in rows {
        wtr.write_record([
            safe_cell(&r.geoid),
            safe_cell(&r.name),
            safe_cell(&r.variable),
            num_cell(r.estimate),
            num_cell(r.moe),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_wide_csv<W: Write>(table: &WideTable, out: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(out);
    let header: Vec<String> = ["GEOID".to_string(), "NAME".to_string()]
        .into_iter()
        .chain(table.columns.iter().map(|c| safe_cell(c)))
        .collect();
    wtr.write_record(&header)?;
    for r in &table.rows {
        let record: Vec<String> = [safe_cell(&r.geoid), safe_cell(&r.name)]
            .into_iter()
            .chain(r.values.iter().map(|v| num_cell(*v)))
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a table as CSV with header. Missing values are empty cells.
pub fn write_csv<W: Write>(table: &AcsTable, out: W) -> Result<()> {
    match table {
        AcsTable::Tidy(rows) => write_tidy_csv(rows, out),
        AcsTable::Wide(t) => write_wide_csv(t, out),
    }
}

/// JSON records: one object per row, missing values as `null`.
pub fn to_json_value(table: &AcsTable) -> Result<Value> {
    match table {
        AcsTable::Tidy(rows) => Ok(serde_json::to_value(rows)?),
        AcsTable::Wide(t) => {
            let records = t
                .rows
                .iter()
                .map(|r| {
                    let mut obj = Map::new();
                    obj.insert("GEOID".into(), Value::from(r.geoid.clone()));
                    obj.insert("NAME".into(), Value::from(r.name.clone()));
                    for (c, v) in t.columns.iter().zip(&r.values) {
                        obj.insert(c.clone(), v.map(Value::from).unwrap_or(Value::Null));
                    }
                    Value::Object(obj)
                })
                .collect();
            Ok(Value::Array(records))
        }
    }
}

pub fn write_json<W: Write>(table: &AcsTable, mut out: W) -> Result<()> {
    let s = serde_json::to_string_pretty(&to_json_value(table)?)?;
    out.write_all(s.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Save a table as CSV.
pub fn save_csv<P: AsRef<Path>>(table: &AcsTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_csv(table, BufWriter::new(f))
}

/// Save a table as a pretty JSON array.
pub fn save_json<P: AsRef<Path>>(table: &AcsTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_json(table, BufWriter::new(f))
}
