use acs_rs::retry::with_retries;
use acs_rs::{AcsQuery, Client, OutputMode, ReferenceData, Selectors, Survey, VariableSet, storage};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "acs",
    version,
    about = "Fetch American Community Survey tables from the Census API"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch data and write it as CSV or JSON.
    Get(GetArgs),
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SurveyArg {
    Acs1,
    Acs5,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    Tidy,
    Wide,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// Geography level (state, county, tract, block group, place, cbsa, zcta, ...)
    #[arg(short, long)]
    geography: String,
    /// Variable codes separated by comma or semicolon (e.g., B19013_001,B01001_001)
    #[arg(short, long)]
    variables: Option<String>,
    /// Variable with a friendly name, as name=CODE. Repeatable.
    #[arg(long = "alias")]
    aliases: Vec<String>,
    /// Table code whose variables should all be fetched (e.g., B01001)
    #[arg(short, long)]
    table: Option<String>,
    /// Survey year (end year for 5-year data)
    #[arg(short, long, default_value_t = 2019)]
    year: i32,
    #[arg(long, value_enum, default_value = "acs5")]
    survey: SurveyArg,
    /// Table layout.
    #[arg(long, value_enum, default_value = "tidy")]
    output: LayoutArg,
    /// Confidence level for margins of error (90, 95 or 99).
    #[arg(long, default_value_t = 90)]
    moe_level: u32,
    /// States as FIPS, abbreviation or name; comma separated.
    #[arg(long)]
    state: Option<String>,
    /// Counties as FIPS or name prefix; comma separated.
    #[arg(long)]
    county: Option<String>,
    #[arg(long)]
    zcta: Option<String>,
    #[arg(long)]
    place: Option<String>,
    #[arg(long)]
    cbsa: Option<String>,
    /// Census API key. Defaults to $CENSUS_API_KEY.
    #[arg(long)]
    key: Option<String>,
    /// Log each API call (key redacted).
    #[arg(long, default_value_t = false)]
    show_call: bool,
    /// Print informational messages.
    #[arg(long, default_value_t = false)]
    verbose: bool,
    /// Retry the whole request this many extra times on network/server errors.
    #[arg(long, default_value_t = 0)]
    retries: u32,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// FIPS state table CSV (fips,abb,name). Requires --county-table.
    #[arg(long, requires = "county_table")]
    state_table: Option<PathBuf>,
    /// FIPS county table CSV (state_code,county_code,county,state_name). Requires --state-table.
    #[arg(long, requires = "state_table")]
    county_table: Option<PathBuf>,
    /// Save results to file instead of printing CSV to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

fn parse_list(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split([',', ';'])
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn parse_alias(s: &str) -> Result<(String, String)> {
    let (name, code) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid --alias '{s}', expected name=CODE"))?;
    Ok((name.trim().to_string(), code.trim().to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Get(args) => cmd_get(args),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn build_query(args: &GetArgs) -> Result<AcsQuery> {
    let mut variables = VariableSet::from_codes(parse_list(args.variables.as_deref()));
    for a in &args.aliases {
        let (name, code) = parse_alias(a)?;
        variables.push(code, Some(name));
    }

    let mut query = AcsQuery::new(args.geography.clone())
        .variable_set(variables)
        .year(args.year)
        .survey(match args.survey {
            SurveyArg::Acs1 => Survey::Acs1,
            SurveyArg::Acs5 => Survey::Acs5,
        })
        .output(match args.output {
            LayoutArg::Tidy => OutputMode::Tidy,
            LayoutArg::Wide => OutputMode::Wide,
        })
        .moe_level(args.moe_level)
        .selectors(Selectors {
            state: parse_list(args.state.as_deref()),
            county: parse_list(args.county.as_deref()),
            zcta: parse_list(args.zcta.as_deref()),
            place: parse_list(args.place.as_deref()),
            cbsa: parse_list(args.cbsa.as_deref()),
        })
        .show_call(args.show_call);
    if let Some(t) = &args.table {
        query = query.table(t.clone());
    }
    if let Some(k) = &args.key {
        query = query.key(k.clone());
    }
    Ok(query)
}

fn cmd_get(args: GetArgs) -> Result<()> {
    init_logging(args.verbose);

    let mut client = Client::with_timeout(Duration::from_secs(args.timeout))?;
    if let (Some(states), Some(counties)) = (&args.state_table, &args.county_table) {
        let s = File::open(states).with_context(|| format!("open {}", states.display()))?;
        let c = File::open(counties).with_context(|| format!("open {}", counties.display()))?;
        client = client.with_reference_data(ReferenceData::from_readers(s, c)?);
    }

    let query = build_query(&args)?;
    let table = with_retries(args.retries + 1, || client.get_acs(&query))?;

    let fmt = match (&args.format, &args.out) {
        (Some(OutFormat::Csv), _) => "csv".to_string(),
        (Some(OutFormat::Json), _) => "json".to_string(),
        (None, Some(path)) => path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("csv")
            .to_ascii_lowercase(),
        (None, None) => "csv".to_string(),
    };

    match (&args.out, fmt.as_str()) {
        (Some(path), "csv") => storage::save_csv(&table, path)?,
        (Some(path), "json") => storage::save_json(&table, path)?,
        (None, "csv") => storage::write_csv(&table, std::io::stdout().lock())?,
        (None, "json") => storage::write_json(&table, std::io::stdout().lock())?,
        (_, other) => anyhow::bail!("unsupported format: {}", other),
    }
    if let Some(path) = &args.out {
        eprintln!("Saved {} rows to {}", table.len(), path.display());
    }

    Ok(())
}
