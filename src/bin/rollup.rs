//! kpi-rollup: run one compliance roll-up pass over a snapshot file.
//!
//! Reads a JSON snapshot (dashboards, users, viewer, year, mode, optional
//! `now`), resolves the director hierarchy, builds aggregate dashboards, and
//! prints the enriched dashboard list with scores as JSON on stdout.
//!
//! Usage: `kpi-rollup <snapshot.json> [--config <path>] [--now YYYY-MM-DD] [--strict] [--pretty]`
//!
//! Logging goes to stderr via `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use kpi_rollup_lib::compliance::parse_date;
use kpi_rollup_lib::config::{load_config, load_config_from, EngineConfig};
use kpi_rollup_lib::error::EngineError;
use kpi_rollup_lib::pipeline::{run_rollup, Snapshot};

const USAGE: &str =
    "Usage: kpi-rollup <snapshot.json> [--config <path>] [--now YYYY-MM-DD] [--strict] [--pretty]";

#[derive(Debug, Default)]
struct Args {
    snapshot: PathBuf,
    config: Option<PathBuf>,
    now: Option<String>,
    strict: bool,
    pretty: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut snapshot = None;
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--now" => {
                args.now = Some(iter.next().ok_or("--now needs a date")?);
            }
            "--strict" => args.strict = true,
            "--pretty" => args.pretty = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => return Err(format!("Unknown flag: {}", other)),
            other => snapshot = Some(PathBuf::from(other)),
        }
    }

    args.snapshot = snapshot.ok_or_else(|| USAGE.to_string())?;
    Ok(args)
}

fn run(args: &Args) -> Result<String, EngineError> {
    let config: EngineConfig = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    let content = std::fs::read_to_string(&args.snapshot)?;
    let mut snapshot: Snapshot = serde_json::from_str(&content)?;
    if let Some(raw) = &args.now {
        snapshot.now = Some(parse_date(raw)?);
    }
    if args.strict {
        snapshot.validate()?;
    }

    // Captured once; every cut-off in the pass derives from it.
    let now = chrono::Local::now().date_naive();
    let output = run_rollup(&snapshot, &config, now);

    let json = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    Ok(json)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
