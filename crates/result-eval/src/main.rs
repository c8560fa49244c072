//! result-eval CLI - Extract and evaluate results from test output.

mod logging;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table};
use result_eval_core::{
    ReportFormat, Reporter, ReporterConfig, Results, RunReport, RunSummary,
    TestContext, TestInput, TestOutcome, ValidatedConfig, Value, builtin_parsers, load_config,
    process_all,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::debug;

/// Exit codes for the CLI.
mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const PROCESSING_FAILED: u8 = 1;
    pub const CONFIG_ERROR: u8 = 2;
}

#[derive(Parser)]
#[command(name = "result-eval")]
#[command(about = "Extract and evaluate results from test output")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a results config without processing any output
    Check {
        /// Results config file (YAML)
        #[arg(long)]
        config: PathBuf,
    },
    /// Extract and evaluate results for one or more test outputs
    Run {
        /// Results config file (YAML)
        #[arg(long)]
        config: PathBuf,

        /// Value of `return_value` for every test
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        return_value: i64,

        /// Extra base key, e.g. `--base sys_name=cluster1` (value parsed as JSON if possible)
        #[arg(long = "base", value_name = "KEY=VALUE", value_parser = parse_base)]
        base: Vec<(String, Value)>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Test output files; each file is one test named after its file stem
        #[arg(value_name = "OUTPUT", required = true)]
        outputs: Vec<PathBuf>,
    },
    /// List available result parsers and their config fields
    Parsers,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, !cli.no_color);

    let reporter = Reporter::new(ReporterConfig {
        verbose: cli.verbose,
        color: !cli.no_color,
    });

    match &cli.command {
        Command::Check { config } => check_command(&reporter, config),
        Command::Run {
            config,
            return_value,
            base,
            format,
            outputs,
        } => run_command(
            &reporter,
            &RunArgs {
                config,
                return_value: *return_value,
                base,
                format,
                outputs,
            },
        ),
        Command::Parsers => parsers_command(),
    }
}

/// Parse a `KEY=VALUE` base key argument.
fn parse_base(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{arg}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{arg}'"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw));
    Ok((key.to_string(), value))
}

fn load_validated(reporter: &Reporter, path: &Path) -> Result<ValidatedConfig, ExitCode> {
    load_config(path)
        .and_then(|config| config.validate())
        .map_err(|e| {
            reporter.error(&format!("{}: {e}", path.display()));
            ExitCode::from(exit_code::CONFIG_ERROR)
        })
}

fn check_command(reporter: &Reporter, path: &Path) -> ExitCode {
    match load_validated(reporter, path) {
        Ok(config) => {
            if config.matchers.is_empty() && config.evaluations.is_empty() {
                reporter.warn("config declares no result parsers or evaluations");
            }
            println!(
                "ok: {} result parsers, {} evaluations",
                config.matchers.len(),
                config.evaluations.len()
            );
            ExitCode::from(exit_code::SUCCESS)
        }
        Err(code) => code,
    }
}

struct RunArgs<'a> {
    config: &'a Path,
    return_value: i64,
    base: &'a [(String, Value)],
    format: &'a str,
    outputs: &'a [PathBuf],
}

fn test_inputs(args: &RunArgs<'_>) -> Vec<TestInput> {
    args.outputs
        .iter()
        .map(|output| {
            let name = output.file_stem().map_or_else(
                || output.display().to_string(),
                |s| s.to_string_lossy().into_owned(),
            );

            let mut base = Results::new();
            base.insert("name", name.as_str());
            base.insert("return_value", args.return_value);
            for (key, value) in args.base {
                base.insert(key.as_str(), value.clone());
            }

            TestInput {
                ctx: TestContext::new(&name),
                base,
                output: output.clone(),
            }
        })
        .collect()
}

fn run_command(reporter: &Reporter, args: &RunArgs<'_>) -> ExitCode {
    let report_format: ReportFormat = match args.format.parse() {
        Ok(f) => f,
        Err(e) => {
            reporter.error(&format!("Invalid format: {e}"));
            return ExitCode::from(exit_code::CONFIG_ERROR);
        }
    };

    let config = match load_validated(reporter, args.config) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let tests = test_inputs(args);
    debug!(
        config = %args.config.display(),
        tests = tests.len(),
        matchers = config.matchers.len(),
        evaluations = config.evaluations.len(),
        "processing run"
    );
    let start_time = Instant::now();
    let outcomes = process_all(&config, &tests);
    let summary = RunSummary::from_outcomes(&outcomes);

    match report_format {
        ReportFormat::Table => {
            reporter.run_start(outcomes.len());
            for outcome in &outcomes {
                reporter.test_result(outcome);
            }
            println!();
            print_results_table(&outcomes);
            reporter.failures(&outcomes);
            reporter.summary(&summary, start_time.elapsed());
            reporter.flush();
        }
        ReportFormat::Json => {
            let report = RunReport::new(&timestamp(), &outcomes);
            println!("{}", format_results_json(&report));
        }
    }

    if summary.failed == 0 {
        ExitCode::from(exit_code::SUCCESS)
    } else {
        ExitCode::from(exit_code::PROCESSING_FAILED)
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn format_results_json(report: &RunReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

fn value_cell(key: &str, value: &Value) -> Cell {
    match (key, value) {
        ("result", Value::Bool(true)) => Cell::new("true").fg(Color::Green),
        ("result", Value::Bool(false)) => Cell::new("false").fg(Color::Red),
        (_, Value::Null) => Cell::new("null").fg(Color::DarkGrey),
        _ => Cell::new(value),
    }
}

fn print_results_table(outcomes: &[TestOutcome]) {
    let mut table = Table::new();
    table.set_header(vec!["Test", "Key", "Value"]);

    for outcome in outcomes {
        match &outcome.result {
            Ok(results) => {
                for (key, value) in results.iter() {
                    table.add_row(vec![
                        Cell::new(&outcome.ctx),
                        Cell::new(key),
                        value_cell(key, value),
                    ]);
                }
            }
            Err(_) => {
                table.add_row(vec![
                    Cell::new(&outcome.ctx),
                    Cell::new("-"),
                    Cell::new("error").fg(Color::Red),
                ]);
            }
        }
    }

    println!("{table}");
}

fn parsers_command() -> ExitCode {
    for parser in builtin_parsers() {
        println!("{}: {}", parser.name(), parser.help());

        let mut table = Table::new();
        table.set_header(vec!["Field", "Required", "Description"]);
        for field in parser.config_fields() {
            table.add_row(vec![
                Cell::new(field.name),
                Cell::new(if field.required { "yes" } else { "no" }),
                Cell::new(field.help),
            ]);
        }
        println!("{table}");
    }
    ExitCode::from(exit_code::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_base() -> TestResult {
        assert_eq!(parse_base("n=3")?, ("n".to_string(), Value::Int(3)));
        assert_eq!(
            parse_base("sys_name=cluster1")?,
            ("sys_name".to_string(), Value::from("cluster1"))
        );
        assert_eq!(
            parse_base("tags=[\"a\",\"b\"]")?,
            ("tags".to_string(), Value::from(vec!["a", "b"]))
        );
        assert_eq!(parse_base("eq=a=b")?, ("eq".to_string(), Value::from("a=b")));
        assert!(parse_base("novalue").is_err());
        assert!(parse_base("=1").is_err());
        Ok(())
    }

    #[test]
    fn test_test_inputs_base_keys() {
        let outputs = vec![PathBuf::from("/tmp/run-1.out")];
        let base = vec![("sys_name".to_string(), Value::from("c1"))];
        let args = RunArgs {
            config: Path::new("results.yaml"),
            return_value: 2,
            base: &base,
            format: "table",
            outputs: &outputs,
        };
        let inputs = test_inputs(&args);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].ctx.name, "run-1");
        assert_eq!(inputs[0].base.get("name"), Some(&Value::from("run-1")));
        assert_eq!(inputs[0].base.get("return_value"), Some(&Value::Int(2)));
        assert_eq!(inputs[0].base.get("sys_name"), Some(&Value::from("c1")));
    }
}
