use std::env;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

const FIXTURES: &str = "crates/result-eval/tests/fixtures";

#[derive(Parser)]
#[command(name = "xtask", about = "Build tasks for result-eval")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cargo fmt --check
    Fmt,
    /// Run cargo check
    Check,
    /// Run cargo clippy
    Clippy,
    /// Run cargo test
    Test,
    /// Run all CI checks (fmt, check, clippy, test, smoke)
    Ci,
    /// Run the release binary against the test fixtures
    Smoke {
        /// Arguments to pass to `result-eval run` instead of the defaults
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Build release and install to ~/.local/bin/
    Install,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {e:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Fmt => cmd_fmt(),
        Commands::Check => cmd_check(),
        Commands::Clippy => cmd_clippy(),
        Commands::Test => cmd_test(),
        Commands::Ci => cmd_ci(),
        Commands::Smoke { args } => cmd_smoke(&args),
        Commands::Install => cmd_install(),
    }
}

fn cmd_fmt() -> Result<()> {
    cargo(&["fmt", "--all", "--check"])
}

fn cmd_check() -> Result<()> {
    cargo(&["check", "--workspace", "--all-targets"])
}

fn cmd_clippy() -> Result<()> {
    cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
}

fn cmd_test() -> Result<()> {
    cargo(&["test", "--workspace"])
}

fn cmd_ci() -> Result<()> {
    cmd_fmt()?;
    cmd_check()?;
    cmd_clippy()?;
    cmd_test()?;
    cmd_smoke(&[])?;
    Ok(())
}

fn cmd_smoke(args: &[String]) -> Result<()> {
    let config = format!("{FIXTURES}/results.yaml");
    cargo(&[
        "run", "-p", "result-eval", "--release", "--",
        "check", "--config", &config,
    ])?;

    if args.is_empty() {
        let fast = format!("{FIXTURES}/fast.out");
        let slow = format!("{FIXTURES}/slow.out");
        cargo(&[
            "run", "-p", "result-eval", "--release", "--",
            "run", "--config", &config, &fast, &slow,
        ])
    } else {
        let mut cmd_args = vec!["run", "-p", "result-eval", "--release", "--", "run"];
        cmd_args.extend(args.iter().map(String::as_str));
        cargo(&cmd_args)
    }
}

fn cmd_install() -> Result<()> {
    cargo(&["build", "--release", "-p", "result-eval"])?;

    let home = env::var_os("HOME").context("HOME environment variable not set")?;
    let bin_dir = PathBuf::from(home).join(".local/bin");

    std::fs::create_dir_all(&bin_dir)
        .with_context(|| format!("Failed to create directory: {}", bin_dir.display()))?;

    let src = PathBuf::from("target/release/result-eval");
    let dst = bin_dir.join("result-eval");
    std::fs::copy(&src, &dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    println!("Installed: {}", dst.display());

    Ok(())
}

fn cargo(args: &[&str]) -> Result<()> {
    exec("cargo", args)
}

fn exec(program: &str, args: &[&str]) -> Result<()> {
    let cmd_line = format!("{program} {}", args.join(" "));
    eprintln!("$ {cmd_line}");

    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to execute: {cmd_line}"))?;

    if !status.success() {
        let code_info = match status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        };
        bail!("{cmd_line}: {code_info}");
    }
    Ok(())
}
