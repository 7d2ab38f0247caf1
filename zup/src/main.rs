//! Self-healing local setup runner.
//!
//! Runs the steps in `zup.yaml`, asking a language model for a fix whenever a
//! step fails and applying it after confirmation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use zup::exit_codes;
use zup::heal::{HealPolicy, Healer};
use zup::io::advisor::OpenAiAdvisor;
use zup::io::config::{AdvisorConfig, DEFAULT_CONFIG_PATH, load_config};
use zup::io::confirm::StdinConfirmer;
use zup::io::console::ConsoleReporter;
use zup::io::init::{InitOptions, init_project};
use zup::io::locate::SearchPath;
use zup::io::mode::ExecutionModes;
use zup::io::process::ShellExecutor;
use zup::io::steps::{DEFAULT_SETUP_PATH, load_setup};
use zup::logging;
use zup::setup::run_setup;

#[derive(Parser)]
#[command(
    name = "zup",
    version,
    about = "Automates local repo setup, fixing failed steps with AI"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every step in the setup file, healing failures.
    Run {
        /// Step file to run.
        #[arg(short, long, default_value = DEFAULT_SETUP_PATH)]
        file: PathBuf,
        /// Tool configuration.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Parse and check the setup file without running anything.
    Validate {
        #[arg(short, long, default_value = DEFAULT_SETUP_PATH)]
        file: PathBuf,
    },
    /// Write a sample `zup.yaml` and default `.zup/config.toml` if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { file, config } => cmd_run(&file, &config),
        Command::Validate { file } => cmd_validate(&file),
        Command::Init { force } => cmd_init(force),
    }
}

fn cmd_run(file: &Path, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    let setup = load_setup(file)?;

    let api_key = resolve_api_key(&config.advisor);
    let advisor = OpenAiAdvisor::new(config.advisor.clone(), api_key)?;
    let executor = ShellExecutor::new(config.execution.shell.clone());
    let locator = SearchPath::from_env();
    let confirmer = StdinConfirmer;
    let healer = Healer::new(
        ExecutionModes::new(&executor, &locator, config.execution.background_log.clone()),
        &advisor,
        &confirmer,
        HealPolicy::from_config(&config.execution),
    );

    let reporter = ConsoleReporter;
    let summary = run_setup(&healer, &setup.setup, |event| reporter.report(event));
    reporter.summary(&summary);

    if summary.failed() == 0 {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::STEPS_FAILED)
    }
}

fn cmd_validate(file: &Path) -> Result<i32> {
    let setup = load_setup(file)?;
    println!("{}: {} steps", file.display(), setup.setup.len());
    Ok(exit_codes::OK)
}

fn cmd_init(force: bool) -> Result<i32> {
    let report = init_project(Path::new("."), &InitOptions { force })?;
    for path in &report.written {
        println!("wrote {}", path.display());
    }
    if report.written.is_empty() {
        println!("nothing to do (use --force to overwrite)");
    }
    Ok(exit_codes::OK)
}

/// Configured key first, then the environment variable it names.
fn resolve_api_key(config: &AdvisorConfig) -> Option<String> {
    if let Some(key) = config.api_key.as_ref().filter(|key| !key.trim().is_empty()) {
        debug!("using api key from config");
        return Some(key.clone());
    }
    std::env::var(&config.api_key_env).ok()
}
