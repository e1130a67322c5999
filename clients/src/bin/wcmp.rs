//! `wcmp`: runs the WMO Core Metadata Profile conformance engine.
//!
//! **Usage:**
//! ```text
//! wcmp [--bundle <dir>] [--verbosity <level>] [--log <file>] <command>
//!
//! wcmp ets validate <FILE|->
//! wcmp kpi validate <FILE|-> [--fail-on-ets] [--kpi <ID>].. [--summary] [--group]
//! wcmp topics validate <TOPIC> [--fuzzy]
//! wcmp topics list [PREFIX]
//! wcmp bundle info
//! ```
//!
//! `ets validate` exits non-zero if any clause fails. Nothing is logged
//! unless `--verbosity`, `--log` or `RUST_LOG` is given.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wcmp_conformance::{Bundle, ClauseStatus, Engine, Error, KpiOptions, NormalizedDocument};

/// Validate and score WMO Core Metadata Profile records.
#[derive(Parser)]
#[command(
    name = "wcmp",
    about = "Validate and score WMO Core Metadata Profile records"
)]
struct Cli {
    /// Reference data bundle directory.
    #[arg(long, env = "WCMP_BUNDLE", default_value = "bundle", global = true)]
    bundle: PathBuf,

    /// Log level.
    #[arg(long, value_enum, global = true)]
    verbosity: Option<Verbosity>,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warn => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Executable test suite.
    Ets {
        #[command(subcommand)]
        action: EtsAction,
    },
    /// Key performance indicators.
    Kpi {
        #[command(subcommand)]
        action: KpiAction,
    },
    /// WIS2 topic hierarchy.
    Topics {
        #[command(subcommand)]
        action: TopicsAction,
    },
    /// Reference data bundle.
    Bundle {
        #[command(subcommand)]
        action: BundleAction,
    },
}

#[derive(Subcommand)]
enum EtsAction {
    /// Run the test suite against a record (`-` reads stdin).
    Validate { file: String },
}

#[derive(Subcommand)]
enum KpiAction {
    /// Score a record (`-` reads stdin).
    Validate {
        file: String,
        /// Require the test suite to pass before scoring.
        #[arg(long)]
        fail_on_ets: bool,
        /// Indicator to run (repeatable; default all).
        #[arg(long = "kpi", value_name = "ID")]
        kpis: Vec<String>,
        /// Print totals only.
        #[arg(long)]
        summary: bool,
        /// Add per-category subtotals.
        #[arg(long)]
        group: bool,
    },
}

#[derive(Subcommand)]
enum TopicsAction {
    /// Validate a topic.
    Validate {
        topic: String,
        /// Accept a matching prefix.
        #[arg(long)]
        fuzzy: bool,
    },
    /// List the tokens permitted after a prefix.
    List {
        #[arg(default_value = "")]
        prefix: String,
    },
}

#[derive(Subcommand)]
enum BundleAction {
    /// Describe the loaded reference data.
    Info,
}

fn init_logging(cli: &Cli) -> Result<()> {
    let filter = match (cli.verbosity, &cli.log) {
        (Some(level), _) => EnvFilter::new(level.directive()),
        (None, Some(_)) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        (None, None) => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => return Ok(()),
        },
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match &cli.log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn read_input(file: &str) -> Result<Vec<u8>> {
    if file == "-" {
        let mut raw = Vec::new();
        io::stdin()
            .read_to_end(&mut raw)
            .context("cannot read record from stdin")?;
        return Ok(raw);
    }
    std::fs::read(file).with_context(|| format!("cannot read record {file}"))
}

fn open_engine(bundle: &Path) -> Result<Engine> {
    let bundle = Bundle::open(bundle)
        .with_context(|| format!("cannot load reference bundle {}", bundle.display()))?;
    debug!(root = %bundle.root().display(), "reference bundle loaded");
    Ok(Engine::new(bundle.data()))
}

fn load_document(engine: &Engine, file: &str) -> Result<NormalizedDocument> {
    let raw = read_input(file)?;
    engine
        .parse(&raw, None)
        .with_context(|| format!("cannot parse record {file}"))
}

fn ets_validate(engine: &Engine, file: &str) -> Result<()> {
    let document = load_document(engine, file)?;
    let report = engine.run_tests(&document)?;

    let title = format!("{} Test Suite Report", report.suite.title());
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    if let Some(identifier) = &report.identifier {
        println!("Record: {identifier}");
    }
    println!();

    for result in &report.results {
        println!("[{}] {}: {}", result.status, result.id, result.description);
        if let Some(message) = &result.message {
            println!("       {message}");
        }
    }

    let summary = report.summary();
    println!();
    println!(
        "Summary: {} passed, {} skipped, {} failed",
        summary.passed, summary.skipped, summary.failed
    );

    if report.status() == ClauseStatus::Fail {
        eprintln!("Conformance FAILED: {} clause(s) did not pass.", summary.failed);
        process::exit(1);
    }

    println!("Conformance PASSED.");
    Ok(())
}

fn kpi_validate(engine: &Engine, file: &str, options: &KpiOptions) -> Result<()> {
    let document = load_document(engine, file)?;
    match engine.evaluate(&document, options) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(Error::TestSuite(err)) => {
            eprintln!("{err}");
            for message in &err.errors {
                eprintln!("  {message}");
            }
            process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

fn bundle_info(engine: &Engine, root: &Path) -> Result<()> {
    let reference = engine.reference();
    let codelists: Vec<String> = reference
        .codelists()
        .names()
        .map(|(authority, name)| format!("{authority}:{name}"))
        .collect();
    let info = json!({
        "root": root.display().to_string(),
        "codelists": codelists,
        "wcmp2_schema": reference.schema().is_some(),
        "topic_levels": reference.topics().map(|t| t.depth()),
        "weights": reference.weights(),
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    let engine = open_engine(&cli.bundle)?;

    match &cli.command {
        Command::Ets {
            action: EtsAction::Validate { file },
        } => ets_validate(&engine, file),
        Command::Kpi {
            action:
                KpiAction::Validate {
                    file,
                    fail_on_ets,
                    kpis,
                    summary,
                    group,
                },
        } => {
            let options = KpiOptions {
                fail_on_ets: *fail_on_ets,
                selected: kpis.clone(),
                summary_only: *summary,
                group_by_category: *group,
            };
            kpi_validate(&engine, file, &options)
        }
        Command::Topics { action } => {
            let validator = engine.topics()?;
            match action {
                TopicsAction::Validate { topic, fuzzy } => {
                    let result = validator.validate(topic, *fuzzy);
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                TopicsAction::List { prefix } => {
                    let children = validator.list_children(prefix);
                    println!("{}", serde_json::to_string_pretty(&children)?);
                }
            }
            Ok(())
        }
        Command::Bundle {
            action: BundleAction::Info,
        } => bundle_info(&engine, &cli.bundle),
    }
}
