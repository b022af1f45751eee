//! Command-line front end: read an evaluation request as JSON, write the
//! report as JSON.
//!
//! ```text
//! slabscore --sample --pretty
//! slabscore --input request.json --config slabscore.toml
//! cat request.json | slabscore
//! ```

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use slabscore::config::EvalConfig;
use slabscore::document::Document;
use slabscore::pipeline::{EvaluationRequest, Evaluator};
use slabscore::{Error, ErrorKind, ErrorResponse};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "slabscore")]
#[command(version, about = "Compare fixed-window and semantic chunking for RAG", long_about = None)]
struct Cli {
    /// TOML config file, layered under SLABSCORE_* environment variables
    #[arg(short, long, env = "SLABSCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Request JSON file; stdin when omitted
    #[arg(short, long, conflicts_with = "sample")]
    input: Option<PathBuf>,

    /// Evaluate the bundled sample document
    #[arg(long)]
    sample: bool,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slabscore=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let response = classify(&err);
            error!(kind = ?response.kind, "{}", response.message);
            if let Ok(json) = serde_json::to_string(&response) {
                println!("{json}");
            }
            exit_code(response.kind)
        }
    }
}

/// Library errors keep their kind; anything else failed outside the request.
fn classify(err: &anyhow::Error) -> ErrorResponse {
    match err.downcast_ref::<Error>() {
        Some(e) => ErrorResponse {
            kind: e.kind(),
            message: format!("{err:#}"),
        },
        None => ErrorResponse {
            kind: ErrorKind::Internal,
            message: format!("{err:#}"),
        },
    }
}

fn exit_code(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::Input => ExitCode::from(2),
        ErrorKind::Provider | ErrorKind::Config | ErrorKind::Internal => ExitCode::FAILURE,
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = EvalConfig::load(cli.config.as_deref())?;
    let evaluator = Evaluator::from_config(config);

    let request = if cli.sample {
        EvaluationRequest::new(Document::sample())
    } else {
        read_request(cli.input.as_ref())?
    };
    info!(document = %request.document.id, "evaluating");

    let report = evaluator.run(&request)?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}")?;
    Ok(())
}

fn read_request(path: Option<&PathBuf>) -> anyhow::Result<EvaluationRequest> {
    let raw = match path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            buf
        }
    };
    parse_request(&raw)
}

/// A request that does not parse is the caller's to fix.
fn parse_request(raw: &str) -> anyhow::Result<EvaluationRequest> {
    serde_json::from_str(raw)
        .map_err(|e| Error::InvalidParameter(format!("request JSON: {e}")))
        .context("parsing request")
}
