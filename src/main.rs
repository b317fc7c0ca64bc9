//! fanscan - bounded concurrent file scanner
//!
//! Entry point for the CLI application.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use fanscan::config::{CliArgs, Command, PipelineConfig};
use fanscan::render::render_report;
use fanscan::{CancelToken, DirSource, HashCompare, ListingSource, PatternScan};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let mut config = PipelineConfig::from_args(&args).context("Invalid configuration")?;

    // Ctrl-C stops the walk; queued work still drains
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        handler_token.cancel();
    })
    .context("Failed to set signal handler")?;

    let builder = fanscan::scan()
        .cancel_token(cancel)
        .collect_walk_errors(args.verbose > 0);

    let builder = match &args.command {
        Command::Grep {
            pattern,
            path,
            exclude,
            ignore_case,
            names,
        } => {
            config.walk.name_filter = names.to_filter().context("Invalid name filter")?;
            let processor = PatternScan::new(pattern, exclude.as_deref(), *ignore_case)
                .context("Invalid pattern")?;
            let source = DirSource::new(path)
                .with_context(|| format!("Cannot scan {}", path.display()))?;
            builder.source(source).processor(processor)
        }
        Command::FindHash { hash, path, names } => {
            config.walk.name_filter = names.to_filter().context("Invalid name filter")?;
            let processor = HashCompare::new(hash).context("Invalid digest")?;
            if let Some(alg) = processor.algorithm() {
                info!(algorithm = %alg, "selected digest");
            }
            let source = DirSource::new(path)
                .with_context(|| format!("Cannot scan {}", path.display()))?;
            builder.source(source).processor(processor)
        }
        Command::Verify { listing } => {
            let source = ListingSource::new(listing)
                .with_context(|| format!("Cannot read listing {}", listing.display()))?;
            builder.source(source).processor(HashCompare::per_item())
        }
    };

    let report = builder.config(config).run().context("Scan failed")?;

    let color = !args.no_color && console::colors_enabled();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_report(&mut out, &report, color).context("Failed to write output")?;
    out.flush().context("Failed to write output")?;

    if args.verbose > 0 {
        for e in &report.walk_errors {
            eprintln!("warning: {e}");
        }
    }

    Ok(ExitCode::from(report.termination.exit_code()))
}

fn setup_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "fanscan=warn",
        1 => "fanscan=debug",
        _ => "fanscan=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_names(verbose > 1)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to set up logging: {e}"))
}
