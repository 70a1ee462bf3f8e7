//! # wimps-read - Trace Reader Entry Point
//!
//! `wimps-read [--format text|json] [--summary] <TRACE>`
//!
//! A trace that fails to parse still has its readable prefix printed before
//! the error, and the exit code names the failure kind.

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use log::{debug, warn};
use wimps::cli::{self, OutputFormat, ReadArgs};
use wimps::domain::Trace;
use wimps::trace::{self, read_trace, write_json_lines, write_text, Summary};
use wimps_common::exit;

fn main() {
    env_logger::init();
    let args: ReadArgs = cli::parse_or_exit();
    std::process::exit(run(&args));
}

fn run(args: &ReadArgs) -> i32 {
    let input = match trace::open(&args.trace) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("error: {e}");
            return e.exit_code();
        }
    };

    let (trace, failure) = match read_trace(input) {
        Ok(trace) => (trace, None),
        Err(e) => {
            warn!("returning {} samples recovered before the failure", e.recovered.len());
            (e.recovered, Some(e.error))
        }
    };
    debug!("read {} samples from {}", trace.len(), args.trace.display());

    if let Err(e) = print(args, &trace) {
        eprintln!("error: {e:#}");
        return exit::READ_FAILED;
    }

    match failure {
        None => exit::SUCCESS,
        Some(e) => {
            eprintln!("error: {}: {e}", args.trace.display());
            e.exit_code()
        }
    }
}

fn print(args: &ReadArgs, trace: &Trace) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let written = if args.summary {
        writeln!(out, "{}", Summary::of(trace))
    } else {
        match args.format {
            OutputFormat::Text => write_text(&mut out, &trace.samples),
            OutputFormat::Json => write_json_lines(&mut out, &trace.samples),
        }
    };
    written.context("failed to write samples")?;

    out.flush().context("failed to flush output")?;
    Ok(())
}
