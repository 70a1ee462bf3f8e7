//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "wimps",
    version,
    about = "Run a program and sample its call stack once per second",
    after_help = "\
EXAMPLES:
    wimps ./my-app --flag value              Profile ./my-app with arguments
    wimps --preload /opt/wimps/libwimps_preload.so my-app

The trace is written to the target's working directory as
_wimps_trace_v1_pid<PID>_time<EPOCH>_<EXE>_"
)]
pub struct LaunchArgs {
    /// Sampler shared object to inject (default: ./libwimps_preload.so)
    #[arg(long, value_name = "PATH")]
    pub preload: Option<PathBuf>,

    /// Program to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

/// How parsed samples are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One header line per sample followed by its addresses
    Text,
    /// One JSON object per sample, one per line
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "wimps-read", version, about = "Print the samples stored in a wimps trace file")]
pub struct ReadArgs {
    /// Trace file written by the sampler
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print only summary statistics
    #[arg(short, long)]
    pub summary: bool,
}
