//! # wimps - Launcher Entry Point
//!
//! `wimps [--preload <PATH>] <COMMAND> [ARGS]...`
//!
//! Runs the command under ptrace with the sampler injected and relays signals
//! until it ends. Exits 0 once the target has exited or been killed, whatever
//! its own status; setup and usage failures exit with the code from
//! [`wimps_common::exit`].

use log::{info, warn};
use wimps::cli::{self, LaunchArgs};
use wimps::domain::SupervisorError;
use wimps::supervisor::{ExitOutcome, Supervisor};
use wimps_common::exit;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => exit::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    });
}

fn run() -> Result<(), SupervisorError> {
    let args: LaunchArgs = cli::parse_or_exit();

    let mut supervisor = Supervisor::new();
    if let Some(preload) = args.preload {
        supervisor = supervisor.preload(preload);
    }

    match supervisor.launch(&args.command)? {
        ExitOutcome::Exited(0) => info!("target exited cleanly"),
        outcome => warn!("target {outcome}"),
    }
    Ok(())
}
