use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::Command;

const PRELOAD_PACKAGE: &str = "wimps-preload";
const PRELOAD_LIBRARY: &str = "libwimps_preload.so";
// Without it the library loads but never samples
const PRELOAD_FEATURES: &str = "autostart";

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Build the sampler library and copy it into the working directory
    BuildPreload {
        #[arg(long)]
        release: bool,
        /// Where to put libwimps_preload.so (default: working directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::BuildPreload { release, out_dir } => {
            let out_dir = match out_dir {
                Some(dir) => dir,
                None => std::env::current_dir().context("Failed to resolve working directory")?,
            };
            build_preload(release, &out_dir)?;
        }
    }

    Ok(())
}

fn build_preload(release: bool, out_dir: &Path) -> Result<()> {
    let mut cmd = Command::new(std::env::var("CARGO").unwrap_or_else(|_| "cargo".into()));
    cmd.arg("build")
        .arg("--package")
        .arg(PRELOAD_PACKAGE)
        .arg("--features")
        .arg(PRELOAD_FEATURES);
    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().context("Failed to build sampler library")?;
    if !status.success() {
        anyhow::bail!("Failed to build sampler library");
    }

    let profile = if release { "release" } else { "debug" };
    let built = target_dir().join(profile).join(PRELOAD_LIBRARY);
    let installed = out_dir.join(PRELOAD_LIBRARY);
    std::fs::copy(&built, &installed)
        .with_context(|| format!("Failed to copy {} to {}", built.display(), installed.display()))?;

    println!("✓ Sampler library built successfully");
    println!("  Profile: {profile}");
    println!("  Installed: {}", installed.display());

    Ok(())
}

fn target_dir() -> PathBuf {
    std::env::var_os("CARGO_TARGET_DIR").map_or_else(
        || Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("target"),
        PathBuf::from,
    )
}
