//! Build automation tasks for the pool-warden workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Minimum supported Rust version, kept in step with the workspace manifest.
const MSRV: &str = "1.85";

/// Feature sets of `pool-warden` that CI must build and test.
const FEATURE_SETS: &[&[&str]] = &[&[], &["serde"]];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for pool-warden")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format check, clippy per feature set, tests, docs
    Ci,
    /// Check formatting
    Fmt {
        /// Rewrite files instead of checking
        #[arg(long)]
        fix: bool,
    },
    /// Clippy for every feature set, warnings denied
    Clippy,
    /// Tests for every feature set
    Test,
    /// Property tests with a raised case count
    Proptest {
        /// Cases per property
        #[arg(long, default_value_t = 1024)]
        cases: u32,
    },
    /// Check the library against the minimum supported toolchain
    Msrv,
    /// Build docs with warnings denied
    Doc,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh, false)?;
            for_each_feature_set(|features| clippy(&sh, features))?;
            for_each_feature_set(|features| test(&sh, features))?;
            doc(&sh)?;
            println!("CI checks passed.");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy => for_each_feature_set(|features| clippy(&sh, features))?,
        Command::Test => for_each_feature_set(|features| test(&sh, features))?,
        Command::Proptest { cases } => proptest(&sh, cases)?,
        Command::Msrv => msrv(&sh)?,
        Command::Doc => doc(&sh)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .map(PathBuf::from)
        .context("xtask is not inside the workspace")
}

fn for_each_feature_set(mut run: impl FnMut(&str) -> Result<()>) -> Result<()> {
    for set in FEATURE_SETS {
        let features = set.join(",");
        println!("== features: [{features}]");
        run(&features)?;
    }
    Ok(())
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        cmd!(sh, "cargo fmt --all").run()?;
    } else {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
    }
    Ok(())
}

/// `--features` arguments selecting `features` on the library crate.
fn feature_args(features: &str) -> Vec<String> {
    if features.is_empty() {
        Vec::new()
    } else {
        vec!["--features".to_string(), format!("pool-warden/{features}")]
    }
}

fn clippy(sh: &Shell, features: &str) -> Result<()> {
    let args = feature_args(features);
    cmd!(sh, "cargo clippy --workspace --all-targets {args...} -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell, features: &str) -> Result<()> {
    let args = feature_args(features);
    cmd!(sh, "cargo test --workspace {args...}").run()?;
    Ok(())
}

fn proptest(sh: &Shell, cases: u32) -> Result<()> {
    if cases == 0 {
        bail!("--cases must be at least 1");
    }
    cmd!(sh, "cargo test -p pool-warden-testing --test properties")
        .env("PROPTEST_CASES", cases.to_string())
        .run()?;
    Ok(())
}

fn msrv(sh: &Shell) -> Result<()> {
    let toolchain = format!("+{MSRV}");
    cmd!(sh, "cargo {toolchain} check -p pool-warden --all-features")
        .run()
        .with_context(|| format!("toolchain {MSRV} must be installed"))?;
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo doc --workspace --all-features --no-deps")
        .env("RUSTDOCFLAGS", "-D warnings")
        .run()?;
    Ok(())
}
