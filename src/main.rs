use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

use treepatch::{apply, create, diff, logging, state, ApplyOutcome, Postcondition, ScanOptions};

#[derive(Parser)]
#[command(name = "treepatch", about = "Snapshot directory trees and create or apply verified patches")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Skip every file or directory whose absolute path contains this text
    #[arg(long, global = true)]
    exclude: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the state of a directory as JSON, followed by its fingerprint
    State {
        /// Directory to scan
        root: PathBuf,
    },
    /// Show what changed between two directories
    Diff {
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        new: PathBuf,
        /// Print the full delta as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a patch by comparing old and new directories
    Create {
        /// Path to the old (original) directory
        #[arg(long)]
        old: PathBuf,
        /// Path to the new (updated) directory
        #[arg(long)]
        new: PathBuf,
        /// Output path for the patch file
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Apply a patch to a target directory
    Apply {
        /// Path to the target directory to patch
        #[arg(long)]
        target: PathBuf,
        /// Path to the patch file
        #[arg(long, short)]
        patch: PathBuf,
    },
    /// Print the metadata stored in a patch file
    Inspect {
        /// Path to the patch file
        patch: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let options = ScanOptions {
        exclude: cli.exclude,
        ..ScanOptions::default()
    };

    match cli.command {
        Commands::State { root } => {
            let state = tokio::task::spawn_blocking(move || state::scan(&root, &options))
                .await?
                .context("Failed to scan directory")?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            println!("Fingerprint: {}", state.fingerprint());
        }
        Commands::Diff { old, new, json } => {
            let delta = tokio::task::spawn_blocking(move || -> anyhow::Result<diff::Delta> {
                let (old_state, new_state) = (
                    state::scan(&old, &options)
                        .with_context(|| format!("Failed to scan {}", old.display()))?,
                    state::scan(&new, &options)
                        .with_context(|| format!("Failed to scan {}", new.display()))?,
                );
                Ok(diff::diff(&old_state, &new_state))
            })
            .await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&delta)?);
            } else {
                for path in &delta.removed {
                    println!("-  {}", path);
                }
                for path in &delta.added {
                    println!("+  {}", path);
                }
                for path in &delta.changed {
                    println!("*  {}", path);
                }
                println!("Source state: {}", delta.source_fingerprint);
                println!("Target state: {}", delta.target_fingerprint);
            }
        }
        Commands::Create { old, new, output } => {
            println!("Creating patch...");
            println!("  Old: {}", old.display());
            println!("  New: {}", new.display());
            println!("  Output: {}", output.display());

            let start = Instant::now();
            let (delta, summary) = tokio::task::spawn_blocking(move || {
                create::create_patch(&old, &new, &output, &options)
            })
            .await?
            .context("Failed to create patch")?;
            let elapsed = start.elapsed();

            println!("\nPatch created successfully!");
            println!("  Files added: {}", summary.files_added);
            println!("  Files modified: {}", summary.files_modified);
            println!("  Files deleted: {}", summary.files_deleted);
            println!("  Patch size: {} bytes", summary.archive_bytes);
            println!("  Source state: {}", delta.source_fingerprint);
            println!("  Target state: {}", delta.target_fingerprint);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Apply { target, patch } => {
            println!("Applying patch...");
            println!("  Target: {}", target.display());
            println!("  Patch: {}", patch.display());

            let start = Instant::now();
            let outcome = tokio::task::spawn_blocking(move || {
                apply::apply_patch(&target, &patch, &options)
            })
            .await?
            .context("Failed to apply patch")?;
            let elapsed = start.elapsed();

            match outcome {
                ApplyOutcome::NoOpAlreadyCurrent => {
                    println!("\nTarget already matches the patch; nothing to do.");
                }
                ApplyOutcome::Applied(report) => {
                    println!("\nPatch applied.");
                    println!("  Files deleted: {}", report.removed.len());
                    println!("  Files already absent: {}", report.missing_removals.len());
                    println!("  Files written: {}", report.written.len());
                    println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
                    match &report.postcondition {
                        Postcondition::Matched => {}
                        Postcondition::Diverged { expected, actual } => {
                            println!("  Warning: final state {} differs from patch target {}", actual, expected);
                        }
                        Postcondition::Unverified { reason } => {
                            println!("  Warning: final state could not be verified: {}", reason);
                        }
                    }
                    if !report.failures.is_empty() {
                        for failure in &report.failures {
                            eprintln!("  Failed: {}: {}", failure.path, failure.error);
                        }
                        bail!("{} file(s) could not be patched", report.failures.len());
                    }
                }
            }
        }
        Commands::Inspect { patch } => {
            let delta = tokio::task::spawn_blocking(move || apply::read_delta(&patch))
                .await?
                .context("Failed to read patch")?;
            println!("{}", serde_json::to_string_pretty(&delta)?);
        }
    }

    Ok(())
}
