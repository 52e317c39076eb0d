//! # Legacy Codec Migration
//!
//! Rewrites raw and gzip blobs into snappy in parallel, validating each
//! rewrite before (optionally) pruning the original.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use snapper_cas::{find_legacy_blobs, migrate_blob, MigrationOutcome};
use snapper_config::{log_migrate_debug, log_migrate_error, log_migrate_info, MigrateConfig};

use crate::status::{format_bytes, format_number};

/// Maximum threads for migration (preserve system resources)
pub const MAX_MIGRATE_THREADS: usize = 4;

#[derive(Args, Debug)]
pub struct SnapifyArgs {
    /// Directory tree to migrate (defaults to the data dir)
    #[arg(value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Remove each legacy file once its rewrite validated
    #[arg(long)]
    prune: bool,

    /// Worker threads (default: min(cpus / 2, 4))
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

/// Calculate default thread count: min(cpu_cores / 2, MAX_MIGRATE_THREADS)
pub fn default_thread_count() -> usize {
    (num_cpus::get() / 2).clamp(1, MAX_MIGRATE_THREADS)
}

pub fn run(data_dir: &Path, defaults: &MigrateConfig, args: SnapifyArgs) -> Result<()> {
    let root = args.directory.unwrap_or_else(|| data_dir.to_path_buf());
    let prune = args.prune || defaults.prune_legacy;
    let threads = args
        .threads
        .or(defaults.threads)
        .unwrap_or_else(default_thread_count);

    let legacy = find_legacy_blobs(&root)
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    if legacy.is_empty() {
        println!("  ✅ Nothing to migrate under {}", root.display());
        return Ok(());
    }
    log_migrate_info!(
        "Starting migration",
        files = legacy.len(),
        threads = threads,
        prune = prune
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("snapper-snapify-{}", i))
        .build()
        .context("Failed to create migration thread pool")?;

    let pb = ProgressBar::new(legacy.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    pb.set_message("rewriting");

    let results: Vec<(&PathBuf, snapper_cas::Result<MigrationOutcome>)> = pool.install(|| {
        legacy
            .par_iter()
            .progress_with(pb.clone())
            .map(|path| (path, migrate_blob(path, prune)))
            .collect()
    });
    pb.finish_and_clear();

    let mut converted = 0u64;
    let mut reused = 0u64;
    let mut pruned = 0u64;
    let mut bytes = 0u64;
    let mut failed = 0u64;
    for (path, result) in &results {
        match result {
            Ok(outcome) => {
                log_migrate_debug!(
                    "Migrated",
                    path = tracing::field::debug(&outcome.target),
                    codec = tracing::field::display(outcome.codec)
                );
                if outcome.reused_existing {
                    reused += 1;
                } else {
                    converted += 1;
                }
                if outcome.pruned {
                    pruned += 1;
                }
                bytes += outcome.bytes;
            }
            Err(e) => {
                failed += 1;
                log_migrate_error!(
                    "Migration failed",
                    path = tracing::field::debug(path),
                    error = tracing::field::display(e)
                );
                eprintln!("  {} {}: {}", style("✗").red(), path.display(), e);
            }
        }
    }

    println!();
    println!("  Snapify Summary");
    println!("  ===============");
    println!("    🔄 Converted:  {} ({} decoded)", format_number(converted), format_bytes(bytes));
    println!("    ♻️  Existing:   {}", format_number(reused));
    if prune {
        println!("    🗑️  Pruned:     {}", format_number(pruned));
    }
    if failed > 0 {
        println!("    ❌ Failed:     {}", format_number(failed));
        anyhow::bail!("{} of {} blobs failed to migrate", failed, results.len());
    }
    Ok(())
}
