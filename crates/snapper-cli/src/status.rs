//! # Store Status
//!
//! Blob counts per codec and on-disk footprint.

use anyhow::{Context, Result};
use console::style;
use snapper_cas::AssetStore;

pub fn run(store: &AssetStore, json: bool) -> Result<()> {
    let stats = store.stats().context("Failed to scan data directory")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!();
    println!("  Snapper Store Status");
    println!("  ====================");
    println!("    📁 Data:    {}", store.data_dir().display());
    println!("    📁 Spool:   {}", store.spool_dir().display());
    println!();
    println!("    📦 Blobs:   {} ({})", format_number(stats.blob_count()), format_bytes(stats.total_bytes));
    println!("       snappy:  {}", format_number(stats.snappy_blobs));
    println!("       gzip:    {}", format_number(stats.gzip_blobs));
    println!("       raw:     {}", format_number(stats.raw_blobs));

    if stats.legacy_count() > 0 {
        println!();
        println!(
            "  {} {} legacy blobs can be rewritten with `snapper snapify`.",
            style("💡").yellow(),
            format_number(stats.legacy_count())
        );
    }
    Ok(())
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(3 * 1073741824), "3.00 GB");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(4096), "4,096");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
