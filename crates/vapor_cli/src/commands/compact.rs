//! Compact command implementation.

use serde::Serialize;
use vapor_core::Store;

/// Compaction statistics.
#[derive(Debug, Serialize)]
pub struct CompactReport {
    /// Sequence number carried by the compacted log.
    pub sequence: u64,
    /// Live keys written to the new log.
    pub live_keys: usize,
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
}

/// Runs the compact command.
pub fn run(store: &Store, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let before = store.stats()?;
    store.compact()?;
    let after = store.stats()?;

    let report = CompactReport {
        sequence: after.sequence.as_u64(),
        live_keys: after.live_keys,
        bytes_before: before.log_bytes,
        bytes_after: after.log_bytes,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => {
            println!("Compaction complete:");
            println!("  Sequence:   {}", report.sequence);
            println!("  Live keys:  {}", report.live_keys);
            println!("  Log before: {} bytes", report.bytes_before);
            println!("  Log after:  {} bytes", report.bytes_after);
        }
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}
