//! Clean command implementation.

use std::path::Path;

/// Deletes the store directory at `path`.
///
/// Refuses directories that hold neither a log nor a salt file, so a
/// mistyped path cannot wipe unrelated data.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        println!("Nothing to clean at {:?}", path);
        return Ok(());
    }
    if !is_store_dir(path) {
        return Err(format!("{:?} does not look like a Vapor store", path).into());
    }

    std::fs::remove_dir_all(path)?;
    tracing::info!(path = %path.display(), "store removed");
    Ok(())
}

fn is_store_dir(path: &Path) -> bool {
    path.join("batches.log").exists() || path.join(super::SALT_FILE).exists()
}
